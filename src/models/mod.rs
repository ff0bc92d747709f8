//! Data models for the API recorder
//!
//! These models are shared between the recorder core and its transports.

pub mod event;
pub mod message;
pub mod request;

pub use event::*;
pub use message::*;
pub use request::*;
