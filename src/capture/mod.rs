//! Capture pipeline
//!
//! Correlates lifecycle fragments into complete requests, decodes request
//! bodies and scopes requests to the recorded domain.

pub mod body;
pub mod correlator;
pub mod domain;

pub use body::decode_body;
pub use correlator::{CaptureMode, RequestCorrelator, DEFAULT_PENDING_TTL};
