//! # API Recorder Core

//! Capture-and-correlate engine behind the API Recorder browser extension.
//!
//! ## Features
//!
//! - Correlation of header, body and response events into complete requests
//! - Domain-scoped recording sessions persisted to SQLite
//! - Export to cURL, Postman collections and Playwright tests
//! - Request replay
//! - Native messaging host and MCP server bindings
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │              Browser extension (popup / panel)           │
//! ├───────────────────────────┬─────────────────────────────┤
//! │   Native messaging host   │         MCP server          │
//! ├───────────────────────────┴─────────────────────────────┤
//! │                  API Recorder Core (Rust)                │
//! │  ┌──────────┐  ┌─────────┐  ┌────────┐  ┌───────────┐   │
//! │  │Correlator│──│ Session │──│ Export │  │  Storage  │   │
//! │  │          │  │         │──│        │  │ (SQLite)  │   │
//! │  └──────────┘  └─────────┘  └────────┘  └───────────┘   │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod capture;
pub mod config;
pub mod export;
pub mod host;
pub mod mcp;
pub mod models;
pub mod replay;
pub mod session;
pub mod storage;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
