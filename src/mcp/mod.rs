//! MCP (Model Context Protocol) binding.
//!
//! A query view over the recorded session, built on the official rmcp SDK.

pub mod sdk_server;

pub use sdk_server::{McpServerConfig, RecorderMcpServer};
