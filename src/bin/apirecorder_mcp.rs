//! Standalone MCP server binary for API Recorder.
//!
//! Runs the MCP server over stdio, reading the session the native messaging
//! host persists under the same storage path.
//!
//! Usage:
//! ```
//! cargo run --bin apirecorder_mcp -- --storage-path ./apirecorder_data
//! ```

use std::path::PathBuf;

use apirecorder_core::mcp::{McpServerConfig, RecorderMcpServer};
use rmcp::ServiceExt;
use tokio::io::{stdin, stdout};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = parse_args();

    tracing::info!("Starting API Recorder MCP server (rmcp SDK)");

    let server = RecorderMcpServer::new(config);
    server.bootstrap().await?;

    // stdout carries the MCP protocol
    let transport = (stdin(), stdout());
    let service = server.serve(transport).await?;
    service.waiting().await?;

    Ok(())
}

fn init_tracing() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(LevelFilter::INFO)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn parse_args() -> McpServerConfig {
    let mut args = std::env::args().skip(1);
    let mut config = McpServerConfig::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--storage-path" => {
                if let Some(path) = args.next() {
                    config.storage_path = PathBuf::from(path);
                }
            }
            "--allow-writes" => {
                config.allow_writes = true;
            }
            "--help" | "-h" => {
                eprintln!("API Recorder MCP Server");
                eprintln!();
                eprintln!("Usage: apirecorder_mcp [OPTIONS]");
                eprintln!();
                eprintln!("Options:");
                eprintln!("  --storage-path <PATH>   Storage path shared with the native host");
                eprintln!("  --allow-writes          Enable tools that send network traffic (replay)");
                eprintln!("  --help, -h              Show this help");
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {arg}");
            }
        }
    }

    config
}
