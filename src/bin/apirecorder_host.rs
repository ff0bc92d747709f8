//! Native messaging host for the API Recorder extension.
//!
//! The browser launches this binary and talks to it over stdin/stdout using
//! length-prefixed JSON frames. Logs go to stderr (debug builds) or to a
//! daily file under the storage path (release builds).
//!
//! Usage:
//! ```
//! apirecorder_host --storage-path ./apirecorder_data --port
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use apirecorder_core::api::{init_logging, BroadcastSink, Recorder};
use apirecorder_core::capture::CaptureMode;
use apirecorder_core::config::RecorderConfig;
use apirecorder_core::host::{run_host, HostTransport};
use tokio::io::{stdin, stdout};

#[derive(Debug)]
struct HostArgs {
    config: RecorderConfig,
    port_mode: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args_from(std::env::args().skip(1));
    init_logging(Some(args.config.storage_path.as_path()))?;

    let sink = Arc::new(BroadcastSink::default());
    let transport = if args.port_mode {
        HostTransport::Port(sink.subscribe())
    } else {
        HostTransport::Message
    };

    tracing::info!(
        "Starting native messaging host (mode: {}, capture: {:?})",
        if args.port_mode { "port" } else { "message" },
        args.config.capture_mode
    );
    let recorder = Arc::new(Recorder::open(args.config, sink).await?);
    run_host(recorder, transport, stdin(), stdout()).await
}

fn parse_args_from<I>(mut args: I) -> HostArgs
where
    I: Iterator<Item = String>,
{
    let mut config = RecorderConfig::default();
    let mut port_mode = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--storage-path" => {
                if let Some(path) = args.next() {
                    config.storage_path = PathBuf::from(path);
                }
            }
            "--capture-responses" => {
                config.capture_mode = CaptureMode::WithResponse;
            }
            "--pending-ttl-secs" => {
                match args.next().map(|v| v.parse::<u64>()) {
                    Some(Ok(secs)) if secs > 0 => config.pending_ttl = Duration::from_secs(secs),
                    _ => eprintln!("--pending-ttl-secs expects a positive number of seconds"),
                }
            }
            "--port" => {
                port_mode = true;
            }
            "--help" | "-h" => {
                eprintln!("API Recorder native messaging host");
                eprintln!();
                eprintln!("Usage: apirecorder_host [OPTIONS]");
                eprintln!();
                eprintln!("Options:");
                eprintln!("  --storage-path <PATH>     State and log directory (default: platform data dir)");
                eprintln!("  --capture-responses       Wait for response status and body before completing");
                eprintln!("  --pending-ttl-secs <N>    Seconds an incomplete request is kept (default: 30)");
                eprintln!("  --port                    Stream update/export pushes on this connection");
                eprintln!("  --help, -h                Show this help");
                std::process::exit(0);
            }
            // The browser passes the caller's origin (and a parent window on Windows).
            origin if origin.contains("-extension://") || origin.starts_with("--parent-window") => {}
            _ => {
                eprintln!("Unknown argument: {arg}");
            }
        }
    }

    HostArgs { config, port_mode }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> HostArgs {
        parse_args_from(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn defaults_to_message_mode() {
        let args = parse(&["chrome-extension://abcdef/"]);
        assert!(!args.port_mode);
        assert_eq!(args.config.capture_mode, CaptureMode::RequestOnly);
        assert_eq!(args.config.pending_ttl, Duration::from_secs(30));
    }

    #[test]
    fn parses_all_flags() {
        let args = parse(&[
            "--storage-path",
            "/tmp/rec",
            "--capture-responses",
            "--pending-ttl-secs",
            "90",
            "--port",
        ]);
        assert!(args.port_mode);
        assert_eq!(args.config.storage_path, PathBuf::from("/tmp/rec"));
        assert_eq!(args.config.capture_mode, CaptureMode::WithResponse);
        assert_eq!(args.config.pending_ttl, Duration::from_secs(90));
    }

    #[test]
    fn invalid_ttl_keeps_default() {
        let args = parse(&["--pending-ttl-secs", "soon"]);
        assert_eq!(args.config.pending_ttl, Duration::from_secs(30));
    }
}
