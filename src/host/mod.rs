//! Native messaging host
//!
//! Binds a [`Recorder`] to a framed byte stream. In message mode each request
//! gets exactly one reply. In port mode the sink's pushes (`update` and
//! `export`) are forwarded as well, and the `stop` reply is not repeated.
//!
//! An `export` too large for one frame is sent as consecutive `export`
//! frames whose `data` arrays concatenate to the full list.

pub mod codec;

pub use codec::{
    decode_message, export_frames, read_frame, write_frame, write_message, FrameError,
    MAX_INBOUND_FRAME, MAX_OUTBOUND_FRAME,
};

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;

use crate::api::Recorder;
use crate::models::OutboundMessage;

const OUTBOUND_QUEUE: usize = 256;

/// How replies and pushes reach the extension
pub enum HostTransport {
    /// One reply per inbound message
    Message,
    /// Long-lived connection that also carries sink pushes
    Port(broadcast::Receiver<OutboundMessage>),
}

impl HostTransport {
    fn is_port(&self) -> bool {
        matches!(self, HostTransport::Port(_))
    }
}

/// Serve the recorder until the peer closes the stream or framing breaks.
pub async fn run_host<R, W>(
    recorder: Arc<Recorder>,
    transport: HostTransport,
    reader: R,
    writer: W,
) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let port_mode = transport.is_port();
    let (out_tx, out_rx) = mpsc::channel::<OutboundMessage>(OUTBOUND_QUEUE);
    let writer_task = tokio::spawn(write_loop(writer, out_rx));

    let forward_task = match transport {
        HostTransport::Port(pushes) => Some(tokio::spawn(forward_pushes(pushes, out_tx.clone()))),
        HostTransport::Message => None,
    };

    // Reads run in their own task so a half-read frame is never dropped by select!.
    let (frame_tx, mut frame_rx) = mpsc::channel(16);
    let reader_task = tokio::spawn(read_loop(reader, frame_tx));

    let mut tick = tokio::time::interval(recorder.config().sweep_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let outcome = loop {
        tokio::select! {
            frame = frame_rx.recv() => {
                let payload = match frame {
                    Some(Ok(payload)) => payload,
                    Some(Err(err)) => break Err(anyhow::Error::from(err)),
                    None => break Ok(()),
                };
                let reply = match decode_message(&payload) {
                    Ok(message) => recorder.handle(message).await,
                    Err(err) => {
                        tracing::warn!("Rejecting inbound message: {}", err);
                        Some(OutboundMessage::error(err.to_string()))
                    }
                };
                let reply = match reply {
                    // The sink already delivered the export to this port.
                    Some(OutboundMessage::Export { .. }) if port_mode => None,
                    other => other,
                };
                if let Some(reply) = reply {
                    if out_tx.send(reply).await.is_err() {
                        break Err(anyhow::anyhow!("output channel closed"));
                    }
                }
            }
            _ = tick.tick() => {
                let salvaged = recorder.sweep().await;
                if !salvaged.is_empty() {
                    tracing::debug!("Sweep admitted {} requests", salvaged.len());
                }
            }
        }
    };

    reader_task.abort();
    if let Some(task) = forward_task {
        task.abort();
        let _ = task.await;
    }
    drop(out_tx);
    if let Err(err) = writer_task.await {
        tracing::warn!("Writer task failed: {}", err);
    }

    match &outcome {
        Ok(()) => tracing::info!("Native messaging peer disconnected"),
        Err(err) => tracing::warn!("Native messaging session ended: {:#}", err),
    }
    outcome
}

async fn read_loop<R>(mut reader: R, frames: mpsc::Sender<Result<Vec<u8>, FrameError>>)
where
    R: AsyncRead + Unpin,
{
    loop {
        match read_frame(&mut reader).await {
            Ok(Some(payload)) => {
                if frames.send(Ok(payload)).await.is_err() {
                    return;
                }
            }
            Ok(None) => return,
            Err(err) => {
                let _ = frames.send(Err(err)).await;
                return;
            }
        }
    }
}

async fn write_loop<W>(mut writer: W, mut outbound: mpsc::Receiver<OutboundMessage>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = outbound.recv().await {
        for frame in outbound_frames(message) {
            match write_message(&mut writer, &frame).await {
                Ok(()) => {}
                Err(FrameError::TooLarge { len, limit }) => {
                    tracing::warn!("Dropping {} byte reply over the {} byte limit", len, limit);
                    let notice = OutboundMessage::error(oversized_reply(len, limit));
                    if let Err(err) = write_message(&mut writer, &notice).await {
                        tracing::warn!("Failed to write to native messaging peer: {}", err);
                        return;
                    }
                }
                Err(err) => {
                    tracing::warn!("Failed to write to native messaging peer: {}", err);
                    return;
                }
            }
        }
    }
}

/// Exports are spread over as many frames as the browser's limit requires.
fn outbound_frames(message: OutboundMessage) -> Vec<OutboundMessage> {
    match message {
        OutboundMessage::Export { data } => match export_frames(&data, MAX_OUTBOUND_FRAME) {
            Ok(frames) => {
                if frames.len() > 1 {
                    tracing::debug!("Sending {} commands in {} export frames", data.len(), frames.len());
                }
                frames
            }
            Err(FrameError::TooLarge { len, limit }) => {
                tracing::warn!("Export command of {} bytes cannot fit a frame", len);
                vec![OutboundMessage::error(oversized_reply(len, limit))]
            }
            Err(err) => vec![OutboundMessage::error(err.to_string())],
        },
        other => vec![other],
    }
}

fn oversized_reply(len: usize, limit: usize) -> String {
    format!("reply of {len} bytes exceeds the {limit} byte message limit")
}

async fn forward_pushes(
    mut pushes: broadcast::Receiver<OutboundMessage>,
    out: mpsc::Sender<OutboundMessage>,
) {
    loop {
        match pushes.recv().await {
            Ok(message) => {
                if out.send(message).await.is_err() {
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("Port fell behind, {} pushes skipped", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}
