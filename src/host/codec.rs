//! Native messaging framing
//!
//! Each message is a 32-bit length in native byte order followed by that
//! many bytes of UTF-8 JSON.

use std::io::ErrorKind;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::models::{InboundMessage, OutboundMessage};

/// Largest frame the browser sends to a host
pub const MAX_INBOUND_FRAME: usize = 64 * 1024 * 1024;
/// Largest frame the browser accepts from a host
pub const MAX_OUTBOUND_FRAME: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame of {len} bytes exceeds limit of {limit} bytes")]
    TooLarge { len: usize, limit: usize },
    #[error("stream closed in the middle of a frame")]
    Truncated,
    #[error("invalid message: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Read one frame. `Ok(None)` means the peer closed the stream between frames.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        let n = reader.read(&mut len_buf[filled..]).await?;
        if n == 0 {
            return if filled == 0 {
                Ok(None)
            } else {
                Err(FrameError::Truncated)
            };
        }
        filled += n;
    }

    let len = u32::from_ne_bytes(len_buf) as usize;
    if len > MAX_INBOUND_FRAME {
        return Err(FrameError::TooLarge {
            len,
            limit: MAX_INBOUND_FRAME,
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            FrameError::Truncated
        } else {
            FrameError::Io(e)
        }
    })?;
    Ok(Some(payload))
}

/// Write one frame and flush it
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_OUTBOUND_FRAME {
        return Err(FrameError::TooLarge {
            len: payload.len(),
            limit: MAX_OUTBOUND_FRAME,
        });
    }
    let mut frame = Vec::with_capacity(payload.len() + 4);
    frame.extend_from_slice(&(payload.len() as u32).to_ne_bytes());
    frame.extend_from_slice(payload);
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

pub fn decode_message(payload: &[u8]) -> Result<InboundMessage, FrameError> {
    Ok(serde_json::from_slice(payload)?)
}

pub async fn write_message<W>(writer: &mut W, message: &OutboundMessage) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let payload = serde_json::to_vec(message)?;
    write_frame(writer, &payload).await
}

/// Pack replay commands into `export` messages that each serialize to at
/// most `limit` bytes, keeping command order.
///
/// An empty list still yields one empty `export`. Fails with
/// [`FrameError::TooLarge`] when a single command cannot fit on its own.
pub fn export_frames(
    commands: &[String],
    limit: usize,
) -> Result<Vec<OutboundMessage>, FrameError> {
    let overhead = serde_json::to_vec(&OutboundMessage::Export { data: Vec::new() })?.len();
    let mut frames = Vec::new();
    let mut batch: Vec<String> = Vec::new();
    let mut size = overhead;

    for command in commands {
        let encoded = serde_json::to_string(command)?.len();
        if overhead + encoded > limit {
            return Err(FrameError::TooLarge {
                len: overhead + encoded,
                limit,
            });
        }
        // Array elements are comma separated.
        let separator = usize::from(!batch.is_empty());
        if size + separator + encoded > limit {
            frames.push(OutboundMessage::Export {
                data: std::mem::take(&mut batch),
            });
            size = overhead;
        }
        size += usize::from(!batch.is_empty()) + encoded;
        batch.push(command.clone());
    }

    if !batch.is_empty() || frames.is_empty() {
        frames.push(OutboundMessage::Export { data: batch });
    }
    Ok(frames)
}
