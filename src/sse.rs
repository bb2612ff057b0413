//! Server-sent event framing
//!
//! Frames are separated by a blank line. Only `data:` lines inside a frame
//! carry payload; a single space after the field marker is dropped and all
//! other lines are ignored. Frame boundaries are found on the raw bytes, so
//! a multi-byte character split across network chunks decodes intact.

use crate::error::TransportError;
use crate::transport::StreamResponse;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

const DATA_FIELD: &str = "data:";

/// Incremental frame decoder
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Offset up to which `buffer` is known to hold no frame boundary
    scanned: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, returning the payloads of every frame it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some((end, delimiter_len)) = find_frame_boundary(&self.buffer, self.scanned) {
            payloads.extend(frame_payloads(&self.buffer[..end]));
            self.buffer.drain(..end + delimiter_len);
            self.scanned = 0;
        }
        // A delimiter may still straddle the next chunk
        self.scanned = self.buffer.len().saturating_sub(2);
        payloads
    }

    /// Flush the trailing partial frame at end of stream
    pub fn finish(&mut self) -> Vec<String> {
        self.scanned = 0;
        let rest = std::mem::take(&mut self.buffer);
        frame_payloads(&rest)
    }

    /// Bytes held back waiting for a frame boundary
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// Locate the first blank line at or after `from`.
///
/// Returns the frame length and the delimiter length (`\n\n` or `\n\r\n`).
fn find_frame_boundary(buffer: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while let Some(offset) = buffer.get(i..)?.iter().position(|&b| b == b'\n') {
        let newline = i + offset;
        match buffer.get(newline + 1) {
            Some(b'\n') => return Some((newline, 2)),
            Some(b'\r') if buffer.get(newline + 2) == Some(&b'\n') => return Some((newline, 3)),
            _ => {}
        }
        i = newline + 1;
    }
    None
}

fn frame_payloads(frame: &[u8]) -> Vec<String> {
    if frame.is_empty() {
        return Vec::new();
    }
    let text = String::from_utf8_lossy(frame);
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter_map(|line| line.strip_prefix(DATA_FIELD))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest).to_string())
        .collect()
}

/// How a pump ended without a transport error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpOutcome {
    /// End of body reached and the trailing frame flushed
    Completed,
    /// Cancellation observed; remaining buffered payloads were discarded
    Cancelled,
}

/// Read a response body to the end, invoking `on_payload` per payload line.
///
/// Non-success status and a missing body are reported before any read.
/// Once `cancel` fires no further payload is delivered, even if bytes for
/// it are already buffered.
pub async fn pump_payloads<F>(
    response: StreamResponse,
    cancel: &CancellationToken,
    mut on_payload: F,
) -> Result<PumpOutcome, TransportError>
where
    F: FnMut(String),
{
    if !response.is_success() {
        return Err(TransportError::status(response.status));
    }
    let Some(mut body) = response.body else {
        return Err(TransportError::missing_body());
    };

    let mut decoder = FrameDecoder::new();
    loop {
        let chunk = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(PumpOutcome::Cancelled),
            chunk = body.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => {
                for payload in decoder.push(&bytes) {
                    if cancel.is_cancelled() {
                        return Ok(PumpOutcome::Cancelled);
                    }
                    on_payload(payload);
                }
            }
            Some(Err(e)) => return Err(e),
            None => break,
        }
    }

    if decoder.pending() > 0 {
        tracing::debug!(bytes = decoder.pending(), "Flushing unterminated final frame");
    }
    for payload in decoder.finish() {
        if cancel.is_cancelled() {
            return Ok(PumpOutcome::Cancelled);
        }
        on_payload(payload);
    }
    Ok(PumpOutcome::Completed)
}
