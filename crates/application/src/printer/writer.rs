//! Paced, chunked delivery of an encoded payload.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use domain::{TransportError, WriteError};
use tokio::time::sleep;
use tracing::{debug, trace, warn};

use super::encoder::EncodedPayload;
use super::session::PrinterSession;

/// Bytes per write; fits the default 23-byte ATT MTU.
pub const DEFAULT_CHUNK_SIZE: usize = 20;

/// Pause between writes so the printer buffer can drain.
pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(50);

/// Delay to wait before sending the chunk at `chunk_index`.
/// Only consulted between writes, so `chunk_index` starts at 1.
pub trait PacingPolicy: Send + Sync {
    fn delay_before(&self, chunk_index: usize) -> Duration;
}

/// Same delay between every pair of chunks.
#[derive(Debug, Clone, Copy)]
pub struct FixedPacing(pub Duration);

impl PacingPolicy for FixedPacing {
    fn delay_before(&self, _chunk_index: usize) -> Duration {
        self.0
    }
}

/// Back-to-back writes.
#[derive(Debug, Clone, Copy)]
pub struct NoPacing;

impl PacingPolicy for NoPacing {
    fn delay_before(&self, _chunk_index: usize) -> Duration {
        Duration::ZERO
    }
}

impl<F> PacingPolicy for F
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    fn delay_before(&self, chunk_index: usize) -> Duration {
        self(chunk_index)
    }
}

/// Splits payloads into bounded chunks and writes them strictly in order.
#[derive(Clone)]
pub struct ChunkedWriter {
    chunk_size: NonZeroUsize,
    pacing: Arc<dyn PacingPolicy>,
    write_timeout: Option<Duration>,
}

impl Default for ChunkedWriter {
    fn default() -> Self {
        Self::new(
            NonZeroUsize::new(DEFAULT_CHUNK_SIZE).unwrap_or(NonZeroUsize::MIN),
            FixedPacing(DEFAULT_CHUNK_DELAY),
        )
    }
}

impl ChunkedWriter {
    pub fn new(chunk_size: NonZeroUsize, pacing: impl PacingPolicy + 'static) -> Self {
        Self {
            chunk_size,
            pacing: Arc::new(pacing),
            write_timeout: None,
        }
    }

    /// Bounds every individual write. Off by default.
    pub fn with_write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size.get()
    }

    /// Number of writes needed for `len` bytes.
    pub fn chunk_count(&self, len: usize) -> usize {
        len.div_ceil(self.chunk_size.get())
    }

    /// Writes the whole payload, one chunk at a time.
    ///
    /// The session is re-checked before every write and watched during every
    /// write and pacing delay. A drop before the last chunk is acknowledged
    /// fails the call with [`WriteError::NotConnected`]; the bytes already
    /// sent are not resumed. A drop after the last acknowledgment does not
    /// fail a transfer that already completed.
    pub async fn write_all(
        &self,
        payload: &EncodedPayload,
        session: &PrinterSession,
    ) -> Result<(), WriteError> {
        if !session.is_connected() {
            return Err(WriteError::NotConnected);
        }

        let total = self.chunk_count(payload.len());
        debug!(
            bytes = payload.len(),
            chunks = total,
            device = %session.device().label(),
            "Sending payload to printer"
        );

        for (index, chunk) in payload.as_bytes().chunks(self.chunk_size.get()).enumerate() {
            if index > 0 {
                let delay = self.pacing.delay_before(index);
                if !delay.is_zero() {
                    tokio::select! {
                        biased;
                        _ = session.disconnected() => return Err(lost(index, total)),
                        _ = sleep(delay) => {}
                    }
                }
            }

            if !session.is_connected() {
                return Err(lost(index, total));
            }

            let result = tokio::select! {
                biased;
                _ = session.disconnected() => return Err(lost(index, total)),
                result = self.write_chunk(session, chunk) => result,
            };

            if let Err(e) = result {
                if !session.is_connected() {
                    return Err(lost(index, total));
                }
                warn!(chunk = index, error = %e, "Chunk write failed");
                return Err(WriteError::from(e));
            }

            trace!(chunk = index, len = chunk.len(), "Chunk written");
        }

        Ok(())
    }

    async fn write_chunk(
        &self,
        session: &PrinterSession,
        chunk: &[u8],
    ) -> Result<(), TransportError> {
        match self.write_timeout {
            Some(limit) => tokio::time::timeout(limit, session.write_chunk(chunk))
                .await
                .map_err(|_| TransportError::Io(format!("write timed out after {:?}", limit)))?,
            None => session.write_chunk(chunk).await,
        }
    }
}

fn lost(sent: usize, total: usize) -> WriteError {
    warn!(sent, total, "Printer connection lost during transfer");
    WriteError::NotConnected
}
