use std::sync::Arc;

use domain::{PrintError, ReceiptRecord, ReceiptTemplate};
use tracing::{info, warn};

use super::encoder;
use super::session::TransportSession;
use super::writer::ChunkedWriter;

/// "Print this receipt now".
///
/// Holds no state of its own; the session decides whether printing is
/// possible and the writer performs the transfer.
pub struct PrintService {
    session: Arc<TransportSession>,
    writer: ChunkedWriter,
    template: ReceiptTemplate,
}

impl PrintService {
    pub fn new(session: Arc<TransportSession>, writer: ChunkedWriter) -> Self {
        Self {
            session,
            writer,
            template: ReceiptTemplate::default(),
        }
    }

    pub fn with_template(mut self, template: ReceiptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn session(&self) -> &Arc<TransportSession> {
        &self.session
    }

    /// Encodes and sends one receipt over the current session.
    ///
    /// Never connects on its own: without a live session the call fails
    /// before anything is encoded or written.
    pub async fn print_receipt(&self, record: &ReceiptRecord) -> Result<(), PrintError> {
        let Some(session) = self.session.current().await else {
            warn!(receipt = %record.id, "Print requested with no printer connected");
            return Err(PrintError::NotConnected);
        };

        record.validate()?;

        let payload = encoder::encode(record, &self.template);
        info!(
            receipt = %record.id,
            bytes = payload.len(),
            chunks = self.writer.chunk_count(payload.len()),
            device = %session.device().label(),
            "Printing receipt"
        );

        self.writer
            .write_all(&payload, &session)
            .await
            .inspect_err(|e| warn!(receipt = %record.id, error = %e, "Receipt transfer failed"))?;

        info!(receipt = %record.id, "Receipt sent to printer");
        Ok(())
    }
}
