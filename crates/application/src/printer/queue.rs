use domain::{PrintError, ReceiptRecord};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::service::PrintService;

struct PrintJob {
    record: ReceiptRecord,
    reply: oneshot::Sender<Result<(), PrintError>>,
}

/// Runs print requests one after another over the shared session.
pub struct PrintQueue {
    service: PrintService,
    job_rx: mpsc::Receiver<PrintJob>,
}

/// Cloneable submit side of a [`PrintQueue`].
#[derive(Clone)]
pub struct PrintQueueHandle {
    job_tx: mpsc::Sender<PrintJob>,
}

impl PrintQueue {
    pub fn new(service: PrintService, capacity: usize) -> (Self, PrintQueueHandle) {
        let (job_tx, job_rx) = mpsc::channel(capacity.max(1));
        (Self { service, job_rx }, PrintQueueHandle { job_tx })
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        info!("🖨️ Print queue started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Shutdown signal received");
                    break;
                }
                job = self.job_rx.recv() => {
                    let Some(job) = job else {
                        // All handles dropped
                        info!("🖨️ Print job channel closed. Print queue shutting down.");
                        break;
                    };

                    let result = self.service.print_receipt(&job.record).await;
                    match &result {
                        Ok(()) => info!(receipt = %job.record.id, "✅ Print job complete"),
                        Err(e) => error!(receipt = %job.record.id, "❌ Print job failed: {}", e),
                    }

                    if job.reply.send(result).is_err() {
                        warn!(receipt = %job.record.id, "Print caller went away before the result");
                    }
                }
            }
        }
    }
}

impl PrintQueueHandle {
    /// Queues `record` and waits for its result.
    pub async fn print(&self, record: ReceiptRecord) -> Result<(), PrintError> {
        let (reply, result) = oneshot::channel();
        self.job_tx
            .send(PrintJob { record, reply })
            .await
            .map_err(|_| PrintError::SendFailed("print queue is not running".to_string()))?;

        result
            .await
            .map_err(|_| PrintError::SendFailed("print queue stopped mid-job".to_string()))?
    }
}
