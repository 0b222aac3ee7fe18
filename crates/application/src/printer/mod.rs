pub mod encoder;
pub mod label;
pub mod queue;
pub mod service;
pub mod session;
pub mod writer;

pub use encoder::{EncodedPayload, Instruction, ReceiptBuilder};
pub use label::epl_label;
pub use queue::{PrintQueue, PrintQueueHandle};
pub use service::PrintService;
pub use session::{PrinterSession, SessionEvent, SessionStateMachine, TransportSession};
pub use writer::{ChunkedWriter, FixedPacing, NoPacing, PacingPolicy};
