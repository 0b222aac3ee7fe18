//! Application layer - Printing use cases
//!
//! - Command encoding (receipt record -> ESC/POS bytes)
//! - Printer session lifecycle
//! - Chunked, paced transfer to the write endpoint
//! - Print orchestration and sequential print queue

pub mod printer;

pub use printer::{PrintQueue, PrintService, TransportSession};
