mod connection_state;
mod status;

pub use connection_state::ConnectionState;
pub use status::{ConnectionIndicator, SessionStatus};
