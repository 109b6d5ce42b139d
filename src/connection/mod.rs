//! Connection Module
//!
//! One task per client socket:
//!
//! ```text
//! socket bytes -> input buffer -> RESP parser -> dispatcher
//!                                                    │
//! socket  <-  ordered replies  <-  encoder  <--------┘
//! ```
//!
//! [`handler`] holds the state machine; see its docs for the close
//! conditions and limits (10 MiB input cap, 60 s idle timeout).

pub mod handler;

pub use handler::{
    handle_connection, ConnectionError, ConnectionHandler, ConnectionStats, IDLE_TIMEOUT,
    MAX_INPUT_BUFFER,
};
