//! Command Dispatch Module
//!
//! Sits between the RESP parser and the store:
//!
//! ```text
//! parsed RESP array ──> CommandHandler ──> Store ──> RESP reply
//! ```
//!
//! See [`handler::CommandHandler`] for the supported commands and the
//! error replies they produce.

pub mod handler;

pub use handler::CommandHandler;
