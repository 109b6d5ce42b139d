//! # blinkdb - An In-Memory Key-Value Store with a RESP-2 Server
//!
//! blinkdb keeps a single keyspace of binary-safe strings in memory and
//! serves it over the Redis wire protocol (RESP-2). Entries may carry a
//! time-to-live, the keyspace is capped by a byte budget, and the least
//! recently used entries are evicted when the budget is exceeded.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                           blinkdb                              │
//! │                                                                │
//! │  ┌────────────┐    ┌─────────────┐    ┌─────────────────┐      │
//! │  │ TCP Server │───>│ Connection  │───>│ CommandHandler  │      │
//! │  │ (Listener) │    │  Handler    │    │  SET/GET/DEL    │      │
//! │  └────────────┘    └──────┬──────┘    └────────┬────────┘      │
//! │                           │                    │               │
//! │                    ┌──────▼──────┐     ┌───────▼────────┐      │
//! │                    │ RESP Parser │     │     Store      │      │
//! │                    │ (framing)   │     │ chained table  │      │
//! │                    └─────────────┘     │ + LRU index    │      │
//! │                                        │ + byte budget  │      │
//! │                                        └───────▲────────┘      │
//! │                                                │               │
//! │                                 ┌──────────────┴─────────────┐ │
//! │                                 │         TTL Reaper         │ │
//! │                                 │   (background tokio task)  │ │
//! │                                 └────────────────────────────┘ │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: RESP-2 value types, encoder, and incremental parser
//! - [`storage`]: chained hash table, LRU index, the [`storage::Store`],
//!   and the background TTL reaper
//! - [`commands`]: the SET/GET/DEL command dispatcher
//! - [`connection`]: per-client read/parse/dispatch/write loop
//! - [`server`]: listener, accept loop, and connection cap
//!
//! ## Quick Start
//!
//! ```ignore
//! use blinkdb::server::{Server, ServerConfig};
//! use blinkdb::storage::{start_reaper, Store};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(Store::new());
//!     let _reaper = start_reaper(Arc::clone(&store));
//!
//!     let server = Server::bind(ServerConfig::default(), store).await?;
//!     server.run().await;
//!     Ok(())
//! }
//! ```

pub mod commands;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

pub use commands::CommandHandler;
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{ParseError, RespParser, RespValue};
pub use server::{Server, ServerConfig};
pub use storage::{start_reaper, Reaper, ReaperConfig, Store};

/// The default port the server listens on.
pub const DEFAULT_PORT: u16 = 9001;

/// The default host the client connects to.
pub const DEFAULT_HOST: &str = "localhost";

/// Default cap on concurrent client connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;

/// Version of blinkdb.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
