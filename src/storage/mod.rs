//! Storage Module
//!
//! The keyspace and everything that maintains it:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                       Store                          │
//! │  ┌─────────────────┐  ┌───────────┐  one Mutex       │
//! │  │   ChainTable    │  │ LruIndex  │  around all of   │
//! │  │ (bucket chains) │  │ (recency) │  it, plus        │
//! │  └─────────────────┘  └───────────┘  current_bytes   │
//! └───────────────────────────▲──────────────────────────┘
//!                             │
//!               ┌─────────────┴─────────────┐
//!               │          Reaper           │
//!               │  (1 s background sweep)   │
//!               └───────────────────────────┘
//! ```
//!
//! - [`table`]: separate-chaining hash table with load-factor resize
//! - [`lru`]: O(1) least-recently-used key index
//! - [`store`]: the mutex-guarded combination with byte budgeting and
//!   TTL semantics
//! - [`reaper`]: background task sweeping expired entries

pub mod lru;
pub mod reaper;
pub mod store;
pub mod table;

pub use lru::LruIndex;
pub use reaper::{start_reaper, Reaper, ReaperConfig};
pub use store::{Entry, Store, StoreStats, DEFAULT_MAX_BYTES};
pub use table::ChainTable;
