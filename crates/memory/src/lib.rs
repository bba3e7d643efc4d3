//! Learning memory for GroundSQL.
//!
//! An append-only log of judged outcomes is the source of truth. Two
//! derived things hang off it:
//!
//! - retrieval (`retrieve_similar`, `implicated_tables`) reads the log
//!   directly, ranked by verdict tier then similarity then recency
//! - `consolidate` recomputes a derived reliable-pattern view; the view
//!   is a cache, never authoritative, and rebuilding it never blocks
//!   `record` (snapshot-then-swap)
//!
//! With a journal path configured, every record is appended to a JSONL
//! file before it enters the in-memory log, and the log is replayed from
//! the journal on open.

pub mod consolidate;
pub mod journal;
pub mod store;

pub use consolidate::{ConsolidatedEntry, ConsolidatedView};
pub use journal::Journal;
pub use store::LearningMemory;
