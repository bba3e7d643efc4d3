//! Static knowledge store for GroundSQL.
//!
//! Knowledge arrives as loose JSON records, gets validated at the load
//! boundary into immutable domain types, and is published as an atomic
//! snapshot. Reload builds a complete new store before swapping a single
//! `Arc`; in-flight readers keep the old snapshot until they finish.

pub mod loader;
pub mod store;

pub use loader::{KnowledgeSource, RawPattern};
pub use store::{KnowledgeStore, SharedKnowledge};
