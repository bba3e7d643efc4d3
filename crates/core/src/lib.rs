//! # GroundSQL Core
//!
//! Domain types, traits, and error definitions for the GroundSQL grounding
//! engine. No runtime, no I/O: this crate defines the domain model that
//! all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The external capabilities (SQL generation, SQL execution, live schema
//! probing) are defined as traits here. Implementations live with the
//! caller; tests use mocks. This keeps the context assembly and learning
//! logic testable without a model or a database in the loop.

pub mod capability;
pub mod context;
pub mod error;
pub mod introspect;
pub mod knowledge;
pub mod memory;
pub mod pattern;
pub mod similarity;

// Re-export key types at crate root for ergonomics
pub use capability::{Row, SqlExecutor, SqlGenerator};
pub use context::{AssembledContext, AssemblyMetadata, ContextLayer, Fragment};
pub use error::{
    AssemblyError, Error, ExecutionError, GenerationError, LoadError, Result, SchemaUnavailable,
    WriteError,
};
pub use introspect::{IntrospectionResult, ObservedColumn, SchemaProbe};
pub use knowledge::{BusinessRule, ColumnDescriptor, Gotcha, MetricDefinition, TableDescriptor};
pub use memory::{MemoryRecord, Verdict};
pub use pattern::{PatternId, QueryPattern};
