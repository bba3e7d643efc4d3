//! External capability traits — SQL generation and execution.
//!
//! Both are opaque collaborators: the core assembles context and learns
//! from outcomes, but never retries or inspects these calls. Their errors
//! pass through unmodified; retry policy belongs to the caller.

use async_trait::async_trait;

use crate::context::AssembledContext;
use crate::error::{ExecutionError, GenerationError};

/// A result row as a column-name → value map.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// The language-model-driven reasoning step.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    /// Produce a candidate SQL query grounded in the assembled context.
    async fn generate(
        &self,
        context: &AssembledContext,
        question: &str,
    ) -> Result<String, GenerationError>;
}

/// The database execution layer.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Run a candidate query and return its rows.
    async fn execute(&self, sql: &str) -> Result<Vec<Row>, ExecutionError>;
}
