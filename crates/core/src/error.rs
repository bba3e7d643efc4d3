//! Error types for the GroundSQL domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all GroundSQL operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Knowledge load errors ---
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    // --- Live schema errors ---
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaUnavailable),

    // --- Context assembly errors ---
    #[error("Assembly error: {0}")]
    Assembly(#[from] AssemblyError),

    // --- Learning memory errors ---
    #[error("Memory write error: {0}")]
    Write(#[from] WriteError),

    // --- External capability errors, passed through unmodified ---
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// A knowledge reload failed validation. The whole load is rejected;
/// the previously published store stays live.
///
/// Carries every problem found, not just the first, so the operator
/// can fix a malformed knowledge file in one pass.
#[derive(Debug, Clone, Error)]
#[error("knowledge load rejected with {} problem(s): {}", problems.len(), problems.join("; "))]
pub struct LoadError {
    /// One entry per malformed record, in source order.
    pub problems: Vec<String>,
}

impl LoadError {
    pub fn new(problems: Vec<String>) -> Self {
        Self { problems }
    }
}

/// Live schema introspection failed. Never fatal to a request: the
/// assembler degrades to static metadata and tags the fragment unverified.
#[derive(Debug, Clone, Error)]
pub enum SchemaUnavailable {
    #[error("introspection of '{table}' timed out after {timeout_ms}ms")]
    Timeout { table: String, timeout_ms: u64 },

    #[error("introspection of '{table}' failed: {reason}")]
    Connectivity { table: String, reason: String },

    #[error("introspection is disabled by configuration")]
    Disabled,
}

/// Context assembly failed. Only raised when the foundational knowledge
/// layer is entirely unreachable — every other layer degrades instead.
#[derive(Debug, Clone, Error)]
pub enum AssemblyError {
    #[error("knowledge store unreachable: {reason}")]
    KnowledgeUnavailable { reason: String },
}

/// Learning memory could not persist an outcome. Raised only on storage
/// faults, never on record content; surfaced to the `report_outcome`
/// caller, who decides whether to retry.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("journal write failed: {0}")]
    Storage(String),

    #[error("record serialization failed: {0}")]
    Serialization(String),
}

/// Error from the opaque generation capability.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct GenerationError {
    pub message: String,
}

/// Error from the opaque SQL execution capability.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ExecutionError {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_lists_every_problem() {
        let err = LoadError::new(vec![
            "table[0]: missing table_name".into(),
            "gotcha[2]: unknown table 'race_winz'".into(),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("2 problem(s)"));
        assert!(msg.contains("missing table_name"));
        assert!(msg.contains("race_winz"));
    }

    #[test]
    fn schema_timeout_displays_table_and_budget() {
        let err = Error::Schema(SchemaUnavailable::Timeout {
            table: "race_wins".into(),
            timeout_ms: 2000,
        });
        assert!(err.to_string().contains("race_wins"));
        assert!(err.to_string().contains("2000ms"));
    }

    #[test]
    fn execution_error_passes_message_through() {
        let err = Error::Execution(ExecutionError {
            message: "no such column: points".into(),
        });
        assert!(err.to_string().contains("no such column"));
    }
}
