//! Live schema introspection types and the probe trait.
//!
//! Introspection results are ephemeral: cached per process with a TTL and
//! an explicit invalidation signal, never persisted. Introspected column
//! types override stale static metadata during assembly; the static
//! descriptor's free-text notes are retained as supplementary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SchemaUnavailable;

/// What a live probe observed about one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrospectionResult {
    pub table: String,
    pub columns: Vec<ObservedColumn>,
    pub fetched_at: DateTime<Utc>,
}

/// One column as observed at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservedColumn {
    pub name: String,

    /// The runtime type as reported by the live schema source.
    pub observed_type: String,

    /// A few sample values, when available.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<String>,
}

impl IntrospectionResult {
    pub fn column(&self, name: &str) -> Option<&ObservedColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// The live schema source. Implemented by the caller against a real
/// database; tests use canned or failing probes.
#[async_trait]
pub trait SchemaProbe: Send + Sync {
    /// Fetch live column metadata for a table.
    async fn probe(&self, table: &str) -> Result<IntrospectionResult, SchemaUnavailable>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_lookup() {
        let result = IntrospectionResult {
            table: "race_wins".into(),
            columns: vec![ObservedColumn {
                name: "date".into(),
                observed_type: "TEXT".into(),
                samples: vec!["2019-03-17".into()],
            }],
            fetched_at: Utc::now(),
        };
        assert_eq!(result.column("date").unwrap().observed_type, "TEXT");
        assert!(result.column("winner").is_none());
    }
}
