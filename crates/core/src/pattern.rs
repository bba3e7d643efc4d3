//! Validated query patterns — prior question/SQL pairs known to be correct.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier for a stored pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternId(pub String);

impl PatternId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for PatternId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A previously validated question → SQL pairing.
///
/// Patterns are append-only. A newer pattern with the same question
/// supersedes an older one for ranking purposes; both stay retrievable
/// for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPattern {
    /// Natural-language question or intent summary.
    pub question: String,

    /// The validated SQL text.
    pub sql: String,

    /// Tables the SQL touches, when known.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<String>,

    /// Metric the pattern answers, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,

    /// When the pattern was validated and stored.
    pub created_at: DateTime<Utc>,
}

impl QueryPattern {
    pub fn new(question: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            sql: sql.into(),
            tables: Vec::new(),
            metric: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_tables(mut self, tables: Vec<String>) -> Self {
        self.tables = tables;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_ids_are_unique() {
        assert_ne!(PatternId::generate(), PatternId::generate());
    }

    #[test]
    fn builder_sets_tables() {
        let p = QueryPattern::new("who won in 2019", "SELECT driver FROM race_wins")
            .with_tables(vec!["race_wins".into()]);
        assert_eq!(p.tables, vec!["race_wins"]);
        assert!(p.metric.is_none());
    }
}
