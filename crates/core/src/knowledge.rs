//! Static knowledge domain types — table metadata and business rules.
//!
//! These are built once per knowledge load, validated at the load boundary,
//! and immutable afterwards. Loose source records are never representable
//! here: a `TableDescriptor` in hand is a valid one.

use serde::{Deserialize, Serialize};

/// Metadata for one table in the grounded schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Table name — unique within a knowledge store.
    pub name: String,

    /// Free-text description of what the table holds.
    pub description: String,

    /// Columns in declaration order.
    pub columns: Vec<ColumnDescriptor>,

    /// Data-quality notes, each optionally tagged with affected columns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quality_notes: Vec<QualityNote>,
}

/// A single column of a table descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,

    /// Declared SQL type as recorded in the knowledge source.
    pub sql_type: String,

    #[serde(default)]
    pub description: String,
}

/// A free-text data-quality note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityNote {
    pub text: String,

    /// Columns the note is about, when known.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
}

/// A business rule: either a metric definition or a gotcha.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BusinessRule {
    Metric(MetricDefinition),
    Gotcha(Gotcha),
}

/// A named metric and how to compute it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub name: String,
    pub definition: String,
    /// The table the metric is computed from.
    pub table: String,
}

/// A known pitfall affecting one or more tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gotcha {
    pub issue: String,
    pub tables_affected: Vec<String>,
    pub solution: String,
}

impl TableDescriptor {
    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }
}

impl BusinessRule {
    /// Tables this rule applies to.
    pub fn tables(&self) -> Vec<&str> {
        match self {
            Self::Metric(m) => vec![m.table.as_str()],
            Self::Gotcha(g) => g.tables_affected.iter().map(String::as_str).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> TableDescriptor {
        TableDescriptor {
            name: "drivers_championship".into(),
            description: "Final championship standings per season".into(),
            columns: vec![
                ColumnDescriptor {
                    name: "position".into(),
                    sql_type: "TEXT".into(),
                    description: "Finishing position, stored as text".into(),
                },
                ColumnDescriptor {
                    name: "points".into(),
                    sql_type: "REAL".into(),
                    description: String::new(),
                },
            ],
            quality_notes: vec![],
        }
    }

    #[test]
    fn column_lookup_by_name() {
        let desc = descriptor();
        assert_eq!(desc.column("position").unwrap().sql_type, "TEXT");
        assert!(desc.column("missing").is_none());
    }

    #[test]
    fn rule_tables_cover_both_kinds() {
        let metric = BusinessRule::Metric(MetricDefinition {
            name: "race_wins".into(),
            definition: "COUNT(*) WHERE position = '1'".into(),
            table: "results".into(),
        });
        assert_eq!(metric.tables(), vec!["results"]);

        let gotcha = BusinessRule::Gotcha(Gotcha {
            issue: "position is TEXT".into(),
            tables_affected: vec!["drivers_championship".into(), "results".into()],
            solution: "compare as strings".into(),
        });
        assert_eq!(gotcha.tables().len(), 2);
    }

    #[test]
    fn rule_serialization_is_tagged() {
        let rule = BusinessRule::Gotcha(Gotcha {
            issue: "dates are strings".into(),
            tables_affected: vec!["race_wins".into()],
            solution: "parse with strftime".into(),
        });
        let json = serde_json::to_string(&rule).unwrap();
        assert!(json.contains("\"kind\":\"gotcha\""));
    }
}
