//! Knowledge source parsing and validation.
//!
//! Source records are deserialized into `Raw*` shapes where every field is
//! optional, then checked field by field so a single load pass can report
//! every problem at once. Invalid records never become domain types; the
//! whole load is rejected with an aggregated `LoadError`.

use groundsql_core::error::LoadError;
use groundsql_core::knowledge::{
    BusinessRule, ColumnDescriptor, Gotcha, MetricDefinition, QualityNote, TableDescriptor,
};
use serde::{Deserialize, Serialize};

/// One parsed knowledge source document, pre-validation.
///
/// Matches the on-disk format: `tables`, `metrics`, `common_gotchas`, and
/// optionally `query_patterns` used to seed the pattern index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeSource {
    #[serde(default)]
    pub tables: Vec<RawTable>,

    #[serde(default)]
    pub metrics: Vec<RawMetric>,

    #[serde(default)]
    pub common_gotchas: Vec<RawGotcha>,

    #[serde(default)]
    pub query_patterns: Vec<RawPattern>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTable {
    pub table_name: Option<String>,
    pub table_description: Option<String>,
    #[serde(default)]
    pub table_columns: Vec<RawColumn>,
    #[serde(default)]
    pub data_quality_notes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawColumn {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub sql_type: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMetric {
    pub name: Option<String>,
    pub definition: Option<String>,
    pub table: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawGotcha {
    pub issue: Option<String>,
    #[serde(default)]
    pub tables_affected: Vec<String>,
    pub solution: Option<String>,
}

/// A raw question → SQL pairing from a knowledge file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPattern {
    pub question: Option<String>,
    pub sql: Option<String>,
}

impl KnowledgeSource {
    /// Parse a source document from JSON text.
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        serde_json::from_str(json)
            .map_err(|e| LoadError::new(vec![format!("source is not valid JSON: {e}")]))
    }
}

/// Everything a successful validation pass yields.
#[derive(Debug)]
pub(crate) struct Validated {
    pub tables: Vec<TableDescriptor>,
    pub rules: Vec<BusinessRule>,
    pub patterns: Vec<(String, String)>,
}

/// Validate parsed sources into domain types.
///
/// Every problem across all sources is collected; any problem fails the
/// whole load. Gotcha table references are checked separately by the store
/// because they are a reported violation, not a malformed record.
pub(crate) fn validate(sources: &[KnowledgeSource]) -> Result<Validated, LoadError> {
    let mut problems = Vec::new();
    let mut tables = Vec::new();
    let mut rules = Vec::new();
    let mut patterns = Vec::new();
    let mut seen_names: Vec<String> = Vec::new();

    for (si, source) in sources.iter().enumerate() {
        for (ti, raw) in source.tables.iter().enumerate() {
            let at = format!("source[{si}].tables[{ti}]");
            let Some(name) = non_empty(&raw.table_name) else {
                problems.push(format!("{at}: missing table_name"));
                continue;
            };
            if seen_names.contains(&name) {
                problems.push(format!("{at}: duplicate table_name '{name}'"));
                continue;
            }
            let Some(description) = non_empty(&raw.table_description) else {
                problems.push(format!("{at} ('{name}'): missing table_description"));
                continue;
            };

            let mut columns = Vec::new();
            let mut ok = true;
            for (ci, col) in raw.table_columns.iter().enumerate() {
                let Some(col_name) = non_empty(&col.name) else {
                    problems.push(format!("{at} ('{name}').columns[{ci}]: missing name"));
                    ok = false;
                    continue;
                };
                let Some(sql_type) = non_empty(&col.sql_type) else {
                    problems.push(format!(
                        "{at} ('{name}').columns[{ci}] ('{col_name}'): missing or empty type"
                    ));
                    ok = false;
                    continue;
                };
                columns.push(ColumnDescriptor {
                    name: col_name,
                    sql_type,
                    description: col.description.clone(),
                });
            }
            if !ok {
                continue;
            }

            seen_names.push(name.clone());
            tables.push(TableDescriptor {
                name,
                description,
                columns,
                quality_notes: raw
                    .data_quality_notes
                    .iter()
                    .map(|n| QualityNote {
                        text: n.clone(),
                        columns: Vec::new(),
                    })
                    .collect(),
            });
        }

        for (mi, raw) in source.metrics.iter().enumerate() {
            let at = format!("source[{si}].metrics[{mi}]");
            match (non_empty(&raw.name), non_empty(&raw.definition), non_empty(&raw.table)) {
                (Some(name), Some(definition), Some(table)) => {
                    rules.push(BusinessRule::Metric(MetricDefinition {
                        name,
                        definition,
                        table,
                    }));
                }
                _ => problems.push(format!("{at}: metric requires name, definition, and table")),
            }
        }

        for (gi, raw) in source.common_gotchas.iter().enumerate() {
            let at = format!("source[{si}].common_gotchas[{gi}]");
            match (non_empty(&raw.issue), non_empty(&raw.solution)) {
                (Some(issue), Some(solution)) => {
                    if raw.tables_affected.is_empty() {
                        problems.push(format!("{at}: gotcha lists no affected tables"));
                        continue;
                    }
                    rules.push(BusinessRule::Gotcha(Gotcha {
                        issue,
                        tables_affected: raw.tables_affected.clone(),
                        solution,
                    }));
                }
                _ => problems.push(format!("{at}: gotcha requires issue and solution")),
            }
        }

        for (pi, raw) in source.query_patterns.iter().enumerate() {
            let at = format!("source[{si}].query_patterns[{pi}]");
            match (non_empty(&raw.question), non_empty(&raw.sql)) {
                (Some(q), Some(s)) => patterns.push((q, s)),
                _ => problems.push(format!("{at}: pattern requires question and sql")),
            }
        }
    }

    if problems.is_empty() {
        Ok(Validated {
            tables,
            rules,
            patterns,
        })
    } else {
        Err(LoadError::new(problems))
    }
}

fn non_empty(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
