//! The knowledge store snapshot and its atomic publication wrapper.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use groundsql_core::error::LoadError;
use groundsql_core::knowledge::{BusinessRule, Gotcha, TableDescriptor};
use groundsql_core::similarity::{token_matches_table, tokenize};
use tracing::{info, warn};

use crate::loader::{self, KnowledgeSource};

/// An immutable snapshot of all static knowledge.
///
/// Built fully by `load`, never mutated afterwards. Reload builds a new
/// store and publishes it through [`SharedKnowledge`].
#[derive(Debug)]
pub struct KnowledgeStore {
    tables: HashMap<String, TableDescriptor>,
    rules: Vec<BusinessRule>,
    /// Gotchas referencing tables absent from this store. Reported, kept.
    violations: Vec<String>,
    /// Seed patterns carried by the knowledge sources.
    seed_patterns: Vec<(String, String)>,
}

impl KnowledgeStore {
    /// Build a store from parsed sources. All-or-nothing: any malformed
    /// record fails the whole load with an aggregated report.
    pub fn load(sources: &[KnowledgeSource]) -> Result<Self, LoadError> {
        let validated = loader::validate(sources)?;

        let tables: HashMap<String, TableDescriptor> = validated
            .tables
            .into_iter()
            .map(|t| (t.name.clone(), t))
            .collect();

        // Gotcha table references are a reported violation, not a
        // malformed record: the load succeeds and the report is kept.
        let mut violations = Vec::new();
        for rule in &validated.rules {
            if let BusinessRule::Gotcha(g) = rule {
                for table in &g.tables_affected {
                    if !tables.contains_key(table) {
                        let v = format!("gotcha '{}' references unknown table '{table}'", g.issue);
                        warn!(violation = %v, "knowledge validation");
                        violations.push(v);
                    }
                }
            }
        }

        info!(
            tables = tables.len(),
            rules = validated.rules.len(),
            violations = violations.len(),
            "knowledge store loaded"
        );

        Ok(Self {
            tables,
            rules: validated.rules,
            violations,
            seed_patterns: validated.patterns,
        })
    }

    /// Look up a table descriptor by exact name.
    pub fn lookup_table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.get(name)
    }

    /// All business rules that apply to a table.
    pub fn rules_for(&self, table_name: &str) -> Vec<&BusinessRule> {
        self.rules
            .iter()
            .filter(|r| r.tables().contains(&table_name))
            .collect()
    }

    /// Every gotcha in the store, in load order.
    pub fn all_gotchas(&self) -> impl Iterator<Item = &Gotcha> {
        self.rules.iter().filter_map(|r| match r {
            BusinessRule::Gotcha(g) => Some(g),
            BusinessRule::Metric(_) => None,
        })
    }

    /// Table names heuristically referenced by a question: a question
    /// token matching the table name or any of its name parts counts
    /// ("championship" references `drivers_championship`). Sorted for
    /// deterministic downstream iteration.
    pub fn referenced_tables(&self, question: &str) -> Vec<String> {
        let tokens = tokenize(question);
        let mut hits: Vec<String> = self
            .tables
            .keys()
            .filter(|table| tokens.iter().any(|tok| token_matches_table(tok, table)))
            .cloned()
            .collect();
        hits.sort();
        hits
    }

    /// Gotcha reference violations found at load time.
    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    /// Question/SQL pairs the sources carried, for seeding a pattern index.
    pub fn seed_patterns(&self) -> &[(String, String)] {
        &self.seed_patterns
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

/// Atomically published knowledge store handle.
///
/// Readers grab an `Arc` snapshot and keep it for the whole request; a
/// concurrent reload swaps the inner pointer without disturbing them.
#[derive(Clone)]
pub struct SharedKnowledge {
    inner: Arc<RwLock<Arc<KnowledgeStore>>>,
}

impl SharedKnowledge {
    pub fn new(store: KnowledgeStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(store))),
        }
    }

    /// The current snapshot. Cheap; hold it for the request's duration.
    pub fn current(&self) -> Arc<KnowledgeStore> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Rebuild from new sources and publish atomically. On failure the
    /// previous store stays live and servable.
    pub fn reload(&self, sources: &[KnowledgeSource]) -> Result<(), LoadError> {
        let fresh = KnowledgeStore::load(sources)?;
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(fresh);
        info!("knowledge store reloaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f1_source() -> KnowledgeSource {
        KnowledgeSource::from_json(
            r#"{
                "tables": [
                    {
                        "table_name": "drivers_championship",
                        "table_description": "Final standings per season",
                        "table_columns": [
                            {"name": "position", "type": "TEXT", "description": "stored as text"},
                            {"name": "driver", "type": "TEXT", "description": ""}
                        ],
                        "data_quality_notes": ["position is TEXT"]
                    },
                    {
                        "table_name": "race_wins",
                        "table_description": "One row per win",
                        "table_columns": [
                            {"name": "date", "type": "TEXT", "description": "race date"}
                        ],
                        "data_quality_notes": []
                    }
                ],
                "metrics": [
                    {"name": "total_wins", "definition": "COUNT(*)", "table": "race_wins"}
                ],
                "common_gotchas": [
                    {
                        "issue": "position is TEXT, use string comparison",
                        "tables_affected": ["drivers_championship"],
                        "solution": "position = '1'"
                    }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn lookup_round_trips_loaded_tables() {
        let store = KnowledgeStore::load(&[f1_source()]).unwrap();
        assert!(store.lookup_table("drivers_championship").is_some());
        assert!(store.lookup_table("race_wins").is_some());
        assert!(store.lookup_table("pit_stops").is_none());
    }

    #[test]
    fn rules_for_filters_by_table() {
        let store = KnowledgeStore::load(&[f1_source()]).unwrap();
        let rules = store.rules_for("drivers_championship");
        assert_eq!(rules.len(), 1);
        let rules = store.rules_for("race_wins");
        assert_eq!(rules.len(), 1); // the metric
    }

    #[test]
    fn gotcha_with_unknown_table_is_reported_not_dropped() {
        let mut source = f1_source();
        source.common_gotchas.push(crate::loader::RawGotcha {
            issue: Some("phantom issue".into()),
            tables_affected: vec!["no_such_table".into()],
            solution: Some("n/a".into()),
        });
        let store = KnowledgeStore::load(&[source]).unwrap();
        assert_eq!(store.violations().len(), 1);
        assert!(store.violations()[0].contains("no_such_table"));
        // The gotcha itself is retained.
        assert_eq!(store.all_gotchas().count(), 2);
    }

    #[test]
    fn referenced_tables_matches_synonym_tokens() {
        let store = KnowledgeStore::load(&[f1_source()]).unwrap();
        let hit = store.referenced_tables("who won the 2023 championship");
        assert_eq!(hit, vec!["drivers_championship"]);

        let hit = store.referenced_tables("how many race wins does Hamilton have");
        assert_eq!(hit, vec!["race_wins"]);

        let hit = store.referenced_tables("average pit stop duration");
        assert!(hit.is_empty());
    }

    #[test]
    fn reload_failure_keeps_previous_store() {
        let shared = SharedKnowledge::new(KnowledgeStore::load(&[f1_source()]).unwrap());
        let before = shared.current();

        let mut bad = f1_source();
        bad.tables[0].table_name = None;
        assert!(shared.reload(&[bad]).is_err());

        let after = shared.current();
        assert!(Arc::ptr_eq(&before, &after));
        assert!(after.lookup_table("drivers_championship").is_some());
    }

    #[test]
    fn reload_publishes_new_snapshot_while_old_remains_valid() {
        let shared = SharedKnowledge::new(KnowledgeStore::load(&[f1_source()]).unwrap());
        let old = shared.current();

        let mut next = f1_source();
        next.tables[0].table_name = Some("constructors_championship".into());
        shared.reload(&[next]).unwrap();

        // Old snapshot is unchanged for in-flight readers.
        assert!(old.lookup_table("drivers_championship").is_some());
        // New readers see the new store.
        let new = shared.current();
        assert!(new.lookup_table("constructors_championship").is_some());
        assert!(new.lookup_table("drivers_championship").is_none());
    }
}
