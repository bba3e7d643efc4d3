//! The derived reliable-pattern view over the raw memory log.
//!
//! Consolidation groups records into intent clusters (keyed by sorted
//! intent tokens) and keeps the single most reliable record per cluster:
//! highest verdict tier, then newest, then lowest record id as the final
//! deterministic tie-break. Rebuilding from the same log yields a
//! byte-identical view.

use std::collections::BTreeMap;

use groundsql_core::memory::{MemoryRecord, Verdict};
use groundsql_core::similarity::intent_tokens;
use serde::Serialize;

/// One cluster's most reliable outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidatedEntry {
    /// The question of the winning record.
    pub question: String,
    /// The SQL of the winning record.
    pub sql: String,
    /// The winning record's verdict.
    pub verdict: Verdict,
    /// How many records fell into this cluster.
    pub support: usize,
}

/// The full derived view. A cache over the log, never authoritative.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConsolidatedView {
    /// Cluster key → best entry. BTreeMap keeps serialization stable.
    pub clusters: BTreeMap<String, ConsolidatedEntry>,
}

impl ConsolidatedView {
    /// Build the view from a snapshot of the log.
    pub fn build(records: &[MemoryRecord]) -> Self {
        let mut grouped: BTreeMap<String, Vec<&MemoryRecord>> = BTreeMap::new();
        for record in records {
            let key = intent_tokens(&record.question).join(" ");
            if key.is_empty() {
                continue;
            }
            grouped.entry(key).or_default().push(record);
        }

        let clusters = grouped
            .into_iter()
            .map(|(key, mut members)| {
                members.sort_by(|a, b| {
                    b.verdict
                        .tier()
                        .cmp(&a.verdict.tier())
                        .then_with(|| b.recorded_at.cmp(&a.recorded_at))
                        .then_with(|| a.id.cmp(&b.id))
                });
                let best = members[0];
                (
                    key,
                    ConsolidatedEntry {
                        question: best.question.clone(),
                        sql: best.generated_sql.clone(),
                        verdict: best.verdict,
                        support: members.len(),
                    },
                )
            })
            .collect();

        Self { clusters }
    }

    /// Canonical serialized form, used to compare rebuilds for identity.
    pub fn to_canonical_json(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn record(question: &str, sql: &str, verdict: Verdict) -> MemoryRecord {
        MemoryRecord::new(question, sql, verdict)
    }

    #[test]
    fn clusters_by_intent_not_exact_text() {
        let records = vec![
            record("who won the championship", "SELECT a", Verdict::Failed),
            record("championship who won", "SELECT b", Verdict::Success),
        ];
        let view = ConsolidatedView::build(&records);
        assert_eq!(view.len(), 1);
        let entry = view.clusters.values().next().unwrap();
        assert_eq!(entry.sql, "SELECT b"); // success wins
        assert_eq!(entry.support, 2);
    }

    #[test]
    fn success_beats_newer_failure() {
        let mut success = record("race wins total", "SELECT good", Verdict::Success);
        success.recorded_at = Utc::now() - Duration::hours(1);
        let failure = record("race wins total", "SELECT bad", Verdict::Failed);

        let view = ConsolidatedView::build(&[failure, success]);
        let entry = view.clusters.values().next().unwrap();
        assert_eq!(entry.sql, "SELECT good");
    }

    #[test]
    fn within_tier_newest_wins() {
        let mut old = record("race wins total", "SELECT old", Verdict::Success);
        old.recorded_at = Utc::now() - Duration::hours(2);
        let new = record("race wins total", "SELECT new", Verdict::Success);

        let view = ConsolidatedView::build(&[old, new]);
        assert_eq!(view.clusters.values().next().unwrap().sql, "SELECT new");
    }

    #[test]
    fn rebuild_is_byte_identical() {
        let records = vec![
            record("who won the championship", "SELECT a", Verdict::Success),
            record("how many races in 2019", "SELECT b", Verdict::Corrected),
            record("which team has most wins", "SELECT c", Verdict::Failed),
        ];
        let first = ConsolidatedView::build(&records);
        let second = ConsolidatedView::build(&records);
        assert_eq!(first.to_canonical_json(), second.to_canonical_json());
    }

    #[test]
    fn empty_log_gives_empty_view() {
        assert!(ConsolidatedView::build(&[]).is_empty());
    }
}
