//! Append-only index of previously validated query patterns.
//!
//! A pattern, once stored, is never overwritten. A newer pattern with the
//! same question supersedes the older one in ranking (recency tie-break);
//! both stay in the index for audit. `search` never mutates; `add` is
//! idempotent on exact `(question, sql)` duplicates.

use std::sync::Arc;

use groundsql_core::pattern::{PatternId, QueryPattern};
use groundsql_core::similarity::question_similarity;
use tokio::sync::RwLock;
use tracing::debug;

/// A stored pattern with its id and insertion sequence.
#[derive(Debug, Clone)]
struct StoredPattern {
    id: PatternId,
    pattern: QueryPattern,
    /// Monotonic insertion counter. Breaks timestamp ties deterministically.
    seq: u64,
}

/// The searchable pattern repository.
pub struct PatternIndex {
    entries: Arc<RwLock<Vec<StoredPattern>>>,
}

impl PatternIndex {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Append a pattern. Idempotent: an exact `(question, sql)` duplicate
    /// is a no-op returning the existing id, not an error.
    pub async fn add(&self, mut pattern: QueryPattern) -> PatternId {
        let mut entries = self.entries.write().await;

        if let Some(existing) = entries
            .iter()
            .find(|e| e.pattern.question == pattern.question && e.pattern.sql == pattern.sql)
        {
            debug!(id = %existing.id, "duplicate pattern, returning existing id");
            return existing.id.clone();
        }

        // Keep stored timestamps non-decreasing even if the caller's
        // clock skewed backwards.
        if let Some(last) = entries.last() {
            if pattern.created_at < last.pattern.created_at {
                pattern.created_at = last.pattern.created_at;
            }
        }

        let id = PatternId::generate();
        let seq = entries.len() as u64;
        debug!(id = %id, question = %pattern.question, "pattern stored");
        entries.push(StoredPattern {
            id: id.clone(),
            pattern,
            seq,
        });
        id
    }

    /// Top-k patterns by similarity to a question.
    ///
    /// Identical question text scores strictly higher than any
    /// non-identical entry; ties break by recency (newer wins), then by
    /// insertion order. Scores are non-increasing in the returned order.
    pub async fn search(&self, question: &str, k: usize) -> Vec<(QueryPattern, f64)> {
        if k == 0 {
            return Vec::new();
        }
        let entries = self.entries.read().await;

        let mut scored: Vec<(&StoredPattern, f64)> = entries
            .iter()
            .map(|e| (e, question_similarity(question, &e.pattern.question)))
            .filter(|(_, score)| *score > 0.0)
            .collect();

        scored.sort_by(|(a, sa), (b, sb)| {
            sb.partial_cmp(sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.pattern.created_at.cmp(&a.pattern.created_at))
                .then_with(|| b.seq.cmp(&a.seq))
        });
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(e, score)| (e.pattern.clone(), score))
            .collect()
    }

    /// Seed the index with question/SQL pairs carried by knowledge
    /// sources. Returns the number of newly stored patterns; exact
    /// duplicates of already-stored pairs are skipped.
    pub async fn seed(&self, pairs: &[(String, String)]) -> usize {
        let before = self.len().await;
        for (question, sql) in pairs {
            self.add(QueryPattern::new(question.as_str(), sql.as_str())).await;
        }
        let added = self.len().await - before;
        if added > 0 {
            debug!(added, "pattern index seeded from knowledge sources");
        }
        added
    }

    /// Number of stored patterns, duplicates-by-supersession included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for PatternIndex {
    fn default() -> Self {
        Self::new()
    }
}
