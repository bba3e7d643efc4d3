//! The learning memory store — append-only log plus derived view.

use std::path::Path;
use std::sync::Arc;

use groundsql_core::error::WriteError;
use groundsql_core::memory::{MemoryRecord, Verdict};
use groundsql_core::similarity::{question_similarity, token_matches_table, tokenize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::consolidate::ConsolidatedView;
use crate::journal::Journal;

/// The learning memory: outcomes in, retrieval and consolidation out.
///
/// `record` is the only mutation. Readers never observe a partially
/// written record: the log is appended under a write lock after the
/// journal append succeeds, and retrieval clones what it needs under a
/// read lock.
pub struct LearningMemory {
    log: RwLock<Vec<MemoryRecord>>,
    journal: Option<Journal>,
    view: RwLock<Arc<ConsolidatedView>>,
}

impl LearningMemory {
    /// In-memory only; nothing survives the process.
    pub fn ephemeral() -> Self {
        Self {
            log: RwLock::new(Vec::new()),
            journal: None,
            view: RwLock::new(Arc::new(ConsolidatedView::default())),
        }
    }

    /// Journaled: replay the JSONL log from disk, then append to it on
    /// every `record`.
    pub fn open(journal_path: &Path) -> Result<Self, WriteError> {
        let records = Journal::replay(journal_path);
        let journal = Journal::open(journal_path)?;
        info!(path = %journal_path.display(), replayed = records.len(), "learning memory opened");
        Ok(Self {
            log: RwLock::new(records),
            journal: Some(journal),
            view: RwLock::new(Arc::new(ConsolidatedView::default())),
        })
    }

    /// Append a judged outcome.
    ///
    /// Fails only on a storage fault, never on record content. Timestamps
    /// are clamped to the last written record's, keeping the log
    /// monotonically non-decreasing even across clock skew.
    pub async fn record(&self, mut record: MemoryRecord) -> Result<(), WriteError> {
        let mut log = self.log.write().await;
        if let Some(last) = log.last() {
            if record.recorded_at < last.recorded_at {
                record.recorded_at = last.recorded_at;
            }
        }
        if let Some(journal) = &self.journal {
            journal.append(&record)?;
        }
        debug!(verdict = ?record.verdict, question = %record.question, "outcome recorded");
        log.push(record);
        Ok(())
    }

    /// Top-k records similar to a question.
    ///
    /// Ranking: verdict tier (success > corrected > failed), then
    /// similarity, then recency, then log order. Records with no lexical
    /// overlap are excluded.
    pub async fn retrieve_similar(&self, question: &str, k: usize) -> Vec<(MemoryRecord, f64)> {
        if k == 0 {
            return Vec::new();
        }
        let log = self.log.read().await;

        let mut scored: Vec<(usize, &MemoryRecord, f64)> = log
            .iter()
            .enumerate()
            .map(|(i, r)| (i, r, question_similarity(question, &r.question)))
            .filter(|(_, _, score)| *score > 0.0)
            .collect();

        scored.sort_by(|(ia, a, sa), (ib, b, sb)| {
            b.verdict
                .tier()
                .cmp(&a.verdict.tier())
                .then_with(|| sb.partial_cmp(sa).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| b.recorded_at.cmp(&a.recorded_at))
                .then_with(|| ib.cmp(ia))
        });
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(_, r, score)| (r.clone(), score))
            .collect()
    }

    /// Which of the candidate tables are implicated by a stored
    /// correction. A correction implicates a table when its text names
    /// the table or one of the table's name tokens.
    pub async fn implicated_tables(&self, candidates: &[String]) -> Vec<String> {
        let log = self.log.read().await;
        let mut hits: Vec<String> = candidates
            .iter()
            .filter(|table| {
                log.iter().any(|r| {
                    r.verdict == Verdict::Corrected
                        && r.correction.as_deref().is_some_and(|text| {
                            tokenize(text).iter().any(|tok| token_matches_table(tok, table))
                        })
                })
            })
            .cloned()
            .collect();
        hits.dedup();
        hits
    }

    /// Recompute the derived reliable-pattern view.
    ///
    /// Snapshot-then-swap: the log read lock is held only long enough to
    /// clone the records, so concurrent `record` calls are never blocked
    /// by the rebuild. Idempotent — no new records, identical view.
    pub async fn consolidate(&self) -> Arc<ConsolidatedView> {
        let snapshot: Vec<MemoryRecord> = self.log.read().await.clone();
        let view = Arc::new(ConsolidatedView::build(&snapshot));
        info!(clusters = view.len(), records = snapshot.len(), "memory consolidated");
        *self.view.write().await = view.clone();
        view
    }

    /// The last consolidated view. Empty until `consolidate` first runs.
    pub async fn consolidated(&self) -> Arc<ConsolidatedView> {
        self.view.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.log.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.log.read().await.is_empty()
    }
}
