//! Context assembly pipeline — the core architectural component.
//!
//! Assembles a ranked, size-bounded context from six grounding layers:
//!
//! 1. **Gotchas** (business-rule pitfalls for referenced tables)
//! 2. **Corrections** (learned from judged outcomes)
//! 3. **Introspection** (live schema, overrides stale static types)
//! 4. **Static schema** (table metadata and metric definitions)
//! 5. **Patterns** (previously validated question/SQL pairs)
//! 6. **Memory** (generic prior outcomes)
//!
//! Layer precedence is an explicit score table, not call order; scoring
//! is deterministic, so identical inputs always produce the identical
//! context, including the truncation set.
//!
//! Failure policy: any single layer failing degrades the context rather
//! than aborting. Assembly fails only when no knowledge store is
//! reachable, since no grounding is possible without it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use groundsql_config::AppConfig;
use groundsql_core::context::{
    AssembledContext, AssemblyMetadata, ContextLayer, DropInfo, Fragment, LayerStats,
};
use groundsql_core::error::AssemblyError;
use groundsql_core::introspect::IntrospectionResult;
use groundsql_core::knowledge::{BusinessRule, TableDescriptor};
use groundsql_introspect::SchemaIntrospector;
use groundsql_knowledge::SharedKnowledge;
use groundsql_memory::LearningMemory;
use groundsql_patterns::PatternIndex;
use tracing::{debug, info, warn};

use crate::context::token;

// ── Types ─────────────────────────────────────────────────────────────────

/// The stores an assembler pulls from.
pub struct AssemblerHandles {
    /// The foundational layer. `None` means no knowledge has been loaded
    /// yet, and every `assemble` call fails.
    pub knowledge: Option<SharedKnowledge>,
    pub patterns: Arc<PatternIndex>,
    pub memory: Arc<LearningMemory>,
    /// `None` disables the live introspection layer entirely.
    pub introspector: Option<Arc<SchemaIntrospector>>,
}

/// Tunables for a single assembler.
#[derive(Debug, Clone)]
pub struct AssembleOptions {
    /// Top-k validated patterns per question.
    pub pattern_k: usize,
    /// Top-k memory records per question.
    pub memory_k: usize,
    /// Toggles the institutional-knowledge layer (gotchas and metrics).
    pub institutional_enabled: bool,
    /// Bound on concurrent schema probes during fan-out.
    pub max_concurrent_probes: usize,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            pattern_k: 5,
            memory_k: 5,
            institutional_enabled: true,
            max_concurrent_probes: 4,
        }
    }
}

impl AssembleOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            pattern_k: config.retrieval.pattern_k,
            memory_k: config.retrieval.memory_k,
            institutional_enabled: config.knowledge.institutional_enabled,
            max_concurrent_probes: config.introspection.max_concurrent,
        }
    }
}

/// Relevance and recency adjustments are bounded below the gap between
/// layer base scores, so they reorder within a layer but never across.
const RELEVANCE_WEIGHT: f64 = 8.0;

// ── Assembler ─────────────────────────────────────────────────────────────

/// The context assembler. Performs no writes; a cancelled `assemble`
/// leaves nothing behind.
pub struct ContextAssembler {
    handles: AssemblerHandles,
    opts: AssembleOptions,
}

impl ContextAssembler {
    pub fn new(handles: AssemblerHandles, opts: AssembleOptions) -> Self {
        Self { handles, opts }
    }

    /// Assemble a context for a question within a token budget.
    pub async fn assemble(
        &self,
        question: &str,
        budget_tokens: usize,
    ) -> Result<AssembledContext, AssemblyError> {
        self.assemble_explicit(question, budget_tokens, &[]).await
    }

    /// Like [`assemble`](Self::assemble), with extra tables the caller
    /// wants grounded regardless of the question's own references.
    /// Explicit tables are always probed when introspection is on.
    pub async fn assemble_explicit(
        &self,
        question: &str,
        budget_tokens: usize,
        explicit_tables: &[String],
    ) -> Result<AssembledContext, AssemblyError> {
        let store = self
            .handles
            .knowledge
            .as_ref()
            .ok_or_else(|| AssemblyError::KnowledgeUnavailable {
                reason: "no knowledge store loaded".into(),
            })?
            .current();

        // ── Referenced tables ──────────────────────────────────────────
        let mut referenced = store.referenced_tables(question);
        for table in explicit_tables {
            if !referenced.contains(table) {
                referenced.push(table.clone());
            }
        }
        referenced.sort();
        debug!(?referenced, "tables referenced by question");

        // ── Concurrent layer fetches (read-only, independent) ──────────
        let (patterns, memories) = tokio::join!(
            self.handles.patterns.search(question, self.opts.pattern_k),
            self.handles.memory.retrieve_similar(question, self.opts.memory_k),
        );
        let implicated = self.handles.memory.implicated_tables(&referenced).await;

        // ── Probe targets: absent/thin descriptors, correction-implicated
        //    tables, and explicit requests ───────────────────────────────
        let mut targets: BTreeSet<String> = BTreeSet::new();
        for table in &referenced {
            let unconfident = store
                .lookup_table(table)
                .map(|d| d.columns.is_empty())
                .unwrap_or(true);
            if unconfident || implicated.contains(table) {
                targets.insert(table.clone());
            }
        }
        for table in explicit_tables {
            targets.insert(table.clone());
        }

        // ── Bounded introspection fan-out ──────────────────────────────
        let mut live: BTreeMap<String, IntrospectionResult> = BTreeMap::new();
        if let Some(introspector) = &self.handles.introspector {
            let results: Vec<_> = stream::iter(targets.iter().cloned())
                .map(|table| {
                    let introspector = introspector.clone();
                    async move {
                        let result = introspector.introspect(&table).await;
                        (table, result)
                    }
                })
                .buffer_unordered(self.opts.max_concurrent_probes.max(1))
                .collect()
                .await;
            for (table, result) in results {
                match result {
                    Ok(res) => {
                        live.insert(table, res);
                    }
                    Err(e) => {
                        // Non-fatal: fall back to static metadata, unverified.
                        warn!(table = %table, error = %e, "introspection degraded to static metadata");
                    }
                }
            }
        }

        // ── Fragment collection ────────────────────────────────────────
        let mut fragments: Vec<Fragment> = Vec::new();

        if self.opts.institutional_enabled {
            self.collect_rules(&store, &referenced, &mut fragments);
        }
        self.collect_schema(&store, &referenced, &targets, &live, &mut fragments);
        self.collect_patterns(&patterns, &mut fragments);
        self.collect_memory(&memories, &mut fragments);

        // ── Deterministic sort: score desc, then stable content order ──
        fragments.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.layer.name().cmp(b.layer.name()))
                .then_with(|| a.source.cmp(&b.source))
                .then_with(|| a.text.cmp(&b.text))
        });

        // ── Budget fill: include the highest-scored prefix that fits ──
        let totals = Self::count_by_layer(fragments.iter());
        let mut included = Vec::new();
        let mut dropped = Vec::new();
        let mut used = 0usize;
        let mut exhausted = false;
        for fragment in fragments {
            let cost = token::estimate_fragment_tokens(&fragment);
            if !exhausted && used + cost <= budget_tokens {
                used += cost;
                included.push(fragment);
            } else {
                // Budget exhausted: everything from here down is dropped,
                // which is exactly the lowest-scored remainder.
                exhausted = true;
                dropped.push(fragment);
            }
        }

        let metadata = Self::build_metadata(budget_tokens, used, &included, &dropped, &totals);

        info!(
            fragments = included.len(),
            dropped = dropped.len(),
            tokens = used,
            budget = budget_tokens,
            "context assembled"
        );

        Ok(AssembledContext {
            fragments: included,
            budget_tokens,
            metadata,
        })
    }

    // ── Layer collectors ──────────────────────────────────────────────

    fn collect_rules(
        &self,
        store: &groundsql_knowledge::KnowledgeStore,
        referenced: &[String],
        out: &mut Vec<Fragment>,
    ) {
        let mut seen_gotchas: BTreeSet<String> = BTreeSet::new();
        for table in referenced {
            for rule in store.rules_for(table) {
                match rule {
                    BusinessRule::Gotcha(g) => {
                        if seen_gotchas.insert(g.issue.clone()) {
                            out.push(Self::scored(
                                ContextLayer::Gotcha,
                                table,
                                format!("{} Solution: {}", g.issue, g.solution),
                                1.0,
                                None,
                                true,
                            ));
                        }
                    }
                    BusinessRule::Metric(m) => {
                        out.push(Self::scored(
                            ContextLayer::StaticSchema,
                            format!("metric:{}", m.name),
                            format!("metric {}: {} (table {})", m.name, m.definition, m.table),
                            0.8,
                            None,
                            true,
                        ));
                    }
                }
            }
        }
    }

    fn collect_schema(
        &self,
        store: &groundsql_knowledge::KnowledgeStore,
        referenced: &[String],
        targets: &BTreeSet<String>,
        live: &BTreeMap<String, IntrospectionResult>,
        out: &mut Vec<Fragment>,
    ) {
        for table in referenced {
            let descriptor = store.lookup_table(table);
            match (descriptor, live.get(table)) {
                (Some(desc), Some(result)) => {
                    // Introspected data wins on conflict; static free-text
                    // notes are retained as supplementary.
                    out.push(Self::scored(
                        ContextLayer::Introspection,
                        table,
                        Self::render_live(result, Some(desc)),
                        1.0,
                        None,
                        true,
                    ));
                    out.push(Self::scored(
                        ContextLayer::StaticSchema,
                        table,
                        Self::render_notes(desc),
                        0.9,
                        None,
                        true,
                    ));
                }
                (Some(desc), None) => {
                    // Tagged unverified when a probe was wanted but failed.
                    let verified = !targets.contains(table);
                    out.push(Self::scored(
                        ContextLayer::StaticSchema,
                        table,
                        Self::render_static(desc),
                        0.9,
                        None,
                        verified,
                    ));
                }
                (None, Some(result)) => {
                    out.push(Self::scored(
                        ContextLayer::Introspection,
                        table,
                        Self::render_live(result, None),
                        1.0,
                        None,
                        true,
                    ));
                }
                (None, None) => {
                    debug!(table = %table, "no grounding available for table");
                }
            }
        }
    }

    fn collect_patterns(&self, patterns: &[(groundsql_core::pattern::QueryPattern, f64)], out: &mut Vec<Fragment>) {
        for (rank, (pattern, similarity)) in patterns.iter().enumerate() {
            out.push(Self::scored(
                ContextLayer::Pattern,
                format!("pattern:{}", pattern.question),
                format!("Q: {}\nSQL: {}", pattern.question, pattern.sql),
                *similarity,
                Some(rank),
                true,
            ));
        }
    }

    fn collect_memory(&self, memories: &[(groundsql_core::memory::MemoryRecord, f64)], out: &mut Vec<Fragment>) {
        for (rank, (record, similarity)) in memories.iter().enumerate() {
            match (&record.verdict, &record.correction) {
                (groundsql_core::memory::Verdict::Corrected, Some(correction)) => {
                    out.push(Self::scored(
                        ContextLayer::Correction,
                        format!("memory:{}", record.id),
                        format!("correction for '{}': {}", record.question, correction),
                        *similarity,
                        Some(rank),
                        true,
                    ));
                }
                _ => {
                    out.push(Self::scored(
                        ContextLayer::Memory,
                        format!("memory:{}", record.id),
                        format!(
                            "previously {}: Q: {} SQL: {}",
                            match record.verdict {
                                groundsql_core::memory::Verdict::Success => "validated",
                                groundsql_core::memory::Verdict::Corrected => "corrected",
                                groundsql_core::memory::Verdict::Failed => "failed",
                            },
                            record.question,
                            record.generated_sql
                        ),
                        *similarity,
                        Some(rank),
                        true,
                    ));
                }
            }
        }
    }

    // ── Rendering & scoring helpers ───────────────────────────────────

    fn scored(
        layer: ContextLayer,
        source: impl Into<String>,
        text: impl Into<String>,
        relevance: f64,
        recency_rank: Option<usize>,
        verified: bool,
    ) -> Fragment {
        let mut fragment = Fragment::new(layer, source, text);
        let recency = recency_rank.map(|r| 1.0 / (1.0 + r as f64)).unwrap_or(0.0);
        fragment.score = layer.base_score() + relevance.clamp(0.0, 1.0) * RELEVANCE_WEIGHT + recency;
        fragment.verified = verified;
        fragment
    }

    fn render_static(desc: &TableDescriptor) -> String {
        let columns = desc
            .columns
            .iter()
            .map(|c| {
                if c.description.is_empty() {
                    format!("{} {}", c.name, c.sql_type)
                } else {
                    format!("{} {} ({})", c.name, c.sql_type, c.description)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        let mut text = format!("table {}: {}. columns: {}", desc.name, desc.description, columns);
        if !desc.quality_notes.is_empty() {
            let notes = desc
                .quality_notes
                .iter()
                .map(|n| n.text.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            text.push_str(&format!(". notes: {notes}"));
        }
        text
    }

    /// Description and quality notes only, kept alongside a live result.
    fn render_notes(desc: &TableDescriptor) -> String {
        let mut text = format!("table {}: {}", desc.name, desc.description);
        if !desc.quality_notes.is_empty() {
            let notes = desc
                .quality_notes
                .iter()
                .map(|n| n.text.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            text.push_str(&format!(". notes: {notes}"));
        }
        text
    }

    fn render_live(result: &IntrospectionResult, desc: Option<&TableDescriptor>) -> String {
        let columns = result
            .columns
            .iter()
            .map(|c| {
                // Observed type wins; static column description carries over.
                let static_desc = desc
                    .and_then(|d| d.column(&c.name))
                    .map(|sc| sc.description.as_str())
                    .filter(|s| !s.is_empty());
                let mut part = format!("{} {}", c.name, c.observed_type);
                if let Some(d) = static_desc {
                    part.push_str(&format!(" ({d})"));
                }
                if !c.samples.is_empty() {
                    part.push_str(&format!(" [samples: {}]", c.samples.join(", ")));
                }
                part
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("live schema for {}: {}", result.table, columns)
    }

    fn count_by_layer<'a>(fragments: impl Iterator<Item = &'a Fragment>) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for fragment in fragments {
            *counts.entry(fragment.layer.name()).or_insert(0) += 1;
        }
        counts
    }

    fn build_metadata(
        budget: usize,
        used: usize,
        included: &[Fragment],
        dropped: &[Fragment],
        totals: &BTreeMap<&'static str, usize>,
    ) -> AssemblyMetadata {
        let mut per_layer = Vec::new();
        for layer in ContextLayer::ALL {
            let name = layer.name();
            let total = totals.get(name).copied().unwrap_or(0);
            if total == 0 {
                continue;
            }
            let layer_included: Vec<&Fragment> =
                included.iter().filter(|f| f.layer == layer).collect();
            per_layer.push(LayerStats {
                name: name.to_string(),
                tokens: layer_included
                    .iter()
                    .map(|f| token::estimate_fragment_tokens(f))
                    .sum(),
                items_included: layer_included.len(),
                items_total: total,
            });
        }

        let mut drops = Vec::new();
        for layer in ContextLayer::ALL {
            let layer_dropped: Vec<&Fragment> = dropped.iter().filter(|f| f.layer == layer).collect();
            if layer_dropped.is_empty() {
                continue;
            }
            drops.push(DropInfo {
                layer: layer.name().to_string(),
                items_dropped: layer_dropped.len(),
                tokens_dropped: layer_dropped
                    .iter()
                    .map(|f| token::estimate_fragment_tokens(f))
                    .sum(),
                reason: "budget exhausted, lowest-scored fragments dropped".into(),
            });
        }

        AssemblyMetadata {
            total_tokens: used,
            budget,
            utilization_pct: if budget == 0 {
                0.0
            } else {
                (used as f32 / budget as f32) * 100.0
            },
            per_layer,
            drops,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use groundsql_core::error::SchemaUnavailable;
    use groundsql_core::introspect::{ObservedColumn, SchemaProbe};
    use groundsql_core::memory::{MemoryRecord, Verdict};
    use groundsql_core::pattern::QueryPattern;
    use groundsql_knowledge::{KnowledgeSource, KnowledgeStore};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Duration;

    const F1_KNOWLEDGE: &str = r#"{
        "tables": [
            {
                "table_name": "drivers_championship",
                "table_description": "Final championship standings per season",
                "table_columns": [
                    {"name": "position", "type": "TEXT", "description": "stored as text"},
                    {"name": "driver", "type": "TEXT", "description": ""},
                    {"name": "season", "type": "INTEGER", "description": ""}
                ],
                "data_quality_notes": ["position is TEXT"]
            },
            {
                "table_name": "race_wins",
                "table_description": "One row per race win",
                "table_columns": [
                    {"name": "date", "type": "TEXT", "description": "race date as text"},
                    {"name": "driver", "type": "TEXT", "description": ""}
                ],
                "data_quality_notes": ["date is TEXT, not DATE"]
            }
        ],
        "metrics": [
            {"name": "total_wins", "definition": "COUNT(*) grouped by driver", "table": "race_wins"}
        ],
        "common_gotchas": [
            {
                "issue": "position is TEXT, use string comparison, e.g. position = '1'",
                "tables_affected": ["drivers_championship"],
                "solution": "always compare position against quoted literals"
            }
        ]
    }"#;

    fn shared_knowledge() -> SharedKnowledge {
        let source = KnowledgeSource::from_json(F1_KNOWLEDGE).unwrap();
        SharedKnowledge::new(KnowledgeStore::load(&[source]).unwrap())
    }

    fn handles(knowledge: Option<SharedKnowledge>) -> AssemblerHandles {
        AssemblerHandles {
            knowledge,
            patterns: Arc::new(PatternIndex::new()),
            memory: Arc::new(LearningMemory::ephemeral()),
            introspector: None,
        }
    }

    fn assembler(handles: AssemblerHandles) -> ContextAssembler {
        ContextAssembler::new(handles, AssembleOptions::default())
    }

    struct CountingProbe {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SchemaProbe for CountingProbe {
        async fn probe(
            &self,
            table: &str,
        ) -> Result<groundsql_core::introspect::IntrospectionResult, SchemaUnavailable> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(groundsql_core::introspect::IntrospectionResult {
                table: table.to_string(),
                columns: vec![ObservedColumn {
                    name: "position".into(),
                    observed_type: "INTEGER".into(),
                    samples: vec!["1".into()],
                }],
                fetched_at: Utc::now(),
            })
        }
    }

    struct TimeoutProbe;

    #[async_trait]
    impl SchemaProbe for TimeoutProbe {
        async fn probe(
            &self,
            table: &str,
        ) -> Result<groundsql_core::introspect::IntrospectionResult, SchemaUnavailable> {
            Err(SchemaUnavailable::Timeout {
                table: table.to_string(),
                timeout_ms: 2000,
            })
        }
    }

    #[test]
    fn options_mirror_config() {
        let mut config = AppConfig::default();
        config.retrieval.pattern_k = 3;
        config.knowledge.institutional_enabled = false;
        config.introspection.max_concurrent = 2;

        let opts = AssembleOptions::from_config(&config);
        assert_eq!(opts.pattern_k, 3);
        assert_eq!(opts.memory_k, 5);
        assert!(!opts.institutional_enabled);
        assert_eq!(opts.max_concurrent_probes, 2);
    }

    #[tokio::test]
    async fn gotcha_outranks_generic_metadata() {
        let asm = assembler(handles(Some(shared_knowledge())));
        let ctx = asm.assemble("who won the 2023 championship", 4096).await.unwrap();

        // The gotcha fragment is present, verbatim, and ranked first.
        assert_eq!(ctx.fragments[0].layer, ContextLayer::Gotcha);
        assert!(ctx.fragments[0]
            .text
            .contains("position is TEXT, use string comparison, e.g. position = '1'"));
        assert!(ctx.render().contains("position is TEXT, use string comparison"));
    }

    #[tokio::test]
    async fn budget_is_never_exceeded_and_truncation_is_deterministic() {
        let knowledge = shared_knowledge();
        let patterns = Arc::new(PatternIndex::new());
        for i in 0..20 {
            patterns
                .add(QueryPattern::new(
                    format!("championship winner question number {i}"),
                    format!("SELECT driver FROM drivers_championship WHERE season = {i}"),
                ))
                .await;
        }
        let asm = assembler(AssemblerHandles {
            knowledge: Some(knowledge),
            patterns,
            memory: Arc::new(LearningMemory::ephemeral()),
            introspector: None,
        });

        let budget = 120;
        let first = asm.assemble("championship winner question", budget).await.unwrap();
        let second = asm.assemble("championship winner question", budget).await.unwrap();

        assert!(first.metadata.total_tokens <= budget);
        assert!(!first.metadata.drops.is_empty());

        // Identical inputs, identical truncation set.
        let texts_a: Vec<&str> = first.fragments.iter().map(|f| f.text.as_str()).collect();
        let texts_b: Vec<&str> = second.fragments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts_a, texts_b);

        // Everything included outranks everything dropped.
        let min_included = first
            .fragments
            .iter()
            .map(|f| f.score)
            .fold(f64::INFINITY, f64::min);
        let dropped_total: usize = first.metadata.drops.iter().map(|d| d.items_dropped).sum();
        assert!(dropped_total > 0);
        // Per-layer totals minus included equals dropped.
        let included_total: usize = first.metadata.per_layer.iter().map(|l| l.items_included).sum();
        let all_total: usize = first.metadata.per_layer.iter().map(|l| l.items_total).sum();
        assert_eq!(all_total - included_total, dropped_total);
        assert!(min_included.is_finite());
    }

    #[tokio::test]
    async fn introspection_timeout_degrades_to_unverified_static() {
        let knowledge = shared_knowledge();
        let memory = Arc::new(LearningMemory::ephemeral());
        // A correction implicating race_wins forces a probe for it.
        memory
            .record(
                MemoryRecord::new("when did Hamilton win", "SELECT ...", Verdict::Corrected)
                    .with_correction("date in race_wins is TEXT"),
            )
            .await
            .unwrap();
        let introspector = Arc::new(SchemaIntrospector::new(
            Arc::new(TimeoutProbe),
            Duration::from_secs(300),
            Duration::from_secs(2),
        ));
        let asm = assembler(AssemblerHandles {
            knowledge: Some(knowledge),
            patterns: Arc::new(PatternIndex::new()),
            memory,
            introspector: Some(introspector),
        });

        let ctx = asm.assemble("race wins by date", 4096).await.unwrap();

        // Assembly did not fail, the static TEXT note survived, unverified.
        let static_frag = ctx
            .fragments
            .iter()
            .find(|f| f.layer == ContextLayer::StaticSchema && f.source == "race_wins")
            .expect("static fragment for race_wins");
        assert!(!static_frag.verified);
        assert!(static_frag.text.contains("date is TEXT, not DATE"));
        assert!(ctx.render().contains("(unverified)"));
    }

    #[tokio::test]
    async fn correction_triggers_introspection_for_implicated_table() {
        let knowledge = shared_knowledge();
        let memory = Arc::new(LearningMemory::ephemeral());
        memory
            .record(
                MemoryRecord::new(
                    "who finished second in the championship",
                    "SELECT driver FROM drivers_championship WHERE position = 2",
                    Verdict::Corrected,
                )
                .with_correction("position in drivers_championship is TEXT, not INTEGER"),
            )
            .await
            .unwrap();

        let probe = Arc::new(CountingProbe {
            calls: AtomicUsize::new(0),
        });
        let introspector = Arc::new(SchemaIntrospector::new(
            probe.clone(),
            Duration::from_secs(300),
            Duration::from_secs(2),
        ));
        let asm = assembler(AssemblerHandles {
            knowledge: Some(knowledge),
            patterns: Arc::new(PatternIndex::new()),
            memory,
            introspector: Some(introspector),
        });

        let ctx = asm
            .assemble("who finished third in the championship", 4096)
            .await
            .unwrap();

        // The implicated table was probed even with no static gotcha for it.
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
        // Live data overrides the static type, static notes retained.
        let live = ctx
            .fragments
            .iter()
            .find(|f| f.layer == ContextLayer::Introspection)
            .expect("introspection fragment");
        assert!(live.text.contains("position INTEGER"));
        let supplementary = ctx
            .fragments
            .iter()
            .find(|f| f.layer == ContextLayer::StaticSchema && f.source == "drivers_championship")
            .expect("supplementary static fragment");
        assert!(supplementary.text.contains("position is TEXT"));
    }

    #[tokio::test]
    async fn missing_knowledge_store_fails_assembly() {
        let asm = assembler(handles(None));
        let err = asm.assemble("who won", 4096).await.unwrap_err();
        assert!(matches!(err, AssemblyError::KnowledgeUnavailable { .. }));
    }

    #[tokio::test]
    async fn empty_pattern_and_memory_layers_degrade_silently() {
        let asm = assembler(handles(Some(shared_knowledge())));
        let ctx = asm.assemble("who won the 2023 championship", 4096).await.unwrap();

        assert!(!ctx.fragments.is_empty());
        assert!(!ctx
            .metadata
            .per_layer
            .iter()
            .any(|l| l.name == "pattern" || l.name == "memory"));
    }

    #[tokio::test]
    async fn institutional_layer_can_be_disabled() {
        let mut opts = AssembleOptions::default();
        opts.institutional_enabled = false;
        let asm = ContextAssembler::new(handles(Some(shared_knowledge())), opts);

        let ctx = asm.assemble("who won the 2023 championship", 4096).await.unwrap();
        assert!(!ctx.fragments.iter().any(|f| f.layer == ContextLayer::Gotcha));
        // Table metadata is still grounded.
        assert!(ctx.fragments.iter().any(|f| f.layer == ContextLayer::StaticSchema));
    }

    #[tokio::test]
    async fn explicit_table_without_descriptor_is_probed() {
        let probe = Arc::new(CountingProbe {
            calls: AtomicUsize::new(0),
        });
        let introspector = Arc::new(SchemaIntrospector::new(
            probe.clone(),
            Duration::from_secs(300),
            Duration::from_secs(2),
        ));
        let asm = assembler(AssemblerHandles {
            knowledge: Some(shared_knowledge()),
            patterns: Arc::new(PatternIndex::new()),
            memory: Arc::new(LearningMemory::ephemeral()),
            introspector: Some(introspector),
        });

        let ctx = asm
            .assemble_explicit("anything about sprints", 4096, &["sprint_results".to_string()])
            .await
            .unwrap();

        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
        assert!(ctx
            .fragments
            .iter()
            .any(|f| f.layer == ContextLayer::Introspection && f.source == "sprint_results"));
    }

    #[tokio::test]
    async fn patterns_rank_above_generic_memory() {
        let patterns = Arc::new(PatternIndex::new());
        patterns
            .add(QueryPattern::new("race wins for Hamilton", "SELECT COUNT(*)"))
            .await;
        let memory = Arc::new(LearningMemory::ephemeral());
        memory
            .record(MemoryRecord::new("race wins for Hamilton", "SELECT 1", Verdict::Success))
            .await
            .unwrap();

        let asm = assembler(AssemblerHandles {
            knowledge: Some(shared_knowledge()),
            patterns,
            memory,
            introspector: None,
        });

        let ctx = asm.assemble("race wins for Hamilton", 4096).await.unwrap();
        let pattern_pos = ctx
            .fragments
            .iter()
            .position(|f| f.layer == ContextLayer::Pattern)
            .unwrap();
        let memory_pos = ctx
            .fragments
            .iter()
            .position(|f| f.layer == ContextLayer::Memory)
            .unwrap();
        assert!(pattern_pos < memory_pos);
    }
}
