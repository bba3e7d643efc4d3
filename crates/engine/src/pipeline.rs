//! The query pipeline: assemble, generate, execute, learn.
//!
//! `QueryEngine` owns one [`ContextAssembler`] plus the generation and
//! execution capabilities, and closes the loop: judged outcomes flow back
//! into learning memory, validated queries seed the pattern index, and
//! corrections invalidate the introspection cache so the next request
//! re-probes the implicated tables.

use std::sync::Arc;

use groundsql_config::AppConfig;
use groundsql_core::capability::{Row, SqlExecutor, SqlGenerator};
use groundsql_core::context::AssembledContext;
use groundsql_core::error::Result;
use groundsql_core::introspect::SchemaProbe;
use groundsql_core::memory::{MemoryRecord, Verdict};
use groundsql_core::pattern::QueryPattern;
use groundsql_core::similarity::{token_matches_table, tokenize};
use groundsql_introspect::SchemaIntrospector;
use groundsql_knowledge::SharedKnowledge;
use groundsql_memory::LearningMemory;
use groundsql_patterns::PatternIndex;
use tracing::{debug, info};

use crate::context::assembler::{AssembleOptions, AssemblerHandles, ContextAssembler};

/// One answered question, carrying everything `report_outcome` needs.
#[derive(Debug, Clone)]
pub struct EngineAnswer {
    pub question: String,
    pub sql: String,
    pub rows: Vec<Row>,
    pub context: AssembledContext,
}

/// The orchestrating engine.
pub struct QueryEngine {
    assembler: ContextAssembler,
    generator: Arc<dyn SqlGenerator>,
    executor: Arc<dyn SqlExecutor>,
    knowledge: Option<SharedKnowledge>,
    patterns: Arc<PatternIndex>,
    memory: Arc<LearningMemory>,
    introspector: Option<Arc<SchemaIntrospector>>,
    budget_tokens: usize,
}

impl QueryEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        assembler: ContextAssembler,
        generator: Arc<dyn SqlGenerator>,
        executor: Arc<dyn SqlExecutor>,
        knowledge: Option<SharedKnowledge>,
        patterns: Arc<PatternIndex>,
        memory: Arc<LearningMemory>,
        introspector: Option<Arc<SchemaIntrospector>>,
        budget_tokens: usize,
    ) -> Self {
        Self {
            assembler,
            generator,
            executor,
            knowledge,
            patterns,
            memory,
            introspector,
            budget_tokens,
        }
    }

    /// Build a fully wired engine from configuration.
    ///
    /// Every recognized option is consumed: `context.budget_tokens`
    /// bounds assembly, the retrieval k's and the institutional toggle
    /// shape the assembler, `memory.journal_path` selects a journaled or
    /// ephemeral learning memory, and the introspection section sets
    /// TTL, timeout, and the enabled flag (a disabled introspector
    /// reports `SchemaUnavailable::Disabled` without probing). The
    /// pattern index is seeded from the knowledge sources' validated
    /// pairs.
    pub async fn from_config(
        config: &AppConfig,
        knowledge: SharedKnowledge,
        generator: Arc<dyn SqlGenerator>,
        executor: Arc<dyn SqlExecutor>,
        probe: Option<Arc<dyn SchemaProbe>>,
    ) -> Result<Self> {
        let memory = Arc::new(match &config.memory.journal_path {
            Some(path) => LearningMemory::open(path)?,
            None => LearningMemory::ephemeral(),
        });
        let patterns = Arc::new(PatternIndex::new());
        patterns.seed(knowledge.current().seed_patterns()).await;
        let introspector = probe
            .map(|p| Arc::new(SchemaIntrospector::from_config(p, &config.introspection)));

        let assembler = ContextAssembler::new(
            AssemblerHandles {
                knowledge: Some(knowledge.clone()),
                patterns: patterns.clone(),
                memory: memory.clone(),
                introspector: introspector.clone(),
            },
            AssembleOptions::from_config(config),
        );

        info!(
            budget = config.context.budget_tokens,
            introspection = config.introspection.enabled,
            journaled = config.memory.journal_path.is_some(),
            "engine built from configuration"
        );
        Ok(Self::new(
            assembler,
            generator,
            executor,
            Some(knowledge),
            patterns,
            memory,
            introspector,
            config.context.budget_tokens,
        ))
    }

    /// Answer a natural-language question end to end.
    ///
    /// Assembly degradation (missing layers, failed probes) does not fail
    /// the call; only an unreachable knowledge store, a generation fault,
    /// or an execution fault does.
    pub async fn answer(&self, question: &str) -> Result<EngineAnswer> {
        let context = self.assembler.assemble(question, self.budget_tokens).await?;
        debug!(
            fragments = context.fragments.len(),
            tokens = context.metadata.total_tokens,
            "context ready for generation"
        );

        let sql = self.generator.generate(&context, question).await?;
        let rows = self.executor.execute(&sql).await?;

        info!(question, rows = rows.len(), "question answered");
        Ok(EngineAnswer {
            question: question.to_string(),
            sql,
            rows,
            context,
        })
    }

    /// Feed a judged outcome back into the learning layers.
    ///
    /// Success seeds the pattern index with the validated pair. A
    /// correction is stored verbatim and the introspection cache entries
    /// for the tables it names are dropped, so the next assembly for
    /// those tables probes live schema instead of trusting a stale cache.
    pub async fn report_outcome(
        &self,
        answer: &EngineAnswer,
        verdict: Verdict,
        correction: Option<&str>,
    ) -> Result<()> {
        let mut record = MemoryRecord::new(&answer.question, &answer.sql, verdict)
            .with_layers(answer.context.layers_used());
        if let Some(text) = correction {
            record = record.with_correction(text);
        }
        self.memory.record(record).await?;

        match verdict {
            Verdict::Success => {
                let id = self
                    .patterns
                    .add(QueryPattern::new(&answer.question, &answer.sql))
                    .await;
                debug!(pattern = %id, "validated query stored as pattern");
            }
            Verdict::Corrected => {
                if let Some(text) = correction {
                    self.invalidate_corrected_tables(text).await;
                }
            }
            Verdict::Failed => {}
        }

        info!(question = %answer.question, verdict = ?verdict, "outcome recorded");
        Ok(())
    }

    /// Drop cache entries for every known table the correction names.
    async fn invalidate_corrected_tables(&self, correction: &str) {
        let (Some(introspector), Some(knowledge)) = (&self.introspector, &self.knowledge) else {
            return;
        };
        let store = knowledge.current();
        let tokens = tokenize(correction);
        for table in store.table_names() {
            if tokens.iter().any(|tok| token_matches_table(tok, table)) {
                debug!(table, "correction names table, invalidating cached schema");
                introspector.invalidate(table).await;
            }
        }
    }

    /// Rebuild the consolidated memory view. Cheap enough to run after a
    /// batch of outcomes; concurrent `answer` calls are unaffected.
    pub async fn consolidate_memory(&self) -> Result<()> {
        self.memory.consolidate().await;
        Ok(())
    }

    pub fn budget_tokens(&self) -> usize {
        self.budget_tokens
    }
}
