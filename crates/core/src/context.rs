//! Assembled context types — scored fragments grouped by grounding layer.
//!
//! A `Fragment` is one unit of context text attributed to exactly one
//! layer. The assembler scores fragments, sorts them, and fills the
//! configured budget; the resulting `AssembledContext` is consumed once
//! by the generation capability and never persisted.

use serde::{Deserialize, Serialize};

/// The distinct grounding layers, in precedence order.
///
/// Base scores are spaced ten apart so relevance and recency adjustments
/// (bounded below ten) can reorder fragments within a layer but never
/// across layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextLayer {
    /// Known pitfalls from the business-rule knowledge.
    Gotcha,
    /// Corrections learned from judged outcomes.
    Correction,
    /// Live schema introspection results.
    Introspection,
    /// Static table metadata and metric definitions.
    StaticSchema,
    /// Previously validated query patterns.
    Pattern,
    /// Generic learned memory (non-correction outcomes).
    Memory,
}

impl ContextLayer {
    /// Every layer in precedence order.
    pub const ALL: [ContextLayer; 6] = [
        ContextLayer::Gotcha,
        ContextLayer::Correction,
        ContextLayer::Introspection,
        ContextLayer::StaticSchema,
        ContextLayer::Pattern,
        ContextLayer::Memory,
    ];

    /// Base precedence score. Gotchas and corrections share the top tier.
    pub fn base_score(self) -> f64 {
        match self {
            Self::Gotcha | Self::Correction => 50.0,
            Self::Introspection => 40.0,
            Self::StaticSchema => 30.0,
            Self::Pattern => 20.0,
            Self::Memory => 10.0,
        }
    }

    /// Stable name used in metadata and rendered section headers.
    pub fn name(self) -> &'static str {
        match self {
            Self::Gotcha => "gotcha",
            Self::Correction => "correction",
            Self::Introspection => "introspection",
            Self::StaticSchema => "static_schema",
            Self::Pattern => "pattern",
            Self::Memory => "memory",
        }
    }
}

/// One scored unit of context text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fragment {
    /// The layer this fragment came from.
    pub layer: ContextLayer,

    /// What produced it — a table name, pattern id, record id.
    pub source: String,

    /// The text handed to the generation step.
    pub text: String,

    /// Final score after precedence, relevance, and recency adjustments.
    pub score: f64,

    /// False when the fragment rests on static metadata that live
    /// introspection could not confirm.
    pub verified: bool,
}

impl Fragment {
    pub fn new(layer: ContextLayer, source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            layer,
            source: source.into(),
            text: text.into(),
            score: layer.base_score(),
            verified: true,
        }
    }

    pub fn unverified(mut self) -> Self {
        self.verified = false;
        self
    }
}

/// The assembled, budget-bounded context for one request.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    /// Fragments in descending score order, all within budget.
    pub fragments: Vec<Fragment>,

    /// The configured budget in tokens.
    pub budget_tokens: usize,

    /// Assembly statistics (per-layer counts, drops, utilization).
    pub metadata: AssemblyMetadata,
}

impl AssembledContext {
    /// Render the context as sectioned text for the generation step.
    ///
    /// Fragments keep score order; unverified fragments are tagged so the
    /// model can weigh them accordingly.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for frag in &self.fragments {
            let tag = if frag.verified { "" } else { " (unverified)" };
            out.push_str(&format!("[{}{}] {}\n", frag.layer.name(), tag, frag.text));
        }
        out
    }

    /// The distinct layers present, in first-appearance order.
    pub fn layers_used(&self) -> Vec<ContextLayer> {
        let mut seen = Vec::new();
        for frag in &self.fragments {
            if !seen.contains(&frag.layer) {
                seen.push(frag.layer);
            }
        }
        seen
    }
}

/// Detailed metadata about the assembly process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssemblyMetadata {
    /// Total tokens in the assembled context.
    pub total_tokens: usize,

    /// Configured token budget.
    pub budget: usize,

    /// Budget utilization percentage (0.0–100.0).
    pub utilization_pct: f32,

    /// Per-layer statistics.
    pub per_layer: Vec<LayerStats>,

    /// Fragments dropped during budget enforcement.
    pub drops: Vec<DropInfo>,
}

/// Statistics for a single context layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerStats {
    /// Layer name.
    pub name: String,
    /// Tokens consumed by this layer.
    pub tokens: usize,
    /// Fragments included after budget trimming.
    pub items_included: usize,
    /// Fragments available before trimming.
    pub items_total: usize,
}

/// Information about fragments dropped from a layer during budget enforcement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropInfo {
    /// Which layer.
    pub layer: String,
    /// Number of fragments dropped.
    pub items_dropped: usize,
    /// Estimated tokens of dropped content.
    pub tokens_dropped: usize,
    /// Reason for dropping.
    pub reason: String,
}
