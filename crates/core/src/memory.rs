//! Learning memory domain types — judged outcomes of generated queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::ContextLayer;

/// The judged outcome of a generated query.
///
/// Ordering matters for retrieval: `Success` outranks `Corrected`
/// outranks `Failed` at equal similarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Success,
    Corrected,
    Failed,
}

impl Verdict {
    /// Retrieval tier — higher ranks first.
    pub fn tier(self) -> u8 {
        match self {
            Self::Success => 2,
            Self::Corrected => 1,
            Self::Failed => 0,
        }
    }
}

/// One judged outcome written into the learning memory log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique record id.
    pub id: String,

    /// The question as asked.
    pub question: String,

    /// The SQL the generation step produced.
    pub generated_sql: String,

    /// How the outcome was judged.
    pub verdict: Verdict,

    /// Correction text, present when verdict is `Corrected`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<String>,

    /// Write timestamp. Monotonically non-decreasing in log order.
    pub recorded_at: DateTime<Utc>,

    /// Context layers that were actually assembled for this question.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers_used: Vec<ContextLayer>,
}

impl MemoryRecord {
    pub fn new(
        question: impl Into<String>,
        generated_sql: impl Into<String>,
        verdict: Verdict,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            question: question.into(),
            generated_sql: generated_sql.into(),
            verdict,
            correction: None,
            recorded_at: Utc::now(),
            layers_used: Vec::new(),
        }
    }

    pub fn with_correction(mut self, correction: impl Into<String>) -> Self {
        self.correction = Some(correction.into());
        self
    }

    pub fn with_layers(mut self, layers: Vec<ContextLayer>) -> Self {
        self.layers_used = layers;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_tiers_order_success_first() {
        assert!(Verdict::Success.tier() > Verdict::Corrected.tier());
        assert!(Verdict::Corrected.tier() > Verdict::Failed.tier());
    }

    #[test]
    fn record_round_trips_through_json() {
        let rec = MemoryRecord::new("who won", "SELECT 1", Verdict::Corrected)
            .with_correction("position is TEXT, compare as string");
        let json = serde_json::to_string(&rec).unwrap();
        let back: MemoryRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.verdict, Verdict::Corrected);
        assert_eq!(back.correction.as_deref(), Some("position is TEXT, compare as string"));
    }
}
