//! # GroundSQL Engine
//!
//! The orchestrating crate: [`ContextAssembler`] merges the grounding
//! layers into one ranked, size-bounded context, and [`QueryEngine`] runs
//! the full loop — assemble, generate, execute — and feeds judged
//! outcomes back into learning memory.

pub mod context;
pub mod pipeline;

pub use context::assembler::{AssemblerHandles, AssembleOptions, ContextAssembler};
pub use pipeline::{EngineAnswer, QueryEngine};
