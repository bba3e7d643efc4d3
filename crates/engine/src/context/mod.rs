//! Context assembly — fragment collection, scoring, and budget enforcement.

pub mod assembler;
pub mod token;
