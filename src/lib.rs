// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod ingest;
pub mod notify;
pub mod pipeline;
pub mod recommendation;
pub mod retry;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::error::{PipelineError, Result};
pub use crate::pipeline::{ArticleOutcome, CycleReport, Orchestrator};
pub use crate::recommendation::{Action, Level, Recommendation};
