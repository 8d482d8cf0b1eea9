//! Cash Horizon
//!
//! Financial analysis engine for small companies:
//! - Deterministic metrics over a transaction ledger (burn, runway, growth, health)
//! - Three analysis tasks (spending, runway, investment) that compute facts first
//!   and hand them to a pluggable summarizer for narrative
//! - A workflow orchestrator with sequential and parallel policies, per-task
//!   failure isolation and a whole-run deadline
//! - Chart series projections, post-run verification and an audit trail
//!
//! PIPELINE:
//! VALIDATE → RUN TASKS → SETTLE → SUMMARIZE → VERIFY → AUDIT

pub mod api;
pub mod audit;
pub mod charts;
pub mod config;
pub mod error;
pub mod gemini;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod summarizer;
pub mod tasks;
pub mod verification;

pub use error::{OrchestrationError, Result};

// Re-export common types
pub use charts::ChartProjector;
pub use config::Settings;
pub use metrics::FinancialCalculator;
pub use models::*;
pub use orchestrator::WorkflowOrchestrator;
pub use summarizer::{MockSummarizer, Summarizer};
