//! Analysis tasks
//!
//! Every task follows the same pipeline:
//! COMPUTE FACTS → BUILD REQUEST → SUMMARIZE → PACKAGE OUTCOME
//!
//! Facts come only from the deterministic engines. The summarizer sees
//! them but never changes them, and facts survive a failed summarize call.

use crate::config::AnalysisSettings;
use crate::error::OrchestrationError;
use crate::metrics::FinancialCalculator;
use crate::models::{CompanyProfile, TaskKind, TaskOutcome, Transaction};
use crate::summarizer::Summarizer;
use crate::Result;
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

pub mod investment;
pub mod options;
pub mod runway;
pub mod spending;

/// Facts of tasks that already completed in this run, keyed by task.
pub type PriorFacts = BTreeMap<TaskKind, Value>;

/// Company plus the transactions a task computes over. Each running task owns its copy.
#[derive(Debug, Clone)]
pub struct TaskInput {
    pub company: CompanyProfile,
    pub transactions: Vec<Transaction>,
}

impl TaskInput {
    pub fn new(company: CompanyProfile, transactions: Vec<Transaction>) -> Self {
        Self {
            company,
            transactions,
        }
    }
}

/// Shared, read-only parameters for task execution.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub calculator: FinancialCalculator,
    pub analysis: AnalysisSettings,
    pub summarize_timeout: Duration,
}

impl TaskContext {
    pub fn new(
        calculator: FinancialCalculator,
        analysis: AnalysisSettings,
        summarize_timeout: Duration,
    ) -> Self {
        Self {
            calculator,
            analysis,
            summarize_timeout,
        }
    }
}

impl Default for TaskContext {
    fn default() -> Self {
        Self::new(
            FinancialCalculator::new(),
            AnalysisSettings::default(),
            Duration::from_secs(60),
        )
    }
}

/// Output of the fact-computation stage, ready for the summarizer.
#[derive(Debug, Clone)]
pub(crate) struct PreparedRequest {
    pub facts: Value,
    pub system_context: &'static str,
    pub instructions: String,
}

#[derive(Debug, Clone)]
pub struct AnalysisTask {
    kind: TaskKind,
    context: TaskContext,
}

impl AnalysisTask {
    pub fn new(kind: TaskKind, context: TaskContext) -> Self {
        Self { kind, context }
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    fn prepare(&self, input: &TaskInput) -> Result<PreparedRequest> {
        match self.kind {
            TaskKind::SpendingAnalysis => spending::prepare(&self.context, input),
            TaskKind::RunwayPrediction => runway::prepare(&self.context, input),
            TaskKind::InvestmentAdvice => investment::prepare(&self.context, input),
        }
    }

    /// Run the task to a settled outcome. Never returns an error: failures
    /// become `TaskOutcome::Failure`, keeping whatever facts were computed.
    pub async fn run(
        &self,
        input: &TaskInput,
        prior: &PriorFacts,
        summarizer: &dyn Summarizer,
    ) -> TaskOutcome {
        self.execute(input, prior, summarizer, None).await
    }

    /// Like [`run`](Self::run), but also publishes the computed facts on
    /// `facts_tx` before the summarizer is called. A caller that aborts the
    /// task mid-summarize can still recover them from the receiver.
    pub async fn run_publishing_facts(
        &self,
        input: &TaskInput,
        prior: &PriorFacts,
        summarizer: &dyn Summarizer,
        facts_tx: oneshot::Sender<Value>,
    ) -> TaskOutcome {
        self.execute(input, prior, summarizer, Some(facts_tx)).await
    }

    async fn execute(
        &self,
        input: &TaskInput,
        prior: &PriorFacts,
        summarizer: &dyn Summarizer,
        facts_tx: Option<oneshot::Sender<Value>>,
    ) -> TaskOutcome {
        let started = Instant::now();
        let task = self.kind;

        info!(
            task = %task,
            company_id = input.company.id,
            transactions = input.transactions.len(),
            prior_tasks = prior.len(),
            "Starting analysis task"
        );

        let prepared = match self.prepare(input) {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!(task = %task, error = %e, "Fact computation failed");
                return failure(e, None, started);
            }
        };

        if let Some(tx) = facts_tx {
            // Receiver gone means nobody waits for early facts.
            let _ = tx.send(prepared.facts.clone());
        }

        let request_facts = with_prior_facts(&prepared.facts, prior);

        let summary = tokio::time::timeout(
            self.context.summarize_timeout,
            summarizer.summarize(prepared.system_context, &request_facts, &prepared.instructions),
        )
        .await
        .unwrap_or_else(|_| {
            Err(OrchestrationError::CollaboratorTimeout(
                self.context.summarize_timeout.as_secs(),
            ))
        });

        match summary {
            Ok(insight) => {
                let execution_time_ms = elapsed_ms(started);
                info!(task = %task, elapsed_ms = execution_time_ms, "Analysis task completed");
                TaskOutcome::Success {
                    insight,
                    computed_facts: prepared.facts,
                    execution_time_ms,
                    completed_at: Utc::now(),
                }
            }
            Err(e) => {
                warn!(task = %task, error = %e, "Summarize failed, keeping computed facts");
                failure(e, Some(prepared.facts), started)
            }
        }
    }
}

/// Facts sent to the summarizer: the task's own facts plus predecessors' facts.
fn with_prior_facts(facts: &Value, prior: &PriorFacts) -> Value {
    if prior.is_empty() {
        return facts.clone();
    }

    let mut merged = facts.clone();
    if let Value::Object(map) = &mut merged {
        let prior_map: serde_json::Map<String, Value> = prior
            .iter()
            .map(|(kind, value)| (kind.as_str().to_string(), value.clone()))
            .collect();
        map.insert("prior_facts".to_string(), Value::Object(prior_map));
        debug!(prior_tasks = prior.len(), "Attached prior facts to summarize request");
    }
    merged
}

fn failure(error: OrchestrationError, computed_facts: Option<Value>, started: Instant) -> TaskOutcome {
    TaskOutcome::Failure {
        error_kind: error.kind(),
        message: error.to_string(),
        computed_facts,
        execution_time_ms: elapsed_ms(started),
    }
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Read a serialized Decimal back out of a fact tree.
    pub fn decimal_at(value: &Value) -> Decimal {
        value.as_str().unwrap().parse().unwrap()
    }

    pub fn context() -> TaskContext {
        TaskContext::new(
            FinancialCalculator::as_of(date(2024, 6, 15)),
            AnalysisSettings::default(),
            Duration::from_secs(5),
        )
    }

    /// Three months of history ending mid-June 2024, burning 10k a month.
    pub fn input(initial_capital: i64) -> TaskInput {
        let mut transactions = Vec::new();
        for month in 4..=6 {
            transactions.push(Transaction::income(
                date(2024, month, 1),
                Decimal::from(20_000),
                "Revenue",
            ));
            transactions.push(Transaction::expense(
                date(2024, month, 2),
                Decimal::from(22_000),
                "Salaries",
            ));
            transactions.push(Transaction::expense(
                date(2024, month, 5),
                Decimal::from(8_000),
                "Rent",
            ));
        }
        TaskInput::new(
            CompanyProfile::new(1, "Acme", Decimal::from(initial_capital)),
            transactions,
        )
    }
}
