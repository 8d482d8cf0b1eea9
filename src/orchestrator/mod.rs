//! Workflow orchestrator - runs the analysis tasks for one company
//!
//! VALIDATE → RUN (sequential | parallel) → AGGREGATE → VERIFY → AUDIT
//!
//! Every task runs on its own tokio task with its own copy of the input,
//! so a panic or a deadline abort is confined to that task's outcome.

use crate::audit::{compute_input_fingerprint, AuditLog};
use crate::config::{AnalysisSettings, Settings};
use crate::error::OrchestrationError;
use crate::metrics::FinancialCalculator;
use crate::models::{
    infinite_f64, CompanyProfile, OverallStatus, ReportSummary, TaskKind, TaskOutcome,
    Transaction, WorkflowPolicy, WorkflowReport, WorkflowState,
};
use crate::summarizer::Summarizer;
use crate::tasks::{elapsed_ms, AnalysisTask, PriorFacts, TaskContext, TaskInput};
use crate::verification::{create_default_verification_engine, VerificationEngine};
use crate::Result;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

type Outcomes = BTreeMap<TaskKind, TaskOutcome>;

pub struct WorkflowOrchestrator {
    summarizer: Arc<dyn Summarizer>,
    analysis: AnalysisSettings,
    summarize_timeout: Duration,
    workflow_timeout: Duration,
    /// Fixed reference date; `None` means "today" at the start of each run.
    as_of: Option<NaiveDate>,
    verification_engine: VerificationEngine,
    audit_log: Arc<AuditLog>,
}

impl WorkflowOrchestrator {
    pub fn new(summarizer: Arc<dyn Summarizer>, settings: &Settings) -> Self {
        Self {
            summarizer,
            analysis: settings.analysis.clone(),
            summarize_timeout: settings.summarizer.timeout,
            workflow_timeout: settings.workflow_timeout,
            as_of: None,
            verification_engine: create_default_verification_engine(),
            audit_log: Arc::new(AuditLog::with_capacity(settings.audit_max_runs)),
        }
    }

    pub fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = Some(as_of);
        self
    }

    pub fn with_audit_log(mut self, audit_log: Arc<AuditLog>) -> Self {
        self.audit_log = audit_log;
        self
    }

    pub fn audit_log(&self) -> &Arc<AuditLog> {
        &self.audit_log
    }

    pub fn analysis_settings(&self) -> &AnalysisSettings {
        &self.analysis
    }

    pub fn calculator(&self) -> FinancialCalculator {
        self.as_of
            .map(FinancialCalculator::as_of)
            .unwrap_or_default()
    }

    fn task_context(&self) -> TaskContext {
        TaskContext::new(self.calculator(), self.analysis.clone(), self.summarize_timeout)
    }

    /// Run all three analyses under `policy` and aggregate them into one report.
    ///
    /// Invalid input is rejected with `DataError` before any task starts.
    /// Task failures never surface as `Err`; they are recorded in the report.
    pub async fn run_workflow(
        &self,
        transactions: Vec<Transaction>,
        company: CompanyProfile,
        policy: WorkflowPolicy,
    ) -> Result<WorkflowReport> {
        validate_inputs(&company, &transactions)?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let started = std::time::Instant::now();
        let deadline = Instant::now() + self.workflow_timeout;
        let mut state = WorkflowState::Pending;

        info!(
            run_id = %run_id,
            company_id = company.id,
            policy = %policy,
            transactions = transactions.len(),
            "Workflow: starting run"
        );

        let fingerprint = compute_input_fingerprint(&company, &transactions, policy);
        let input = TaskInput::new(company, transactions);
        let context = self.task_context();

        advance(&mut state, WorkflowState::Running, run_id);

        let outcomes = match policy {
            WorkflowPolicy::Sequential => self.run_sequential(&context, &input, deadline).await,
            WorkflowPolicy::Parallel => self.run_parallel(&context, &input, deadline).await,
        };

        let succeeded = outcomes.values().filter(|o| o.is_success()).count();
        advance(&mut state, WorkflowState::settled(succeeded, outcomes.len()), run_id);

        let summary = summarize_outcomes(&outcomes, state);
        let mut report = WorkflowReport {
            run_id,
            company_id: input.company.id,
            company_name: input.company.name.clone(),
            policy,
            state,
            outcomes,
            summary,
            checks: Vec::new(),
            started_at,
            completed_at: Utc::now(),
            execution_time_ms: elapsed_ms(started),
        };

        report.checks = self.verification_engine.verify(&report);
        self.audit_log.record(report.clone(), fingerprint).await?;

        info!(
            run_id = %run_id,
            state = ?report.state,
            completed = report.summary.tasks_completed,
            failed = report.summary.tasks_failed,
            not_run = report.summary.tasks_not_run,
            elapsed_ms = report.execution_time_ms,
            "Workflow: run finished"
        );

        Ok(report)
    }

    /// Run one analysis on its own, with no predecessor facts.
    pub async fn run_single_task(
        &self,
        kind: TaskKind,
        transactions: Vec<Transaction>,
        company: CompanyProfile,
    ) -> Result<TaskOutcome> {
        validate_inputs(&company, &transactions)?;

        let deadline = Instant::now() + self.workflow_timeout;
        let input = TaskInput::new(company, transactions);
        let spawned = self.spawn_task(kind, &self.task_context(), input, PriorFacts::new());

        Ok(settle(kind, spawned, deadline, std::time::Instant::now()).await)
    }

    /// Strict dependency chain: each task starts only after its predecessor
    /// succeeded, and receives the facts of every task before it.
    async fn run_sequential(
        &self,
        context: &TaskContext,
        input: &TaskInput,
        deadline: Instant,
    ) -> Outcomes {
        let mut outcomes = Outcomes::new();
        let mut prior = PriorFacts::new();
        let mut halted: Option<String> = None;

        for kind in TaskKind::SEQUENCE {
            if halted.is_none() && Instant::now() >= deadline {
                halted = Some("workflow deadline reached".to_string());
            }
            if let Some(reason) = &halted {
                debug!(task = %kind, reason = %reason, "Skipping task");
                outcomes.insert(kind, TaskOutcome::NotRun { reason: reason.clone() });
                continue;
            }

            let started = std::time::Instant::now();
            let spawned = self.spawn_task(kind, context, input.clone(), prior.clone());
            let outcome = settle(kind, spawned, deadline, started).await;

            match &outcome {
                TaskOutcome::Success { computed_facts, .. } => {
                    prior.insert(kind, computed_facts.clone());
                }
                _ => {
                    warn!(task = %kind, "Sequential chain halted");
                    halted = Some(format!("{} did not succeed", kind));
                }
            }

            outcomes.insert(kind, outcome);
        }

        outcomes
    }

    /// Fan out every task at once, then join them all. No facts are shared.
    async fn run_parallel(
        &self,
        context: &TaskContext,
        input: &TaskInput,
        deadline: Instant,
    ) -> Outcomes {
        let started = std::time::Instant::now();
        let handles: Vec<(TaskKind, SpawnedTask)> = TaskKind::SEQUENCE
            .iter()
            .map(|kind| {
                (
                    *kind,
                    self.spawn_task(*kind, context, input.clone(), PriorFacts::new()),
                )
            })
            .collect();

        debug!(tasks = handles.len(), "Parallel tasks launched");

        let mut outcomes = Outcomes::new();
        for (kind, spawned) in handles {
            outcomes.insert(kind, settle(kind, spawned, deadline, started).await);
        }
        outcomes
    }

    fn spawn_task(
        &self,
        kind: TaskKind,
        context: &TaskContext,
        input: TaskInput,
        prior: PriorFacts,
    ) -> SpawnedTask {
        let task = AnalysisTask::new(kind, context.clone());
        let summarizer = Arc::clone(&self.summarizer);
        let (facts_tx, facts_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            task.run_publishing_facts(&input, &prior, summarizer.as_ref(), facts_tx)
                .await
        });

        SpawnedTask { handle, facts_rx }
    }
}

/// A running task plus the channel its facts arrive on once computed.
struct SpawnedTask {
    handle: JoinHandle<TaskOutcome>,
    facts_rx: oneshot::Receiver<Value>,
}

/// Wait for a spawned task until the run deadline. A task still running at
/// the deadline is aborted; a panicked task becomes an internal failure.
/// Either way, facts the task already computed are kept.
async fn settle(
    kind: TaskKind,
    spawned: SpawnedTask,
    deadline: Instant,
    started: std::time::Instant,
) -> TaskOutcome {
    let SpawnedTask {
        mut handle,
        mut facts_rx,
    } = spawned;

    let error = match tokio::time::timeout_at(deadline, &mut handle).await {
        Ok(Ok(outcome)) => return outcome,
        Ok(Err(join_error)) => {
            error!(task = %kind, error = %join_error, "Task did not finish cleanly");
            join_failure(join_error)
        }
        Err(_) => {
            handle.abort();
            warn!(task = %kind, "Workflow deadline reached, task aborted");
            OrchestrationError::Cancelled("workflow deadline reached".to_string())
        }
    };

    let computed_facts = facts_rx.try_recv().ok();
    if computed_facts.is_some() {
        debug!(task = %kind, "Kept facts computed before the task stopped");
    }

    TaskOutcome::Failure {
        error_kind: error.kind(),
        message: error.to_string(),
        computed_facts,
        execution_time_ms: elapsed_ms(started),
    }
}

fn join_failure(join_error: JoinError) -> OrchestrationError {
    if !join_error.is_panic() {
        return OrchestrationError::Cancelled(join_error.to_string());
    }

    let payload = join_error.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    OrchestrationError::TaskPanicked(message)
}

fn advance(state: &mut WorkflowState, next: WorkflowState, run_id: Uuid) {
    if !state.can_transition_to(next) {
        warn!(run_id = %run_id, from = ?state, to = ?next, "Unexpected workflow transition");
    }
    debug!(run_id = %run_id, from = ?state, to = ?next, "Workflow state change");
    *state = next;
}

/// Reject malformed input before any task starts.
pub fn validate_inputs(company: &CompanyProfile, transactions: &[Transaction]) -> Result<()> {
    company.validate()?;
    for (index, tx) in transactions.iter().enumerate() {
        tx.validate().map_err(|e| match e {
            OrchestrationError::DataError(msg) => {
                OrchestrationError::DataError(format!("transaction {}: {}", index, msg))
            }
            other => other,
        })?;
    }
    Ok(())
}

/// Counts plus headline metrics looked up by key in each task's facts.
/// Missing keys leave the field empty.
fn summarize_outcomes(outcomes: &Outcomes, state: WorkflowState) -> ReportSummary {
    let lookup = |pointer: &str| {
        TaskKind::SEQUENCE.iter().find_map(|kind| {
            outcomes
                .get(kind)
                .and_then(TaskOutcome::computed_facts)
                .and_then(|facts| facts.pointer(pointer))
                .filter(|v| !v.is_null())
        })
    };

    ReportSummary {
        tasks_completed: outcomes.values().filter(|o| o.is_success()).count(),
        tasks_failed: outcomes.values().filter(|o| o.is_failure()).count(),
        tasks_not_run: outcomes
            .values()
            .filter(|o| matches!(o, TaskOutcome::NotRun { .. }))
            .count(),
        overall_status: OverallStatus::from(state),
        runway_months: lookup("/runway/runway_months").and_then(infinite_f64::from_value),
        runway_status: lookup("/runway/status")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        current_balance: lookup("/balance/current_balance")
            .and_then(|v| serde_json::from_value::<Decimal>(v.clone()).ok()),
        investment_readiness: lookup("/readiness/readiness")
            .and_then(|v| v.as_str())
            .map(str::to_string),
    }
}
