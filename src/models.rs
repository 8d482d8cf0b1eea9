//! Core data models for the cash horizon engine

use crate::error::OrchestrationError;
use crate::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//
// ================= Transactions =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

/// A single ledger entry. `amount` is never negative; the sign comes from `kind`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub date: NaiveDate,
    pub amount: Decimal,
    pub category: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    #[serde(default)]
    pub description: Option<String>,
}

impl Transaction {
    pub fn new(
        date: NaiveDate,
        amount: Decimal,
        category: impl Into<String>,
        kind: TransactionKind,
    ) -> Self {
        Self {
            date,
            amount,
            category: category.into(),
            kind,
            description: None,
        }
    }

    pub fn income(date: NaiveDate, amount: Decimal, category: impl Into<String>) -> Self {
        Self::new(date, amount, category, TransactionKind::Income)
    }

    pub fn expense(date: NaiveDate, amount: Decimal, category: impl Into<String>) -> Self {
        Self::new(date, amount, category, TransactionKind::Expense)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            TransactionKind::Income => self.amount,
            TransactionKind::Expense => -self.amount,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            return Err(OrchestrationError::DataError(format!(
                "transaction on {} has negative amount {}",
                self.date, self.amount
            )));
        }
        if self.category.trim().is_empty() {
            return Err(OrchestrationError::DataError(format!(
                "transaction on {} has an empty category",
                self.date
            )));
        }
        Ok(())
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for TransactionKind {
    type Err = OrchestrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(TransactionKind::Income),
            "expense" | "expenses" => Ok(TransactionKind::Expense),
            other => Err(OrchestrationError::DataError(format!(
                "unknown transaction type '{}'",
                other
            ))),
        }
    }
}

//
// ================= Company =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompanyStage {
    Seed,
    Early,
    Growth,
    Mature,
}

impl CompanyStage {
    pub fn from_initial_capital(initial_capital: Decimal) -> Self {
        if initial_capital < Decimal::from(100_000) {
            CompanyStage::Seed
        } else if initial_capital < Decimal::from(1_000_000) {
            CompanyStage::Early
        } else if initial_capital < Decimal::from(10_000_000) {
            CompanyStage::Growth
        } else {
            CompanyStage::Mature
        }
    }
}

impl fmt::Display for CompanyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompanyStage::Seed => "seed",
            CompanyStage::Early => "early",
            CompanyStage::Growth => "growth",
            CompanyStage::Mature => "mature",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompanyProfile {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub initial_capital: Decimal,
}

impl CompanyProfile {
    pub fn new(id: i64, name: impl Into<String>, initial_capital: Decimal) -> Self {
        Self {
            id,
            name: name.into(),
            initial_capital,
        }
    }

    pub fn stage(&self) -> CompanyStage {
        CompanyStage::from_initial_capital(self.initial_capital)
    }

    pub fn validate(&self) -> Result<()> {
        if self.initial_capital.is_sign_negative() && !self.initial_capital.is_zero() {
            return Err(OrchestrationError::DataError(format!(
                "company '{}' has negative initial capital {}",
                self.name, self.initial_capital
            )));
        }
        Ok(())
    }
}

//
// ================= Tasks =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    SpendingAnalysis,
    RunwayPrediction,
    InvestmentAdvice,
}

impl TaskKind {
    /// Dependency order used by the sequential policy.
    pub const SEQUENCE: [TaskKind; 3] = [
        TaskKind::SpendingAnalysis,
        TaskKind::RunwayPrediction,
        TaskKind::InvestmentAdvice,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::SpendingAnalysis => "spending_analysis",
            TaskKind::RunwayPrediction => "runway_prediction",
            TaskKind::InvestmentAdvice => "investment_advice",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = OrchestrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "spending" | "spending_analysis" | "analyst" | "financial_analyst" => {
                Ok(TaskKind::SpendingAnalysis)
            }
            "runway" | "runway_prediction" | "runway_predictor" => Ok(TaskKind::RunwayPrediction),
            "investment" | "investment_advice" | "investment_advisor" => {
                Ok(TaskKind::InvestmentAdvice)
            }
            other => Err(OrchestrationError::ConfigurationError(format!(
                "unknown task kind '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskErrorKind {
    Data,
    Collaborator,
    Configuration,
    Timeout,
    Cancelled,
    Internal,
}

/// Result of one analysis task. Facts computed before a failure point are kept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Success {
        insight: String,
        computed_facts: serde_json::Value,
        execution_time_ms: u64,
        completed_at: DateTime<Utc>,
    },
    Failure {
        error_kind: TaskErrorKind,
        message: String,
        computed_facts: Option<serde_json::Value>,
        execution_time_ms: u64,
    },
    NotRun {
        reason: String,
    },
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TaskOutcome::Failure { .. })
    }

    pub fn computed_facts(&self) -> Option<&serde_json::Value> {
        match self {
            TaskOutcome::Success { computed_facts, .. } => Some(computed_facts),
            TaskOutcome::Failure { computed_facts, .. } => computed_facts.as_ref(),
            TaskOutcome::NotRun { .. } => None,
        }
    }

    pub fn insight(&self) -> Option<&str> {
        match self {
            TaskOutcome::Success { insight, .. } => Some(insight),
            _ => None,
        }
    }
}

//
// ================= Workflow =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowPolicy {
    #[default]
    Sequential,
    Parallel,
}

impl fmt::Display for WorkflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowPolicy::Sequential => "sequential",
            WorkflowPolicy::Parallel => "parallel",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for WorkflowPolicy {
    type Err = OrchestrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(WorkflowPolicy::Sequential),
            "parallel" => Ok(WorkflowPolicy::Parallel),
            other => Err(OrchestrationError::ConfigurationError(format!(
                "unsupported workflow policy '{}'",
                other
            ))),
        }
    }
}

/// Run lifecycle: Pending → Running → {Completed, PartialFailure, Failed}.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Pending,
    Running,
    Completed,
    PartialFailure,
    Failed,
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowState::Completed | WorkflowState::PartialFailure | WorkflowState::Failed
        )
    }

    pub fn can_transition_to(&self, next: WorkflowState) -> bool {
        match (self, next) {
            (WorkflowState::Pending, WorkflowState::Running) => true,
            (WorkflowState::Running, next) => next.is_terminal(),
            _ => false,
        }
    }

    /// Terminal state for a settled run.
    pub fn settled(succeeded: usize, total: usize) -> Self {
        if total > 0 && succeeded == total {
            WorkflowState::Completed
        } else if succeeded > 0 {
            WorkflowState::PartialFailure
        } else {
            WorkflowState::Failed
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Success,
    Partial,
    Failed,
}

impl From<WorkflowState> for OverallStatus {
    fn from(state: WorkflowState) -> Self {
        match state {
            WorkflowState::Completed => OverallStatus::Success,
            WorkflowState::PartialFailure => OverallStatus::Partial,
            _ => OverallStatus::Failed,
        }
    }
}

/// Cross-task summary. Headline fields are omitted when no task produced them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportSummary {
    pub tasks_completed: usize,
    pub tasks_failed: usize,
    pub tasks_not_run: usize,
    pub overall_status: OverallStatus,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "infinite_f64::option"
    )]
    pub runway_months: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runway_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_balance: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investment_readiness: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplianceCheck {
    pub rule_name: String,
    pub passed: bool,
    pub details: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowReport {
    pub run_id: Uuid,
    pub company_id: i64,
    pub company_name: String,
    pub policy: WorkflowPolicy,
    pub state: WorkflowState,
    pub outcomes: BTreeMap<TaskKind, TaskOutcome>,
    pub summary: ReportSummary,
    #[serde(default)]
    pub checks: Vec<ComplianceCheck>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub execution_time_ms: u64,
}

impl WorkflowReport {
    pub fn outcome(&self, kind: TaskKind) -> Option<&TaskOutcome> {
        self.outcomes.get(&kind)
    }
}

/// Serde helpers for month counts that may be infinite (positive cash flow).
///
/// Finite values are plain JSON numbers; infinity is the string `"infinite"`
/// because JSON has no representation for it.
pub mod infinite_f64 {
    use serde::{Deserialize, Deserializer, Serializer};

    const INFINITE: &str = "infinite";

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    fn from_repr<E: serde::de::Error>(repr: Repr) -> Result<f64, E> {
        match repr {
            Repr::Number(n) => Ok(n),
            Repr::Text(t) if t == INFINITE || t == "inf" || t == "infinity" => Ok(f64::INFINITY),
            Repr::Text(t) => Err(E::custom(format!("invalid month count '{}'", t))),
        }
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_infinite() && value.is_sign_positive() {
            serializer.serialize_str(INFINITE)
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        from_repr(Repr::deserialize(deserializer)?)
    }

    /// Parse a month count out of an already-built JSON value.
    pub fn from_value(value: &serde_json::Value) -> Option<f64> {
        match value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => from_repr::<serde_json::Error>(Repr::Text(s.clone())).ok(),
            _ => None,
        }
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => super::serialize(v, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
            match Option::<super::Repr>::deserialize(deserializer)? {
                Some(repr) => super::from_repr(repr).map(Some),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_signed_amount() {
        let income = Transaction::income(date(2024, 1, 1), Decimal::from(100), "Revenue");
        let expense = Transaction::expense(date(2024, 1, 1), Decimal::from(40), "Rent");
        assert_eq!(income.signed_amount(), Decimal::from(100));
        assert_eq!(expense.signed_amount(), Decimal::from(-40));
    }

    #[test]
    fn test_transaction_validation() {
        let negative = Transaction::expense(date(2024, 1, 1), Decimal::from(-5), "Rent");
        assert!(matches!(
            negative.validate(),
            Err(OrchestrationError::DataError(_))
        ));

        let blank = Transaction::expense(date(2024, 1, 1), Decimal::from(5), "  ");
        assert!(blank.validate().is_err());

        let ok = Transaction::expense(date(2024, 1, 1), Decimal::ZERO, "Fees");
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_transaction_json_shape() {
        let json = r#"{"date":"2024-03-05","amount":"1500.00","category":"Salaries","type":"expense"}"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.kind, TransactionKind::Expense);
        assert_eq!(tx.amount, Decimal::new(150000, 2));
        assert!(tx.description.is_none());
    }

    #[test]
    fn test_stage_thresholds() {
        assert_eq!(CompanyStage::from_initial_capital(Decimal::from(99_999)), CompanyStage::Seed);
        assert_eq!(CompanyStage::from_initial_capital(Decimal::from(100_000)), CompanyStage::Early);
        assert_eq!(CompanyStage::from_initial_capital(Decimal::from(1_000_000)), CompanyStage::Growth);
        assert_eq!(CompanyStage::from_initial_capital(Decimal::from(10_000_000)), CompanyStage::Mature);
    }

    #[test]
    fn test_parse_policy_and_task() {
        assert_eq!("Parallel".parse::<WorkflowPolicy>().unwrap(), WorkflowPolicy::Parallel);
        assert!(matches!(
            "custom".parse::<WorkflowPolicy>(),
            Err(OrchestrationError::ConfigurationError(_))
        ));
        assert_eq!("runway".parse::<TaskKind>().unwrap(), TaskKind::RunwayPrediction);
        assert!(matches!(
            "tarot".parse::<TaskKind>(),
            Err(OrchestrationError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_state_transitions() {
        assert!(WorkflowState::Pending.can_transition_to(WorkflowState::Running));
        assert!(WorkflowState::Running.can_transition_to(WorkflowState::PartialFailure));
        assert!(!WorkflowState::Pending.can_transition_to(WorkflowState::Completed));
        assert!(!WorkflowState::Completed.can_transition_to(WorkflowState::Running));

        assert_eq!(WorkflowState::settled(3, 3), WorkflowState::Completed);
        assert_eq!(WorkflowState::settled(1, 3), WorkflowState::PartialFailure);
        assert_eq!(WorkflowState::settled(0, 3), WorkflowState::Failed);
    }

    #[test]
    fn test_infinite_months_roundtrip() {
        let summary = ReportSummary {
            tasks_completed: 1,
            tasks_failed: 0,
            tasks_not_run: 0,
            overall_status: OverallStatus::Success,
            runway_months: Some(f64::INFINITY),
            runway_status: None,
            current_balance: None,
            investment_readiness: None,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["runway_months"], "infinite");
        assert!(json.get("current_balance").is_none());

        let back: ReportSummary = serde_json::from_value(json).unwrap();
        assert_eq!(back.runway_months, Some(f64::INFINITY));
    }
}
