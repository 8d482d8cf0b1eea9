//! Verification engine for finished workflow reports
//!
//! Rules-based checks run after aggregation.
//! Deterministic enforcement; results are attached to the report.

use crate::models::{ComplianceCheck, TaskErrorKind, TaskKind, TaskOutcome, WorkflowReport};
use tracing::{info, warn};

/// Trait for verification rules
pub trait VerificationRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn verify(&self, report: &WorkflowReport) -> VerificationCheckResult;
}

pub struct VerificationCheckResult {
    pub passed: bool,
    pub details: String,
}

impl VerificationCheckResult {
    fn pass(details: impl Into<String>) -> Self {
        Self {
            passed: true,
            details: details.into(),
        }
    }

    fn fail(details: impl Into<String>) -> Self {
        Self {
            passed: false,
            details: details.into(),
        }
    }
}

/// Verification engine that enforces rules
pub struct VerificationEngine {
    rules: Vec<Box<dyn VerificationRule>>,
}

impl VerificationEngine {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn add_rule(&mut self, rule: Box<dyn VerificationRule>) {
        self.rules.push(rule);
    }

    pub fn verify(&self, report: &WorkflowReport) -> Vec<ComplianceCheck> {
        let checks: Vec<ComplianceCheck> = self
            .rules
            .iter()
            .map(|rule| {
                let result = rule.verify(report);
                if !result.passed {
                    warn!(
                        run_id = %report.run_id,
                        rule = rule.name(),
                        details = %result.details,
                        "Verification rule failed"
                    );
                }
                ComplianceCheck {
                    rule_name: rule.name().to_string(),
                    passed: result.passed,
                    details: result.details,
                }
            })
            .collect();

        info!(
            run_id = %report.run_id,
            rule_count = self.rules.len(),
            verified = checks.iter().all(|c| c.passed),
            "Verification completed"
        );

        checks
    }
}

impl Default for VerificationEngine {
    fn default() -> Self {
        Self::new()
    }
}

//
// ========== Rules ==========
//

/// Rule: a not-ready or critical-runway investment result holds no allocation
pub struct InvestmentGateRule;

impl VerificationRule for InvestmentGateRule {
    fn name(&self) -> &'static str {
        "investment_gate"
    }

    fn verify(&self, report: &WorkflowReport) -> VerificationCheckResult {
        let Some(facts) = report
            .outcome(TaskKind::InvestmentAdvice)
            .and_then(TaskOutcome::computed_facts)
        else {
            return VerificationCheckResult::pass("No investment facts to check");
        };

        let readiness = facts
            .pointer("/readiness/readiness")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");

        let runway_status = facts
            .pointer("/readiness/runway_status")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");

        if readiness != "not_ready" && runway_status != "critical" {
            return VerificationCheckResult::pass(format!("Readiness is {}", readiness));
        }

        let mode = facts.pointer("/plan/mode").and_then(|v| v.as_str());
        let has_allocation = facts.pointer("/plan/capacity").is_some();

        if mode == Some("stabilization") && !has_allocation {
            VerificationCheckResult::pass("Not ready; stabilization guidance only")
        } else {
            VerificationCheckResult::fail(format!(
                "Company with readiness {} and {} runway received an allocation",
                readiness, runway_status
            ))
        }
    }
}

/// Rule: failures after fact computation still carry their facts.
/// Summarize errors, timeouts and deadline cancellations all happen after
/// the facts exist.
pub struct FactsRetainedRule;

impl VerificationRule for FactsRetainedRule {
    fn name(&self) -> &'static str {
        "facts_retained"
    }

    fn verify(&self, report: &WorkflowReport) -> VerificationCheckResult {
        let missing: Vec<&str> = report
            .outcomes
            .iter()
            .filter_map(|(kind, outcome)| match outcome {
                TaskOutcome::Failure {
                    error_kind:
                        TaskErrorKind::Collaborator | TaskErrorKind::Timeout | TaskErrorKind::Cancelled,
                    computed_facts: None,
                    ..
                } => Some(kind.as_str()),
                _ => None,
            })
            .collect();

        if missing.is_empty() {
            VerificationCheckResult::pass("Every late failure kept its facts")
        } else {
            VerificationCheckResult::fail(format!("Facts dropped for: {}", missing.join(", ")))
        }
    }
}

/// Rule: summary counts account for every outcome in the report
pub struct OutcomeCoverageRule;

impl VerificationRule for OutcomeCoverageRule {
    fn name(&self) -> &'static str {
        "outcome_coverage"
    }

    fn verify(&self, report: &WorkflowReport) -> VerificationCheckResult {
        let summary = &report.summary;
        let counted = summary.tasks_completed + summary.tasks_failed + summary.tasks_not_run;
        let missing: Vec<&str> = TaskKind::SEQUENCE
            .iter()
            .filter(|kind| !report.outcomes.contains_key(kind))
            .map(|kind| kind.as_str())
            .collect();

        if counted != report.outcomes.len() {
            VerificationCheckResult::fail(format!(
                "Summary counts {} tasks but report holds {}",
                counted,
                report.outcomes.len()
            ))
        } else if !missing.is_empty() {
            VerificationCheckResult::fail(format!("No outcome for: {}", missing.join(", ")))
        } else {
            VerificationCheckResult::pass(format!("{} outcomes accounted for", counted))
        }
    }
}

/// Engine with the standard rule set
pub fn create_default_verification_engine() -> VerificationEngine {
    let mut engine = VerificationEngine::new();
    engine.add_rule(Box::new(InvestmentGateRule));
    engine.add_rule(Box::new(FactsRetainedRule));
    engine.add_rule(Box::new(OutcomeCoverageRule));
    engine
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OverallStatus, ReportSummary, WorkflowPolicy, WorkflowState};
    use chrono::Utc;
    use serde_json::json;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn success(facts: serde_json::Value) -> TaskOutcome {
        TaskOutcome::Success {
            insight: "ok".to_string(),
            computed_facts: facts,
            execution_time_ms: 1,
            completed_at: Utc::now(),
        }
    }

    fn report(outcomes: BTreeMap<TaskKind, TaskOutcome>) -> WorkflowReport {
        let completed = outcomes.values().filter(|o| o.is_success()).count();
        let failed = outcomes.values().filter(|o| o.is_failure()).count();
        let now = Utc::now();
        WorkflowReport {
            run_id: Uuid::new_v4(),
            company_id: 1,
            company_name: "Acme".to_string(),
            policy: WorkflowPolicy::Parallel,
            state: WorkflowState::settled(completed, outcomes.len()),
            summary: ReportSummary {
                tasks_completed: completed,
                tasks_failed: failed,
                tasks_not_run: outcomes.len() - completed - failed,
                overall_status: OverallStatus::Partial,
                runway_months: None,
                runway_status: None,
                current_balance: None,
                investment_readiness: None,
            },
            outcomes,
            checks: vec![],
            started_at: now,
            completed_at: now,
            execution_time_ms: 0,
        }
    }

    fn check<'a>(checks: &'a [ComplianceCheck], name: &str) -> &'a ComplianceCheck {
        checks.iter().find(|c| c.rule_name == name).unwrap()
    }

    #[test]
    fn test_investment_gate_flags_allocation_for_not_ready() {
        let mut outcomes = BTreeMap::new();
        outcomes.insert(
            TaskKind::InvestmentAdvice,
            success(json!({
                "readiness": {"readiness": "not_ready"},
                "plan": {"mode": "allocation", "capacity": {}}
            })),
        );

        let checks = create_default_verification_engine().verify(&report(outcomes));
        assert!(!check(&checks, "investment_gate").passed);
    }

    #[test]
    fn test_investment_gate_accepts_stabilization() {
        let mut outcomes = BTreeMap::new();
        outcomes.insert(
            TaskKind::InvestmentAdvice,
            success(json!({
                "readiness": {"readiness": "not_ready"},
                "plan": {"mode": "stabilization", "guidance": []}
            })),
        );

        let checks = create_default_verification_engine().verify(&report(outcomes));
        assert!(check(&checks, "investment_gate").passed);
    }

    #[test]
    fn test_facts_retained_flags_late_failures_without_facts() {
        let mut outcomes = BTreeMap::new();
        outcomes.insert(
            TaskKind::RunwayPrediction,
            TaskOutcome::Failure {
                error_kind: TaskErrorKind::Collaborator,
                message: "down".to_string(),
                computed_facts: None,
                execution_time_ms: 3,
            },
        );
        outcomes.insert(
            TaskKind::SpendingAnalysis,
            TaskOutcome::Failure {
                error_kind: TaskErrorKind::Cancelled,
                message: "deadline".to_string(),
                computed_facts: None,
                execution_time_ms: 3,
            },
        );

        outcomes.insert(
            TaskKind::InvestmentAdvice,
            TaskOutcome::Failure {
                error_kind: TaskErrorKind::Internal,
                message: "panicked".to_string(),
                computed_facts: None,
                execution_time_ms: 3,
            },
        );

        let checks = create_default_verification_engine().verify(&report(outcomes));
        let facts = check(&checks, "facts_retained");
        assert!(!facts.passed);
        assert!(facts.details.contains("runway_prediction"));
        assert!(facts.details.contains("spending_analysis"));
        assert!(!facts.details.contains("investment_advice"));
    }

    #[test]
    fn test_investment_gate_flags_allocation_on_critical_runway() {
        let mut outcomes = BTreeMap::new();
        outcomes.insert(
            TaskKind::InvestmentAdvice,
            success(json!({
                "readiness": {"readiness": "cautious", "runway_status": "critical"},
                "plan": {"mode": "allocation", "capacity": {}}
            })),
        );

        let checks = create_default_verification_engine().verify(&report(outcomes));
        let gate = check(&checks, "investment_gate");
        assert!(!gate.passed);
        assert!(gate.details.contains("critical"));
    }

    #[test]
    fn test_outcome_coverage_requires_every_task() {
        let mut outcomes = BTreeMap::new();
        outcomes.insert(TaskKind::SpendingAnalysis, success(json!({})));

        let checks = create_default_verification_engine().verify(&report(outcomes));
        assert!(!check(&checks, "outcome_coverage").passed);
    }
}
