//! Investment advice
//!
//! A readiness gate decides between two plans. A company that is not ready
//! (no cash, or under three months of runway) only ever receives
//! stabilization guidance: no capacity is computed, no allocation is
//! requested from the summarizer and none appears in the facts.

use super::options::{curated_options, InvestmentOption, RiskTolerance};
use super::{PreparedRequest, TaskContext, TaskInput};
use crate::metrics::{FinancialCalculator, RunwayStatus};
use crate::models::{infinite_f64, CompanyStage};
use crate::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tracing::info;

pub(crate) const SYSTEM_CONTEXT: &str = "You are the Investment Advisor for Cash Horizon, a startup financial health platform.
Capital preservation comes first; liquidity and safety outrank returns.
Use only the figures provided and never suggest allocations that are not listed.";

const STABILIZATION_GUIDANCE: [&str; 5] = [
    "Reach positive cash flow before committing any capital to investments",
    "Cut discretionary spending and renegotiate the largest recurring costs",
    "Accelerate revenue through the channels with the shortest sales cycle",
    "Open fundraising conversations early while there is still runway to negotiate",
    "Reassess investment readiness once runway exceeds six months",
];

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    Cautious,
    NotReady,
}

impl Readiness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Readiness::Ready => "ready",
            Readiness::Cautious => "cautious",
            Readiness::NotReady => "not_ready",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadinessAssessment {
    pub readiness: Readiness,
    pub reason: String,
    #[serde(with = "infinite_f64")]
    pub runway_months: f64,
    pub current_balance: Decimal,
    pub runway_status: RunwayStatus,
}

/// Percentages across the four buckets; always sums to 100.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Allocation {
    pub emergency_fund: u8,
    pub low_risk: u8,
    pub moderate_risk: u8,
    pub growth: u8,
}

impl Allocation {
    pub const RESERVE_ONLY: Allocation = Allocation::new(100, 0, 0, 0);
    pub const CONSERVATIVE: Allocation = Allocation::new(70, 30, 0, 0);
    pub const BALANCED: Allocation = Allocation::new(50, 40, 10, 0);
    pub const DIVERSIFIED: Allocation = Allocation::new(40, 30, 20, 10);

    const fn new(emergency_fund: u8, low_risk: u8, moderate_risk: u8, growth: u8) -> Self {
        Self {
            emergency_fund,
            low_risk,
            moderate_risk,
            growth,
        }
    }

    fn amounts(&self, base: Decimal) -> AllocationAmounts {
        let share = |pct: u8| (base * Decimal::from(pct) / Decimal::ONE_HUNDRED).round_dp(2);
        AllocationAmounts {
            emergency_fund: share(self.emergency_fund),
            low_risk: share(self.low_risk),
            moderate_risk: share(self.moderate_risk),
            growth: share(self.growth),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AllocationAmounts {
    pub emergency_fund: Decimal,
    pub low_risk: Decimal,
    pub moderate_risk: Decimal,
    pub growth: Decimal,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InvestmentCapacity {
    pub current_balance: Decimal,
    pub emergency_fund_required: Decimal,
    pub emergency_fund_months: u32,
    pub investable_amount: Decimal,
    pub recommended_allocation: Allocation,
    pub allocation_amounts: AllocationAmounts,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum InvestmentPlan {
    Stabilization {
        guidance: Vec<String>,
    },
    Allocation {
        capacity: InvestmentCapacity,
        risk_tolerance: RiskTolerance,
        options: Vec<InvestmentOption>,
    },
}

impl InvestmentPlan {
    pub fn is_stabilization(&self) -> bool {
        matches!(self, InvestmentPlan::Stabilization { .. })
    }

    pub fn capacity(&self) -> Option<&InvestmentCapacity> {
        match self {
            InvestmentPlan::Allocation { capacity, .. } => Some(capacity),
            InvestmentPlan::Stabilization { .. } => None,
        }
    }
}

pub fn assess_readiness(
    calculator: &FinancialCalculator,
    current_balance: Decimal,
    monthly_burn_rate: Decimal,
) -> ReadinessAssessment {
    let runway = calculator.calculate_runway(current_balance, monthly_burn_rate);
    let runway_months = runway.runway_months;

    // Keyed on the runway status so readiness and status never disagree.
    let (readiness, reason) = if current_balance <= Decimal::ZERO {
        (Readiness::NotReady, "Non-positive balance - focus on profitability")
    } else {
        match runway.status {
            RunwayStatus::Critical => (Readiness::NotReady, "Critical runway - preserve cash"),
            RunwayStatus::Warning => {
                (Readiness::Cautious, "Limited runway - minimal investment only")
            }
            RunwayStatus::Healthy => {
                (Readiness::Ready, "Healthy runway - can invest conservatively")
            }
            RunwayStatus::Excellent | RunwayStatus::PositiveCashFlow => {
                (Readiness::Ready, "Strong runway - can invest moderately")
            }
        }
    };

    ReadinessAssessment {
        readiness,
        reason: reason.to_string(),
        runway_months,
        current_balance,
        runway_status: runway.status,
    }
}

/// Split the balance between an emergency reserve and investment buckets.
pub fn calculate_capacity(
    current_balance: Decimal,
    monthly_expenses: Decimal,
    emergency_fund_months: u32,
) -> InvestmentCapacity {
    let emergency_fund_required = monthly_expenses * Decimal::from(emergency_fund_months);
    let investable_amount = (current_balance - emergency_fund_required).max(Decimal::ZERO);

    let allocation = if investable_amount.is_zero() {
        Allocation::RESERVE_ONLY
    } else if current_balance < emergency_fund_required * Decimal::new(15, 1) {
        Allocation::CONSERVATIVE
    } else if current_balance < emergency_fund_required * Decimal::TWO {
        Allocation::BALANCED
    } else {
        Allocation::DIVERSIFIED
    };

    InvestmentCapacity {
        current_balance: current_balance.round_dp(2),
        emergency_fund_required: emergency_fund_required.round_dp(2),
        emergency_fund_months,
        investable_amount: investable_amount.round_dp(2),
        recommended_allocation: allocation,
        allocation_amounts: allocation.amounts(current_balance),
    }
}

pub fn determine_risk_tolerance(
    runway_months: f64,
    monthly_burn_rate: Decimal,
    current_balance: Decimal,
) -> RiskTolerance {
    if runway_months < 6.0 || monthly_burn_rate > current_balance / Decimal::from(12) {
        RiskTolerance::Conservative
    } else {
        RiskTolerance::Moderate
    }
}

pub fn plan_investment(
    assessment: &ReadinessAssessment,
    stage: CompanyStage,
    monthly_burn_rate: Decimal,
    monthly_expenses: Decimal,
    emergency_fund_months: u32,
) -> InvestmentPlan {
    if assessment.readiness == Readiness::NotReady {
        return InvestmentPlan::Stabilization {
            guidance: STABILIZATION_GUIDANCE.iter().map(|s| s.to_string()).collect(),
        };
    }

    let risk_tolerance = determine_risk_tolerance(
        assessment.runway_months,
        monthly_burn_rate,
        assessment.current_balance,
    );

    InvestmentPlan::Allocation {
        capacity: calculate_capacity(
            assessment.current_balance,
            monthly_expenses,
            emergency_fund_months,
        ),
        risk_tolerance,
        options: curated_options(stage, risk_tolerance),
    }
}

pub(crate) fn prepare(ctx: &TaskContext, input: &TaskInput) -> Result<PreparedRequest> {
    let calculator = &ctx.calculator;
    let stage = input.company.stage();

    let balance = calculator.calculate_balance(input.company.initial_capital, &input.transactions);
    let burn = calculator.calculate_burn_rate(&input.transactions, ctx.analysis.burn_period_months);
    let assessment = assess_readiness(calculator, balance.current_balance, burn.burn_rate);
    let plan = plan_investment(
        &assessment,
        stage,
        burn.burn_rate,
        burn.avg_monthly_expenses,
        ctx.analysis.emergency_fund_months,
    );

    info!(
        company_id = input.company.id,
        readiness = assessment.readiness.as_str(),
        stabilization = plan.is_stabilization(),
        "Assessed investment readiness"
    );

    let instructions = build_instructions(&input.company.name, stage, &assessment, &plan);

    let facts = json!({
        "company_stage": stage,
        "balance": serde_json::to_value(&balance)?,
        "burn_rate": serde_json::to_value(&burn)?,
        "readiness": serde_json::to_value(&assessment)?,
        "plan": serde_json::to_value(&plan)?,
    });

    Ok(PreparedRequest {
        facts,
        system_context: SYSTEM_CONTEXT,
        instructions,
    })
}

fn build_instructions(
    company: &str,
    stage: CompanyStage,
    assessment: &ReadinessAssessment,
    plan: &InvestmentPlan,
) -> String {
    let runway = if assessment.runway_months.is_infinite() {
        "unlimited".to_string()
    } else {
        format!("{:.1} months", assessment.runway_months)
    };

    match plan {
        InvestmentPlan::Stabilization { .. } => format!(
            "Provide guidance for {} which is NOT READY to invest.\n\
             Current balance: {}. Runway: {} (status: {}). Reason: {}.\n\
             DO NOT recommend investments. Instead cover: why investing is not \
             appropriate now, the path to positive cash flow, cost reduction, \
             revenue acceleration, fundraising considerations and the path to readiness.",
            company,
            assessment.current_balance,
            runway,
            assessment.runway_status.as_str(),
            assessment.reason,
        ),
        InvestmentPlan::Allocation {
            capacity,
            risk_tolerance,
            options,
        } => {
            let alloc = &capacity.recommended_allocation;
            let amounts = &capacity.allocation_amounts;
            let option_names = options.iter().map(|o| o.name).collect::<Vec<_>>().join(", ");
            format!(
                "Provide investment recommendations for {} ({} stage).\n\
                 Current balance: {}. Runway: {}. Readiness: {}. Risk tolerance: {:?}.\n\
                 Emergency fund needed: {} ({} months). Investable amount: {}.\n\
                 RECOMMENDED ALLOCATION: emergency fund {}% ({}), low risk {}% ({}), \
                 moderate risk {}% ({}), growth {}% ({}).\n\
                 Available options: {}.\n\
                 Cover: readiness assessment, risk profile, allocation strategy, \
                 specific products from the options above, implementation steps and review schedule.",
                company,
                stage,
                assessment.current_balance,
                runway,
                assessment.readiness.as_str(),
                risk_tolerance,
                capacity.emergency_fund_required,
                capacity.emergency_fund_months,
                capacity.investable_amount,
                alloc.emergency_fund,
                amounts.emergency_fund,
                alloc.low_risk,
                amounts.low_risk,
                alloc.moderate_risk,
                amounts.moderate_risk,
                alloc.growth,
                amounts.growth,
                if option_names.is_empty() { "none" } else { option_names.as_str() },
            )
        }
    }
}
