//! Deterministic financial metrics
//!
//! Burn rate, runway, category spending, balance, growth and a composite
//! health score. LLM is NOT allowed here.
//!
//! Every calculation is total: empty or degenerate input yields a zeroed
//! result rather than an error, because the results feed reports that must
//! render even with no data.

use crate::models::{infinite_f64, Transaction, TransactionKind};
use chrono::{Days, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Days per month used for every period window and runway projection.
pub const DAYS_PER_MONTH: u64 = 30;

//
// ================= Results =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BurnRateResult {
    /// Average monthly expenses minus average monthly income. Positive = losing cash.
    pub burn_rate: Decimal,
    pub net_burn: Decimal,
    pub avg_monthly_income: Decimal,
    pub avg_monthly_expenses: Decimal,
    pub months_analyzed: usize,
    pub transaction_count: usize,
    pub period_months: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunwayStatus {
    Critical,
    Warning,
    Healthy,
    Excellent,
    PositiveCashFlow,
}

impl RunwayStatus {
    /// Fixed thresholds, in months: <3 critical, <6 warning, <12 healthy.
    pub fn from_months(runway_months: f64) -> Self {
        if runway_months.is_infinite() && runway_months.is_sign_positive() {
            RunwayStatus::PositiveCashFlow
        } else if runway_months < 3.0 {
            RunwayStatus::Critical
        } else if runway_months < 6.0 {
            RunwayStatus::Warning
        } else if runway_months < 12.0 {
            RunwayStatus::Healthy
        } else {
            RunwayStatus::Excellent
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunwayStatus::Critical => "critical",
            RunwayStatus::Warning => "warning",
            RunwayStatus::Healthy => "healthy",
            RunwayStatus::Excellent => "excellent",
            RunwayStatus::PositiveCashFlow => "positive_cash_flow",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunwayResult {
    /// Infinite when the company is cash-flow positive. A value ≤ 0 means
    /// the balance is already depleted.
    #[serde(with = "infinite_f64")]
    pub runway_months: f64,
    #[serde(with = "infinite_f64")]
    pub runway_days: f64,
    pub estimated_depletion_date: Option<NaiveDate>,
    pub current_balance: Decimal,
    pub monthly_burn_rate: Decimal,
    pub status: RunwayStatus,
}

impl RunwayResult {
    pub fn is_infinite(&self) -> bool {
        self.runway_months.is_infinite()
    }

    pub fn is_depleted(&self) -> bool {
        self.runway_months <= 0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategorySpend {
    pub category: String,
    pub total: Decimal,
    pub count: usize,
    pub percentage: f64,
    pub avg_per_transaction: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryBreakdown {
    /// Sorted by total descending; ties keep first-occurrence order.
    pub categories: Vec<CategorySpend>,
    pub total_expenses: Decimal,
    pub total_income: Decimal,
    pub net_position: Decimal,
    pub transaction_count: usize,
    /// `None` means all time.
    pub period_months: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BalanceStatus {
    Positive,
    Negative,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BalanceResult {
    pub current_balance: Decimal,
    pub initial_capital: Decimal,
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub net_change: Decimal,
    pub balance_status: BalanceStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlyValue {
    pub month: String,
    pub value: Decimal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GrowthRate {
    /// Average month-over-month growth in percent.
    pub growth_rate: f64,
    pub metric: TransactionKind,
    pub period_months: u32,
    pub months_analyzed: usize,
    pub monthly_values: Vec<MonthlyValue>,
    pub trend: Option<Trend>,
    pub insufficient_data: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HealthRating {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

impl HealthRating {
    pub fn from_score(score: u8) -> Self {
        match score {
            80..=u8::MAX => HealthRating::Excellent,
            60..=79 => HealthRating::Good,
            40..=59 => HealthRating::Fair,
            20..=39 => HealthRating::Poor,
            _ => HealthRating::Critical,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthFactors {
    /// 0..=40
    pub runway_score: u8,
    /// 0..=30
    pub revenue_growth_score: u8,
    /// 0..=30
    pub expense_control_score: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthScore {
    pub score: u8,
    pub rating: HealthRating,
    pub factors: HealthFactors,
    pub recommendations: Vec<String>,
}

//
// ================= Calculator =================
//

/// Financial calculator anchored at a reference date ("now").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinancialCalculator {
    as_of: NaiveDate,
}

impl Default for FinancialCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl FinancialCalculator {
    pub fn new() -> Self {
        Self::as_of(Utc::now().date_naive())
    }

    pub fn as_of(as_of: NaiveDate) -> Self {
        Self { as_of }
    }

    pub fn today(&self) -> NaiveDate {
        self.as_of
    }

    /// Earliest date still inside a window of `months` × 30 days.
    pub fn cutoff(&self, months: u32) -> NaiveDate {
        self.as_of
            .checked_sub_days(Days::new(u64::from(months) * DAYS_PER_MONTH))
            .unwrap_or(NaiveDate::MIN)
    }

    pub fn calculate_burn_rate(
        &self,
        transactions: &[Transaction],
        period_months: u32,
    ) -> BurnRateResult {
        let cutoff = self.cutoff(period_months);

        let mut months = BTreeSet::new();
        let mut total_income = Decimal::ZERO;
        let mut total_expenses = Decimal::ZERO;
        let mut transaction_count = 0;

        for tx in transactions.iter().filter(|t| t.date >= cutoff) {
            months.insert(month_key(tx.date));
            transaction_count += 1;
            match tx.kind {
                TransactionKind::Income => total_income += tx.amount,
                TransactionKind::Expense => total_expenses += tx.amount,
            }
        }

        // Months without activity are left out of the denominator.
        let months_analyzed = months.len().max(1);
        let divisor = Decimal::from(months_analyzed);
        let avg_monthly_income = total_income / divisor;
        let avg_monthly_expenses = total_expenses / divisor;
        let burn_rate = (avg_monthly_expenses - avg_monthly_income).round_dp(2);
        let avg_monthly_income = avg_monthly_income.round_dp(2);
        let avg_monthly_expenses = avg_monthly_expenses.round_dp(2);

        debug!(
            burn_rate = %burn_rate,
            months = months_analyzed,
            transactions = transaction_count,
            "Calculated burn rate"
        );

        BurnRateResult {
            burn_rate,
            net_burn: burn_rate,
            avg_monthly_income,
            avg_monthly_expenses,
            months_analyzed: if transaction_count == 0 { 0 } else { months_analyzed },
            transaction_count,
            period_months,
        }
    }

    pub fn calculate_runway(
        &self,
        current_balance: Decimal,
        monthly_burn_rate: Decimal,
    ) -> RunwayResult {
        if monthly_burn_rate <= Decimal::ZERO {
            return RunwayResult {
                runway_months: f64::INFINITY,
                runway_days: f64::INFINITY,
                estimated_depletion_date: None,
                current_balance: current_balance.round_dp(2),
                monthly_burn_rate: monthly_burn_rate.round_dp(2),
                status: RunwayStatus::PositiveCashFlow,
            };
        }

        // Status is classified on the published value so the two always agree.
        let runway_months = floor_ratio2(current_balance, monthly_burn_rate);
        let runway_days = ratio(current_balance, monthly_burn_rate) * DAYS_PER_MONTH as f64;
        let status = RunwayStatus::from_months(runway_months);

        debug!(runway_months, status = status.as_str(), "Calculated runway");

        RunwayResult {
            runway_months,
            runway_days: runway_days.round(),
            estimated_depletion_date: self.offset_days(runway_days),
            current_balance: current_balance.round_dp(2),
            monthly_burn_rate: monthly_burn_rate.round_dp(2),
            status,
        }
    }

    pub fn analyze_spending_by_category(
        &self,
        transactions: &[Transaction],
        period_months: Option<u32>,
    ) -> CategoryBreakdown {
        let cutoff = period_months.map(|m| self.cutoff(m));
        let in_window: Vec<&Transaction> = transactions
            .iter()
            .filter(|t| cutoff.map_or(true, |c| t.date >= c))
            .collect();

        let mut order: Vec<(String, Decimal, usize)> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut total_expenses = Decimal::ZERO;
        let mut total_income = Decimal::ZERO;

        for tx in &in_window {
            match tx.kind {
                TransactionKind::Income => total_income += tx.amount,
                TransactionKind::Expense => {
                    total_expenses += tx.amount;
                    let slot = *index.entry(tx.category.as_str()).or_insert_with(|| {
                        order.push((tx.category.clone(), Decimal::ZERO, 0));
                        order.len() - 1
                    });
                    order[slot].1 += tx.amount;
                    order[slot].2 += 1;
                }
            }
        }

        let mut categories: Vec<CategorySpend> = order
            .into_iter()
            .map(|(category, total, count)| CategorySpend {
                percentage: percentage_of(total, total_expenses),
                avg_per_transaction: (total / Decimal::from(count.max(1))).round_dp(2),
                total: total.round_dp(2),
                category,
                count,
            })
            .collect();

        // Stable sort keeps first-occurrence order among equal totals.
        categories.sort_by(|a, b| b.total.cmp(&a.total));

        debug!(
            category_count = categories.len(),
            total_expenses = %total_expenses,
            "Analyzed spending by category"
        );

        CategoryBreakdown {
            categories,
            total_expenses: total_expenses.round_dp(2),
            total_income: total_income.round_dp(2),
            net_position: (total_income - total_expenses).round_dp(2),
            transaction_count: in_window.len(),
            period_months,
        }
    }

    /// Balance over the entire transaction set; no time window applies.
    pub fn calculate_balance(
        &self,
        initial_capital: Decimal,
        transactions: &[Transaction],
    ) -> BalanceResult {
        let (total_income, total_expenses) = totals(transactions.iter());
        let current_balance = initial_capital + total_income - total_expenses;

        BalanceResult {
            current_balance,
            initial_capital,
            total_income,
            total_expenses,
            net_change: total_income - total_expenses,
            balance_status: if current_balance > Decimal::ZERO {
                BalanceStatus::Positive
            } else {
                BalanceStatus::Negative
            },
        }
    }

    pub fn calculate_growth_rate(
        &self,
        transactions: &[Transaction],
        metric: TransactionKind,
        period_months: u32,
    ) -> GrowthRate {
        let cutoff = self.cutoff(period_months);

        let mut monthly: BTreeMap<String, Decimal> = BTreeMap::new();
        for tx in transactions
            .iter()
            .filter(|t| t.kind == metric && t.date >= cutoff)
        {
            *monthly.entry(month_key(tx.date)).or_insert(Decimal::ZERO) += tx.amount;
        }

        let monthly_values: Vec<MonthlyValue> = monthly
            .iter()
            .map(|(month, value)| MonthlyValue {
                month: month.clone(),
                value: value.round_dp(2),
            })
            .collect();

        if monthly.len() < 2 {
            return GrowthRate {
                growth_rate: 0.0,
                metric,
                period_months,
                months_analyzed: monthly.len(),
                monthly_values,
                trend: None,
                insufficient_data: true,
            };
        }

        let values: Vec<Decimal> = monthly.values().copied().collect();
        // Pairs whose previous month is not positive are skipped entirely.
        let rates: Vec<f64> = values
            .windows(2)
            .filter(|pair| pair[0] > Decimal::ZERO)
            .map(|pair| ratio(pair[1] - pair[0], pair[0]) * 100.0)
            .collect();

        let growth_rate = if rates.is_empty() {
            0.0
        } else {
            round2(rates.iter().sum::<f64>() / rates.len() as f64)
        };

        debug!(growth_rate, metric = %metric, "Calculated growth rate");

        GrowthRate {
            growth_rate,
            metric,
            period_months,
            months_analyzed: monthly.len(),
            monthly_values,
            trend: Some(if growth_rate > 0.0 {
                Trend::Increasing
            } else {
                Trend::Decreasing
            }),
            insufficient_data: false,
        }
    }

    pub fn calculate_financial_health_score(
        &self,
        current_balance: Decimal,
        monthly_burn_rate: Decimal,
        revenue_growth_rate: f64,
        expense_growth_rate: f64,
    ) -> HealthScore {
        let runway_score = if monthly_burn_rate > Decimal::ZERO {
            let runway_months = ratio(current_balance, monthly_burn_rate);
            if runway_months >= 18.0 {
                40
            } else if runway_months >= 12.0 {
                35
            } else if runway_months >= 6.0 {
                25
            } else if runway_months >= 3.0 {
                15
            } else {
                5
            }
        } else {
            40
        };

        let revenue_growth_score = if revenue_growth_rate >= 20.0 {
            30
        } else if revenue_growth_rate >= 10.0 {
            25
        } else if revenue_growth_rate >= 0.0 {
            15
        } else {
            5
        };

        // Relative comparison first: expenses growing slower than revenue earns
        // the full score whatever the absolute rate.
        let expense_control_score = if expense_growth_rate < revenue_growth_rate {
            30
        } else if expense_growth_rate < 5.0 {
            25
        } else if expense_growth_rate < 15.0 {
            20
        } else if expense_growth_rate < 30.0 {
            10
        } else {
            5
        };

        let factors = HealthFactors {
            runway_score,
            revenue_growth_score,
            expense_control_score,
        };
        let score = runway_score + revenue_growth_score + expense_control_score;
        let rating = HealthRating::from_score(score);

        debug!(score, rating = ?rating, "Calculated financial health score");

        HealthScore {
            score,
            rating,
            factors,
            recommendations: recommendations(&factors),
        }
    }

    fn offset_days(&self, days: f64) -> Option<NaiveDate> {
        if !days.is_finite() || days.abs() > 3_650_000.0 {
            return None;
        }
        let whole = days.round() as i64;
        if whole >= 0 {
            self.as_of.checked_add_days(Days::new(whole as u64))
        } else {
            self.as_of.checked_sub_days(Days::new(whole.unsigned_abs()))
        }
    }
}

fn recommendations(factors: &HealthFactors) -> Vec<String> {
    let mut out = Vec::new();

    if factors.runway_score < 20 {
        out.push("URGENT: Extend runway by reducing expenses or raising capital".to_string());
    } else if factors.runway_score < 30 {
        out.push("Focus on extending runway to at least 12 months".to_string());
    }

    if factors.revenue_growth_score < 15 {
        out.push("Prioritize revenue growth strategies".to_string());
    }

    if factors.expense_control_score < 20 {
        out.push("Control expense growth - expenses growing too fast".to_string());
    }

    if out.is_empty() {
        out.push("Maintain current trajectory".to_string());
    }

    out
}

//
// ================= Shared helpers =================
//

/// `YYYY-MM` bucket key.
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// `Mon YYYY` display label.
pub fn month_label(date: NaiveDate) -> String {
    date.format("%b %Y").to_string()
}

pub(crate) fn totals<'a, I>(transactions: I) -> (Decimal, Decimal)
where
    I: Iterator<Item = &'a Transaction>,
{
    transactions.fold((Decimal::ZERO, Decimal::ZERO), |(income, expenses), tx| {
        match tx.kind {
            TransactionKind::Income => (income + tx.amount, expenses),
            TransactionKind::Expense => (income, expenses + tx.amount),
        }
    })
}

/// `numerator / denominator` as f64; 0 when the denominator is zero.
pub(crate) fn ratio(numerator: Decimal, denominator: Decimal) -> f64 {
    if denominator.is_zero() {
        return 0.0;
    }
    match numerator.checked_div(denominator) {
        Some(q) => q.to_f64().unwrap_or(0.0),
        None => {
            let n = numerator.to_f64().unwrap_or(0.0);
            let d = denominator.to_f64().unwrap_or(1.0);
            n / d
        }
    }
}

/// `numerator / denominator` cut to two decimals toward negative infinity.
/// A ratio below a two-decimal threshold stays below it after the cut.
pub(crate) fn floor_ratio2(numerator: Decimal, denominator: Decimal) -> f64 {
    if denominator.is_zero() {
        return 0.0;
    }
    match numerator.checked_div(denominator) {
        Some(q) => q
            .round_dp_with_strategy(2, RoundingStrategy::ToNegativeInfinity)
            .to_f64()
            .unwrap_or(0.0),
        None => (ratio(numerator, denominator) * 100.0).floor() / 100.0,
    }
}

/// Percentage of `part` in `whole`, two decimals; 0 when `whole` is zero.
pub(crate) fn percentage_of(part: Decimal, whole: Decimal) -> f64 {
    if whole <= Decimal::ZERO {
        return 0.0;
    }
    round2(ratio(part, whole) * 100.0)
}

pub(crate) fn round2(value: f64) -> f64 {
    if value.is_finite() {
        (value * 100.0).round() / 100.0
    } else {
        value
    }
}

//
// ================= Tests =================
//

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dec(n: i64) -> Decimal {
        Decimal::from(n)
    }

    fn calc() -> FinancialCalculator {
        FinancialCalculator::as_of(date(2024, 6, 15))
    }

    /// 50k income and 45k expenses in each of the last three calendar months.
    fn three_month_scenario() -> Vec<Transaction> {
        let mut txs = Vec::new();
        for month in [4, 5, 6] {
            txs.push(Transaction::income(date(2024, month, 10), dec(50_000), "Revenue"));
            txs.push(Transaction::expense(date(2024, month, 10), dec(45_000), "Salaries"));
        }
        txs
    }

    #[test]
    fn test_scenario_net_positive_company() {
        let calc = calc();
        let txs = three_month_scenario();

        let balance = calc.calculate_balance(dec(100_000), &txs);
        assert_eq!(balance.current_balance, dec(115_000));

        let burn = calc.calculate_burn_rate(&txs, 3);
        assert_eq!(burn.avg_monthly_expenses, dec(45_000));
        assert_eq!(burn.avg_monthly_income, dec(50_000));
        assert_eq!(burn.burn_rate, dec(-5_000));
        assert_eq!(burn.months_analyzed, 3);
        assert_eq!(burn.transaction_count, 6);

        let runway = calc.calculate_runway(balance.current_balance, burn.burn_rate);
        assert!(runway.is_infinite());
        assert_eq!(runway.status, RunwayStatus::PositiveCashFlow);
        assert!(runway.estimated_depletion_date.is_none());
    }

    #[test]
    fn test_burn_rate_empty_is_zeroed() {
        let burn = calc().calculate_burn_rate(&[], 3);
        assert_eq!(burn.burn_rate, Decimal::ZERO);
        assert_eq!(burn.avg_monthly_expenses, Decimal::ZERO);
        assert_eq!(burn.transaction_count, 0);
        assert_eq!(burn.months_analyzed, 0);
    }

    #[test]
    fn test_burn_rate_divides_by_active_months_only() {
        // Three-month window but only one month has activity.
        let txs = vec![Transaction::expense(date(2024, 6, 1), dec(9_000), "Rent")];
        let burn = calc().calculate_burn_rate(&txs, 3);
        assert_eq!(burn.avg_monthly_expenses, dec(9_000));
        assert_eq!(burn.burn_rate, dec(9_000));
        assert_eq!(burn.months_analyzed, 1);
    }

    #[test]
    fn test_burn_rate_ignores_old_transactions() {
        let txs = vec![
            Transaction::expense(date(2023, 1, 1), dec(1_000_000), "Old"),
            Transaction::expense(date(2024, 6, 1), dec(1_000), "Rent"),
        ];
        let burn = calc().calculate_burn_rate(&txs, 3);
        assert_eq!(burn.burn_rate, dec(1_000));
        assert_eq!(burn.transaction_count, 1);
    }

    #[test]
    fn test_runway_non_positive_burn_is_infinite() {
        for balance in [dec(-500), Decimal::ZERO, dec(1_000_000)] {
            for burn in [Decimal::ZERO, dec(-1), dec(-10_000)] {
                let runway = calc().calculate_runway(balance, burn);
                assert_eq!(runway.status, RunwayStatus::PositiveCashFlow);
                assert!(runway.runway_months.is_infinite());
            }
        }
    }

    #[test]
    fn test_runway_boundary_three_months_is_warning() {
        let runway = calc().calculate_runway(dec(30_000), dec(10_000));
        assert_eq!(runway.runway_months, 3.0);
        assert_eq!(runway.status, RunwayStatus::Warning);
        assert_eq!(runway.runway_days, 90.0);
        assert_eq!(runway.estimated_depletion_date, Some(date(2024, 9, 13)));

        let just_below = calc().calculate_runway(dec(29_999), dec(10_000));
        assert_eq!(just_below.status, RunwayStatus::Critical);
    }

    #[test]
    fn test_runway_just_below_threshold_never_publishes_threshold() {
        // 2.99996 months would round half-up to 3.0 while still being critical.
        let runway = calc().calculate_runway(Decimal::new(299_996, 1), dec(10_000));
        assert_eq!(runway.runway_months, 2.99);
        assert_eq!(runway.status, RunwayStatus::Critical);
        assert_eq!(RunwayStatus::from_months(runway.runway_months), runway.status);

        let almost_six = calc().calculate_runway(dec(59_999), dec(10_000));
        assert_eq!(almost_six.runway_months, 5.99);
        assert_eq!(almost_six.status, RunwayStatus::Warning);
    }

    #[test]
    fn test_burn_rate_rounds_net_not_components() {
        // 1000.006 - 0.004 per month: rounding each side first would give 1000.01.
        let txs = vec![
            Transaction::expense(date(2024, 6, 1), Decimal::new(1_000_006, 3), "Rent"),
            Transaction::income(date(2024, 6, 2), Decimal::new(4, 3), "Interest"),
        ];
        let burn = calc().calculate_burn_rate(&txs, 3);
        assert_eq!(burn.burn_rate, Decimal::new(100_000, 2));
        assert_eq!(burn.avg_monthly_expenses, Decimal::new(100_001, 2));
        assert_eq!(burn.avg_monthly_income, Decimal::ZERO);
    }

    #[test]
    fn test_runway_statuses() {
        let c = calc();
        assert_eq!(c.calculate_runway(dec(100_000), dec(10_000)).status, RunwayStatus::Healthy);
        assert_eq!(c.calculate_runway(dec(120_000), dec(10_000)).status, RunwayStatus::Excellent);
        assert_eq!(c.calculate_runway(dec(50_000), dec(10_000)).status, RunwayStatus::Warning);
    }

    #[test]
    fn test_runway_negative_balance_is_depleted() {
        let runway = calc().calculate_runway(dec(-500), dec(1_000));
        assert!(runway.is_depleted());
        assert_eq!(runway.runway_months, -0.5);
        assert_eq!(runway.status, RunwayStatus::Critical);
        assert_eq!(runway.estimated_depletion_date, Some(date(2024, 5, 31)));
    }

    #[test]
    fn test_category_breakdown_sorted_with_stable_ties() {
        let txs = vec![
            Transaction::expense(date(2024, 6, 1), dec(100), "Travel"),
            Transaction::expense(date(2024, 6, 1), dec(300), "Salaries"),
            Transaction::expense(date(2024, 6, 2), dec(100), "Software"),
            Transaction::income(date(2024, 6, 2), dec(1_000), "Revenue"),
            Transaction::expense(date(2024, 6, 3), dec(100), "Marketing"),
        ];
        let breakdown = calc().analyze_spending_by_category(&txs, None);

        let names: Vec<&str> = breakdown.categories.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(names, vec!["Salaries", "Travel", "Software", "Marketing"]);
        assert_eq!(breakdown.categories[0].percentage, 50.0);
        assert_eq!(breakdown.total_expenses, dec(600));
        assert_eq!(breakdown.total_income, dec(1_000));
        assert_eq!(breakdown.net_position, dec(400));
        assert_eq!(breakdown.transaction_count, 5);
    }

    #[test]
    fn test_category_breakdown_no_expenses() {
        let txs = vec![Transaction::income(date(2024, 6, 1), dec(500), "Revenue")];
        let breakdown = calc().analyze_spending_by_category(&txs, Some(3));
        assert!(breakdown.categories.is_empty());
        assert_eq!(breakdown.total_expenses, Decimal::ZERO);
        assert_eq!(breakdown.period_months, Some(3));
    }

    #[test]
    fn test_category_breakdown_period_filter() {
        let txs = vec![
            Transaction::expense(date(2023, 1, 1), dec(900), "Legacy"),
            Transaction::expense(date(2024, 6, 1), dec(100), "Rent"),
        ];
        let breakdown = calc().analyze_spending_by_category(&txs, Some(1));
        assert_eq!(breakdown.categories.len(), 1);
        assert_eq!(breakdown.categories[0].percentage, 100.0);
    }

    #[test]
    fn test_balance_sum_identity() {
        // Deterministic pseudo-random transaction sets.
        let mut seed: u64 = 0x5eed;
        let mut next = move || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            seed >> 33
        };

        for _ in 0..50 {
            let count = (next() % 40) as usize;
            let initial = Decimal::new((next() % 10_000_000) as i64, 2);
            let txs: Vec<Transaction> = (0..count)
                .map(|i| {
                    let amount = Decimal::new((next() % 5_000_000) as i64, 2);
                    let day = date(2020 + (i % 5) as i32, 1 + (i % 12) as u32, 1);
                    if next() % 2 == 0 {
                        Transaction::income(day, amount, "Revenue")
                    } else {
                        Transaction::expense(day, amount, "Costs")
                    }
                })
                .collect();

            let income: Decimal = txs
                .iter()
                .filter(|t| t.kind == TransactionKind::Income)
                .map(|t| t.amount)
                .sum();
            let expense: Decimal = txs
                .iter()
                .filter(|t| t.kind == TransactionKind::Expense)
                .map(|t| t.amount)
                .sum();

            let balance = calc().calculate_balance(initial, &txs);
            assert_eq!(balance.current_balance, initial + income - expense);
        }
    }

    #[test]
    fn test_balance_uses_full_history() {
        let txs = vec![
            Transaction::expense(date(2015, 1, 1), dec(10_000), "Ancient"),
            Transaction::income(date(2024, 6, 1), dec(2_000), "Revenue"),
        ];
        let balance = calc().calculate_balance(dec(5_000), &txs);
        assert_eq!(balance.current_balance, dec(-3_000));
        assert_eq!(balance.balance_status, BalanceStatus::Negative);
        assert_eq!(balance.net_change, dec(-8_000));
    }

    #[test]
    fn test_growth_rate_average() {
        let txs = vec![
            Transaction::income(date(2024, 4, 5), dec(100), "Revenue"),
            Transaction::income(date(2024, 5, 5), dec(150), "Revenue"),
            Transaction::income(date(2024, 6, 5), dec(150), "Revenue"),
            Transaction::expense(date(2024, 6, 5), dec(999), "Rent"),
        ];
        let growth = calc().calculate_growth_rate(&txs, TransactionKind::Income, 6);
        // (+50% + 0%) / 2
        assert_eq!(growth.growth_rate, 25.0);
        assert_eq!(growth.months_analyzed, 3);
        assert_eq!(growth.trend, Some(Trend::Increasing));
        assert!(!growth.insufficient_data);
    }

    #[test]
    fn test_growth_rate_skips_pairs_after_zero_month() {
        let txs = vec![
            Transaction::expense(date(2024, 4, 5), Decimal::ZERO, "Rent"),
            Transaction::expense(date(2024, 5, 5), dec(100), "Rent"),
            Transaction::expense(date(2024, 6, 5), dec(50), "Rent"),
        ];
        let growth = calc().calculate_growth_rate(&txs, TransactionKind::Expense, 6);
        // The 0 → 100 pair is dropped; only 100 → 50 counts.
        assert_eq!(growth.growth_rate, -50.0);
        assert_eq!(growth.trend, Some(Trend::Decreasing));
    }

    #[test]
    fn test_growth_rate_insufficient_data() {
        let txs = vec![Transaction::income(date(2024, 6, 5), dec(100), "Revenue")];
        let growth = calc().calculate_growth_rate(&txs, TransactionKind::Income, 6);
        assert_eq!(growth.growth_rate, 0.0);
        assert!(growth.insufficient_data);
        assert!(growth.trend.is_none());
    }

    #[test]
    fn test_health_score_tables() {
        let c = calc();

        let best = c.calculate_financial_health_score(dec(100_000), dec(-1), 25.0, 5.0);
        assert_eq!(best.score, 100);
        assert_eq!(best.rating, HealthRating::Excellent);
        assert_eq!(best.recommendations, vec!["Maintain current trajectory".to_string()]);

        let worst = c.calculate_financial_health_score(dec(1_000), dec(1_000), -10.0, 40.0);
        assert_eq!(worst.factors.runway_score, 5);
        assert_eq!(worst.factors.revenue_growth_score, 5);
        assert_eq!(worst.factors.expense_control_score, 5);
        assert_eq!(worst.score, 15);
        assert_eq!(worst.rating, HealthRating::Critical);
        assert_eq!(worst.recommendations.len(), 3);
        assert!(worst.recommendations[0].starts_with("URGENT"));
    }

    #[test]
    fn test_expense_control_is_relative() {
        // 80% expense growth still earns the maximum when revenue grows faster.
        let score = calc().calculate_financial_health_score(dec(120_000), dec(10_000), 90.0, 80.0);
        assert_eq!(score.factors.expense_control_score, 30);
        assert_eq!(score.factors.runway_score, 35);
        assert_eq!(score.rating, HealthRating::Excellent);
    }

    #[test]
    fn test_rating_thresholds() {
        assert_eq!(HealthRating::from_score(80), HealthRating::Excellent);
        assert_eq!(HealthRating::from_score(79), HealthRating::Good);
        assert_eq!(HealthRating::from_score(40), HealthRating::Fair);
        assert_eq!(HealthRating::from_score(20), HealthRating::Poor);
        assert_eq!(HealthRating::from_score(19), HealthRating::Critical);
    }
}
