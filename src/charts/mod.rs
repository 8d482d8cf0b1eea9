//! Chart-ready projections
//!
//! Month-bucketed series derived from the same transaction set the metrics
//! use: burn history, balance history, category pies, income/expense trends
//! and a straight-line runway forecast. Pure transformations, no side effects.

use crate::metrics::{
    month_key, month_label, percentage_of, ratio, round2, totals, FinancialCalculator,
};
use crate::models::{Transaction, TransactionKind};
use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

pub const OTHER_CATEGORY: &str = "Other";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BurnHistoryPoint {
    pub month: String,
    pub month_label: String,
    pub income: Decimal,
    pub expenses: Decimal,
    pub burn_rate: Decimal,
    pub net_cash_flow: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BurnHistoryChart {
    pub points: Vec<BurnHistoryPoint>,
    pub period_months: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategorySlice {
    pub category: String,
    pub amount: Decimal,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryPie {
    pub transaction_kind: TransactionKind,
    /// Top categories followed by at most one synthetic "Other" slice.
    pub slices: Vec<CategorySlice>,
    pub total: Decimal,
    pub category_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastPoint {
    pub month: String,
    pub month_label: String,
    /// Floored at zero for display.
    pub balance: Decimal,
    pub is_projected: bool,
    pub is_depleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunwayForecast {
    pub points: Vec<ForecastPoint>,
    pub current_balance: Decimal,
    pub monthly_burn_rate: Decimal,
    pub forecast_months: u32,
    /// Index of the first point whose balance is ≤ 0, if any within the horizon.
    pub depletion_month: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BalancePoint {
    pub month: String,
    pub month_label: String,
    pub balance: Decimal,
    pub is_positive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BalanceHistory {
    pub points: Vec<BalancePoint>,
    pub initial_capital: Decimal,
    /// Balance carried into the window from transactions before it.
    pub opening_balance: Decimal,
    pub final_balance: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendPoint {
    pub month: String,
    pub month_label: String,
    pub value: Decimal,
    pub growth_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendChart {
    pub metric: TransactionKind,
    pub points: Vec<TrendPoint>,
    pub overall_growth_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dashboard {
    pub burn_history: BurnHistoryChart,
    pub expense_breakdown: CategoryPie,
    pub income_breakdown: CategoryPie,
    pub balance_history: BalanceHistory,
    pub income_trend: TrendChart,
    pub expense_trend: TrendChart,
}

/// Derives chart series relative to the calculator's reference date.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChartProjector {
    calculator: FinancialCalculator,
}

impl ChartProjector {
    pub fn new(calculator: FinancialCalculator) -> Self {
        Self { calculator }
    }

    pub fn burn_history(&self, transactions: &[Transaction], months: u32) -> BurnHistoryChart {
        let cutoff = self.calculator.cutoff(months);

        let mut monthly: BTreeMap<NaiveDate, (Decimal, Decimal)> = BTreeMap::new();
        for tx in transactions.iter().filter(|t| t.date >= cutoff) {
            let bucket = monthly
                .entry(month_start(tx.date))
                .or_insert((Decimal::ZERO, Decimal::ZERO));
            match tx.kind {
                TransactionKind::Income => bucket.0 += tx.amount,
                TransactionKind::Expense => bucket.1 += tx.amount,
            }
        }

        let points: Vec<BurnHistoryPoint> = monthly
            .into_iter()
            .map(|(month, (income, expenses))| {
                let burn_rate = expenses - income;
                BurnHistoryPoint {
                    month: month_key(month),
                    month_label: month_label(month),
                    income: income.round_dp(2),
                    expenses: expenses.round_dp(2),
                    burn_rate: burn_rate.round_dp(2),
                    net_cash_flow: (-burn_rate).round_dp(2),
                }
            })
            .collect();

        debug!(points = points.len(), "Generated burn history chart");

        BurnHistoryChart {
            points,
            period_months: months,
        }
    }

    /// Pie of the `top_n` largest categories plus an "Other" slice for the rest.
    ///
    /// Every percentage, "Other" included, is taken against the combined total
    /// of shown and collapsed categories, so the slices add up to 100.
    pub fn category_pie(
        &self,
        transactions: &[Transaction],
        kind: TransactionKind,
        top_n: usize,
    ) -> CategoryPie {
        let mut order: Vec<(String, Decimal)> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();
        for tx in transactions.iter().filter(|t| t.kind == kind) {
            let slot = *index.entry(tx.category.as_str()).or_insert_with(|| {
                order.push((tx.category.clone(), Decimal::ZERO));
                order.len() - 1
            });
            order[slot].1 += tx.amount;
        }
        let category_count = order.len();

        order.sort_by(|a, b| b.1.cmp(&a.1));

        let shown_len = top_n.min(order.len());
        let other_amount: Decimal = order[shown_len..].iter().map(|(_, amount)| *amount).sum();
        let shown_amount: Decimal = order[..shown_len].iter().map(|(_, amount)| *amount).sum();
        let total = shown_amount + other_amount;

        let mut slices: Vec<CategorySlice> = order
            .into_iter()
            .take(shown_len)
            .map(|(category, amount)| CategorySlice {
                percentage: percentage_of(amount, total),
                amount: amount.round_dp(2),
                category,
            })
            .collect();

        if category_count > top_n {
            slices.push(CategorySlice {
                category: OTHER_CATEGORY.to_string(),
                amount: other_amount.round_dp(2),
                percentage: percentage_of(other_amount, total),
            });
        }

        debug!(
            kind = %kind,
            slices = slices.len(),
            total = %total,
            "Generated category pie"
        );

        CategoryPie {
            transaction_kind: kind,
            slices,
            total: total.round_dp(2),
            category_count,
        }
    }

    /// Straight-line projection of the balance at the current burn rate.
    pub fn runway_forecast(
        &self,
        current_balance: Decimal,
        monthly_burn_rate: Decimal,
        forecast_months: u32,
    ) -> RunwayForecast {
        let today = self.calculator.today();
        let mut balance = current_balance;
        let mut points = Vec::with_capacity(forecast_months as usize + 1);
        let mut depletion_month = None;

        for month in 0..=forecast_months {
            let date = today
                .checked_add_months(Months::new(month))
                .unwrap_or(NaiveDate::MAX);
            let is_depleted = balance <= Decimal::ZERO;
            if is_depleted && depletion_month.is_none() {
                depletion_month = Some(month as usize);
            }

            points.push(ForecastPoint {
                month: month_key(date),
                month_label: month_label(date),
                balance: balance.max(Decimal::ZERO).round_dp(2),
                is_projected: month > 0,
                is_depleted,
            });

            balance -= monthly_burn_rate;
        }

        debug!(forecast_months, ?depletion_month, "Generated runway forecast");

        RunwayForecast {
            points,
            current_balance: current_balance.round_dp(2),
            monthly_burn_rate: monthly_burn_rate.round_dp(2),
            forecast_months,
            depletion_month,
        }
    }

    /// End-of-month balances inside the window, carrying earlier history in.
    pub fn balance_history(
        &self,
        initial_capital: Decimal,
        transactions: &[Transaction],
        months: u32,
    ) -> BalanceHistory {
        let cutoff = self.calculator.cutoff(months);

        let (prior_income, prior_expenses) =
            totals(transactions.iter().filter(|t| t.date < cutoff));
        let opening_balance = initial_capital + prior_income - prior_expenses;

        let mut window: Vec<&Transaction> =
            transactions.iter().filter(|t| t.date >= cutoff).collect();
        window.sort_by_key(|t| t.date);

        let mut balance = opening_balance;
        let mut month_end: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
        for tx in window {
            balance += tx.signed_amount();
            month_end.insert(month_start(tx.date), balance);
        }

        let points = month_end
            .into_iter()
            .map(|(month, balance)| BalancePoint {
                month: month_key(month),
                month_label: month_label(month),
                balance: balance.round_dp(2),
                is_positive: balance > Decimal::ZERO,
            })
            .collect();

        BalanceHistory {
            points,
            initial_capital,
            opening_balance: opening_balance.round_dp(2),
            final_balance: balance.round_dp(2),
        }
    }

    pub fn trend(
        &self,
        transactions: &[Transaction],
        metric: TransactionKind,
        months: u32,
    ) -> TrendChart {
        let cutoff = self.calculator.cutoff(months);

        let mut monthly: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
        for tx in transactions
            .iter()
            .filter(|t| t.kind == metric && t.date >= cutoff)
        {
            *monthly.entry(month_start(tx.date)).or_insert(Decimal::ZERO) += tx.amount;
        }

        let mut previous: Option<Decimal> = None;
        let mut points = Vec::with_capacity(monthly.len());
        for (month, value) in &monthly {
            let growth_rate = previous
                .filter(|p| *p > Decimal::ZERO)
                .map(|p| round2(ratio(*value - p, p) * 100.0));
            points.push(TrendPoint {
                month: month_key(*month),
                month_label: month_label(*month),
                value: value.round_dp(2),
                growth_rate,
            });
            previous = Some(*value);
        }

        let overall_growth_rate = match (monthly.values().next(), monthly.values().last()) {
            (Some(first), Some(last)) if monthly.len() >= 2 && *first > Decimal::ZERO => {
                round2(ratio(*last - *first, *first) * 100.0)
            }
            _ => 0.0,
        };

        TrendChart {
            metric,
            points,
            overall_growth_rate,
        }
    }

    pub fn dashboard(
        &self,
        initial_capital: Decimal,
        transactions: &[Transaction],
        months: u32,
        top_n: usize,
    ) -> Dashboard {
        let dashboard = Dashboard {
            burn_history: self.burn_history(transactions, months),
            expense_breakdown: self.category_pie(transactions, TransactionKind::Expense, top_n),
            income_breakdown: self.category_pie(transactions, TransactionKind::Income, top_n),
            balance_history: self.balance_history(initial_capital, transactions, months),
            income_trend: self.trend(transactions, TransactionKind::Income, months),
            expense_trend: self.trend(transactions, TransactionKind::Expense, months),
        };

        info!(months, "Generated combined dashboard data");
        dashboard
    }
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}
