//! Runway prediction: how long the cash lasts at the current burn.

use super::{PreparedRequest, TaskContext, TaskInput};
use crate::charts::ChartProjector;
use crate::models::TransactionKind;
use crate::Result;
use serde_json::json;

pub(crate) const SYSTEM_CONTEXT: &str = "You are the Runway Analyst for Cash Horizon, a startup financial health platform.
Interpret burn rate, runway and the financial health score using only the figures provided.
Be direct about risk and give concrete steps to extend runway.";

pub(crate) fn prepare(ctx: &TaskContext, input: &TaskInput) -> Result<PreparedRequest> {
    let calculator = &ctx.calculator;
    let settings = &ctx.analysis;
    let charts = ChartProjector::new(*calculator);
    let transactions = &input.transactions;

    let burn = calculator.calculate_burn_rate(transactions, settings.burn_period_months);
    let balance = calculator.calculate_balance(input.company.initial_capital, transactions);
    let runway = calculator.calculate_runway(balance.current_balance, burn.burn_rate);

    let revenue_growth = calculator.calculate_growth_rate(
        transactions,
        TransactionKind::Income,
        settings.growth_period_months,
    );
    let expense_growth = calculator.calculate_growth_rate(
        transactions,
        TransactionKind::Expense,
        settings.growth_period_months,
    );
    let health = calculator.calculate_financial_health_score(
        balance.current_balance,
        burn.burn_rate,
        revenue_growth.growth_rate,
        expense_growth.growth_rate,
    );

    let forecast =
        charts.runway_forecast(balance.current_balance, burn.burn_rate, settings.forecast_months);
    let burn_history = charts.burn_history(transactions, settings.chart_months);

    let runway_text = if runway.is_infinite() {
        "unlimited (cash-flow positive)".to_string()
    } else {
        format!("{:.1} months", runway.runway_months)
    };
    let depletion_text = runway
        .estimated_depletion_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "not projected".to_string());

    let instructions = format!(
        "Provide a runway prediction for {}.\n\
         Current balance: {}. Monthly burn rate: {}.\n\
         Runway: {} (status: {}). Estimated depletion: {}.\n\
         Financial health score: {}/100 ({:?}).\n\
         Cover: runway assessment, main risks, expense reductions and \
         revenue opportunities that would extend runway, and fundraising timing.",
        input.company.name,
        balance.current_balance,
        burn.burn_rate,
        runway_text,
        runway.status.as_str(),
        depletion_text,
        health.score,
        health.rating,
    );

    let facts = json!({
        "burn_rate": serde_json::to_value(&burn)?,
        "balance": serde_json::to_value(&balance)?,
        "runway": serde_json::to_value(&runway)?,
        "health_score": serde_json::to_value(&health)?,
        "forecast": serde_json::to_value(&forecast)?,
        "burn_history": serde_json::to_value(&burn_history)?,
    });

    Ok(PreparedRequest {
        facts,
        system_context: SYSTEM_CONTEXT,
        instructions,
    })
}
