//! Spending analysis: where the money goes and how it is trending.

use super::{PreparedRequest, TaskContext, TaskInput};
use crate::charts::ChartProjector;
use crate::models::TransactionKind;
use crate::Result;
use serde_json::json;

pub(crate) const SYSTEM_CONTEXT: &str = "You are the Spending Analyst for Cash Horizon, a startup financial health platform.
Explain spending patterns using only the figures provided.
Be concise, specific and actionable. Never invent numbers.";

pub(crate) fn prepare(ctx: &TaskContext, input: &TaskInput) -> Result<PreparedRequest> {
    let calculator = &ctx.calculator;
    let settings = &ctx.analysis;
    let charts = ChartProjector::new(*calculator);
    let transactions = &input.transactions;

    let breakdown = calculator.analyze_spending_by_category(transactions, None);
    let balance = calculator.calculate_balance(input.company.initial_capital, transactions);
    let income_growth = calculator.calculate_growth_rate(
        transactions,
        TransactionKind::Income,
        settings.growth_period_months,
    );
    let expense_growth = calculator.calculate_growth_rate(
        transactions,
        TransactionKind::Expense,
        settings.growth_period_months,
    );
    let expense_pie =
        charts.category_pie(transactions, TransactionKind::Expense, settings.top_categories);
    let income_pie =
        charts.category_pie(transactions, TransactionKind::Income, settings.top_categories);

    let top_categories = breakdown
        .categories
        .iter()
        .take(3)
        .map(|c| format!("{} ({:.1}%)", c.category, c.percentage))
        .collect::<Vec<_>>()
        .join(", ");

    let instructions = format!(
        "Provide a spending analysis for {}.\n\
         Total expenses: {}. Total income: {}. Current balance: {}.\n\
         Largest categories: {}.\n\
         Expense growth: {:.1}% per month. Income growth: {:.1}% per month.\n\
         Cover: key spending patterns, categories that need attention, \
         cost optimization opportunities and risks.",
        input.company.name,
        breakdown.total_expenses,
        breakdown.total_income,
        balance.current_balance,
        if top_categories.is_empty() { "none recorded".to_string() } else { top_categories },
        expense_growth.growth_rate,
        income_growth.growth_rate,
    );

    let facts = json!({
        "category_breakdown": serde_json::to_value(&breakdown)?,
        "balance": serde_json::to_value(&balance)?,
        "income_growth": serde_json::to_value(&income_growth)?,
        "expense_growth": serde_json::to_value(&expense_growth)?,
        "expense_pie": serde_json::to_value(&expense_pie)?,
        "income_pie": serde_json::to_value(&income_pie)?,
    });

    Ok(PreparedRequest {
        facts,
        system_context: SYSTEM_CONTEXT,
        instructions,
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_spending_facts() {
        let prepared = prepare(&context(), &input(100_000)).unwrap();
        let facts = &prepared.facts;

        assert_eq!(facts["category_breakdown"]["categories"][0]["category"], "Salaries");
        assert_eq!(decimal_at(&facts["balance"]["current_balance"]), Decimal::from(70_000));
        assert_eq!(facts["expense_pie"]["slices"].as_array().unwrap().len(), 2);
        assert!(prepared.instructions.contains("Acme"));
        assert!(prepared.instructions.contains("Salaries (73.3%)"));
    }
}
