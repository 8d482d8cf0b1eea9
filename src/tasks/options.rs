//! Curated investment options, filtered by company stage and risk tolerance.

use crate::models::CompanyStage;
use lazy_static::lazy_static;
use serde::Serialize;
use RiskTolerance::{Conservative, Moderate};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    Conservative,
    Moderate,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvestmentOption {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub risk_level: &'static str,
    pub expected_return: &'static str,
    pub liquidity: &'static str,
    pub minimum: &'static str,
    pub description: &'static str,
    pub pros: &'static [&'static str],
    pub cons: &'static [&'static str],
    #[serde(skip)]
    tolerances: &'static [RiskTolerance],
    /// Empty means every stage.
    #[serde(skip)]
    stages: &'static [CompanyStage],
}

impl InvestmentOption {
    fn suits(&self, stage: CompanyStage, risk: RiskTolerance) -> bool {
        self.tolerances.contains(&risk) && (self.stages.is_empty() || self.stages.contains(&stage))
    }
}

lazy_static! {
    static ref CATALOG: Vec<InvestmentOption> = vec![
        InvestmentOption {
            name: "High-Yield Savings Account",
            kind: "savings",
            risk_level: "very_low",
            expected_return: "4.5-5.0% APY",
            liquidity: "high",
            minimum: "$0",
            description: "Insured savings with competitive rates. Suited to emergency funds and short-term reserves.",
            pros: &["No principal risk", "High liquidity", "Deposit insurance"],
            cons: &["Lower returns", "Inflation risk"],
            tolerances: &[Conservative, Moderate],
            stages: &[],
        },
        InvestmentOption {
            name: "Money Market Funds",
            kind: "money_market",
            risk_level: "low",
            expected_return: "5.0-5.5% APY",
            liquidity: "high",
            minimum: "$1,000",
            description: "Short-term debt securities with better yield than savings.",
            pros: &["Low risk", "Better than savings", "High liquidity"],
            cons: &["Not deposit insured", "Market dependent"],
            tolerances: &[Conservative, Moderate],
            stages: &[],
        },
        InvestmentOption {
            name: "U.S. Treasury Bills",
            kind: "treasury",
            risk_level: "very_low",
            expected_return: "4.5-5.5%",
            liquidity: "moderate",
            minimum: "$100",
            description: "Government-backed securities with maturities from 4 weeks to 1 year.",
            pros: &["Government backed", "Predictable", "Tax advantages"],
            cons: &["Lower returns", "Fixed maturity"],
            tolerances: &[Conservative, Moderate],
            stages: &[],
        },
        InvestmentOption {
            name: "Investment-Grade Corporate Bonds",
            kind: "bonds",
            risk_level: "low_moderate",
            expected_return: "5.5-7.0%",
            liquidity: "moderate",
            minimum: "$1,000",
            description: "Bonds from stable corporations with strong credit ratings.",
            pros: &["Higher yields", "Regular income", "Diversification"],
            cons: &["Credit risk", "Interest rate risk", "Less liquid"],
            tolerances: &[Moderate],
            stages: &[],
        },
        InvestmentOption {
            name: "S&P 500 Index Funds",
            kind: "equity_index",
            risk_level: "moderate",
            expected_return: "8-12% (historical avg)",
            liquidity: "high",
            minimum: "$0-$1,000",
            description: "Diversified exposure to the 500 largest US companies.",
            pros: &["Growth potential", "Diversified", "Low fees"],
            cons: &["Market volatility", "Not guaranteed", "Long horizon"],
            tolerances: &[Moderate],
            stages: &[CompanyStage::Growth, CompanyStage::Mature],
        },
        InvestmentOption {
            name: "Certificates of Deposit (CDs)",
            kind: "cd",
            risk_level: "very_low",
            expected_return: "4.5-5.5%",
            liquidity: "low",
            minimum: "$500",
            description: "Fixed-term deposits with guaranteed returns, terms from 3 months to 5 years.",
            pros: &["Deposit insurance", "Guaranteed returns", "Predictable"],
            cons: &["Low liquidity", "Early withdrawal penalties", "Rate lock"],
            tolerances: &[Conservative],
            stages: &[CompanyStage::Mature],
        },
    ];
}

pub fn curated_options(stage: CompanyStage, risk: RiskTolerance) -> Vec<InvestmentOption> {
    CATALOG
        .iter()
        .filter(|option| option.suits(stage, risk))
        .cloned()
        .collect()
}
