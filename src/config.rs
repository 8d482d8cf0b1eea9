//! Runtime configuration
//!
//! Values come from the process environment (optionally seeded from `.env`
//! by the binaries). Every field has a default so the engine runs with no
//! configuration at all, backed by the mock summarizer.

use crate::error::OrchestrationError;
use crate::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Knobs for the deterministic calculations each task performs.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSettings {
    pub burn_period_months: u32,
    pub growth_period_months: u32,
    pub chart_months: u32,
    pub forecast_months: u32,
    pub top_categories: usize,
    pub emergency_fund_months: u32,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            burn_period_months: 3,
            growth_period_months: 6,
            chart_months: 12,
            forecast_months: 12,
            top_categories: 10,
            emergency_fund_months: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummarizerSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub analysis: AnalysisSettings,
    pub summarizer: SummarizerSettings,
    /// Deadline for a whole workflow run.
    pub workflow_timeout: Duration,
    pub api_port: u16,
    /// Workflow runs kept in the audit log before the oldest are evicted.
    pub audit_max_runs: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            analysis: AnalysisSettings::default(),
            summarizer: SummarizerSettings::default(),
            workflow_timeout: Duration::from_secs(300),
            api_port: 8080,
            audit_max_runs: 1_000,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let analysis_defaults = defaults.analysis;

        let analysis = AnalysisSettings {
            burn_period_months: positive(&lookup, "BURN_PERIOD_MONTHS", analysis_defaults.burn_period_months)?,
            growth_period_months: positive(&lookup, "GROWTH_PERIOD_MONTHS", analysis_defaults.growth_period_months)?,
            chart_months: positive(&lookup, "CHART_MONTHS", analysis_defaults.chart_months)?,
            forecast_months: positive(&lookup, "FORECAST_MONTHS", analysis_defaults.forecast_months)?,
            top_categories: positive(&lookup, "TOP_CATEGORIES", analysis_defaults.top_categories)?,
            emergency_fund_months: positive(&lookup, "EMERGENCY_FUND_MONTHS", analysis_defaults.emergency_fund_months)?,
        };

        let summarizer = SummarizerSettings {
            api_key: lookup("GEMINI_API_KEY").unwrap_or_default(),
            model: lookup("GEMINI_MODEL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.summarizer.model),
            base_url: lookup("GEMINI_BASE_URL")
                .filter(|v| !v.trim().is_empty())
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.summarizer.base_url),
            timeout: Duration::from_secs(positive(
                &lookup,
                "SUMMARIZE_TIMEOUT_SECS",
                defaults.summarizer.timeout.as_secs(),
            )?),
        };

        let workflow_timeout = Duration::from_secs(positive(
            &lookup,
            "WORKFLOW_TIMEOUT_SECS",
            defaults.workflow_timeout.as_secs(),
        )?);

        let api_port = match lookup("PORT").or_else(|| lookup("API_PORT")) {
            Some(raw) => parse::<u16>("PORT", &raw)?,
            None => defaults.api_port,
        };

        let audit_max_runs = positive(&lookup, "AUDIT_MAX_RUNS", defaults.audit_max_runs)?;

        Ok(Self {
            analysis,
            summarizer,
            workflow_timeout,
            api_port,
            audit_max_runs,
        })
    }

    pub fn has_api_key(&self) -> bool {
        !self.summarizer.api_key.trim().is_empty()
    }
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim().parse::<T>().map_err(|_| {
        OrchestrationError::ConfigurationError(format!("{} has invalid value '{}'", key, raw))
    })
}

fn positive<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialEq + Default,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    let value = parse::<T>(key, &raw)?;
    if value == T::default() {
        return Err(OrchestrationError::ConfigurationError(format!(
            "{} must be greater than zero",
            key
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let settings = Settings::from_lookup(|_| None).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(!settings.has_api_key());
        assert_eq!(settings.analysis.emergency_fund_months, 6);
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "secret"),
            ("GEMINI_BASE_URL", "http://localhost:9000/"),
            ("FORECAST_MONTHS", "24"),
            ("PORT", "9090"),
            ("WORKFLOW_TIMEOUT_SECS", "10"),
            ("AUDIT_MAX_RUNS", "50"),
        ]))
        .unwrap();

        assert!(settings.has_api_key());
        assert_eq!(settings.summarizer.base_url, "http://localhost:9000");
        assert_eq!(settings.analysis.forecast_months, 24);
        assert_eq!(settings.api_port, 9090);
        assert_eq!(settings.workflow_timeout, Duration::from_secs(10));
        assert_eq!(settings.audit_max_runs, 50);
    }

    #[test]
    fn test_invalid_values_are_configuration_errors() {
        let zero = Settings::from_lookup(lookup_from(&[("TOP_CATEGORIES", "0")]));
        assert!(matches!(zero, Err(OrchestrationError::ConfigurationError(_))));

        let garbage = Settings::from_lookup(lookup_from(&[("SUMMARIZE_TIMEOUT_SECS", "soon")]));
        assert!(matches!(garbage, Err(OrchestrationError::ConfigurationError(_))));
    }
}
