use cash_horizon::{
    api::AnalysisRequest,
    charts::ChartProjector,
    config::Settings,
    models::{CompanyProfile, TaskKind, Transaction, WorkflowPolicy},
    orchestrator::{validate_inputs, WorkflowOrchestrator},
    summarizer::{gemini::GeminiSummarizer, MockSummarizer, Summarizer},
};
use chrono::{Datelike, Months, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Policy {
    Sequential,
    Parallel,
}

impl From<Policy> for WorkflowPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::Sequential => WorkflowPolicy::Sequential,
            Policy::Parallel => WorkflowPolicy::Parallel,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Task {
    Spending,
    Runway,
    Investment,
}

impl From<Task> for TaskKind {
    fn from(task: Task) -> Self {
        match task {
            Task::Spending => TaskKind::SpendingAnalysis,
            Task::Runway => TaskKind::RunwayPrediction,
            Task::Investment => TaskKind::InvestmentAdvice,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "cash-horizon", version, about = "Cash runway and spending analysis")]
struct Cli {
    /// JSON file with {"company": {...}, "transactions": [...]}; demo data when omitted
    #[arg(short = 'f', long = "file", global = true)]
    file: Option<PathBuf>,

    /// Company name for demo data
    #[arg(long = "company", default_value = "Demo Company", global = true)]
    company: String,

    /// Initial capital for demo data
    #[arg(long = "initial-capital", default_value = "250000", global = true)]
    initial_capital: Decimal,

    /// Reference date for all windows (defaults to today)
    #[arg(long = "as-of", global = true)]
    as_of: Option<NaiveDate>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run all three analyses and print the workflow report
    Workflow {
        #[arg(short = 'p', long = "policy", value_enum, default_value = "sequential")]
        policy: Policy,
    },
    /// Run a single analysis
    Task {
        #[arg(value_enum)]
        task: Task,
    },
    /// Print dashboard chart series
    Charts,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    let as_of = cli.as_of.unwrap_or_else(|| Utc::now().date_naive());

    let AnalysisRequest {
        company,
        transactions,
    } = match &cli.file {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => demo_request(&cli.company, cli.initial_capital, as_of),
    };

    info!(
        company = %company.name,
        transactions = transactions.len(),
        as_of = %as_of,
        "Loaded input"
    );

    let summarizer: Arc<dyn Summarizer> = if settings.has_api_key() {
        Arc::new(GeminiSummarizer::new(&settings.summarizer)?)
    } else {
        warn!("GEMINI_API_KEY not set; using mock summarizer");
        Arc::new(MockSummarizer::new())
    };
    let orchestrator = WorkflowOrchestrator::new(summarizer, &settings).with_as_of(as_of);

    match cli.command {
        Command::Workflow { policy } => {
            let report = orchestrator
                .run_workflow(transactions, company, policy.into())
                .await?;
            print_json(&report)
        }
        Command::Task { task } => {
            let outcome = orchestrator
                .run_single_task(task.into(), transactions, company)
                .await?;
            print_json(&outcome)
        }
        Command::Charts => {
            validate_inputs(&company, &transactions)?;
            let analysis = orchestrator.analysis_settings();
            let dashboard = ChartProjector::new(orchestrator.calculator()).dashboard(
                company.initial_capital,
                &transactions,
                analysis.chart_months,
                analysis.top_categories,
            );
            print_json(&dashboard)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Three months of ledger activity ending at `as_of`.
fn demo_request(name: &str, initial_capital: Decimal, as_of: NaiveDate) -> AnalysisRequest {
    let mut transactions = Vec::new();

    for back in (0..3u32).rev() {
        let Some(month) = as_of
            .checked_sub_months(Months::new(back))
            .and_then(|d| d.with_day0(0))
        else {
            continue;
        };
        let step = Decimal::from(3 - back);

        transactions.push(
            Transaction::income(month, Decimal::from(18_000) + step * Decimal::from(1_500), "Subscriptions")
                .with_description("Monthly recurring revenue"),
        );
        transactions.push(Transaction::expense(month, Decimal::from(21_000), "Salaries"));
        transactions.push(Transaction::expense(month, Decimal::from(4_500), "Rent"));
        transactions.push(Transaction::expense(
            month,
            Decimal::from(1_200) + step * Decimal::from(100),
            "Cloud Hosting",
        ));
        transactions.push(Transaction::expense(month, Decimal::from(800), "Marketing"));
    }

    AnalysisRequest {
        company: CompanyProfile::new(1, name, initial_capital),
        transactions,
    }
}
