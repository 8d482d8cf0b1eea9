//! REST API Server for the cash horizon engine
//!
//! Thin HTTP surface over the orchestrator: run a workflow, run a single
//! analysis, build dashboard series and fetch audited runs.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::charts::ChartProjector;
use crate::error::OrchestrationError;
use crate::models::{CompanyProfile, TaskKind, Transaction, WorkflowPolicy};
use crate::orchestrator::{validate_inputs, WorkflowOrchestrator};

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WorkflowRequest {
    pub company: CompanyProfile,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    /// "sequential" (default) or "parallel"
    pub policy: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AnalysisRequest {
    pub company: CompanyProfile,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

type ApiResult = (StatusCode, Json<ApiResponse>);

fn ok<T: Serialize>(data: T) -> ApiResult {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

fn failed(error: OrchestrationError) -> ApiResult {
    let status = if error.is_fatal() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    warn!(%status, error = %error, "Request failed");
    (status, Json(ApiResponse::error(error.to_string())))
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<WorkflowOrchestrator>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Analysis Endpoints
/// =============================

async fn run_workflow(
    State(state): State<ApiState>,
    Json(req): Json<WorkflowRequest>,
) -> ApiResult {
    let policy = match req.policy.as_deref().map(WorkflowPolicy::from_str).transpose() {
        Ok(policy) => policy.unwrap_or_default(),
        Err(e) => return failed(e),
    };

    info!(
        company_id = req.company.id,
        policy = %policy,
        transactions = req.transactions.len(),
        "Received workflow request"
    );

    match state
        .orchestrator
        .run_workflow(req.transactions, req.company, policy)
        .await
    {
        Ok(report) => ok(report),
        Err(e) => failed(e),
    }
}

async fn run_task(
    State(state): State<ApiState>,
    Path(task): Path<String>,
    Json(req): Json<AnalysisRequest>,
) -> ApiResult {
    let kind = match TaskKind::from_str(&task) {
        Ok(kind) => kind,
        Err(e) => return failed(e),
    };

    info!(company_id = req.company.id, task = %kind, "Received single task request");

    match state
        .orchestrator
        .run_single_task(kind, req.transactions, req.company)
        .await
    {
        Ok(outcome) => ok(outcome),
        Err(e) => failed(e),
    }
}

async fn dashboard(
    State(state): State<ApiState>,
    Json(req): Json<AnalysisRequest>,
) -> ApiResult {
    if let Err(e) = validate_inputs(&req.company, &req.transactions) {
        return failed(e);
    }

    let settings = state.orchestrator.analysis_settings();
    let projector = ChartProjector::new(state.orchestrator.calculator());

    ok(projector.dashboard(
        req.company.initial_capital,
        &req.transactions,
        settings.chart_months,
        settings.top_categories,
    ))
}

async fn get_run(State(state): State<ApiState>, Path(run_id): Path<String>) -> ApiResult {
    let Ok(run_id) = Uuid::parse_str(&run_id) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(format!("Invalid run id '{}'", run_id))),
        );
    };

    match state.orchestrator.audit_log().get(run_id).await {
        Ok(Some(record)) => ok(record.report.as_ref()),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Run {} not found", run_id))),
        ),
        Err(e) => failed(e),
    }
}

async fn list_runs(State(state): State<ApiState>, Path(company_id): Path<i64>) -> ApiResult {
    match state.orchestrator.audit_log().list_for_company(company_id).await {
        Ok(run_ids) => ok(serde_json::json!({
            "company_id": company_id,
            "run_ids": run_ids,
        })),
        Err(e) => failed(e),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<WorkflowOrchestrator>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/analysis/workflow", post(run_workflow))
        .route("/api/v1/analysis/tasks/:task", post(run_task))
        .route("/api/v1/analysis/runs/:run_id", get(get_run))
        .route("/api/v1/companies/:company_id/runs", get(list_runs))
        .route("/api/v1/charts/dashboard", post(dashboard))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    orchestrator: Arc<WorkflowOrchestrator>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::summarizer::MockSummarizer;
    use crate::tasks::test_support::{date, input};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router() -> Router {
        let orchestrator =
            WorkflowOrchestrator::new(Arc::new(MockSummarizer::new()), &Settings::default())
                .with_as_of(date(2024, 6, 15));
        create_router(Arc::new(orchestrator))
    }

    fn payload(initial_capital: i64) -> Value {
        let data = input(initial_capital);
        json!({"company": data.company, "transactions": data.transactions})
    }

    async fn send(router: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(router(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_workflow_then_fetch_run() {
        let app = router();
        let mut body = payload(200_000);
        body["policy"] = json!("parallel");

        let (status, response) =
            send(app.clone(), "POST", "/api/v1/analysis/workflow", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["success"], true);
        assert_eq!(response["data"]["state"], "completed");
        assert_eq!(response["data"]["summary"]["runway_months"], 17.0);

        let run_id = response["data"]["run_id"].as_str().unwrap().to_string();
        let (status, fetched) =
            send(app.clone(), "GET", &format!("/api/v1/analysis/runs/{}", run_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["data"]["run_id"], run_id.as_str());

        let (status, listed) = send(app.clone(), "GET", "/api/v1/companies/1/runs", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["data"]["run_ids"], json!([run_id]));

        let (status, _) = send(
            app,
            "GET",
            &format!("/api/v1/analysis/runs/{}", Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_policy_is_bad_request() {
        let mut body = payload(200_000);
        body["policy"] = json!("round_robin");

        let (status, response) =
            send(router(), "POST", "/api/v1/analysis/workflow", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["success"], false);
        assert!(response["error"].as_str().unwrap().contains("round_robin"));
    }

    #[tokio::test]
    async fn test_invalid_transaction_is_bad_request() {
        let mut body = payload(200_000);
        body["transactions"][0]["category"] = json!("  ");

        let (status, _) = send(router(), "POST", "/api/v1/analysis/workflow", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_single_task() {
        let (status, response) = send(
            router(),
            "POST",
            "/api/v1/analysis/tasks/investment",
            Some(payload(50_000)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["data"]["status"], "success");
        assert_eq!(response["data"]["computed_facts"]["plan"]["mode"], "stabilization");

        let (status, _) = send(
            router(),
            "POST",
            "/api/v1/analysis/tasks/astrology",
            Some(payload(50_000)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_dashboard() {
        let (status, response) =
            send(router(), "POST", "/api/v1/charts/dashboard", Some(payload(100_000))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["data"]["burn_history"]["points"].as_array().unwrap().len(), 3);
        assert_eq!(response["data"]["expense_breakdown"]["slices"][0]["category"], "Salaries");
    }

    #[tokio::test]
    async fn test_malformed_run_id() {
        let (status, _) = send(router(), "GET", "/api/v1/analysis/runs/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
