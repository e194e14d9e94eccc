//! REST API server for the research agent
//!
//! Exposes research runs, stored memory and audited reports over HTTP.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::ResearchAgent;
use crate::error::ResearchError;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResearchRequest {
    pub symbol: String,
    pub max_refinements: Option<u32>,
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

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub agent: Arc<ResearchAgent>,
    pub default_max_refinements: u32,
}

fn error_status(error: &ResearchError) -> StatusCode {
    match error {
        ResearchError::InvalidPlan(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
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
/// Research Endpoint
/// =============================

async fn run_research(
    State(state): State<ApiState>,
    Json(req): Json<ResearchRequest>,
) -> ApiResult {
    let max_refinements = req.max_refinements.unwrap_or(state.default_max_refinements);
    info!(symbol = %req.symbol, max_refinements, "Received research request");

    match state.agent.research(&req.symbol, max_refinements).await {
        Ok(report) => (StatusCode::OK, Json(ApiResponse::success(report))),
        Err(e) => {
            warn!(symbol = %req.symbol, error = %e, "Research failed");
            (
                error_status(&e),
                Json(ApiResponse::error(format!("Research failed: {}", e))),
            )
        }
    }
}

/// =============================
/// Memory Endpoint
/// =============================

async fn get_memory(State(state): State<ApiState>, Path(symbol): Path<String>) -> ApiResult {
    let symbol = symbol.to_uppercase();

    match state.agent.memory().load().await {
        Ok(memory) => {
            let runs: Vec<_> = memory.runs_for(&symbol).cloned().collect();
            (
                StatusCode::OK,
                Json(ApiResponse::success(serde_json::json!({
                    "symbol": symbol,
                    "insights": memory.insights_for(&symbol),
                    "runs": runs,
                }))),
            )
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Memory unavailable: {}", e))),
        ),
    }
}

/// =============================
/// Report Endpoint
/// =============================

async fn get_report(State(state): State<ApiState>, Path(report_id): Path<String>) -> ApiResult {
    let report_id = match Uuid::parse_str(&report_id) {
        Ok(id) => id,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error(format!("Invalid report id: {}", e))),
            )
        }
    };

    let audit_log = state.agent.audit_log();
    match audit_log.get(report_id).await {
        Ok(Some(record)) => {
            let verified = audit_log.verify_integrity(report_id).await.unwrap_or(false);
            (
                StatusCode::OK,
                Json(ApiResponse::success(serde_json::json!({
                    "report": record.report.as_ref(),
                    "fingerprint": record.fingerprint,
                    "verified": verified,
                    "execution_time_ms": record.execution_time_ms,
                }))),
            )
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Report {} not found", report_id))),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(e.to_string())),
        ),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(agent: Arc<ResearchAgent>, default_max_refinements: u32) -> Router {
    let state = ApiState {
        agent,
        default_max_refinements,
    };

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/research", post(run_research))
        .route("/api/v1/memory/:symbol", get(get_memory))
        .route("/api/v1/reports/:report_id", get(get_report))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    agent: Arc<ResearchAgent>,
    default_max_refinements: u32,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(agent, default_max_refinements);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResearchConfig;
    use crate::execution::ExecutionEngine;
    use crate::memory::InMemoryMemoryStore;
    use crate::planner::AdaptivePlanner;
    use crate::tools::create_default_registry;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tower::ServiceExt;

    fn router() -> Router {
        let registry = create_default_registry(&ResearchConfig::default()).unwrap();
        let agent = ResearchAgent::new(
            Box::new(AdaptivePlanner),
            ExecutionEngine::new(registry, false),
            Arc::new(InMemoryMemoryStore::new()),
        );
        create_router(Arc::new(agent), 2)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_research_then_fetch_memory_and_report() {
        let app = router();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/research")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"symbol":"aapl","max_refinements":1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["symbol"], "AAPL");
        let report_id = body["data"]["report_id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/memory/aapl")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        let insights = body["data"]["insights"].as_array().unwrap();
        assert!(insights.iter().any(|i| i == "earnings_preview_needed"));
        assert_eq!(body["data"]["runs"].as_array().unwrap().len(), 1);

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/reports/{}", report_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["data"]["verified"], true);
    }

    #[tokio::test]
    async fn test_blank_symbol_is_bad_request() {
        let response = router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/research")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"symbol":"  "}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_report_ids() {
        let app = router();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/reports/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/reports/not-a-uuid")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
