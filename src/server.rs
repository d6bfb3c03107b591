// 🌐 JSON API - read-only view of the dashboard
//
// Every request re-runs the whole pipeline from the configured files, so a
// refreshed export shows up on the next call.

use crate::config::Config;
use crate::pipeline::{self, Dashboard};
use crate::report::{BranchStat, MonthStat, SellerStat};
use crate::table::Value;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

/// Shared application state
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    /// Not every branch has a file yet
    waiting: bool,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            waiting: false,
        }
    }

    fn waiting(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            waiting: true,
        }
    }

    fn failed(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            waiting: false,
        }
    }
}

/// KPI response
#[derive(Serialize)]
struct KpiResponse {
    currency: String,
    total_amount: f64,
    row_count: usize,
    seller_count: usize,
    date_range: Option<String>,
    by_branch: Vec<BranchStat>,
    by_month: Vec<MonthStat>,
    fingerprint: String,
}

impl KpiResponse {
    fn new(dashboard: &Dashboard, currency: &str) -> Self {
        let summary = &dashboard.summary;
        Self {
            currency: currency.to_string(),
            total_amount: summary.total_amount,
            row_count: summary.row_count,
            seller_count: summary.seller_count,
            date_range: summary.date_range.map(|r| r.display()),
            by_branch: summary.by_branch.clone(),
            by_month: summary.by_month.clone(),
            fingerprint: dashboard.kpis.fingerprint(),
        }
    }
}

/// Records in table form: column names once, then one array per row
#[derive(Serialize)]
struct RecordsResponse {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Run the pipeline off the async runtime and map its outcome
async fn load_dashboard(state: &AppState) -> Result<Dashboard, Response> {
    let config = state.config.clone();
    let result = tokio::task::spawn_blocking(move || pipeline::run(&config)).await;

    match result {
        Ok(Ok(dashboard)) => Ok(dashboard),
        Ok(Err(e)) if e.is_waiting() => {
            Err((StatusCode::OK, Json(ApiResponse::<()>::waiting(e.to_string()))).into_response())
        }
        Ok(Err(e)) => {
            error!("Pipeline failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::failed(e.to_string())),
            )
                .into_response())
        }
        Err(e) => {
            error!("Pipeline task panicked: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::failed("Internal error".to_string())),
            )
                .into_response())
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/kpis - Scalars, branch and month series
async fn get_kpis(State(state): State<AppState>) -> Response {
    match load_dashboard(&state).await {
        Ok(dashboard) => {
            let response = KpiResponse::new(&dashboard, &state.config.currency);
            (StatusCode::OK, Json(ApiResponse::ok(response))).into_response()
        }
        Err(response) => response,
    }
}

/// GET /api/sellers - Sales per (branch, salesperson), best first
async fn get_sellers(State(state): State<AppState>) -> Response {
    match load_dashboard(&state).await {
        Ok(dashboard) => {
            let sellers: Vec<SellerStat> = dashboard.summary.by_seller;
            (StatusCode::OK, Json(ApiResponse::ok(sellers))).into_response()
        }
        Err(response) => response,
    }
}

/// GET /api/records - The full consolidated table
async fn get_records(State(state): State<AppState>) -> Response {
    match load_dashboard(&state).await {
        Ok(dashboard) => {
            let (columns, rows) = dashboard.table.into_parts();
            let response = RecordsResponse { columns, rows };
            (StatusCode::OK, Json(ApiResponse::ok(response))).into_response()
        }
        Err(response) => response,
    }
}

/// GET /api/branches/:label - Records of a single branch
async fn get_branch_records(
    State(state): State<AppState>,
    Path(label): Path<String>,
) -> Response {
    // Decode URL-encoded label ("Yaound%C3%A9")
    let decoded_label = urlencoding::decode(&label)
        .unwrap_or_else(|_| label.clone().into())
        .into_owned();

    if !state.config.branches.iter().any(|b| b.label == decoded_label) {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::failed(format!(
                "Unknown branch: {}",
                decoded_label
            ))),
        )
            .into_response();
    }

    match load_dashboard(&state).await {
        Ok(dashboard) => {
            let filtered = dashboard
                .table
                .filter_eq(&state.config.columns.origin, &Value::text(decoded_label));
            let (columns, rows) = filtered.into_parts();
            (
                StatusCode::OK,
                Json(ApiResponse::ok(RecordsResponse { columns, rows })),
            )
                .into_response()
        }
        Err(response) => response,
    }
}

// ============================================================================
// Router
// ============================================================================

pub fn router(config: Config) -> Router {
    let state = AppState {
        config: Arc::new(config),
    };

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/kpis", get(get_kpis))
        .route("/sellers", get(get_sellers))
        .route("/records", get(get_records))
        .route("/branches/:label", get(get_branch_records))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
