//! REST API handlers for the operations dashboard.
//!
//! These handlers use the shared DashboardService.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::auth::AuthenticatedUser;
use crate::error::OpsError;
use crate::export::to_csv;
use crate::reports::ReportFilter;

// ============================================================================
// Errors
// ============================================================================

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);
pub type ApiResult<T> = Result<T, ApiError>;

pub fn status_for(e: &OpsError) -> StatusCode {
    match e {
        OpsError::MalformedInput(_) | OpsError::InvalidArgument(_) | OpsError::Csv(_) => StatusCode::BAD_REQUEST,
        OpsError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        OpsError::Forbidden(_) => StatusCode::FORBIDDEN,
        OpsError::InsufficientHistory(_) => StatusCode::UNPROCESSABLE_ENTITY,
        e if e.is_store_failure() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_response(e: OpsError) -> ApiError {
    let status = status_for(&e);
    if status.is_server_error() {
        tracing::error!("Request failed: {}", e);
    }
    (status, Json(ErrorResponse { error: e.to_string() }))
}

// ============================================================================
// Query parameters
// ============================================================================

/// Filter and output options shared by the report endpoints. Each list is
/// comma-separated; present-but-empty selects nothing.
#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub years: Option<String>,
    pub months: Option<String>,
    pub types: Option<String>,
    pub handlers: Option<String>,
    pub format: Option<String>,
    pub horizon: Option<u32>,
}

impl ReportQuery {
    pub fn filter(&self) -> Result<ReportFilter, OpsError> {
        ReportFilter::from_lists(
            self.years.as_deref(),
            self.months.as_deref(),
            self.types.as_deref(),
            self.handlers.as_deref(),
        )
    }

    fn wants_csv(&self) -> bool {
        self.format.as_deref().is_some_and(|f| f.eq_ignore_ascii_case("csv"))
    }
}

/// JSON body, or the report's main table as a CSV attachment.
fn respond<T: Serialize, R: Serialize>(query: &ReportQuery, name: &str, body: &T, table: &[R]) -> ApiResult<Response> {
    if query.wants_csv() {
        let bytes = to_csv(table).map_err(error_response)?;
        let disposition = format!("attachment; filename=\"{}.csv\"", name);
        Ok((
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            bytes,
        )
            .into_response())
    } else {
        Ok(Json(body).into_response())
    }
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

pub async fn get_stats(State(state): State<AppState>, Query(query): Query<ReportQuery>) -> ApiResult<Response> {
    let filter = query.filter().map_err(error_response)?;
    let stats = state.service.stats(&filter).await.map_err(error_response)?;
    respond(&query, "stats", &*stats, std::slice::from_ref(&*stats))
}

pub async fn get_summary(State(state): State<AppState>, Query(query): Query<ReportQuery>) -> ApiResult<Response> {
    let filter = query.filter().map_err(error_response)?;
    let summary = state.service.summary(&filter).await.map_err(error_response)?;
    respond(&query, "summary", &*summary, &summary.by_handler_type)
}

pub async fn get_capacity(State(state): State<AppState>, Query(query): Query<ReportQuery>) -> ApiResult<Response> {
    let filter = query.filter().map_err(error_response)?;
    let rows = state.service.capacity(&filter).await.map_err(error_response)?;
    respond(&query, "capacity", &*rows, rows.as_slice())
}

pub async fn get_workload(State(state): State<AppState>, Query(query): Query<ReportQuery>) -> ApiResult<Response> {
    let filter = query.filter().map_err(error_response)?;
    let balance = state.service.workload(&filter).await.map_err(error_response)?;
    respond(&query, "workload", &*balance, &balance.handlers)
}

pub async fn get_flow(State(state): State<AppState>, Query(query): Query<ReportQuery>) -> ApiResult<Response> {
    let filter = query.filter().map_err(error_response)?;
    let rows = state.service.flow(&filter).await.map_err(error_response)?;
    respond(&query, "flow", &*rows, rows.as_slice())
}

pub async fn get_assignment(State(state): State<AppState>, Query(query): Query<ReportQuery>) -> ApiResult<Response> {
    let filter = query.filter().map_err(error_response)?;
    let rows = state.service.assignment(&filter).await.map_err(error_response)?;
    respond(&query, "assignment", &*rows, rows.as_slice())
}

pub async fn get_cycle_times(State(state): State<AppState>, Query(query): Query<ReportQuery>) -> ApiResult<Response> {
    let filter = query.filter().map_err(error_response)?;
    let report = state.service.cycle_times(&filter).await.map_err(error_response)?;
    respond(&query, "cycle_times", &*report, &report.standards)
}

pub async fn get_bottlenecks(State(state): State<AppState>, Query(query): Query<ReportQuery>) -> ApiResult<Response> {
    let filter = query.filter().map_err(error_response)?;
    let report = state.service.bottlenecks(&filter).await.map_err(error_response)?;
    respond(&query, "bottlenecks", &*report, &report.top_handlers)
}

pub async fn get_forecast(State(state): State<AppState>, Query(query): Query<ReportQuery>) -> ApiResult<Response> {
    let filter = query.filter().map_err(error_response)?;
    let horizon = query.horizon.unwrap_or(90);
    let forecast = state
        .service
        .forecast(&filter, horizon)
        .await
        .map_err(error_response)?;
    respond(&query, "forecast", &*forecast, &forecast.points)
}

pub async fn get_latest_load(State(state): State<AppState>) -> ApiResult<Response> {
    let entry = state.service.latest_load().await.map_err(error_response)?;
    Ok(Json(entry).into_response())
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub source: Option<String>,
}

impl UploadQuery {
    fn source(&self) -> &str {
        self.source.as_deref().unwrap_or("upload.csv")
    }
}

pub async fn analyze_upload(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> ApiResult<Response> {
    user.require_admin().map_err(error_response)?;
    let batch = state
        .service
        .analyze_upload(&body, query.source())
        .await
        .map_err(error_response)?;
    Ok(Json(serde_json::json!({
        "summary": batch.summary(),
        "internal_duplicates": batch.duplicate_rows(),
    }))
    .into_response())
}

pub async fn load_upload(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> ApiResult<Response> {
    user.require_admin().map_err(error_response)?;
    let result = state
        .service
        .load_upload(&body, query.source())
        .await
        .map_err(error_response)?;
    tracing::info!("{} loaded {} ({} new)", user.username, query.source(), result.outcome.inserted);
    Ok((StatusCode::CREATED, Json(result)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    pub days: Option<u32>,
    pub limit: Option<usize>,
}

pub async fn get_usage(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<UsageQuery>,
) -> ApiResult<Response> {
    user.require_admin().map_err(error_response)?;
    let summary = state
        .service
        .usage(query.days.unwrap_or(30))
        .await
        .map_err(error_response)?;
    Ok(Json(summary).into_response())
}

pub async fn get_sessions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<UsageQuery>,
) -> ApiResult<Response> {
    user.require_admin().map_err(error_response)?;
    let sessions = state
        .service
        .recent_sessions(query.limit.unwrap_or(20))
        .await
        .map_err(error_response)?;
    Ok(Json(sessions).into_response())
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Response> {
    let session = state.service.logout(&user.username).await.map_err(error_response)?;
    Ok(Json(serde_json::json!({ "session": session })).into_response())
}
