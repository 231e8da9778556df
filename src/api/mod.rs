//! REST interface to the dashboard reports.
//!
//! Every route except the health check sits behind Basic auth; the
//! middleware attaches the [`AuthenticatedUser`] to the request and records
//! the visited page in the user's usage session.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod handlers;
pub mod service;

pub use service::DashboardService;

use crate::auth::{authenticate, AuthenticatedUser, Credentials};
use handlers::{error_response, ErrorResponse};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DashboardService>,
    pub credentials: Arc<Vec<Credentials>>,
}

impl AppState {
    pub fn new(service: DashboardService, credentials: Vec<Credentials>) -> Self {
        Self {
            service: Arc::new(service),
            credentials: Arc::new(credentials),
        }
    }
}

const API_PREFIX: &str = "/api/v1/";
const LOGOUT_PAGE: &str = "logout";
/// Largest accepted export. Other routes keep axum's 2 MB default.
const UPLOAD_BODY_LIMIT: usize = 64 * 1024 * 1024;

async fn require_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let user: AuthenticatedUser = match authenticate(&state.credentials, header_value) {
        Ok(user) => user,
        Err(e) => {
            let (status, body): (StatusCode, Json<ErrorResponse>) = error_response(e);
            let mut response = (status, body).into_response();
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"operations\""),
            );
            return response;
        }
    };

    let path = request.uri().path();
    let page = path.strip_prefix(API_PREFIX).unwrap_or(path).to_string();
    // Logging out closes the session; it must not open one.
    if page != LOGOUT_PAGE {
        state.service.record_visit(&user.username, &page).await;
    }

    request.extensions_mut().insert(user);
    next.run(request).await
}

pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .route("/api/v1/stats", get(handlers::get_stats))
        // Reports
        .route("/api/v1/reports/summary", get(handlers::get_summary))
        .route("/api/v1/reports/capacity", get(handlers::get_capacity))
        .route("/api/v1/reports/workload", get(handlers::get_workload))
        .route("/api/v1/reports/flow", get(handlers::get_flow))
        .route("/api/v1/reports/assignment", get(handlers::get_assignment))
        .route("/api/v1/reports/cycle-times", get(handlers::get_cycle_times))
        .route("/api/v1/reports/bottlenecks", get(handlers::get_bottlenecks))
        .route("/api/v1/reports/forecast", get(handlers::get_forecast))
        // Loads
        .route("/api/v1/loads/latest", get(handlers::get_latest_load))
        .route(
            "/api/v1/uploads/analyze",
            post(handlers::analyze_upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/api/v1/uploads",
            post(handlers::load_upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        // Admin
        .route("/api/v1/admin/usage", get(handlers::get_usage))
        .route("/api/v1/admin/sessions", get(handlers::get_sessions))
        .route("/api/v1/logout", post(handlers::logout))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/api/v1/health", get(handlers::health))
        .merge(protected)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
