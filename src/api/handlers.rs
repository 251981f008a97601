//! HTTP API handlers.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use super::binding::HandlerSet;
use crate::metrics;
use crate::probe::DependencyProbe;

/// Operation id of the health endpoint in the contract.
pub const GET_HEALTHZ: &str = "getHealthz";

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// Downstream health check.
    pub probe: Arc<dyn DependencyProbe>,
}

impl AppState {
    /// Create new app state.
    pub fn new(probe: Arc<dyn DependencyProbe>) -> Self {
        Self { probe }
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("probe", &self.probe.name())
            .finish()
    }
}

/// Health status reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Unhealthy,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok` or `unhealthy`.
    pub status: HealthStatus,
    /// Probe diagnostic, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
}

/// Health check handler - probes the dependency on every call.
///
/// Returns 200 when healthy, 503 with the probe detail otherwise.
pub async fn get_healthz(State(state): State<AppState>) -> impl IntoResponse {
    let result = {
        let _timer = metrics::timer_probe();
        state.probe.check().await
    };
    metrics::inc_probe_checks(state.probe.name(), result.status);

    if result.is_healthy() {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: HealthStatus::Ok,
                detail: result.detail,
            }),
        )
    } else {
        warn!(
            probe = state.probe.name(),
            detail = result.detail.as_deref().unwrap_or(""),
            "Dependency probe reported unhealthy"
        );
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: HealthStatus::Unhealthy,
                detail: result.detail,
            }),
        )
    }
}

/// Handlers for every operation in the bundled contract.
pub fn handler_set() -> HandlerSet<AppState> {
    HandlerSet::new().register(GET_HEALTHZ, get_healthz)
}

/// Fallback for paths the contract does not declare.
pub async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("no route for {}", uri.path()),
        }),
    )
}

/// Turn a handler panic into a 500 response.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!(panic = %message, "Handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "internal server error".to_string(),
        }),
    )
        .into_response()
}
