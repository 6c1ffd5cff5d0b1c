//! Health check endpoints.
//!
//! - `/health/live` - the process is up
//! - `/health/ready` - settings are readable and the bridge can serve
//! - `/health` - same as ready

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::AppState;

/// Health status response.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// Overall status: "healthy" or "unhealthy"
    pub status: &'static str,
    /// Host version
    pub version: &'static str,
    /// Individual component checks
    pub checks: HealthChecks,
}

/// Individual health checks.
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    /// Settings document readable (a missing file counts as readable)
    pub settings: bool,
    /// Projects directory usable
    pub projects: bool,
}

impl HealthStatus {
    fn from_checks(checks: HealthChecks) -> Self {
        let healthy = checks.settings && checks.projects;
        Self {
            status: if healthy { "healthy" } else { "unhealthy" },
            version: env!("CARGO_PKG_VERSION"),
            checks,
        }
    }

    fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Liveness probe.
#[tracing::instrument(name = "liveness_probe")]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe.
///
/// Returns 503 when the settings document cannot be parsed or the projects
/// directory exists but cannot be listed.
#[tracing::instrument(name = "readiness_probe", skip(state))]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    let settings_ok = state.bridge.settings_store().load().is_ok();
    let projects_ok = state.bridge.projects().list().is_ok();

    let status = HealthStatus::from_checks(HealthChecks {
        settings: settings_ok,
        projects: projects_ok,
    });

    let code = if status.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(status))
}
