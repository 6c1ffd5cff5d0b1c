//! # Easel Host Library
//!
//! The privileged side of Easel. The editor UI cannot hold credentials or
//! call third-party APIs itself; it posts JSON-RPC requests to `/rpc` on
//! localhost and the host performs the signed and authenticated calls.
//!
//! This library is used by both the binary and integration tests.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use clap::Parser;
use easel_bridge::{Bridge, ProjectDir, Services};
use easel_core::SettingsStore;
use easel_integrations::{GenerationClient, PhotoSearchClient, PollPolicy, SignedSearchProxy};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

pub mod health;
pub mod metrics;
pub mod routes;
pub mod validation;

/// Default port for the local host.
pub const DEFAULT_PORT: u16 = 9474;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Bridge that serves the UI's requests.
    pub bridge: Arc<Bridge>,
}

impl AppState {
    /// Wrap a bridge.
    #[must_use]
    pub fn new(bridge: Bridge) -> Self {
        Self {
            bridge: Arc::new(bridge),
        }
    }
}

/// Command-line arguments for easel-host.
#[derive(Debug, Clone, Parser)]
#[command(name = "easel-host")]
#[command(about = "Local host for the Easel editor: signed icon search, photo search and image generation")]
#[command(version)]
pub struct CliArgs {
    /// Port to listen on (localhost only).
    #[arg(long, env = "EASEL_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Settings document path. Defaults to the platform config directory.
    #[arg(long, env = "EASEL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory for saved projects. Defaults to the platform data directory.
    #[arg(long, env = "EASEL_PROJECTS_DIR")]
    pub projects_dir: Option<PathBuf>,

    /// Override the Noun Project API base URL.
    #[arg(long, env = "EASEL_NOUN_PROJECT_URL")]
    pub noun_project_url: Option<String>,

    /// Override the Unsplash API base URL.
    #[arg(long, env = "EASEL_UNSPLASH_URL")]
    pub unsplash_url: Option<String>,

    /// Override the Replicate API base URL.
    #[arg(long, env = "EASEL_REPLICATE_URL")]
    pub replicate_url: Option<String>,

    /// Delay between generation status polls, in milliseconds.
    #[arg(long, env = "EASEL_POLL_INTERVAL_MS", default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// Maximum generation status polls. 0 polls until the job ends.
    #[arg(long, env = "EASEL_POLL_MAX_ATTEMPTS", default_value_t = 600)]
    pub poll_max_attempts: u32,

    /// Give up on a generation after this many seconds.
    #[arg(long, env = "EASEL_POLL_TIMEOUT_SECS")]
    pub poll_timeout_secs: Option<u64>,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No `--config` given and no platform config directory exists.
    #[error("no config directory available; pass --config")]
    NoConfigDir,
    /// No `--projects-dir` given and no platform data directory exists.
    #[error("no data directory available; pass --projects-dir")]
    NoProjectsDir,
    /// A service client could not be built.
    #[error("{service} client: {message}")]
    Service {
        /// Which service.
        service: &'static str,
        /// What went wrong.
        message: String,
    },
}

/// Resolved host configuration.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Listen port.
    pub port: u16,
    /// Settings document path.
    pub settings_path: PathBuf,
    /// Project directory.
    pub projects_dir: PathBuf,
    /// Noun Project base URL override.
    pub noun_project_url: Option<String>,
    /// Unsplash base URL override.
    pub unsplash_url: Option<String>,
    /// Replicate base URL override.
    pub replicate_url: Option<String>,
    /// Generation poll bounds.
    pub poll_policy: PollPolicy,
}

impl HostConfig {
    /// Resolve configuration from parsed arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a default location is needed but the
    /// platform has none.
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let settings_path = match args.config {
            Some(path) => path,
            None => SettingsStore::default_path().ok_or(ConfigError::NoConfigDir)?,
        };
        let projects_dir = match args.projects_dir {
            Some(path) => path,
            None => easel_core::default_projects_dir().ok_or(ConfigError::NoProjectsDir)?,
        };
        let poll_policy = PollPolicy {
            interval: Duration::from_millis(args.poll_interval_ms),
            max_attempts: (args.poll_max_attempts > 0).then_some(args.poll_max_attempts),
            timeout: args.poll_timeout_secs.map(Duration::from_secs),
        };
        Ok(Self {
            port: args.port,
            settings_path,
            projects_dir,
            noun_project_url: args.noun_project_url,
            unsplash_url: args.unsplash_url,
            replicate_url: args.replicate_url,
            poll_policy,
        })
    }

    /// Build the remote service clients.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Service`] if a base URL is malformed or an
    /// HTTP client cannot be built.
    pub fn build_services(&self) -> Result<Services, ConfigError> {
        fn service<E: std::fmt::Display>(service: &'static str) -> impl FnOnce(E) -> ConfigError {
            move |err| ConfigError::Service {
                service,
                message: err.to_string(),
            }
        }

        let icons = match &self.noun_project_url {
            Some(url) => SignedSearchProxy::with_base_url(url),
            None => SignedSearchProxy::new(),
        }
        .map_err(service("noun project"))?;
        let photos = match &self.unsplash_url {
            Some(url) => PhotoSearchClient::with_base_url(url),
            None => PhotoSearchClient::new(),
        }
        .map_err(service("unsplash"))?;
        let generation = match &self.replicate_url {
            Some(url) => GenerationClient::with_base_url(url),
            None => GenerationClient::new(),
        }
        .map_err(service("replicate"))?
        .with_policy(self.poll_policy.clone());

        Ok(Services {
            icons,
            photos,
            generation,
        })
    }

    /// Build the bridge: settings store, project directory and clients.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Service`] if a client cannot be built.
    pub fn build_bridge(&self) -> Result<Bridge, ConfigError> {
        Ok(Bridge::new(
            SettingsStore::new(&self.settings_path),
            ProjectDir::new(&self.projects_dir),
            self.build_services()?,
        ))
    }
}

/// Build a CORS layer that only allows localhost origins.
///
/// The editor UI is served from a local dev server or the host itself.
#[must_use]
pub fn build_cors_layer(port: u16) -> CorsLayer {
    let localhost_origins = [
        format!("http://localhost:{port}"),
        format!("http://127.0.0.1:{port}"),
        // Common dev server ports
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(), // Vite
        "http://localhost:8080".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://127.0.0.1:5173".to_string(),
        "http://127.0.0.1:8080".to_string(),
    ];

    let origins: Vec<HeaderValue> = localhost_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

/// Prometheus metrics endpoint.
#[tracing::instrument(name = "metrics", skip(handle))]
async fn metrics_handler(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

/// Build the application router.
#[must_use]
pub fn router(state: AppState, metrics_handle: PrometheusHandle, port: u16) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    Router::new()
        .merge(metrics_router)
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/health", get(health::readiness))
        .route("/rpc", post(routes::rpc_handler))
        .layer(DefaultBodyLimit::max(validation::MAX_RPC_BODY_BYTES))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(build_cors_layer(port))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
