//! Method dispatch for the UI bridge.
//!
//! Requests arrive as JSON-RPC envelopes from the untrusted UI. Credentials
//! may come from the request params or from the stored settings; either way
//! they are used here and never echoed back or logged.

use easel_core::{ImageSource, Secret, Settings, SettingsStore, Shape};
use easel_integrations::generation::DEFAULT_SIZE;
use easel_integrations::{
    ConsumerCredentials, GenerationClient, GenerationError, GenerationRequest, PhotoError,
    PhotoSearchClient, SignedSearchProxy,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::projects::{ProjectDir, ProjectDirError};
use crate::rpc::{
    JsonRpcRequest, JsonRpcResponse, INVALID_PARAMS, INVALID_REQUEST, JSONRPC_VERSION,
    METHOD_NOT_FOUND, OPERATION_FAILED,
};

/// Methods served by the bridge.
pub const METHODS: &[&str] = &[
    "config/read",
    "config/save",
    "icons/search",
    "photos/search",
    "image/generate",
    "project/save",
    "project/load",
    "project/list",
];

/// A failed bridge call.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Malformed envelope.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// Unknown method.
    #[error("Method not found: {0}")]
    MethodNotFound(String),
    /// Params missing or malformed.
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    /// The operation failed; the message is user-displayable.
    #[error("{0}")]
    Failed(String),
}

impl BridgeError {
    /// JSON-RPC error code for this failure.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidRequest(_) => INVALID_REQUEST,
            Self::MethodNotFound(_) => METHOD_NOT_FOUND,
            Self::InvalidParams(_) => INVALID_PARAMS,
            Self::Failed(_) => OPERATION_FAILED,
        }
    }
}

impl From<GenerationError> for BridgeError {
    fn from(err: GenerationError) -> Self {
        Self::Failed(err.to_string())
    }
}

impl From<PhotoError> for BridgeError {
    fn from(err: PhotoError) -> Self {
        Self::Failed(err.to_string())
    }
}

impl From<ProjectDirError> for BridgeError {
    fn from(err: ProjectDirError) -> Self {
        let message = err.to_string();
        match err {
            ProjectDirError::InvalidName(_) => Self::InvalidParams(message),
            _ => Self::Failed(message),
        }
    }
}

/// Remote service clients used by the bridge.
#[derive(Debug, Clone)]
pub struct Services {
    /// Noun Project search.
    pub icons: SignedSearchProxy,
    /// Unsplash search.
    pub photos: PhotoSearchClient,
    /// Replicate generation.
    pub generation: GenerationClient,
}

impl Services {
    /// Clients for the production APIs.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Failed`] if an HTTP client cannot be built.
    pub fn production() -> Result<Self, BridgeError> {
        Ok(Self {
            icons: SignedSearchProxy::new().map_err(|e| BridgeError::Failed(e.to_string()))?,
            photos: PhotoSearchClient::new()?,
            generation: GenerationClient::new()?,
        })
    }
}

#[derive(Deserialize)]
struct IconSearchParams {
    query: String,
    #[serde(default)]
    key: Option<Secret>,
    #[serde(default)]
    secret: Option<Secret>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhotoSearchParams {
    query: String,
    #[serde(default)]
    access_key: Option<Secret>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateParams {
    prompt: String,
    #[serde(default)]
    api_key: Option<Secret>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

#[derive(Deserialize)]
struct ProjectSaveParams {
    shapes: Vec<Shape>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct ProjectLoadParams {
    name: String,
}

/// A credential from the request, else the stored one.
fn pick(param: Option<Secret>, stored: &Secret) -> Secret {
    param
        .filter(|value| !value.is_blank())
        .unwrap_or_else(|| stored.clone())
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, BridgeError> {
    let params = if params.is_null() { json!({}) } else { params };
    serde_json::from_value(params).map_err(|e| BridgeError::InvalidParams(e.to_string()))
}

/// Settings as shown to the UI: secrets blanked, with configured flags.
fn redacted_settings(settings: &Settings) -> Value {
    let visible = Settings {
        replicate_api_token: Secret::default(),
        noun_project_secret: Secret::default(),
        ..settings.clone()
    };
    let mut value = serde_json::to_value(visible).unwrap_or_else(|_| json!({}));
    if let Some(map) = value.as_object_mut() {
        map.insert(
            "configured".to_string(),
            json!({
                "replicateApiToken": !settings.replicate_api_token.is_blank(),
                "nounProjectSecret": !settings.noun_project_secret.is_blank(),
            }),
        );
    }
    value
}

/// Dispatches bridge requests against settings, projects and services.
pub struct Bridge {
    store: SettingsStore,
    settings: RwLock<Settings>,
    projects: ProjectDir,
    services: Services,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("settings_path", &self.store.path())
            .field("projects", &self.projects.root())
            .finish_non_exhaustive()
    }
}

impl Bridge {
    /// Create a bridge, loading settings from `store`.
    ///
    /// Unreadable settings are logged and replaced with empty ones.
    #[must_use]
    pub fn new(store: SettingsStore, projects: ProjectDir, services: Services) -> Self {
        let settings = store.load().unwrap_or_else(|e| {
            warn!("Ignoring unreadable settings at {}: {e}", store.path().display());
            Settings::default()
        });
        Self {
            store,
            settings: RwLock::new(settings),
            projects,
            services,
        }
    }

    /// Backing settings store.
    #[must_use]
    pub fn settings_store(&self) -> &SettingsStore {
        &self.store
    }

    /// Project directory.
    #[must_use]
    pub fn projects(&self) -> &ProjectDir {
        &self.projects
    }

    /// Snapshot of the current settings.
    pub async fn settings(&self) -> Settings {
        self.settings.read().await.clone()
    }

    /// Handle one request. Errors become JSON-RPC error responses.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        debug!(method = %request.method, "Bridge request");
        let id = request.id.clone();
        match self.dispatch(request).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(err) => {
                debug!(code = err.code(), error = %err, "Bridge request failed");
                JsonRpcResponse::error(id, err.code(), err.to_string())
            }
        }
    }

    async fn dispatch(&self, request: JsonRpcRequest) -> Result<Value, BridgeError> {
        if request.jsonrpc != JSONRPC_VERSION {
            return Err(BridgeError::InvalidRequest(format!(
                "unsupported jsonrpc version {:?}",
                request.jsonrpc
            )));
        }
        let params = request.params;
        match request.method.as_str() {
            "config/read" => Ok(self.config_read().await),
            "config/save" => self.config_save(parse_params(params)?).await,
            "icons/search" => self.icons_search(parse_params(params)?).await,
            "photos/search" => self.photos_search(parse_params(params)?).await,
            "image/generate" => self.image_generate(parse_params(params)?).await,
            "project/save" => self.project_save(parse_params(params)?),
            "project/load" => self.project_load(parse_params(params)?),
            "project/list" => Ok(json!({ "projects": self.projects.list()? })),
            _ => Err(BridgeError::MethodNotFound(request.method)),
        }
    }

    async fn config_read(&self) -> Value {
        redacted_settings(&*self.settings.read().await)
    }

    async fn config_save(&self, incoming: Settings) -> Result<Value, BridgeError> {
        // The write guard is held across the file write so saves apply in order.
        let mut settings = self.settings.write().await;
        let merged = settings.clone().apply_update(incoming);

        let store = self.store.clone();
        let to_write = merged.clone();
        let written = tokio::task::spawn_blocking(move || store.save(&to_write)).await;

        match written {
            Ok(Ok(())) => {
                *settings = merged;
                Ok(json!({ "saved": true }))
            }
            Ok(Err(e)) => {
                warn!("Error saving settings to {}: {e}", self.store.path().display());
                Ok(json!({ "saved": false }))
            }
            Err(e) => {
                warn!("Settings write task failed: {e}");
                Ok(json!({ "saved": false }))
            }
        }
    }

    async fn icons_search(&self, params: IconSearchParams) -> Result<Value, BridgeError> {
        let credentials = {
            let settings = self.settings.read().await;
            ConsumerCredentials {
                key: pick(params.key, &settings.noun_project_key),
                secret: pick(params.secret, &settings.noun_project_secret),
            }
        };
        let document = self
            .services
            .icons
            .search(&params.query, &credentials)
            .await;
        Ok(document.into_value())
    }

    async fn photos_search(&self, params: PhotoSearchParams) -> Result<Value, BridgeError> {
        let access_key = pick(
            params.access_key,
            &self.settings.read().await.unsplash_access_key,
        );
        match self.services.photos.search(&params.query, &access_key).await {
            Ok(results) => Ok(json!({ "results": results })),
            Err(err) => Ok(json!({ "error": err.to_string() })),
        }
    }

    async fn image_generate(&self, params: GenerateParams) -> Result<Value, BridgeError> {
        let token = pick(
            params.api_key,
            &self.settings.read().await.replicate_api_token,
        );
        let request = GenerationRequest::new(params.prompt).with_size(
            params.width.unwrap_or(DEFAULT_SIZE),
            params.height.unwrap_or(DEFAULT_SIZE),
        );

        let image_url = self.services.generation.generate(&request, &token).await?;
        let shape = Shape::image(image_url.clone(), ImageSource::Generated);
        Ok(json!({ "imageUrl": image_url, "shape": shape }))
    }

    fn project_save(&self, params: ProjectSaveParams) -> Result<Value, BridgeError> {
        let name = self.projects.save(params.name.as_deref(), &params.shapes)?;
        Ok(json!({ "saved": true, "name": name }))
    }

    fn project_load(&self, params: ProjectLoadParams) -> Result<Value, BridgeError> {
        let shapes = self.projects.load(&params.name)?;
        Ok(json!({ "shapes": shapes }))
    }
}
