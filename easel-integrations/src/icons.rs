//! Noun Project icon search behind an OAuth 1.0a signing proxy.
//!
//! The proxy takes a search term and a consumer key/secret pair, signs a
//! `GET <base>/icons/<term>?limit=20` and relays the provider's JSON body.
//! Failures are folded into a `{"error": "..."}` document by
//! [`SignedSearchProxy::search`]; [`SignedSearchProxy::try_search`] keeps the
//! typed [`SearchError`].

use std::sync::Arc;

use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

use crate::oauth::{
    percent_encode, sign_request, ConsumerCredentials, NonceSource, SignedRequest, SigningError,
    SystemNonceSource,
};

/// Production Noun Project API origin.
pub const DEFAULT_BASE_URL: &str = "https://api.thenounproject.com";

/// Number of icons requested per search.
pub const SEARCH_LIMIT: u32 = 20;

const ERROR_FIELD: &str = "error";
const ITEMS_FIELD: &str = "items";
const PROVIDER_ITEMS_FIELD: &str = "icons";

/// Errors that can occur during a signed search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The consumer key or secret is empty.
    #[error("Missing credentials")]
    MissingCredentials,
    /// The OAuth signature could not be computed.
    #[error(transparent)]
    Signature(#[from] SigningError),
    /// The provider answered with a non-2xx status.
    #[error("API Error: {status} {body}")]
    RemoteHttp {
        /// HTTP status code.
        status: u16,
        /// Response body as text.
        body: String,
    },
    /// Network-level failure.
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    /// The 2xx body was not JSON.
    #[error("invalid JSON from icon search: {0}")]
    Decode(#[from] serde_json::Error),
    /// The configured base URL is unusable.
    #[error("invalid icon search URL: {0}")]
    InvalidUrl(String),
}

/// Reasons a [`SearchDocument`] fails validation.
#[derive(Debug, thiserror::Error)]
pub enum SearchValidationError {
    /// Both `error` and items are present.
    #[error("search result carries both an error and items")]
    Ambiguous,
    /// Neither `error` nor items are present.
    #[error("search result carries neither an error nor items")]
    Empty,
    /// `error` is present but not a string.
    #[error("search result error is not a string")]
    ErrorNotString,
    /// The items field is not an array.
    #[error("search result items are not an array")]
    ItemsNotArray,
    /// An item could not be read as an icon record.
    #[error("invalid icon record at index {index}: {source}")]
    InvalidRecord {
        /// Position of the bad record.
        index: usize,
        /// Decode failure.
        source: serde_json::Error,
    },
}

/// Icon identifier; the provider sends either a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IconId {
    /// Numeric id.
    Number(u64),
    /// String id.
    Text(String),
}

impl std::fmt::Display for IconId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// One icon from a search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconRecord {
    /// Provider id.
    pub id: IconId,
    /// Search term the icon is filed under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    /// Raster preview.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    /// Full-resolution (usually SVG) asset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    /// Creator credit line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution: Option<String>,
}

impl IconRecord {
    /// URL to place on the canvas: the icon itself, else its preview.
    #[must_use]
    pub fn insert_url(&self) -> Option<&str> {
        self.icon_url.as_deref().or(self.preview_url.as_deref())
    }
}

/// A validated search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Icons returned by the provider, in provider order.
    Items(Vec<IconRecord>),
    /// A user-displayable failure.
    Error(String),
}

/// Loosely typed search result document.
///
/// Holds the provider body verbatim on success, or `{"error": "..."}` on
/// failure. Call [`SearchDocument::validate`] before reading items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchDocument(Map<String, Value>);

impl SearchDocument {
    /// Wrap a provider body. A bare array becomes `{"items": [...]}`; any
    /// other non-object becomes an error document.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            Value::Array(items) => {
                let mut map = Map::new();
                map.insert(ITEMS_FIELD.to_string(), Value::Array(items));
                Self(map)
            }
            other => Self::error(format!("Unexpected search response: {other}")),
        }
    }

    /// An `{"error": message}` document.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert(ERROR_FIELD.to_string(), Value::String(message.into()));
        Self(map)
    }

    /// The `error` field, if it is a string.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.0.get(ERROR_FIELD).and_then(Value::as_str)
    }

    /// Borrow the underlying map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Convert into a JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    fn items_field(&self) -> Option<&Value> {
        [ITEMS_FIELD, PROVIDER_ITEMS_FIELD]
            .iter()
            .filter_map(|key| self.0.get(*key))
            .find(|value| !value.is_null())
    }

    /// Check that exactly one of `error` or items is present and decode it.
    ///
    /// Items are read from `items`, falling back to the provider's `icons`.
    ///
    /// # Errors
    ///
    /// Returns a [`SearchValidationError`] describing the first violation.
    pub fn validate(&self) -> Result<SearchOutcome, SearchValidationError> {
        let error = self.0.get(ERROR_FIELD).filter(|value| !value.is_null());
        match (error, self.items_field()) {
            (Some(_), Some(_)) => Err(SearchValidationError::Ambiguous),
            (None, None) => Err(SearchValidationError::Empty),
            (Some(Value::String(message)), None) => Ok(SearchOutcome::Error(message.clone())),
            (Some(_), None) => Err(SearchValidationError::ErrorNotString),
            (None, Some(Value::Array(items))) => items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    IconRecord::deserialize(item)
                        .map_err(|source| SearchValidationError::InvalidRecord { index, source })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(SearchOutcome::Items),
            (None, Some(_)) => Err(SearchValidationError::ItemsNotArray),
        }
    }
}

impl From<SearchError> for SearchDocument {
    fn from(err: SearchError) -> Self {
        Self::error(err.to_string())
    }
}

/// OAuth 1.0a signing proxy for the Noun Project icon search.
#[derive(Clone)]
pub struct SignedSearchProxy {
    inner: Arc<InnerProxy>,
}

struct InnerProxy {
    http: Client,
    base_url: Url,
    nonces: Arc<dyn NonceSource>,
}

impl std::fmt::Debug for SignedSearchProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedSearchProxy")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl SignedSearchProxy {
    /// Create a proxy for the production API.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Transport`] if the HTTP client fails to build.
    pub fn new() -> Result<Self, SearchError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a proxy against another origin, e.g. a mock server.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidUrl`] if the URL is malformed, or
    /// [`SearchError::Transport`] if the HTTP client fails to build.
    pub fn with_base_url(base_url: impl AsRef<str>) -> Result<Self, SearchError> {
        let base_url = crate::parse_base_url(base_url.as_ref()).map_err(SearchError::InvalidUrl)?;
        Ok(Self {
            inner: Arc::new(InnerProxy {
                http: crate::http_client()?,
                base_url,
                nonces: Arc::new(SystemNonceSource),
            }),
        })
    }

    /// Replace the nonce/timestamp source.
    #[must_use]
    pub fn with_nonce_source(self, nonces: impl NonceSource + 'static) -> Self {
        Self {
            inner: Arc::new(InnerProxy {
                http: self.inner.http.clone(),
                base_url: self.inner.base_url.clone(),
                nonces: Arc::new(nonces),
            }),
        }
    }

    /// Search URL for a term: `<base>/icons/<term>?limit=20`.
    #[must_use]
    pub fn search_url(&self, query: &str) -> Url {
        let mut url = crate::join_path(
            &self.inner.base_url,
            &format!("icons/{}", percent_encode(query)),
        );
        url.set_query(Some(&format!("limit={SEARCH_LIMIT}")));
        url
    }

    /// Build the signed GET for a term without sending it.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::MissingCredentials`] if either credential is
    /// blank, or [`SearchError::Signature`] if signing fails.
    pub fn signed_request(
        &self,
        query: &str,
        credentials: &ConsumerCredentials,
    ) -> Result<SignedRequest, SearchError> {
        if !credentials.is_complete() {
            return Err(SearchError::MissingCredentials);
        }
        let nonce = self.inner.nonces.next();
        Ok(sign_request(
            Method::GET,
            self.search_url(query),
            credentials,
            &nonce,
        )?)
    }

    /// Sign and send a search, returning the provider body.
    ///
    /// # Errors
    ///
    /// Returns a [`SearchError`] for missing credentials, signing failures,
    /// non-2xx responses, transport failures or a non-JSON body.
    #[tracing::instrument(name = "icons.search", skip(self, credentials))]
    pub async fn try_search(
        &self,
        query: &str,
        credentials: &ConsumerCredentials,
    ) -> Result<Value, SearchError> {
        let request = self.signed_request(query, credentials)?;
        debug!(url = %request.url, "Sending signed icon search");

        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "Icon search rejected");
            return Err(SearchError::RemoteHttp {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Search, folding every failure into an `{"error": ...}` document.
    pub async fn search(&self, query: &str, credentials: &ConsumerCredentials) -> SearchDocument {
        match self.try_search(query, credentials).await {
            Ok(body) => SearchDocument::from_value(body),
            Err(err) => {
                debug!(error = %err, "Icon search failed");
                err.into()
            }
        }
    }
}
