//! Unsplash photo search.

use std::sync::Arc;

use easel_core::Secret;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

/// Production Unsplash API origin.
pub const DEFAULT_BASE_URL: &str = "https://api.unsplash.com";

/// Number of photos requested per search.
pub const PHOTOS_PER_PAGE: u32 = 20;

/// Errors that can occur during a photo search.
#[derive(Debug, thiserror::Error)]
pub enum PhotoError {
    /// No access key was supplied.
    #[error("Missing Unsplash Access Key")]
    MissingCredentials,
    /// The provider rejected the access key.
    #[error("Invalid Unsplash Access Key. Please check settings.")]
    InvalidAccessKey,
    /// Any other non-2xx answer.
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
    /// The body was not a search result.
    #[error("invalid JSON from photo search: {0}")]
    Decode(#[from] serde_json::Error),
    /// The configured base URL is unusable.
    #[error("invalid photo search URL: {0}")]
    InvalidUrl(String),
}

/// One photo from a search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRecord {
    /// Provider id.
    pub id: String,
    /// Thumbnail for the results grid.
    pub thumb_url: String,
    /// Image placed on the canvas.
    pub full_url: String,
    /// Alt text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Photographer name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<UnsplashPhoto>,
}

#[derive(Deserialize)]
struct UnsplashPhoto {
    id: String,
    urls: UnsplashUrls,
    #[serde(default)]
    alt_description: Option<String>,
    #[serde(default)]
    user: Option<UnsplashUser>,
}

#[derive(Deserialize)]
struct UnsplashUrls {
    small: String,
    regular: String,
}

#[derive(Deserialize)]
struct UnsplashUser {
    name: Option<String>,
}

impl From<UnsplashPhoto> for PhotoRecord {
    fn from(photo: UnsplashPhoto) -> Self {
        Self {
            id: photo.id,
            thumb_url: photo.urls.small,
            full_url: photo.urls.regular,
            description: photo.alt_description,
            author: photo.user.and_then(|user| user.name),
        }
    }
}

/// Unsplash search client.
#[derive(Clone)]
pub struct PhotoSearchClient {
    inner: Arc<InnerClient>,
}

struct InnerClient {
    http: Client,
    base_url: Url,
}

impl std::fmt::Debug for PhotoSearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhotoSearchClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish()
    }
}

impl PhotoSearchClient {
    /// Create a client for the production API.
    ///
    /// # Errors
    ///
    /// Returns [`PhotoError::Transport`] if the HTTP client fails to build.
    pub fn new() -> Result<Self, PhotoError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a client against another origin.
    ///
    /// # Errors
    ///
    /// Returns [`PhotoError::InvalidUrl`] if the URL is malformed, or
    /// [`PhotoError::Transport`] if the HTTP client fails to build.
    pub fn with_base_url(base_url: impl AsRef<str>) -> Result<Self, PhotoError> {
        let base_url = crate::parse_base_url(base_url.as_ref()).map_err(PhotoError::InvalidUrl)?;
        Ok(Self {
            inner: Arc::new(InnerClient {
                http: crate::http_client()?,
                base_url,
            }),
        })
    }

    fn search_url(&self, query: &str) -> Url {
        let mut url = crate::join_path(&self.inner.base_url, "search/photos");
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("per_page", &PHOTOS_PER_PAGE.to_string());
        url
    }

    /// Search photos.
    ///
    /// # Errors
    ///
    /// Returns [`PhotoError::MissingCredentials`] without a network call if
    /// the key is blank, [`PhotoError::InvalidAccessKey`] on 401, or another
    /// [`PhotoError`] for other failures.
    #[tracing::instrument(name = "photos.search", skip(self, access_key))]
    pub async fn search(
        &self,
        query: &str,
        access_key: &Secret,
    ) -> Result<Vec<PhotoRecord>, PhotoError> {
        if access_key.is_blank() {
            return Err(PhotoError::MissingCredentials);
        }

        let response = self
            .inner
            .http
            .get(self.search_url(query))
            .header(AUTHORIZATION, format!("Client-ID {}", access_key.expose()))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status == StatusCode::UNAUTHORIZED {
            warn!("Unsplash rejected the access key");
            return Err(PhotoError::InvalidAccessKey);
        }
        if !status.is_success() {
            warn!(status = status.as_u16(), "Photo search rejected");
            return Err(PhotoError::RemoteHttp {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SearchResponse = serde_json::from_str(&body)?;
        debug!(count = parsed.results.len(), "Photo search complete");
        Ok(parsed.results.into_iter().map(PhotoRecord::from).collect())
    }
}
