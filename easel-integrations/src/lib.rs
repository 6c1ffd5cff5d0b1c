//! # Easel Integrations
//!
//! Clients for the remote services used by the editor. All of them run on the
//! privileged side of the bridge because they handle raw credentials.
//!
//! ## Clients
//!
//! - [`SignedSearchProxy`] - Noun Project icon search, OAuth 1.0a signed
//! - [`GenerationClient`] - Replicate prediction submit + status polling
//! - [`PhotoSearchClient`] - Unsplash photo search
//!
//! The OAuth 1.0a signer lives in [`oauth`] and the poll clock abstraction in
//! [`clock`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod clock;
pub mod generation;
pub mod icons;
pub mod oauth;
pub mod photos;

pub use clock::{Clock, ManualClock, TokioClock};
pub use generation::{
    GenerationClient, GenerationError, GenerationJob, GenerationRequest, JobPhase, JobSnapshot,
    JobStatus, PollPolicy,
};
pub use icons::{
    IconId, IconRecord, SearchDocument, SearchError, SearchOutcome, SearchValidationError,
    SignedSearchProxy,
};
pub use oauth::{
    ConsumerCredentials, NonceSource, OAuthNonce, SignedRequest, SigningError, SystemNonceSource,
};
pub use photos::{PhotoError, PhotoRecord, PhotoSearchClient};

/// User agent sent with every outbound request.
const USER_AGENT: &str = concat!("easel/", env!("CARGO_PKG_VERSION"));

/// Build the shared HTTP client configuration.
fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().user_agent(USER_AGENT).build()
}

/// Parse a base URL, mapping failures to a display string.
fn parse_base_url(base_url: &str) -> Result<url::Url, String> {
    let url = url::Url::parse(base_url).map_err(|e| format!("{base_url}: {e}"))?;
    if url.cannot_be_a_base() {
        return Err(format!("{base_url}: not a base URL"));
    }
    Ok(url)
}

/// Join `segments` (already percent-encoded) onto the base URL's path.
fn join_path(base: &url::Url, segments: &str) -> url::Url {
    let mut url = base.clone();
    let prefix = base.path().trim_end_matches('/');
    url.set_path(&format!("{prefix}/{segments}"));
    url.set_query(None);
    url
}
