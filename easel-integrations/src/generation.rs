//! Replicate image generation: submit a prediction, then poll its status
//! URL until the job reaches a terminal state.
//!
//! The poll loop is an explicit state machine over [`GenerationJob`]. Time
//! comes from an injected [`Clock`] and the loop is bounded by a
//! [`PollPolicy`]. Transport errors while polling end the call immediately;
//! only the "not finished yet" condition is retried.

use std::sync::Arc;
use std::time::Duration;

use easel_core::Secret;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;

use crate::clock::{Clock, TokioClock};

/// Production Replicate API origin.
pub const DEFAULT_BASE_URL: &str = "https://api.replicate.com";

/// Model version submitted with every prediction (stability-ai/sdxl).
pub const SDXL_VERSION: &str = "39ed52f2a78e934b3ba6e2a89f5b1c712de7dfea535525255b1aa35c5565e08b";

/// Default output width and height.
pub const DEFAULT_SIZE: u32 = 768;

const SCHEDULER: &str = "K_EULER";
const INFERENCE_STEPS: u32 = 50;
const START_FAILED: &str = "Failed to start generation";

/// Errors that can occur while generating an image.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// No API token was supplied.
    #[error("Missing API token")]
    MissingCredential,
    /// The provider refused to create the prediction.
    #[error("{}", .detail.as_deref().unwrap_or(START_FAILED))]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Provider `detail` message, if any.
        detail: Option<String>,
    },
    /// The job ended in `failed`.
    #[error("Generation failed")]
    Failed,
    /// The job ended in `canceled`.
    #[error("Generation canceled")]
    Canceled,
    /// The job succeeded without an output URL.
    #[error("Generation returned no output")]
    MissingOutput,
    /// The poll policy ran out before the job finished.
    #[error("Generation timed out after {attempts} status checks ({elapsed:?})")]
    PollTimeout {
        /// Status GETs performed.
        attempts: u32,
        /// Time spent polling.
        elapsed: Duration,
    },
    /// A status GET answered with a non-2xx status.
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
    /// A response body was not JSON.
    #[error("invalid JSON from generation API: {0}")]
    Decode(#[from] serde_json::Error),
    /// A response was JSON but not a prediction.
    #[error("unexpected generation response: {0}")]
    UnexpectedResponse(String),
    /// The configured base URL is unusable.
    #[error("invalid generation URL: {0}")]
    InvalidUrl(String),
    /// A terminal job was asked to advance.
    #[error("generation job {0} has already finished")]
    AlreadyTerminal(String),
}

/// Parameters for one generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Text prompt.
    pub prompt: String,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
}

impl GenerationRequest {
    /// A request at the default 768x768 size.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            width: DEFAULT_SIZE,
            height: DEFAULT_SIZE,
        }
    }

    /// Override the output size.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    fn payload(&self) -> Value {
        json!({
            "version": SDXL_VERSION,
            "input": {
                "prompt": self.prompt,
                "width": self.width,
                "height": self.height,
                "scheduler": SCHEDULER,
                "num_inference_steps": INFERENCE_STEPS,
            }
        })
    }
}

/// Bounds on the status poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay before each status GET.
    pub interval: Duration,
    /// Maximum number of status GETs.
    pub max_attempts: Option<u32>,
    /// Maximum time spent polling.
    pub timeout: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: Some(600),
            timeout: None,
        }
    }
}

impl PollPolicy {
    /// Poll forever at the default interval.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            ..Self::default()
        }
    }

    /// Fail if another status GET would exceed the policy.
    fn check(&self, attempts: u32, elapsed: Duration) -> Result<(), GenerationError> {
        let out_of_attempts = self.max_attempts.is_some_and(|max| attempts >= max);
        let out_of_time = self.timeout.is_some_and(|limit| elapsed >= limit);
        if out_of_attempts || out_of_time {
            return Err(GenerationError::PollTimeout { attempts, elapsed });
        }
        Ok(())
    }
}

/// Remote prediction status.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum JobStatus {
    /// Queued.
    Starting,
    /// Running.
    Processing,
    /// Finished with output.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Stopped before finishing.
    Canceled,
    /// A status this client does not know; treated as still running.
    Unknown(String),
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "starting" => Self::Starting,
            "processing" => Self::Processing,
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            "canceled" => Self::Canceled,
            _ => Self::Unknown(value),
        }
    }
}

impl Default for JobStatus {
    fn default() -> Self {
        Self::Unknown(String::new())
    }
}

impl JobStatus {
    /// Wire name of the status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Starting => "starting",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Unknown(other) => other,
        }
    }

    /// True once no further transition can happen.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    fn terminal_phase(&self) -> Option<JobPhase> {
        match self {
            Self::Succeeded => Some(JobPhase::Succeeded),
            Self::Failed | Self::Canceled => Some(JobPhase::Failed),
            _ => None,
        }
    }
}

/// Local lifecycle of a [`GenerationJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    /// Created remotely, not yet polled.
    Submitted,
    /// At least one status GET returned a non-terminal status.
    Polling,
    /// Terminal with output.
    Succeeded,
    /// Terminal without output.
    Failed,
}

/// One prediction document as returned by create or status calls.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobSnapshot {
    /// Prediction id.
    #[serde(default)]
    pub id: Option<String>,
    /// Remote status.
    #[serde(default)]
    pub status: JobStatus,
    /// Related URLs; `get` is the status resource.
    #[serde(default)]
    pub urls: Option<JobUrls>,
    /// Output URLs once succeeded.
    #[serde(default)]
    pub output: Option<Value>,
    /// Provider error detail once failed.
    #[serde(default)]
    pub error: Option<Value>,
}

/// URLs attached to a prediction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobUrls {
    /// Status resource.
    #[serde(default)]
    pub get: Option<String>,
}

impl JobSnapshot {
    /// First output URL. A bare string output is accepted too.
    fn first_output(&self) -> Option<String> {
        match self.output.as_ref()? {
            Value::Array(items) => items.first().and_then(Value::as_str).map(str::to_string),
            Value::String(url) => Some(url.clone()),
            _ => None,
        }
    }
}

/// A prediction owned by one `generate` call.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    /// Prediction id.
    pub id: String,
    /// Status resource polled until terminal.
    pub status_url: Url,
    /// Last remote status seen.
    pub status: JobStatus,
    /// Local lifecycle phase.
    pub phase: JobPhase,
    /// Result URL, present once succeeded.
    pub output_url: Option<String>,
    /// Status GETs applied so far.
    pub polls: u32,
}

impl GenerationJob {
    fn from_creation(snapshot: JobSnapshot, base_url: &Url) -> Result<Self, GenerationError> {
        let raw_url = snapshot
            .urls
            .as_ref()
            .and_then(|urls| urls.get.as_deref())
            .ok_or_else(|| {
                GenerationError::UnexpectedResponse("prediction has no status URL".to_string())
            })?;
        let status_url = Url::parse(raw_url)
            .map_err(|e| GenerationError::UnexpectedResponse(format!("{raw_url}: {e}")))?;
        if status_url.origin() != base_url.origin() {
            return Err(GenerationError::UnexpectedResponse(format!(
                "status URL {status_url} is not on {}",
                base_url.origin().ascii_serialization()
            )));
        }

        let mut job = Self {
            id: snapshot.id.clone().unwrap_or_default(),
            status_url,
            status: JobStatus::default(),
            phase: JobPhase::Submitted,
            output_url: None,
            polls: 0,
        };
        job.apply(snapshot, JobPhase::Submitted);
        Ok(job)
    }

    /// True once the job succeeded or failed.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, JobPhase::Succeeded | JobPhase::Failed)
    }

    /// Replace the snapshot with a freshly polled one.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::AlreadyTerminal`] if the job has finished;
    /// the job is left unchanged.
    pub fn advance(&mut self, snapshot: JobSnapshot) -> Result<(), GenerationError> {
        if self.is_terminal() {
            return Err(GenerationError::AlreadyTerminal(self.id.clone()));
        }
        self.polls += 1;
        self.apply(snapshot, JobPhase::Polling);
        Ok(())
    }

    fn apply(&mut self, snapshot: JobSnapshot, running: JobPhase) {
        self.phase = snapshot.status.terminal_phase().unwrap_or(running);
        if self.phase == JobPhase::Succeeded {
            self.output_url = snapshot.first_output();
        }
        if snapshot.status == JobStatus::Failed {
            if let Some(error) = &snapshot.error {
                debug!(job = %self.id, %error, "Provider reported failure");
            }
        }
        self.status = snapshot.status;
    }

    /// Final result of a terminal job.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Failed`] or [`GenerationError::Canceled`]
    /// for failed jobs, [`GenerationError::MissingOutput`] for a success
    /// without output, and [`GenerationError::UnexpectedResponse`] if the
    /// job is still running.
    pub fn outcome(&self) -> Result<String, GenerationError> {
        match self.phase {
            JobPhase::Succeeded => self.output_url.clone().ok_or(GenerationError::MissingOutput),
            JobPhase::Failed if self.status == JobStatus::Canceled => {
                Err(GenerationError::Canceled)
            }
            JobPhase::Failed => Err(GenerationError::Failed),
            JobPhase::Submitted | JobPhase::Polling => Err(GenerationError::UnexpectedResponse(
                format!("job {} is still {}", self.id, self.status.as_str()),
            )),
        }
    }
}

/// Replicate prediction client.
#[derive(Clone)]
pub struct GenerationClient {
    inner: Arc<InnerClient>,
}

#[derive(Clone)]
struct InnerClient {
    http: Client,
    base_url: Url,
    clock: Arc<dyn Clock>,
    policy: PollPolicy,
}

impl std::fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("policy", &self.inner.policy)
            .finish_non_exhaustive()
    }
}

impl GenerationClient {
    /// Create a client for the production API.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Transport`] if the HTTP client fails to build.
    pub fn new() -> Result<Self, GenerationError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a client against another origin, e.g. a mock server.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::InvalidUrl`] if the URL is malformed, or
    /// [`GenerationError::Transport`] if the HTTP client fails to build.
    pub fn with_base_url(base_url: impl AsRef<str>) -> Result<Self, GenerationError> {
        let base_url =
            crate::parse_base_url(base_url.as_ref()).map_err(GenerationError::InvalidUrl)?;
        Ok(Self {
            inner: Arc::new(InnerClient {
                http: crate::http_client()?,
                base_url,
                clock: Arc::new(TokioClock),
                policy: PollPolicy::default(),
            }),
        })
    }

    /// Replace the clock used between polls.
    #[must_use]
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        self.map_inner(|inner| inner.clock = clock)
    }

    /// Replace the poll policy.
    #[must_use]
    pub fn with_policy(self, policy: PollPolicy) -> Self {
        self.map_inner(|inner| inner.policy = policy)
    }

    /// Active poll policy.
    #[must_use]
    pub fn policy(&self) -> &PollPolicy {
        &self.inner.policy
    }

    fn map_inner(self, f: impl FnOnce(&mut InnerClient)) -> Self {
        let mut inner = Arc::unwrap_or_clone(self.inner);
        f(&mut inner);
        Self {
            inner: Arc::new(inner),
        }
    }

    fn authorization(token: &Secret) -> String {
        format!("Token {}", token.expose())
    }

    /// Create a prediction.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::MissingCredential`] without a network call
    /// if the token is blank, [`GenerationError::Rejected`] for a non-2xx
    /// answer, or a transport/decode error.
    #[tracing::instrument(name = "generation.submit", skip(self, request, token), fields(width = request.width, height = request.height))]
    pub async fn submit(
        &self,
        request: &GenerationRequest,
        token: &Secret,
    ) -> Result<GenerationJob, GenerationError> {
        if token.is_blank() {
            return Err(GenerationError::MissingCredential);
        }

        let url = crate::join_path(&self.inner.base_url, "v1/predictions");
        let response = self
            .inner
            .http
            .post(url)
            .header(AUTHORIZATION, Self::authorization(token))
            .json(&request.payload())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let detail = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|value| value.get("detail").and_then(Value::as_str).map(str::to_string));
            warn!(status = status.as_u16(), "Prediction rejected");
            return Err(GenerationError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        let snapshot: JobSnapshot = serde_json::from_str(&body)?;
        let job = GenerationJob::from_creation(snapshot, &self.inner.base_url)?;
        info!(job = %job.id, status = job.status.as_str(), "Prediction created");
        Ok(job)
    }

    /// Poll a job until it is terminal or the policy is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::PollTimeout`] when the policy runs out, or
    /// the first transport, HTTP or decode error from a status GET.
    #[tracing::instrument(name = "generation.wait", skip(self, job, token), fields(job = %job.id))]
    pub async fn wait(
        &self,
        mut job: GenerationJob,
        token: &Secret,
    ) -> Result<GenerationJob, GenerationError> {
        let clock = &self.inner.clock;
        let policy = &self.inner.policy;
        let started = clock.now();

        while !job.is_terminal() {
            let elapsed = clock.now().saturating_duration_since(started);
            if let Err(err) = policy.check(job.polls, elapsed) {
                warn!(polls = job.polls, ?elapsed, "Giving up on prediction");
                return Err(err);
            }
            clock.sleep(policy.interval).await;

            let snapshot = self.fetch_status(&job.status_url, token).await?;
            job.advance(snapshot)?;
            debug!(polls = job.polls, status = job.status.as_str(), "Polled prediction");
        }

        Ok(job)
    }

    async fn fetch_status(&self, url: &Url, token: &Secret) -> Result<JobSnapshot, GenerationError> {
        let response = self
            .inner
            .http
            .get(url.clone())
            .header(AUTHORIZATION, Self::authorization(token))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "Status check rejected");
            return Err(GenerationError::RemoteHttp {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Submit a prediction and wait for its first output URL.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Self::submit`] or [`Self::wait`], or the
    /// terminal failure from [`GenerationJob::outcome`].
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        token: &Secret,
    ) -> Result<String, GenerationError> {
        let job = self.submit(request, token).await?;
        let job = self.wait(job, token).await?;
        job.outcome()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token() -> Secret {
        Secret::new("r8_test")
    }

    fn created(server: &MockServer, status: &str) -> Value {
        json!({
            "id": "abc",
            "status": status,
            "urls": {"get": format!("{}/v1/predictions/abc", server.uri())}
        })
    }

    async fn mount_create(server: &MockServer, body: Value) {
        Mock::given(method("POST"))
            .and(path("/v1/predictions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(body))
            .expect(1)
            .mount(server)
            .await;
    }

    fn client(server: &MockServer, clock: Arc<ManualClock>) -> GenerationClient {
        GenerationClient::with_base_url(server.uri())
            .expect("client")
            .with_clock(clock)
    }

    fn snapshot(status: &str, output: Option<Value>) -> JobSnapshot {
        JobSnapshot {
            status: JobStatus::from(status.to_string()),
            output,
            ..JobSnapshot::default()
        }
    }

    fn job(status: &str) -> GenerationJob {
        let base = Url::parse("https://api.replicate.com").expect("url");
        let snapshot = JobSnapshot {
            id: Some("abc".to_string()),
            status: JobStatus::from(status.to_string()),
            urls: Some(JobUrls {
                get: Some("https://api.replicate.com/v1/predictions/abc".to_string()),
            }),
            ..JobSnapshot::default()
        };
        GenerationJob::from_creation(snapshot, &base).expect("job")
    }

    #[test]
    fn test_parses_known_and_unknown_statuses() {
        let status: JobStatus = serde_json::from_value(json!("processing")).expect("status");
        assert_eq!(status, JobStatus::Processing);
        let other: JobStatus = serde_json::from_value(json!("queued")).expect("status");
        assert_eq!(other, JobStatus::Unknown("queued".to_string()));
        assert!(!other.is_terminal());
        assert!(JobStatus::Canceled.is_terminal());
    }

    #[test]
    fn test_payload_carries_fixed_model_parameters() {
        let payload = GenerationRequest::new("a cat").payload();
        assert_eq!(payload["version"], SDXL_VERSION);
        assert_eq!(payload["input"]["prompt"], "a cat");
        assert_eq!(payload["input"]["width"], 768);
        assert_eq!(payload["input"]["height"], 768);
        assert_eq!(payload["input"]["scheduler"], "K_EULER");
        assert_eq!(payload["input"]["num_inference_steps"], 50);
    }

    #[test]
    fn test_job_walks_submitted_polling_succeeded() {
        let mut job = job("starting");
        assert_eq!(job.phase, JobPhase::Submitted);

        job.advance(snapshot("processing", None)).expect("advance");
        assert_eq!(job.phase, JobPhase::Polling);

        job.advance(snapshot("succeeded", Some(json!(["https://x/img.png"]))))
            .expect("advance");
        assert_eq!(job.phase, JobPhase::Succeeded);
        assert_eq!(job.outcome().expect("output"), "https://x/img.png");
        assert_eq!(job.polls, 2);
    }

    #[test]
    fn test_terminal_job_never_changes() {
        let mut job = job("starting");
        job.advance(snapshot("failed", None)).expect("advance");

        let err = job
            .advance(snapshot("succeeded", Some(json!(["https://x/img.png"]))))
            .unwrap_err();
        assert!(matches!(err, GenerationError::AlreadyTerminal(_)));
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.phase, JobPhase::Failed);
        assert_eq!(job.polls, 1);
        assert_eq!(job.outcome().unwrap_err().to_string(), "Generation failed");
    }

    #[test]
    fn test_canceled_and_empty_outputs() {
        let mut canceled = job("processing");
        canceled.advance(snapshot("canceled", None)).expect("advance");
        assert!(matches!(canceled.outcome(), Err(GenerationError::Canceled)));

        let mut empty = job("processing");
        empty.advance(snapshot("succeeded", Some(json!([])))).expect("advance");
        assert!(matches!(empty.outcome(), Err(GenerationError::MissingOutput)));

        let mut bare = job("processing");
        bare.advance(snapshot("succeeded", Some(json!("https://x/one.png"))))
            .expect("advance");
        assert_eq!(bare.outcome().expect("output"), "https://x/one.png");
    }

    #[test]
    fn test_policy_limits() {
        let policy = PollPolicy {
            interval: Duration::from_secs(1),
            max_attempts: Some(2),
            timeout: Some(Duration::from_secs(10)),
        };
        assert!(policy.check(1, Duration::from_secs(9)).is_ok());
        assert!(policy.check(2, Duration::ZERO).is_err());
        assert!(policy.check(0, Duration::from_secs(10)).is_err());
        assert!(PollPolicy::unbounded().check(u32::MAX, Duration::MAX).is_ok());
    }

    #[tokio::test]
    #[cfg_attr(
        target_os = "macos",
        ignore = "wiremock/reqwest system-configuration issue on macOS"
    )]
    async fn test_returns_output_after_two_polls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/predictions"))
            .and(header("authorization", "Token r8_test"))
            .and(body_partial_json(json!({
                "version": SDXL_VERSION,
                "input": {"prompt": "a red fox", "width": 768, "height": 768}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(created(&server, "starting")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/predictions/abc"))
            .and(header("authorization", "Token r8_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "processing"})))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/predictions/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "succeeded",
                "output": ["https://x/img.png"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let clock = Arc::new(ManualClock::new());
        let url = client(&server, Arc::clone(&clock))
            .generate(&GenerationRequest::new("a red fox"), &token())
            .await
            .expect("generate");

        assert_eq!(url, "https://x/img.png");
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(1); 2]);
    }

    #[tokio::test]
    #[cfg_attr(
        target_os = "macos",
        ignore = "wiremock/reqwest system-configuration issue on macOS"
    )]
    async fn test_failed_status_ends_generation() {
        let server = MockServer::start().await;
        mount_create(&server, created(&server, "starting")).await;
        Mock::given(method("GET"))
            .and(path("/v1/predictions/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "failed",
                "error": "NSFW content detected"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server, Arc::new(ManualClock::new()))
            .generate(&GenerationRequest::new("x"), &token())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Generation failed");
    }

    #[tokio::test]
    #[cfg_attr(
        target_os = "macos",
        ignore = "wiremock/reqwest system-configuration issue on macOS"
    )]
    async fn test_failed_on_creation_skips_polling() {
        let server = MockServer::start().await;
        mount_create(&server, created(&server, "failed")).await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let clock = Arc::new(ManualClock::new());
        let err = client(&server, Arc::clone(&clock))
            .generate(&GenerationRequest::new("x"), &token())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Generation failed");
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    #[cfg_attr(
        target_os = "macos",
        ignore = "wiremock/reqwest system-configuration issue on macOS"
    )]
    async fn test_rejected_creation_reports_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/predictions"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({"detail": "bad prompt"})))
            .mount(&server)
            .await;

        let err = client(&server, Arc::new(ManualClock::new()))
            .generate(&GenerationRequest::new("x"), &token())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Rejected { status: 422, .. }));
        assert_eq!(err.to_string(), "bad prompt");
    }

    #[tokio::test]
    #[cfg_attr(
        target_os = "macos",
        ignore = "wiremock/reqwest system-configuration issue on macOS"
    )]
    async fn test_rejected_creation_without_detail_is_generic() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/predictions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let err = client(&server, Arc::new(ManualClock::new()))
            .generate(&GenerationRequest::new("x"), &token())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to start generation");
    }

    #[tokio::test]
    #[cfg_attr(
        target_os = "macos",
        ignore = "wiremock/reqwest system-configuration issue on macOS"
    )]
    async fn test_attempt_cap_stops_after_exact_count() {
        let server = MockServer::start().await;
        mount_create(&server, created(&server, "starting")).await;
        Mock::given(method("GET"))
            .and(path("/v1/predictions/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "processing"})))
            .expect(3)
            .mount(&server)
            .await;

        let err = client(&server, Arc::new(ManualClock::new()))
            .with_policy(PollPolicy {
                max_attempts: Some(3),
                ..PollPolicy::default()
            })
            .generate(&GenerationRequest::new("x"), &token())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::PollTimeout { attempts: 3, .. }));
    }

    #[tokio::test]
    #[cfg_attr(
        target_os = "macos",
        ignore = "wiremock/reqwest system-configuration issue on macOS"
    )]
    async fn test_timeout_uses_the_injected_clock() {
        let server = MockServer::start().await;
        mount_create(&server, created(&server, "starting")).await;
        Mock::given(method("GET"))
            .and(path("/v1/predictions/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "processing"})))
            .expect(3)
            .mount(&server)
            .await;

        let clock = Arc::new(ManualClock::new());
        let err = client(&server, Arc::clone(&clock))
            .with_policy(PollPolicy {
                interval: Duration::from_secs(1),
                max_attempts: None,
                timeout: Some(Duration::from_millis(2500)),
            })
            .generate(&GenerationRequest::new("x"), &token())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::PollTimeout { attempts: 3, .. }));
        assert_eq!(clock.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test]
    #[cfg_attr(
        target_os = "macos",
        ignore = "wiremock/reqwest system-configuration issue on macOS"
    )]
    async fn test_blank_token_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let err = client(&server, Arc::new(ManualClock::new()))
            .generate(&GenerationRequest::new("x"), &Secret::new(""))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::MissingCredential));
    }

    #[tokio::test]
    #[cfg_attr(
        target_os = "macos",
        ignore = "wiremock/reqwest system-configuration issue on macOS"
    )]
    async fn test_status_url_on_another_origin_is_refused() {
        let server = MockServer::start().await;
        mount_create(
            &server,
            json!({
                "id": "abc",
                "status": "starting",
                "urls": {"get": "https://elsewhere.example/v1/predictions/abc"}
            }),
        )
        .await;

        let err = client(&server, Arc::new(ManualClock::new()))
            .generate(&GenerationRequest::new("x"), &token())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::UnexpectedResponse(_)));
    }

    #[tokio::test]
    #[cfg_attr(
        target_os = "macos",
        ignore = "wiremock/reqwest system-configuration issue on macOS"
    )]
    async fn test_poll_http_error_is_not_retried() {
        let server = MockServer::start().await;
        mount_create(&server, created(&server, "starting")).await;
        Mock::given(method("GET"))
            .and(path("/v1/predictions/abc"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server, Arc::new(ManualClock::new()))
            .generate(&GenerationRequest::new("x"), &token())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "API Error: 503 unavailable");
    }

    #[tokio::test]
    async fn test_poll_transport_error_surfaces_after_one_attempt() {
        // Nothing listens on port 1, so the status GET is refused.
        let base = "http://127.0.0.1:1";
        let snapshot = JobSnapshot {
            id: Some("abc".to_string()),
            status: JobStatus::Starting,
            urls: Some(JobUrls {
                get: Some(format!("{base}/v1/predictions/abc")),
            }),
            ..JobSnapshot::default()
        };
        let job = GenerationJob::from_creation(snapshot, &Url::parse(base).expect("url"))
            .expect("job");

        let clock = Arc::new(ManualClock::new());
        let err = GenerationClient::with_base_url(base)
            .expect("client")
            .with_clock(clock.clone())
            .wait(job, &token())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Transport(_)), "{err:?}");
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(1)]);
    }
}
