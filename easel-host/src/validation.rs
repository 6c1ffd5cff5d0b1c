//! Input validation for bridge requests.
//!
//! Everything arriving at `/rpc` comes from the UI and is untrusted. These
//! checks run before dispatch; structural problems (missing or mistyped
//! fields) are left to the bridge's own param decoding.

use easel_bridge::JsonRpcRequest;
use serde_json::Value;
use thiserror::Error;

/// Maximum search query length in characters.
pub const MAX_QUERY_LEN: usize = 200;
/// Maximum generation prompt length in characters.
pub const MAX_PROMPT_LEN: usize = 2000;
/// Largest accepted output width or height in pixels.
pub const MAX_DIMENSION: u64 = 2048;
/// Maximum shapes in one saved project.
pub const MAX_SHAPES_PER_PROJECT: usize = 10_000;
/// Maximum project name length.
pub const MAX_PROJECT_NAME_LEN: usize = 128;
/// Maximum `/rpc` body size.
pub const MAX_RPC_BODY_BYTES: usize = 4 * 1_048_576;

/// Validation error types.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Search query is empty or whitespace.
    #[error("query must not be empty")]
    EmptyQuery,
    /// Search query exceeds maximum length.
    #[error("query too long (max {MAX_QUERY_LEN} chars)")]
    QueryTooLong,
    /// Prompt is empty or whitespace.
    #[error("prompt must not be empty")]
    EmptyPrompt,
    /// Prompt exceeds maximum length.
    #[error("prompt too long (max {MAX_PROMPT_LEN} chars)")]
    PromptTooLong,
    /// Width or height outside `1..=MAX_DIMENSION`.
    #[error("{field} must be between 1 and {MAX_DIMENSION}")]
    InvalidDimension {
        /// Offending field name.
        field: &'static str,
    },
    /// Too many shapes in a project.
    #[error("too many shapes (max {MAX_SHAPES_PER_PROJECT})")]
    TooManyShapes,
    /// Project name exceeds maximum length.
    #[error("project name too long (max {MAX_PROJECT_NAME_LEN} chars)")]
    ProjectNameTooLong,
}

impl ValidationError {
    /// Short label used for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyQuery | Self::QueryTooLong => "query",
            Self::EmptyPrompt | Self::PromptTooLong => "prompt",
            Self::InvalidDimension { .. } => "dimension",
            Self::TooManyShapes | Self::ProjectNameTooLong => "project",
        }
    }
}

/// Validate a search query.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyQuery`] or [`ValidationError::QueryTooLong`].
pub fn validate_query(query: &str) -> Result<(), ValidationError> {
    if query.trim().is_empty() {
        return Err(ValidationError::EmptyQuery);
    }
    if query.chars().count() > MAX_QUERY_LEN {
        return Err(ValidationError::QueryTooLong);
    }
    Ok(())
}

/// Validate a generation prompt.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyPrompt`] or [`ValidationError::PromptTooLong`].
pub fn validate_prompt(prompt: &str) -> Result<(), ValidationError> {
    if prompt.trim().is_empty() {
        return Err(ValidationError::EmptyPrompt);
    }
    if prompt.chars().count() > MAX_PROMPT_LEN {
        return Err(ValidationError::PromptTooLong);
    }
    Ok(())
}

/// Validate an output dimension.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidDimension`] if `value` is 0 or too large.
pub fn validate_dimension(field: &'static str, value: u64) -> Result<(), ValidationError> {
    if value == 0 || value > MAX_DIMENSION {
        return Err(ValidationError::InvalidDimension { field });
    }
    Ok(())
}

fn dimension_field(params: &Value, field: &'static str) -> Result<(), ValidationError> {
    match params.get(field) {
        None | Some(Value::Null) => Ok(()),
        Some(value) => match value.as_u64() {
            Some(n) => validate_dimension(field, n),
            None => Err(ValidationError::InvalidDimension { field }),
        },
    }
}

/// Validate the params of a bridge request by method.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found.
pub fn validate_request(request: &JsonRpcRequest) -> Result<(), ValidationError> {
    let params = &request.params;
    match request.method.as_str() {
        "icons/search" | "photos/search" => {
            if let Some(query) = params.get("query").and_then(Value::as_str) {
                validate_query(query)?;
            }
        }
        "image/generate" => {
            if let Some(prompt) = params.get("prompt").and_then(Value::as_str) {
                validate_prompt(prompt)?;
            }
            dimension_field(params, "width")?;
            dimension_field(params, "height")?;
        }
        "project/save" => {
            if params
                .get("shapes")
                .and_then(Value::as_array)
                .is_some_and(|shapes| shapes.len() > MAX_SHAPES_PER_PROJECT)
            {
                return Err(ValidationError::TooManyShapes);
            }
            if params
                .get("name")
                .and_then(Value::as_str)
                .is_some_and(|name| name.chars().count() > MAX_PROJECT_NAME_LEN)
            {
                return Err(ValidationError::ProjectNameTooLong);
            }
        }
        _ => {}
    }
    Ok(())
}
