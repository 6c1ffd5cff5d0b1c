//! Credential wrapper that never prints its contents.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An API key, token or consumer secret.
///
/// `Debug` output is redacted so a `Secret` can sit inside structs that are
/// logged with `{:?}` or captured by `tracing` spans. There is
/// no `Display` impl; call [`Secret::expose`] at the point of use.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a credential value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the raw credential.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// True when the credential is empty or whitespace only.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Secret(<empty>)")
        } else {
            f.write_str("Secret(<redacted>)")
        }
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
