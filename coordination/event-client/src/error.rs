use std::time::Duration;

use reqwest::{StatusCode, Url};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("timed out after {timeout:?} waiting on event `{name}`")]
    Timeout { name: String, timeout: Duration },
    #[error("coordinator unreachable while waiting on event `{name}`: {source}")]
    Unreachable {
        name: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("coordinator request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("coordinator answered with unexpected status {0}")]
    UnexpectedStatus(StatusCode),
    #[error("invalid coordinator address: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("coordinator address `{0}` cannot carry a path")]
    CannotBeABase(Url),
    #[error("environment variable `{0}` is not set")]
    MissingEnvironment(&'static str),
    #[error("environment variable `{name}` has an invalid value `{value}`")]
    InvalidEnvironment { name: &'static str, value: String },
}

impl ClientError {
    /// Deadline expiry, as opposed to a coordinator failure.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
