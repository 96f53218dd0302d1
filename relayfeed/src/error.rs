//! Failure taxonomy for the feed: per-exchange transport failures, the terminal
//! reconnect condition, and start-up/config errors.

use thiserror::Error;

/// Why one exchange (HTTP poll or stream frame/connection) failed.
///
/// Non-terminal: the controller only logs and counts these. `tag()` gives the
/// short reason string surfaced to subscribers and logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("timeout")]
    Timeout,
    /// Network, DNS, TLS, handshake or connection-loss failure.
    #[error("transport-error: {0}")]
    Transport(String),
    /// Non-2xx HTTP response.
    #[error("http-error:{0}")]
    HttpStatus(u16),
    /// Body was not valid JSON, or not a JSON object.
    #[error("parse-error: {0}")]
    Parse(String),
    /// Envelope said `success: false`.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl FailureReason {
    pub fn tag(&self) -> String {
        match self {
            FailureReason::Timeout => "timeout".into(),
            FailureReason::Transport(_) => "transport-error".into(),
            FailureReason::HttpStatus(code) => format!("http-error:{code}"),
            FailureReason::Parse(_) => "parse-error".into(),
            FailureReason::Rejected(_) => "rejected".into(),
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            FailureReason::Transport(d) | FailureReason::Parse(d) | FailureReason::Rejected(d) => {
                Some(d.as_str())
            }
            FailureReason::Timeout | FailureReason::HttpStatus(_) => None,
        }
    }
}

/// Streaming gave up reconnecting; the feed moves to `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("reconnect attempts exhausted after {attempts} tries")]
pub struct ReconnectExhausted {
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("endpoint must be set")]
    MissingEndpoint,
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("url scheme '{scheme}' does not match {mode} mode")]
    SchemeMismatch { scheme: String, mode: &'static str },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("feed is already running; call stop() first")]
    AlreadyRunning,
    #[error("no tokio runtime available to spawn the feed task")]
    NoRuntime,
    #[error("tls setup failed: {0}")]
    Tls(String),
    #[error("http client setup failed: {0}")]
    Http(#[from] reqwest::Error),
}
