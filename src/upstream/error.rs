use thiserror::Error;

/// Longest slice of an error body kept in a `FetchError`.
const MAX_BODY_EXCERPT: usize = 256;

/// Failure of a single upstream query.
///
/// An instrument missing from a result is not an error; it just leaves that
/// instrument's field unset.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport error, timeout, or a non-2xx response.
    #[error("upstream request to {url} failed: {reason}")]
    Fetch {
        url: String,
        reason: String,
        /// HTTP status, when a response was received at all.
        status: Option<u16>,
    },

    /// The body was not the expected JSON shape.
    #[error("failed to decode upstream response from {url}: {reason}")]
    Parse { url: String, reason: String },
}

impl FetchError {
    pub fn transport(url: impl Into<String>, err: &reqwest::Error) -> Self {
        let reason = if err.is_timeout() {
            format!("timed out: {err}")
        } else {
            err.to_string()
        };
        Self::Fetch {
            url: url.into(),
            reason,
            status: None,
        }
    }

    pub fn status(url: impl Into<String>, status: u16, body: &str) -> Self {
        let excerpt: String = body.chars().take(MAX_BODY_EXCERPT).collect();
        Self::Fetch {
            url: url.into(),
            reason: format!("HTTP {status}: {excerpt}"),
            status: Some(status),
        }
    }

    pub fn parse(url: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Parse {
            url: url.into(),
            reason: err.to_string(),
        }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Transport failures, 5xx and 429 are retried; other 4xx and malformed
    /// bodies are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch { status: None, .. } => true,
            Self::Fetch {
                status: Some(code), ..
            } => *code == 429 || (500..600).contains(code),
            Self::Parse { .. } => false,
        }
    }
}
