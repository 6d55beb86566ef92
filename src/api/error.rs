use thiserror::Error;

/// Failure talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("invalid backend url: {0}")]
  InvalidUrl(#[from] url::ParseError),

  #[error("request to {endpoint} failed")]
  Transport {
    endpoint: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("{endpoint} responded with {status}{}", .message.as_deref().map(|m| format!(": {}", m)).unwrap_or_default())]
  Status {
    endpoint: String,
    status: reqwest::StatusCode,
    message: Option<String>,
  },

  /// The backend answered `success: false`.
  #[error("{0}")]
  Unsuccessful(String),

  #[error("unexpected response from {endpoint}")]
  Decode {
    endpoint: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("not logged in, run `code-reviewer login` first")]
  Unauthenticated,
}
