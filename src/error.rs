use thiserror::Error;

/// Failure of a single fetch.
///
/// Cloneable so that one result can be handed to every caller waiting on the
/// same cache entry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
  /// Network unreachable, DNS failure, timeout, malformed request URL.
  #[error("request to {url} failed: {message}")]
  Transport { url: String, message: String },

  #[error("request to {url} returned HTTP {status}")]
  Status { url: String, status: u16 },

  /// Body was not valid JSON.
  #[error("response from {url} is not valid JSON: {message}")]
  Parse { url: String, message: String },

  /// Body was JSON but not the shape the endpoint declares.
  #[error("unexpected payload for {key}: {message}")]
  Decode { key: String, message: String },

  #[error("cache storage error: {0}")]
  Storage(String),

  /// The task driving the request went away before reporting a result.
  #[error("request was cancelled")]
  Cancelled,
}
