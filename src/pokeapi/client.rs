use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::eyre;
use reqwest::header::{HeaderValue, ACCEPT};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::config::ApiConfig;
use crate::error::FetchError;

pub const DEFAULT_BASE_URL: &str = "https://pokeapi.co/api/v2";

/// Fixed wait before every request.
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(1);

/// PokeAPI HTTP transport.
///
/// Performs plain JSON GETs. Caching and request deduplication live in
/// [`crate::cache::QueryCache`]; this type always hits the network.
#[derive(Clone)]
pub struct HttpClient {
  client: reqwest::Client,
  base_url: Arc<str>,
  request_delay: Duration,
}

impl HttpClient {
  pub fn new(config: &ApiConfig) -> color_eyre::Result<Self> {
    let base_url = config.base_url.trim_end_matches('/');
    Url::parse(base_url)
      .map_err(|e| eyre!("Invalid API base URL {}: {}", base_url, e))?;

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      base_url: Arc::from(base_url),
      request_delay: Duration::from_millis(config.request_delay_ms),
    })
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  /// Absolute URL for a resolved path.
  pub fn url_for(&self, path: &str) -> String {
    format!("{}{}", self.base_url, path)
  }

  /// GET a resolved path relative to the base URL.
  pub async fn get_path(&self, path: &str) -> Result<Value, FetchError> {
    self.get_url(&self.url_for(path)).await
  }

  /// GET an absolute URL (pagination cursors are absolute).
  pub async fn get_url(&self, url: &str) -> Result<Value, FetchError> {
    if !self.request_delay.is_zero() {
      tokio::time::sleep(self.request_delay).await;
    }

    info!(url, "GET");

    let response = self
      .client
      .get(url)
      .header(ACCEPT, HeaderValue::from_static("application/json"))
      .send()
      .await
      .map_err(|e| FetchError::Transport {
        url: url.to_string(),
        message: e.to_string(),
      })?;

    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Status {
        url: url.to_string(),
        status: status.as_u16(),
      });
    }

    let body = response.bytes().await.map_err(|e| FetchError::Transport {
      url: url.to_string(),
      message: e.to_string(),
    })?;

    debug!(url, bytes = body.len(), "response received");

    serde_json::from_slice(&body).map_err(|e| FetchError::Parse {
      url: url.to_string(),
      message: e.to_string(),
    })
  }
}

impl std::fmt::Debug for HttpClient {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("HttpClient")
      .field("base_url", &self.base_url)
      .field("request_delay", &self.request_delay)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use httpmock::prelude::*;
  use serde_json::json;

  fn client_for(server: &MockServer) -> HttpClient {
    HttpClient::new(&ApiConfig {
      base_url: server.base_url(),
      request_delay_ms: 0,
      timeout_secs: 5,
    })
    .unwrap()
  }

  #[tokio::test]
  async fn test_sends_accept_header() {
    let server = MockServer::start_async().await;
    let mock = server
      .mock_async(|when, then| {
        when
          .method(GET)
          .path("/pokemon/1")
          .header("accept", "application/json");
        then.status(200).json_body(json!({"id": 1}));
      })
      .await;

    let client = client_for(&server);
    let body = client.get_path("/pokemon/1").await.unwrap();

    assert_eq!(body["id"], 1);
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_non_json_body_is_parse_error() {
    let server = MockServer::start_async().await;
    server
      .mock_async(|when, then| {
        when.method(GET).path("/pokemon/1");
        then.status(200).body("<html>nope</html>");
      })
      .await;

    let err = client_for(&server).get_path("/pokemon/1").await.unwrap_err();
    assert!(matches!(err, FetchError::Parse { .. }));
  }

  #[tokio::test]
  async fn test_error_status() {
    let server = MockServer::start_async().await;
    server
      .mock_async(|when, then| {
        when.method(GET);
        then.status(404).body("Not Found");
      })
      .await;

    let err = client_for(&server)
      .get_path("/pokemon/{id}")
      .await
      .unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 404, .. }));
  }

  #[tokio::test]
  async fn test_unreachable_host_is_transport_error() {
    let client = HttpClient::new(&ApiConfig {
      base_url: "http://127.0.0.1:1".to_string(),
      request_delay_ms: 0,
      timeout_secs: 2,
    })
    .unwrap();

    let err = client.get_path("/pokemon/1").await.unwrap_err();
    assert!(matches!(err, FetchError::Transport { .. }));
  }

  #[tokio::test]
  async fn test_request_waits_for_configured_delay() {
    let server = MockServer::start_async().await;
    let mock = server
      .mock_async(|when, then| {
        when.method(GET).path("/pokemon/4");
        then.status(200).json_body(json!({"id": 4}));
      })
      .await;

    let client = HttpClient::new(&ApiConfig {
      base_url: server.base_url(),
      request_delay_ms: 300,
      timeout_secs: 5,
    })
    .unwrap();

    let started = std::time::Instant::now();
    let request = tokio::spawn(async move { client.get_path("/pokemon/4").await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(mock.hits_async().await, 0);

    let body = request.await.unwrap().unwrap();
    assert_eq!(body["id"], 4);
    assert!(started.elapsed() >= Duration::from_millis(300));
    mock.assert_hits_async(1).await;
  }

  #[test]
  fn test_trailing_slash_is_trimmed() {
    let client = HttpClient::new(&ApiConfig {
      base_url: "https://pokeapi.co/api/v2/".to_string(),
      request_delay_ms: 0,
      timeout_secs: 5,
    })
    .unwrap();
    assert_eq!(
      client.url_for("/pokemon?limit=21"),
      "https://pokeapi.co/api/v2/pokemon?limit=21"
    );
  }
}
