use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::time::Duration;
use tracing::debug;

use crate::config::PlaylistConfig;
use crate::error::NetworkError;
use crate::network::api_types::NetworkVideoContainer;

/// Anything that can produce the current playlist.
#[async_trait]
pub trait PlaylistSource: Send + Sync {
  async fn fetch_playlist(&self) -> Result<NetworkVideoContainer, NetworkError>;
}

/// Playlist client over HTTPS
#[derive(Clone)]
pub struct HttpPlaylistSource {
  client: reqwest::Client,
  url: String,
}

impl HttpPlaylistSource {
  pub fn new(config: &PlaylistConfig) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      url: config.url.clone(),
    })
  }
}

#[async_trait]
impl PlaylistSource for HttpPlaylistSource {
  async fn fetch_playlist(&self) -> Result<NetworkVideoContainer, NetworkError> {
    let request_error = |source: reqwest::Error| NetworkError::Request {
      url: self.url.clone(),
      source,
    };

    let response = self
      .client
      .get(&self.url)
      .send()
      .await
      .map_err(request_error)?;

    let status = response.status();
    if !status.is_success() {
      return Err(NetworkError::Status {
        url: self.url.clone(),
        status: status.as_u16(),
      });
    }

    let body = response.bytes().await.map_err(request_error)?;
    debug!(bytes = body.len(), url = %self.url, "fetched playlist");

    Ok(serde_json::from_slice(&body)?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn source_for(server: &mockito::Server) -> HttpPlaylistSource {
    HttpPlaylistSource::new(&PlaylistConfig {
      url: format!("{}/devbytes.json", server.url()),
      timeout_secs: 5,
    })
    .unwrap()
  }

  #[tokio::test]
  async fn test_fetch_playlist_success() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("GET", "/devbytes.json")
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(
        r#"{"videos":[{"title":"A","description":"d","url":"u","updated":"2019-01-01","thumbnail":"t","closedCaptions":null}]}"#,
      )
      .create_async()
      .await;

    let playlist = source_for(&server).fetch_playlist().await.unwrap();

    mock.assert_async().await;
    assert_eq!(playlist.videos.len(), 1);
    assert_eq!(playlist.videos[0].url.as_deref(), Some("u"));
  }

  #[tokio::test]
  async fn test_non_success_status_is_network_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
      .mock("GET", "/devbytes.json")
      .with_status(503)
      .create_async()
      .await;

    let err = source_for(&server).fetch_playlist().await.unwrap_err();

    assert!(matches!(err, NetworkError::Status { status: 503, .. }));
  }

  #[tokio::test]
  async fn test_invalid_body_is_decode_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
      .mock("GET", "/devbytes.json")
      .with_status(200)
      .with_body("<html>not json</html>")
      .create_async()
      .await;

    let err = source_for(&server).fetch_playlist().await.unwrap_err();

    assert!(matches!(err, NetworkError::Decode(_)));
  }

  #[tokio::test]
  async fn test_unreachable_host_is_request_error() {
    let source = HttpPlaylistSource::new(&PlaylistConfig {
      url: "http://127.0.0.1:1/devbytes.json".to_string(),
      timeout_secs: 1,
    })
    .unwrap();

    let err = source.fetch_playlist().await.unwrap_err();

    assert!(matches!(err, NetworkError::Request { .. }));
  }
}
