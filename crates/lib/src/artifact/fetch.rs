//! Network fetch capability.
//!
//! [`Fetcher`] is the seam between the artifact cache and the network.
//! [`HttpFetcher`] streams an HTTP(S) response body to disk.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum FetchError {
  #[error("HTTP {status}")]
  Status { status: u16 },

  #[error("request failed: {0}")]
  Request(String),

  #[error("write failed: {0}")]
  Io(#[from] std::io::Error),
}

/// Downloads a URL to a file.
pub trait Fetcher: Send + Sync {
  /// Write the body of `url` to `dest`, returning the number of bytes written.
  ///
  /// `dest` may be left partially written on error; callers own cleanup.
  fn fetch(&self, url: &str, dest: &Path) -> impl Future<Output = Result<u64, FetchError>> + Send;
}

/// [`Fetcher`] over HTTP(S) using `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  /// Create a fetcher whose requests time out after `timeout`.
  pub fn new(timeout: Duration) -> Result<Self, FetchError> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .user_agent(concat!("launchpack/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| FetchError::Request(e.to_string()))?;
    Ok(Self { client })
  }
}

impl Fetcher for HttpFetcher {
  async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
    info!(url = %url, "fetching URL");

    let mut response = self
      .client
      .get(url)
      .send()
      .await
      .map_err(|e| FetchError::Request(e.to_string()))?;

    if !response.status().is_success() {
      return Err(FetchError::Status {
        status: response.status().as_u16(),
      });
    }

    let mut file = fs::File::create(dest).await?;
    let mut written: u64 = 0;

    while let Some(chunk) = response.chunk().await.map_err(|e| FetchError::Request(e.to_string()))? {
      file.write_all(&chunk).await?;
      written += chunk.len() as u64;
    }

    file.flush().await?;
    file.sync_all().await?;

    debug!(path = ?dest, size = written, "download complete");

    Ok(written)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[tokio::test]
  async fn http_fetch_writes_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("GET", "/agent.jar")
      .with_status(200)
      .with_body("agent-bytes")
      .create_async()
      .await;

    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("agent.jar");
    let fetcher = HttpFetcher::new(Duration::from_secs(10)).unwrap();

    let written = fetcher
      .fetch(&format!("{}/agent.jar", server.url()), &dest)
      .await
      .unwrap();

    mock.assert_async().await;
    assert_eq!(written, 11);
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "agent-bytes");
  }

  #[tokio::test]
  async fn http_fetch_reports_status() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server.mock("GET", "/missing.jar").with_status(404).create_async().await;

    let temp = TempDir::new().unwrap();
    let fetcher = HttpFetcher::new(Duration::from_secs(10)).unwrap();

    let err = fetcher
      .fetch(&format!("{}/missing.jar", server.url()), &temp.path().join("missing.jar"))
      .await
      .unwrap_err();

    assert!(matches!(err, FetchError::Status { status: 404 }));
    assert!(!temp.path().join("missing.jar").exists());
  }
}
