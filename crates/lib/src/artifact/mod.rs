//! Artifact cache.
//!
//! Ensures a large downloadable file is present in a module's working
//! directory, preferring in order: the existing working copy, the project-level
//! cache copy, and finally one network fetch.
//!
//! Writes always go to a `.part` sibling and are renamed into place, so a file at
//! the working path is never the remains of an interrupted copy or download.

mod fetch;
mod types;

use std::path::Path;

use tokio::fs;
use tracing::{debug, info, warn};

use crate::util::hash::hash_file;

pub use fetch::{FetchError, Fetcher, HttpFetcher};
pub use types::{Artifact, ArtifactError, MaterializeSource, MaterializedPath};

/// Whether `path` holds a usable copy of an artifact.
///
/// Empty files are never usable. When `sha256` is given the content must match it.
pub fn is_valid_copy(path: &Path, sha256: Option<&str>) -> bool {
  let Ok(metadata) = std::fs::metadata(path) else {
    return false;
  };
  if !metadata.is_file() || metadata.len() == 0 {
    return false;
  }

  match sha256 {
    None => true,
    Some(expected) => match hash_file(path) {
      Ok(actual) if actual.matches(expected) => true,
      Ok(actual) => {
        warn!(path = %path.display(), expected = %expected, actual = %actual, "ignoring copy with wrong checksum");
        false
      }
      Err(e) => {
        warn!(path = %path.display(), error = %e, "ignoring unreadable copy");
        false
      }
    },
  }
}

/// Materializes artifacts using a [`Fetcher`] for the network step.
#[derive(Debug, Clone)]
pub struct ArtifactCache<F> {
  fetcher: F,
}

impl<F: Fetcher> ArtifactCache<F> {
  pub fn new(fetcher: F) -> Self {
    Self { fetcher }
  }

  pub fn fetcher(&self) -> &F {
    &self.fetcher
  }

  /// Make sure `artifact` exists at its working path.
  ///
  /// Performs at most one network fetch, and none at all when either the
  /// working copy or the cache copy is valid.
  ///
  /// # Errors
  ///
  /// - [`ArtifactError::Unavailable`] when the fetch fails
  /// - [`ArtifactError::ChecksumMismatch`] when the downloaded bytes are wrong
  /// - [`ArtifactError::Io`] on local filesystem failures
  pub async fn ensure_materialized(&self, artifact: &Artifact) -> Result<MaterializedPath, ArtifactError> {
    let expected = artifact.sha256.as_deref();

    if is_valid_copy(&artifact.work_path, expected) {
      debug!(path = %artifact.work_path.display(), "using working copy");
      return Ok(MaterializedPath {
        path: artifact.work_path.clone(),
        source: MaterializeSource::WorkingCopy,
      });
    }

    if let Some(dir) = artifact.work_path.parent() {
      fs::create_dir_all(dir).await.map_err(ArtifactError::io(dir))?;
    }

    let partial = artifact.partial_path();
    remove_if_exists(&partial).await?;

    if is_valid_copy(&artifact.cache_path, expected) {
      info!(from = %artifact.cache_path.display(), to = %artifact.work_path.display(), "copying cached artifact");
      fs::copy(&artifact.cache_path, &partial)
        .await
        .map_err(ArtifactError::io(&partial))?;
      return self.commit(&partial, artifact, MaterializeSource::Cache).await;
    }

    info!(name = %artifact.name, url = %artifact.url, "downloading artifact");
    let written = match self.fetcher.fetch(&artifact.url, &partial).await {
      Ok(written) => written,
      Err(source) => {
        remove_if_exists(&partial).await?;
        return Err(ArtifactError::Unavailable {
          name: artifact.name.clone(),
          url: artifact.url.clone(),
          source,
        });
      }
    };

    if written == 0 {
      remove_if_exists(&partial).await?;
      return Err(ArtifactError::Unavailable {
        name: artifact.name.clone(),
        url: artifact.url.clone(),
        source: FetchError::Request("empty response body".to_string()),
      });
    }

    if let Some(expected) = expected {
      let actual = hash_file(&partial).map_err(ArtifactError::io(&partial))?;
      if !actual.matches(expected) {
        remove_if_exists(&partial).await?;
        return Err(ArtifactError::ChecksumMismatch {
          name: artifact.name.clone(),
          expected: expected.to_string(),
          actual: actual.0,
        });
      }
    }

    self.commit(&partial, artifact, MaterializeSource::Network).await
  }

  async fn commit(
    &self,
    partial: &Path,
    artifact: &Artifact,
    source: MaterializeSource,
  ) -> Result<MaterializedPath, ArtifactError> {
    fs::rename(partial, &artifact.work_path)
      .await
      .map_err(ArtifactError::io(&artifact.work_path))?;

    info!(path = %artifact.work_path.display(), source = ?source, "artifact materialized");

    Ok(MaterializedPath {
      path: artifact.work_path.clone(),
      source,
    })
  }
}

async fn remove_if_exists(path: &Path) -> Result<(), ArtifactError> {
  match fs::remove_file(path).await {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(ArtifactError::io(path)(e)),
  }
}

#[cfg(test)]
mod tests {
  use std::path::PathBuf;
  use std::sync::Mutex;
  use std::sync::atomic::{AtomicUsize, Ordering};

  use tempfile::TempDir;
  use tracing_test::traced_test;

  use super::*;
  use crate::util::hash::hash_bytes;

  /// Fetcher that counts calls and serves a fixed body, or fails.
  struct CountingFetcher {
    calls: AtomicUsize,
    body: Option<Vec<u8>>,
    urls: Mutex<Vec<String>>,
  }

  impl CountingFetcher {
    fn serving(body: &[u8]) -> Self {
      Self {
        calls: AtomicUsize::new(0),
        body: Some(body.to_vec()),
        urls: Mutex::new(Vec::new()),
      }
    }

    fn failing() -> Self {
      Self {
        calls: AtomicUsize::new(0),
        body: None,
        urls: Mutex::new(Vec::new()),
      }
    }

    fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
    }
  }

  impl Fetcher for CountingFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      self.urls.lock().unwrap().push(url.to_string());
      match &self.body {
        Some(body) => {
          tokio::fs::write(dest, body).await?;
          Ok(body.len() as u64)
        }
        None => {
          // Simulate a connection dropped mid-transfer.
          tokio::fs::write(dest, b"partial").await?;
          Err(FetchError::Request("connection reset".to_string()))
        }
      }
    }
  }

  struct Layout {
    _temp: TempDir,
    artifact: Artifact,
  }

  fn layout(sha256: Option<String>) -> Layout {
    let temp = TempDir::new().unwrap();
    let artifact = Artifact {
      name: "agent.jar".to_string(),
      url: "https://example.com/agent.jar".to_string(),
      cache_path: temp.path().join("externalLibs").join("agent.jar"),
      work_path: temp.path().join("module").join("build").join("agent.jar"),
      sha256,
    };
    Layout { _temp: temp, artifact }
  }

  fn write(path: &PathBuf, content: &[u8]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
  }

  #[tokio::test]
  #[traced_test]
  async fn working_copy_means_no_network() {
    let l = layout(None);
    write(&l.artifact.work_path, b"existing");
    let cache = ArtifactCache::new(CountingFetcher::serving(b"fresh"));

    let result = cache.ensure_materialized(&l.artifact).await.unwrap();

    assert_eq!(result.source, MaterializeSource::WorkingCopy);
    assert_eq!(cache.fetcher().calls(), 0);
    assert_eq!(std::fs::read(&l.artifact.work_path).unwrap(), b"existing");
    assert!(logs_contain("using working copy"));
  }

  #[tokio::test]
  async fn cache_copy_is_copied_not_fetched() {
    let l = layout(None);
    write(&l.artifact.cache_path, b"cached");
    let cache = ArtifactCache::new(CountingFetcher::serving(b"fresh"));

    let result = cache.ensure_materialized(&l.artifact).await.unwrap();

    assert_eq!(result.source, MaterializeSource::Cache);
    assert_eq!(cache.fetcher().calls(), 0);
    assert_eq!(std::fs::read(&l.artifact.work_path).unwrap(), b"cached");
    assert!(l.artifact.cache_path.exists(), "cache copy must be left in place");
  }

  #[tokio::test]
  async fn nothing_local_fetches_exactly_once() {
    let l = layout(None);
    let cache = ArtifactCache::new(CountingFetcher::serving(b"fresh"));

    let result = cache.ensure_materialized(&l.artifact).await.unwrap();

    assert_eq!(result.source, MaterializeSource::Network);
    assert_eq!(result.path, l.artifact.work_path);
    assert_eq!(cache.fetcher().calls(), 1);
    assert_eq!(*cache.fetcher().urls.lock().unwrap(), vec![l.artifact.url.clone()]);
    assert_eq!(std::fs::read(&l.artifact.work_path).unwrap(), b"fresh");
    assert!(!l.artifact.partial_path().exists());

    // A second call finds the working copy.
    let again = cache.ensure_materialized(&l.artifact).await.unwrap();
    assert_eq!(again.source, MaterializeSource::WorkingCopy);
    assert_eq!(cache.fetcher().calls(), 1);
  }

  #[tokio::test]
  async fn failed_fetch_leaves_nothing_behind() {
    let l = layout(None);
    let cache = ArtifactCache::new(CountingFetcher::failing());

    let err = cache.ensure_materialized(&l.artifact).await.unwrap_err();

    assert!(matches!(err, ArtifactError::Unavailable { .. }));
    assert_eq!(cache.fetcher().calls(), 1);
    assert!(!l.artifact.work_path.exists());
    assert!(!l.artifact.partial_path().exists());
  }

  #[tokio::test]
  async fn stale_partial_file_is_not_materialized() {
    let l = layout(None);
    write(&l.artifact.partial_path(), b"half a jar");
    let cache = ArtifactCache::new(CountingFetcher::serving(b"fresh"));

    let result = cache.ensure_materialized(&l.artifact).await.unwrap();

    assert_eq!(result.source, MaterializeSource::Network);
    assert_eq!(std::fs::read(&l.artifact.work_path).unwrap(), b"fresh");
  }

  #[tokio::test]
  async fn empty_working_copy_is_replaced() {
    let l = layout(None);
    write(&l.artifact.work_path, b"");
    write(&l.artifact.cache_path, b"cached");
    let cache = ArtifactCache::new(CountingFetcher::serving(b"fresh"));

    let result = cache.ensure_materialized(&l.artifact).await.unwrap();

    assert_eq!(result.source, MaterializeSource::Cache);
  }

  #[tokio::test]
  async fn checksum_rejects_corrupt_working_copy() {
    let l = layout(Some(hash_bytes(b"fresh").0));
    write(&l.artifact.work_path, b"corrupt");
    let cache = ArtifactCache::new(CountingFetcher::serving(b"fresh"));

    let result = cache.ensure_materialized(&l.artifact).await.unwrap();

    assert_eq!(result.source, MaterializeSource::Network);
    assert_eq!(std::fs::read(&l.artifact.work_path).unwrap(), b"fresh");
  }

  #[tokio::test]
  async fn checksum_mismatch_on_download_is_fatal() {
    let l = layout(Some(hash_bytes(b"expected").0));
    let cache = ArtifactCache::new(CountingFetcher::serving(b"tampered"));

    let err = cache.ensure_materialized(&l.artifact).await.unwrap_err();

    assert!(matches!(err, ArtifactError::ChecksumMismatch { .. }));
    assert!(!l.artifact.work_path.exists());
    assert!(!l.artifact.partial_path().exists());
  }

  #[test]
  fn valid_copy_requires_non_empty_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("agent.jar");
    assert!(!is_valid_copy(&path, None));

    std::fs::write(&path, b"").unwrap();
    assert!(!is_valid_copy(&path, None));

    std::fs::write(&path, b"x").unwrap();
    assert!(is_valid_copy(&path, None));
    assert!(is_valid_copy(&path, Some(&hash_bytes(b"x").0)));
    assert!(!is_valid_copy(&path, Some(&hash_bytes(b"y").0)));

    assert!(!is_valid_copy(temp.path(), None), "directories are never valid copies");
  }
}
