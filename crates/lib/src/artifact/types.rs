//! Types for artifact materialization.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::fetch::FetchError;
use crate::consts::PARTIAL_SUFFIX;

/// A named external file that must be present in a module's working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
  /// File name, e.g. `opentelemetry-javaagent.jar`.
  pub name: String,
  /// Where to download it from when no local copy exists.
  pub url: String,
  /// Project-level shared copy, consulted before the network.
  pub cache_path: PathBuf,
  /// Where the build expects the file.
  pub work_path: PathBuf,
  /// Expected SHA-256 (hex). When set, local copies are only trusted if they match.
  pub sha256: Option<String>,
}

impl Artifact {
  /// Sibling path that in-flight writes go to before being renamed into place.
  pub fn partial_path(&self) -> PathBuf {
    partial_path(&self.work_path)
  }
}

pub(crate) fn partial_path(path: &Path) -> PathBuf {
  let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
  name.push(PARTIAL_SUFFIX);
  path.with_file_name(name)
}

/// Where a materialized artifact came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterializeSource {
  /// The working copy was already present.
  WorkingCopy,
  /// Copied from the project cache.
  Cache,
  /// Downloaded.
  Network,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterializedPath {
  pub path: PathBuf,
  pub source: MaterializeSource,
}

/// Errors that can occur while materializing an artifact.
#[derive(Debug, Error)]
pub enum ArtifactError {
  /// The network fetch failed. Nothing is left at the working path.
  #[error("artifact {name} unavailable from {url}: {source}")]
  Unavailable {
    name: String,
    url: String,
    #[source]
    source: FetchError,
  },

  /// The downloaded bytes do not match the configured digest.
  #[error("checksum mismatch for {name}: expected {expected}, got {actual}")]
  ChecksumMismatch {
    name: String,
    expected: String,
    actual: String,
  },

  /// Local filesystem error while copying or moving the artifact.
  #[error("failed to materialize {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl ArtifactError {
  /// The artifact could not be obtained: the fetch failed or the bytes were
  /// not the expected ones.
  pub fn is_unavailable(&self) -> bool {
    matches!(self, ArtifactError::Unavailable { .. } | ArtifactError::ChecksumMismatch { .. })
  }

  pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
    move |source| Self::Io {
      path: path.to_path_buf(),
      source,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_path_is_a_sibling() {
    let artifact = Artifact {
      name: "agent.jar".to_string(),
      url: "https://example.com/agent.jar".to_string(),
      cache_path: PathBuf::from("/repo/externalLibs/agent.jar"),
      work_path: PathBuf::from("/repo/mod/build/agent.jar"),
      sha256: None,
    };
    assert_eq!(artifact.partial_path(), PathBuf::from("/repo/mod/build/agent.jar.part"));
  }
}
