//! Adapters for the external tools a pipeline drives.
//!
//! Each adapter builds a [`ToolCommand`] and maps a failed run into a
//! [`ToolError`] that names what was being done.

mod cluster;
mod image;
mod package;
pub mod process;

use std::path::PathBuf;

use thiserror::Error;

pub use cluster::ClusterLoader;
pub use image::{ImageId, ImagePackager, ImageSpec, required_build_args};
pub use package::{ArchivePackager, MODULE_PLACEHOLDER};
pub use process::{ProcessError, ProcessFailure, ProcessOutput, ToolCommand, run_tool};

#[derive(Debug, Error)]
pub enum ToolError {
  #[error("failed to start {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("image build failed for {image}: {failure}")]
  BuildFailed { image: String, failure: ProcessFailure },

  #[error("image export failed for {image}: {failure}")]
  ExportFailed { image: String, failure: ProcessFailure },

  #[error("loading into cluster '{cluster}' failed: {failure}")]
  LoadFailed { cluster: String, failure: ProcessFailure },

  #[error("packaging {module} failed: {failure}")]
  PackageFailed { module: String, failure: ProcessFailure },

  #[error("build argument {name} required by {} has no value", dockerfile.display())]
  UnboundBuildArg { dockerfile: PathBuf, name: String },

  #[error("failed to read {}: {source}", path.display())]
  ReadDockerfile {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("archive for {module} not found at {}", path.display())]
  ArchiveMissing { module: String, path: PathBuf },
}

impl ToolError {
  /// The underlying process failure, when the tool ran and exited non-zero.
  pub fn failure(&self) -> Option<&ProcessFailure> {
    match self {
      ToolError::BuildFailed { failure, .. }
      | ToolError::ExportFailed { failure, .. }
      | ToolError::LoadFailed { failure, .. }
      | ToolError::PackageFailed { failure, .. } => Some(failure),
      _ => None,
    }
  }

  /// Exit code of the failed tool, if it ran and exited with one.
  pub fn exit_code(&self) -> Option<i32> {
    self.failure().and_then(|f| f.exit_code)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn exit_code_from_failure() {
    let err = ToolError::BuildFailed {
      image: "img".into(),
      failure: ProcessFailure {
        command: "podman build".into(),
        exit_code: Some(125),
        stdout: String::new(),
        stderr: "boom".into(),
      },
    };
    assert_eq!(err.exit_code(), Some(125));
    assert_eq!(err.failure().unwrap().stderr, "boom");
  }

  #[test]
  fn non_process_errors_have_no_exit_code() {
    let err = ToolError::ArchiveMissing {
      module: ":m".into(),
      path: PathBuf::from("/m.jar"),
    };
    assert_eq!(err.exit_code(), None);
    assert!(err.failure().is_none());
  }
}
