//! Loading exported images into a local cluster.

use std::path::Path;

use tracing::info;

use super::ToolError;
use super::process::{ProcessError, ToolCommand, run_tool};

/// Adapter for `kind load image-archive`.
#[derive(Debug, Clone)]
pub struct ClusterLoader {
  tool: String,
}

impl ClusterLoader {
  pub fn new(tool: impl Into<String>) -> Self {
    Self { tool: tool.into() }
  }

  pub fn tool(&self) -> &str {
    &self.tool
  }

  pub fn load_command(&self, archive: &Path, cluster: &str) -> ToolCommand {
    ToolCommand::new(&self.tool)
      .args(["load", "image-archive"])
      .arg(archive.as_os_str())
      .args(["-n", cluster])
  }

  /// Load `archive` into `cluster`. `image` is only used for logging and errors.
  pub async fn load_to_cluster(&self, archive: &Path, cluster: &str, image: &str) -> Result<(), ToolError> {
    info!(image = %image, cluster = %cluster, archive = %archive.display(), "loading image into cluster");

    run_tool(&self.load_command(archive, cluster))
      .await
      .map_err(|e| match e {
        ProcessError::Spawn { program, source } => ToolError::Spawn { program, source },
        ProcessError::Failed(failure) => ToolError::LoadFailed {
          cluster: cluster.to_string(),
          failure,
        },
      })?;

    Ok(())
  }
}
