//! Producing a module's application archive.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::ToolError;
use super::process::{ProcessError, ToolCommand, run_tool};

/// Placeholder in the package command replaced by the module's project path.
pub const MODULE_PLACEHOLDER: &str = "{module}";

/// Runs the configured package command, then checks the archive exists.
///
/// With no command configured the archive is expected to have been built by
/// some earlier step; only its presence is checked.
#[derive(Debug, Clone)]
pub struct ArchivePackager {
  command: Option<Vec<String>>,
  project_root: PathBuf,
}

impl ArchivePackager {
  pub fn new(command: Option<Vec<String>>, project_root: impl Into<PathBuf>) -> Self {
    Self {
      command: command.filter(|c| !c.is_empty()),
      project_root: project_root.into(),
    }
  }

  /// The command that would package `module`, if one is configured.
  pub fn package_command(&self, module: &str) -> Option<ToolCommand> {
    let (program, args) = self.command.as_ref()?.split_first()?;
    Some(
      ToolCommand::new(program.replace(MODULE_PLACEHOLDER, module))
        .args(args.iter().map(|a| a.replace(MODULE_PLACEHOLDER, module)))
        .current_dir(&self.project_root),
    )
  }

  pub async fn package(&self, module: &str, archive: &Path) -> Result<(), ToolError> {
    if let Some(cmd) = self.package_command(module) {
      info!(module = %module, "packaging archive");
      run_tool(&cmd).await.map_err(|e| match e {
        ProcessError::Spawn { program, source } => ToolError::Spawn { program, source },
        ProcessError::Failed(failure) => ToolError::PackageFailed {
          module: module.to_string(),
          failure,
        },
      })?;
    } else {
      debug!(module = %module, "no package command configured");
    }

    match std::fs::metadata(archive) {
      Ok(meta) if meta.is_file() => Ok(()),
      _ => Err(ToolError::ArchiveMissing {
        module: module.to_string(),
        path: archive.to_path_buf(),
      }),
    }
  }
}
