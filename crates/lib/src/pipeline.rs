//! The end-to-end flow: resolve → check → plan → execute.
//!
//! Everything that can be rejected is rejected before a plan exists, so an
//! invalid variant or a missing module never causes a side effect.

use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::artifact::{ArtifactCache, ArtifactError, FetchError, HttpFetcher, MaterializedPath};
use crate::config::{ConfigError, LaunchpackConfig};
use crate::execute::{RunError, Toolchain};
use crate::plan::{BuildPlan, PlanBuilder, PlanError, PlanOptions};
use crate::project::{ModuleNotFound, ProjectLookup, SettingsError, check_all};
use crate::tools::{ArchivePackager, ClusterLoader, ImagePackager};
use crate::variant::{ModulePrefix, ModuleRef, ResolvedVariant, VariantError, resolve};

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_INVALID_VARIANT: i32 = 2;
pub const EXIT_MODULE_NOT_FOUND: i32 = 3;
pub const EXIT_ARTIFACT_UNAVAILABLE: i32 = 4;
pub const EXIT_TASK_FAILED: i32 = 5;

#[derive(Debug, Error)]
pub enum PipelineError {
  #[error(transparent)]
  InvalidVariant(#[from] VariantError),

  #[error(transparent)]
  ModuleNotFound(#[from] ModuleNotFound),

  #[error("invalid launcher name '{0}'")]
  InvalidLauncher(String),

  #[error("{module}: {source}")]
  Artifact {
    module: String,
    #[source]
    source: ArtifactError,
  },

  #[error(transparent)]
  Run(#[from] RunError),

  #[error(transparent)]
  Plan(#[from] PlanError),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Settings(#[from] SettingsError),

  #[error("failed to set up HTTP client: {0}")]
  Http(#[from] FetchError),
}

impl PipelineError {
  /// Process exit code for this error.
  pub fn exit_code(&self) -> i32 {
    match self {
      PipelineError::InvalidVariant(_) => EXIT_INVALID_VARIANT,
      PipelineError::ModuleNotFound(_) => EXIT_MODULE_NOT_FOUND,
      PipelineError::Artifact { source, .. } if source.is_unavailable() => EXIT_ARTIFACT_UNAVAILABLE,
      PipelineError::Run(RunError::ArtifactUnavailable { .. }) => EXIT_ARTIFACT_UNAVAILABLE,
      PipelineError::Run(RunError::TaskFailed { .. }) => EXIT_TASK_FAILED,
      _ => EXIT_FAILURE,
    }
  }
}

/// The modules one launcher contributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LauncherSelection {
  pub launcher: String,
  /// Always-present module; checked but not built.
  pub base: ModuleRef,
  pub resolved: ResolvedVariant,
}

/// A request to build one or more launchers.
#[derive(Debug, Clone)]
pub struct BuildRequest {
  pub launchers: Vec<String>,
  pub vault_type: String,
  pub options: PlanOptions,
}

/// A checked selection and the plan built from it.
#[derive(Debug)]
pub struct Prepared {
  pub selections: Vec<LauncherSelection>,
  pub plan: BuildPlan,
}

impl Prepared {
  pub fn modules(&self) -> impl Iterator<Item = &ModuleRef> {
    self.selections.iter().flat_map(|s| s.resolved.iter())
  }
}

/// Reject launcher names that are not a single path segment.
pub fn validate_launcher(name: &str) -> Result<(), PipelineError> {
  let valid = !name.is_empty()
    && name != "."
    && name != ".."
    && !name.chars().any(|c| c == ':' || c == '/' || c == '\\' || c.is_whitespace());
  if valid {
    Ok(())
  } else {
    Err(PipelineError::InvalidLauncher(name.to_string()))
  }
}

/// Resolve `vault_type` for every launcher, then check all modules exist.
///
/// All launchers are resolved before anything is looked up. Repeated launcher
/// names are only selected once.
pub fn select(
  config: &LaunchpackConfig,
  project_root: &Path,
  launchers: &[String],
  vault_type: &str,
  lookup: &impl ProjectLookup,
) -> Result<Vec<LauncherSelection>, PipelineError> {
  let mut selections: Vec<LauncherSelection> = Vec::new();

  for launcher in launchers {
    validate_launcher(launcher)?;
    if selections.iter().any(|s| &s.launcher == launcher) {
      continue;
    }
    let prefix = ModulePrefix::for_launcher(launcher, &config.package.launchers_dir, project_root);
    let resolved = resolve(vault_type, &prefix)?;
    selections.push(LauncherSelection {
      launcher: launcher.clone(),
      base: prefix.base_module(),
      resolved,
    });
  }

  for selection in &selections {
    check_all(std::iter::once(&selection.base).chain(selection.resolved.iter()), lookup)?;
  }

  info!(
    launchers = selections.len(),
    modules = selections.iter().map(|s| s.resolved.len()).sum::<usize>(),
    vault_type = %vault_type,
    "selected modules"
  );

  Ok(selections)
}

/// Select the modules of `request` and build their plan.
pub fn prepare(
  config: &LaunchpackConfig,
  project_root: &Path,
  request: &BuildRequest,
  lookup: &impl ProjectLookup,
) -> Result<Prepared, PipelineError> {
  let selections = select(config, project_root, &request.launchers, &request.vault_type, lookup)?;

  let builder = PlanBuilder::new(config.plan_layout(project_root));
  let plan = builder.build(
    selections.iter().flat_map(|s| s.resolved.iter()),
    &request.options,
  )?;

  Ok(Prepared { selections, plan })
}

/// The production runner for `config`.
pub fn toolchain(config: &LaunchpackConfig, project_root: &Path) -> Result<Toolchain<HttpFetcher>, PipelineError> {
  let fetcher = HttpFetcher::new(config.artifact.fetch_timeout)?;
  Ok(Toolchain::new(
    ArtifactCache::new(fetcher),
    ImagePackager::new(&config.image.tool),
    ClusterLoader::new(&config.cluster.tool),
    ArchivePackager::new(config.package.command.clone(), project_root),
  ))
}

/// Materialise the artifact in every selected module, without building.
pub async fn fetch_artifacts(
  config: &LaunchpackConfig,
  project_root: &Path,
  launchers: &[String],
  vault_type: &str,
  lookup: &impl ProjectLookup,
) -> Result<Vec<(ModuleRef, MaterializedPath)>, PipelineError> {
  let selections = select(config, project_root, launchers, vault_type, lookup)?;
  let layout = config.plan_layout(project_root);
  let cache = ArtifactCache::new(HttpFetcher::new(config.artifact.fetch_timeout)?);

  let mut materialized = Vec::new();
  for module in selections.iter().flat_map(|s| s.resolved.iter()) {
    let artifact = layout.artifact_for(module);
    let path = cache
      .ensure_materialized(&artifact)
      .await
      .map_err(|source| PipelineError::Artifact {
        module: module.path.clone(),
        source,
      })?;
    materialized.push((module.clone(), path));
  }

  Ok(materialized)
}
