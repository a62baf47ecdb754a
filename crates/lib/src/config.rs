//! Layered configuration.
//!
//! Layers, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. the user file, `$XDG_CONFIG_HOME/launchpack/config.toml`
//! 3. the project file, `<project root>/launchpack.toml`
//!
//! Environment variables and command-line flags are applied on top by the CLI.
//! Files are merged table by table, so a layer only needs the keys it changes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{
  DEFAULT_ARCHIVE_BUILD_ARG, DEFAULT_ARTIFACT_BUILD_ARG, DEFAULT_ARTIFACT_CACHE_DIR, DEFAULT_ARTIFACT_NAME,
  DEFAULT_ARTIFACT_URL, DEFAULT_CLUSTER_NAME, DEFAULT_CLUSTER_TOOL, DEFAULT_DOCKERFILE, DEFAULT_FETCH_TIMEOUT_SECS,
  DEFAULT_IMAGE_ARCHIVE, DEFAULT_IMAGE_TAG, DEFAULT_IMAGE_TOOL, DEFAULT_LAUNCHERS_DIR, DEFAULT_LIBS_DIR,
  PROJECT_CONFIG_FILE, USER_CONFIG_FILE,
};
use crate::plan::PlanLayout;
use crate::platform::paths::config_dir;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid configuration in {}: {source}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("invalid configuration: {0}")]
  Invalid(#[source] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArtifactConfig {
  pub name: String,
  pub url: String,
  pub sha256: Option<String>,
  /// Shared cache directory; relative paths are resolved against the project root.
  pub cache_dir: PathBuf,
  #[serde(with = "humantime_duration")]
  pub fetch_timeout: Duration,
}

impl Default for ArtifactConfig {
  fn default() -> Self {
    Self {
      name: DEFAULT_ARTIFACT_NAME.to_string(),
      url: DEFAULT_ARTIFACT_URL.to_string(),
      sha256: None,
      cache_dir: PathBuf::from(DEFAULT_ARTIFACT_CACHE_DIR),
      fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageConfig {
  /// Container CLI, `podman` or `docker`.
  pub tool: String,
  pub dockerfile: String,
  pub tag: String,
  pub archive_name: String,
  pub archive_build_arg: String,
  pub artifact_build_arg: String,
}

impl Default for ImageConfig {
  fn default() -> Self {
    Self {
      tool: DEFAULT_IMAGE_TOOL.to_string(),
      dockerfile: DEFAULT_DOCKERFILE.to_string(),
      tag: DEFAULT_IMAGE_TAG.to_string(),
      archive_name: DEFAULT_IMAGE_ARCHIVE.to_string(),
      archive_build_arg: DEFAULT_ARCHIVE_BUILD_ARG.to_string(),
      artifact_build_arg: DEFAULT_ARTIFACT_BUILD_ARG.to_string(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterConfig {
  pub tool: String,
  pub name: String,
}

impl Default for ClusterConfig {
  fn default() -> Self {
    Self {
      tool: DEFAULT_CLUSTER_TOOL.to_string(),
      name: DEFAULT_CLUSTER_NAME.to_string(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackageConfig {
  /// Command producing a module's archive, as argv tokens. `{module}` is
  /// replaced by the module's project path.
  pub command: Option<Vec<String>>,
  pub launchers_dir: String,
  pub libs_dir: String,
}

impl Default for PackageConfig {
  fn default() -> Self {
    Self {
      command: None,
      launchers_dir: DEFAULT_LAUNCHERS_DIR.to_string(),
      libs_dir: DEFAULT_LIBS_DIR.to_string(),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LaunchpackConfig {
  pub artifact: ArtifactConfig,
  pub image: ImageConfig,
  pub cluster: ClusterConfig,
  pub package: PackageConfig,
}

impl LaunchpackConfig {
  /// Load the user and project files for `project_root` over the defaults.
  pub fn load(project_root: &Path) -> Result<Self, ConfigError> {
    let mut layers = Vec::new();
    if let Some(dir) = config_dir() {
      layers.push(dir.join(USER_CONFIG_FILE));
    }
    layers.push(project_root.join(PROJECT_CONFIG_FILE));
    Self::load_layers(&layers)
  }

  /// Merge the given files, later ones taking precedence. Missing files are
  /// skipped.
  pub fn load_layers(paths: &[PathBuf]) -> Result<Self, ConfigError> {
    let mut merged = toml::Table::new();

    for path in paths {
      let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
        Err(source) => {
          return Err(ConfigError::Read {
            path: path.clone(),
            source,
          });
        }
      };

      let table: toml::Table = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
      })?;
      // Check the layer on its own so errors name the file they came from.
      toml::Value::Table(table.clone())
        .try_into::<LaunchpackConfig>()
        .map_err(|source| ConfigError::Parse {
          path: path.clone(),
          source,
        })?;

      debug!(path = %path.display(), "loaded config layer");
      merge_tables(&mut merged, table);
    }

    toml::Value::Table(merged).try_into().map_err(ConfigError::Invalid)
  }

  /// The artifact cache directory for `project_root`.
  pub fn cache_dir(&self, project_root: &Path) -> PathBuf {
    if self.artifact.cache_dir.is_absolute() {
      self.artifact.cache_dir.clone()
    } else {
      project_root.join(&self.artifact.cache_dir)
    }
  }

  /// Names and locations plans for `project_root` are built with.
  pub fn plan_layout(&self, project_root: &Path) -> PlanLayout {
    PlanLayout {
      artifact_name: self.artifact.name.clone(),
      artifact_url: self.artifact.url.clone(),
      artifact_sha256: self.artifact.sha256.clone(),
      cache_dir: self.cache_dir(project_root),
      dockerfile: self.image.dockerfile.clone(),
      image_tag: self.image.tag.clone(),
      image_archive: self.image.archive_name.clone(),
      libs_dir: self.package.libs_dir.clone(),
      archive_build_arg: self.image.archive_build_arg.clone(),
      artifact_build_arg: self.image.artifact_build_arg.clone(),
      cluster_name: self.cluster.name.clone(),
    }
  }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
  for (key, value) in overlay {
    match (base.get_mut(&key), value) {
      (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => merge_tables(existing, incoming),
      (_, value) => {
        base.insert(key, value);
      }
    }
  }
}

mod humantime_duration {
  use std::time::Duration;

  use serde::{Deserialize, Deserializer, Serializer};

  pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&humantime::format_duration(*duration).to_string())
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(&s).map_err(serde::de::Error::custom)
  }
}
