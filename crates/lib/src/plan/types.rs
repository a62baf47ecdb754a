//! Types for build plans.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artifact::{Artifact, is_valid_copy};
use crate::tools::{ImageId, ImageSpec};

/// The kinds of work a plan is made of, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
  FetchArtifact,
  PackageArchive,
  BuildImage,
  ExportImage,
  LoadToCluster,
}

impl Stage {
  pub fn as_str(&self) -> &'static str {
    match self {
      Stage::FetchArtifact => "fetch-artifact",
      Stage::PackageArchive => "package-archive",
      Stage::BuildImage => "build-image",
      Stage::ExportImage => "export-image",
      Stage::LoadToCluster => "load-to-cluster",
    }
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Node identifier: `<stage>:<module-name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
  pub fn new(stage: Stage, module_name: &str) -> Self {
    Self(format!("{}:{}", stage, module_name))
  }
}

impl fmt::Display for TaskId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Decides at execution time whether a node's work is still needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Guard {
  Always,
  /// Run only while `path` is missing, empty, or fails the digest check.
  MissingFile { path: PathBuf, sha256: Option<String> },
}

impl Guard {
  pub fn should_run(&self) -> bool {
    match self {
      Guard::Always => true,
      Guard::MissingFile { path, sha256 } => !is_valid_copy(path, sha256.as_deref()),
    }
  }
}

/// What a node does when it runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskAction {
  FetchArtifact(Artifact),
  PackageArchive { module: String, archive: PathBuf },
  BuildImage(ImageSpec),
  ExportImage { image: String, archive: PathBuf },
  LoadToCluster { archive: PathBuf, cluster: String, image: String },
}

impl TaskAction {
  pub fn stage(&self) -> Stage {
    match self {
      TaskAction::FetchArtifact(_) => Stage::FetchArtifact,
      TaskAction::PackageArchive { .. } => Stage::PackageArchive,
      TaskAction::BuildImage(_) => Stage::BuildImage,
      TaskAction::ExportImage { .. } => Stage::ExportImage,
      TaskAction::LoadToCluster { .. } => Stage::LoadToCluster,
    }
  }

  pub fn image_id(&self) -> Option<ImageId> {
    match self {
      TaskAction::BuildImage(spec) => Some(ImageId(spec.image.clone())),
      TaskAction::ExportImage { image, .. } | TaskAction::LoadToCluster { image, .. } => Some(ImageId(image.clone())),
      _ => None,
    }
  }
}

/// A single unit of work in a [`BuildPlan`](super::BuildPlan).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskNode {
  pub id: TaskId,
  /// Project path of the module this node works on.
  pub module: String,
  /// Nodes that must succeed (or be skipped) first.
  pub deps: Vec<TaskId>,
  pub action: TaskAction,
  pub guard: Guard,
}

impl TaskNode {
  pub fn stage(&self) -> Stage {
    self.action.stage()
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
  #[error("duplicate node {0}")]
  DuplicateNode(TaskId),

  #[error("node {node} depends on unknown node {dependency}")]
  UnknownDependency { node: TaskId, dependency: TaskId },

  #[error("dependency cycle detected")]
  CycleDetected,
}

/// Per-invocation choices that shape a plan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlanOptions {
  /// Target image platform; `None` builds for the host.
  pub platform: Option<String>,
  /// Add `load-to-cluster` nodes.
  pub load_to_cluster: bool,
  /// Overrides the configured cluster name.
  pub cluster_name: Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn task_id_format() {
    assert_eq!(
      TaskId::new(Stage::BuildImage, "cp-postgresql-azurevault").to_string(),
      "build-image:cp-postgresql-azurevault"
    );
  }

  #[test]
  fn missing_file_guard_follows_the_filesystem() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("agent.jar");
    let guard = Guard::MissingFile {
      path: path.clone(),
      sha256: None,
    };

    assert!(guard.should_run());
    std::fs::write(&path, b"").unwrap();
    assert!(guard.should_run(), "empty file is not materialized");
    std::fs::write(&path, b"agent").unwrap();
    assert!(!guard.should_run());
  }

  #[test]
  fn guard_serializes_as_data() {
    let json = serde_json::to_value(Guard::MissingFile {
      path: PathBuf::from("/m/build/agent.jar"),
      sha256: None,
    })
    .unwrap();
    assert_eq!(json["type"], "missing_file");
    assert_eq!(json["path"], "/m/build/agent.jar");
  }
}
