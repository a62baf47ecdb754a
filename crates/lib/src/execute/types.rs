//! Types for plan execution.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::artifact::{ArtifactError, MaterializedPath};
use crate::plan::{Stage, TaskId};
use crate::tools::{ImageId, ToolError};

/// Lifecycle of a node during execution.
///
/// `Pending → Ready → Running → Succeeded | Failed`, or `Pending → Skipped`
/// when the guard reports the work is already done. Nodes never reached keep
/// `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
  Pending,
  Ready,
  Running,
  Succeeded,
  Skipped,
  Failed,
}

impl NodeState {
  pub fn is_terminal(&self) -> bool {
    matches!(self, NodeState::Succeeded | NodeState::Skipped | NodeState::Failed)
  }
}

/// Errors raised by an [`ActionRunner`](super::ActionRunner).
#[derive(Debug, Error)]
pub enum ActionError {
  #[error(transparent)]
  Artifact(#[from] ArtifactError),

  #[error(transparent)]
  Tool(#[from] ToolError),
}

impl ActionError {
  pub fn exit_code(&self) -> Option<i32> {
    match self {
      ActionError::Tool(e) => e.exit_code(),
      ActionError::Artifact(_) => None,
    }
  }

  pub fn is_artifact_unavailable(&self) -> bool {
    matches!(self, ActionError::Artifact(e) if e.is_unavailable())
  }
}

/// What a successful action produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionOutput {
  Materialized(MaterializedPath),
  Packaged { archive: PathBuf },
  Built { image: ImageId },
  Exported { archive: PathBuf },
  Loaded { cluster: String },
}

/// Why a node failed, with the tool's output kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureDetail {
  pub message: String,
  pub exit_code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
  pub artifact_unavailable: bool,
}

impl FailureDetail {
  pub fn interrupted() -> Self {
    Self {
      message: "interrupted".to_string(),
      exit_code: None,
      stdout: String::new(),
      stderr: String::new(),
      artifact_unavailable: false,
    }
  }
}

impl From<&ActionError> for FailureDetail {
  fn from(err: &ActionError) -> Self {
    let (stdout, stderr) = match err {
      ActionError::Tool(tool) => tool
        .failure()
        .map(|f| (f.stdout.clone(), f.stderr.clone()))
        .unwrap_or_default(),
      ActionError::Artifact(_) => Default::default(),
    };
    Self {
      message: err.to_string(),
      exit_code: err.exit_code(),
      stdout,
      stderr,
      artifact_unavailable: err.is_artifact_unavailable(),
    }
  }
}

fn serialize_millis<S: Serializer>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
  match duration {
    Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
    None => serializer.serialize_none(),
  }
}

/// Final record of one node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
  pub id: TaskId,
  pub stage: Stage,
  pub state: NodeState,
  #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
  pub duration: Option<Duration>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub output: Option<ActionOutput>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub failure: Option<FailureDetail>,
}

impl NodeReport {
  pub(crate) fn pending(id: TaskId, stage: Stage) -> Self {
    Self {
      id,
      stage,
      state: NodeState::Pending,
      duration: None,
      output: None,
      failure: None,
    }
  }
}

/// Errors surfaced from an [`ExecutionReport`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunError {
  #[error("{node}: {message}")]
  ArtifactUnavailable { node: TaskId, message: String },

  #[error("{node} failed: {message}")]
  TaskFailed {
    node: TaskId,
    exit_code: Option<i32>,
    message: String,
  },

  #[error("interrupted while running {}", describe_running(.running))]
  Interrupted { running: Vec<TaskId> },
}

fn describe_running(running: &[TaskId]) -> String {
  if running.is_empty() {
    return "the plan".to_string();
  }
  running.iter().map(|id| id.0.as_str()).collect::<Vec<_>>().join(", ")
}

/// Outcome of executing a plan, one entry per node in plan order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionReport {
  pub nodes: Vec<NodeReport>,
  pub interrupted: bool,
  #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
  pub duration: Option<Duration>,
}

impl ExecutionReport {
  pub fn node(&self, id: &TaskId) -> Option<&NodeReport> {
    self.nodes.iter().find(|n| &n.id == id)
  }

  pub fn state(&self, id: &TaskId) -> Option<NodeState> {
    self.node(id).map(|n| n.state)
  }

  pub fn count(&self, state: NodeState) -> usize {
    self.nodes.iter().filter(|n| n.state == state).count()
  }

  pub fn failed(&self) -> Option<&NodeReport> {
    self.nodes.iter().find(|n| n.state == NodeState::Failed)
  }

  /// True when every node succeeded or was skipped.
  pub fn is_success(&self) -> bool {
    !self.interrupted
      && self
        .nodes
        .iter()
        .all(|n| matches!(n.state, NodeState::Succeeded | NodeState::Skipped))
  }

  /// Turn the report into an error naming the node that stopped the plan.
  pub fn ensure_success(&self) -> Result<(), RunError> {
    if self.interrupted {
      return Err(RunError::Interrupted {
        running: self
          .nodes
          .iter()
          .filter(|n| n.state == NodeState::Failed)
          .map(|n| n.id.clone())
          .collect(),
      });
    }

    let Some(node) = self.failed() else {
      return Ok(());
    };
    let detail = node.failure.clone().unwrap_or_else(FailureDetail::interrupted);

    if detail.artifact_unavailable {
      Err(RunError::ArtifactUnavailable {
        node: node.id.clone(),
        message: detail.message,
      })
    } else {
      Err(RunError::TaskFailed {
        node: node.id.clone(),
        exit_code: detail.exit_code,
        message: detail.message,
      })
    }
  }
}

/// Configuration for plan execution.
#[derive(Debug, Clone)]
pub struct ExecuteConfig {
  /// Maximum number of nodes of one wave running at once. `1` runs the plan
  /// strictly sequentially.
  pub parallelism: usize,
}

impl Default for ExecuteConfig {
  fn default() -> Self {
    Self { parallelism: 1 }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tools::ProcessFailure;

  fn report(states: &[(&str, NodeState)]) -> ExecutionReport {
    ExecutionReport {
      nodes: states
        .iter()
        .map(|(id, state)| NodeReport {
          state: *state,
          ..NodeReport::pending(TaskId(id.to_string()), Stage::BuildImage)
        })
        .collect(),
      ..Default::default()
    }
  }

  #[test]
  fn empty_report_is_success() {
    let report = ExecutionReport::default();
    assert!(report.is_success());
    assert!(report.ensure_success().is_ok());
  }

  #[test]
  fn skipped_counts_as_success() {
    let report = report(&[("a", NodeState::Skipped), ("b", NodeState::Succeeded)]);
    assert!(report.is_success());
  }

  #[test]
  fn pending_is_not_success() {
    let report = report(&[("a", NodeState::Succeeded), ("b", NodeState::Pending)]);
    assert!(!report.is_success());
  }

  #[test]
  fn failure_detail_keeps_tool_output() {
    let err = ActionError::Tool(ToolError::BuildFailed {
      image: "img".into(),
      failure: ProcessFailure {
        command: "podman build".into(),
        exit_code: Some(125),
        stdout: "STEP 1/3\n".into(),
        stderr: "Error: denied\n".into(),
      },
    });
    let detail = FailureDetail::from(&err);

    assert_eq!(detail.exit_code, Some(125));
    assert_eq!(detail.stdout, "STEP 1/3\n");
    assert_eq!(detail.stderr, "Error: denied\n");
    assert!(!detail.artifact_unavailable);
  }

  #[test]
  fn ensure_success_names_failed_node() {
    let mut report = report(&[("build-image:m", NodeState::Failed), ("export-image:m", NodeState::Pending)]);
    report.nodes[0].failure = Some(FailureDetail {
      message: "boom".into(),
      exit_code: Some(1),
      stdout: String::new(),
      stderr: String::new(),
      artifact_unavailable: false,
    });

    assert_eq!(
      report.ensure_success(),
      Err(RunError::TaskFailed {
        node: TaskId("build-image:m".into()),
        exit_code: Some(1),
        message: "boom".into(),
      })
    );
  }

  #[test]
  fn checksum_mismatch_is_artifact_unavailable() {
    let err = ActionError::Artifact(ArtifactError::ChecksumMismatch {
      name: "agent.jar".into(),
      expected: "aa".into(),
      actual: "bb".into(),
    });
    let mut report = report(&[("fetch-artifact:m", NodeState::Failed)]);
    report.nodes[0].failure = Some(FailureDetail::from(&err));

    assert!(matches!(
      report.ensure_success(),
      Err(RunError::ArtifactUnavailable { ref node, .. }) if node.0 == "fetch-artifact:m"
    ));
  }

  #[test]
  fn default_parallelism_is_sequential() {
    assert_eq!(ExecuteConfig::default().parallelism, 1);
  }

  #[test]
  fn report_serializes_durations_as_millis() {
    let mut report = report(&[("a", NodeState::Succeeded)]);
    report.nodes[0].duration = Some(Duration::from_millis(1500));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["nodes"][0]["duration_ms"], 1500);
    assert_eq!(json["nodes"][0]["state"], "succeeded");
  }
}
