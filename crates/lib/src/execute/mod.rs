//! Plan execution.
//!
//! Walks a [`BuildPlan`] wave by wave. A node runs only after every
//! dependency succeeded or was skipped; the first failure halts the plan and
//! leaves every node not yet started in [`NodeState::Pending`]. Nothing is
//! retried and completed side effects are not rolled back.

mod toolchain;
mod types;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::plan::{BuildPlan, TaskAction, TaskId};

pub use toolchain::Toolchain;
pub use types::{
  ActionError, ActionOutput, ExecuteConfig, ExecutionReport, FailureDetail, NodeReport, NodeState, RunError,
};

/// Performs the work a node describes.
///
/// [`Toolchain`] is the production implementation; tests substitute their own.
pub trait ActionRunner: Send + Sync {
  fn run(&self, action: &TaskAction) -> impl Future<Output = Result<ActionOutput, ActionError>> + Send;
}

/// Execute `plan` to completion or first failure.
pub async fn execute_plan<R>(plan: &BuildPlan, runner: Arc<R>, config: &ExecuteConfig) -> ExecutionReport
where
  R: ActionRunner + 'static,
{
  execute_plan_until(plan, runner, config, std::future::pending::<()>()).await
}

/// Execute `plan`, aborting when `shutdown` resolves.
///
/// Aborting drops in-flight actions, which kills their child processes. Nodes
/// cut short are reported as failed and the report is marked interrupted.
pub async fn execute_plan_until<R, S>(
  plan: &BuildPlan,
  runner: Arc<R>,
  config: &ExecuteConfig,
  shutdown: S,
) -> ExecutionReport
where
  R: ActionRunner + 'static,
  S: Future<Output = ()>,
{
  let started = Instant::now();
  tokio::pin!(shutdown);

  let mut report = ExecutionReport {
    nodes: plan
      .nodes()
      .iter()
      .map(|n| NodeReport::pending(n.id.clone(), n.stage()))
      .collect(),
    ..Default::default()
  };
  let position: HashMap<TaskId, usize> = plan
    .nodes()
    .iter()
    .enumerate()
    .map(|(i, n)| (n.id.clone(), i))
    .collect();

  let waves = plan.execution_waves();
  let parallelism = config.parallelism.max(1);
  info!(nodes = plan.len(), waves = waves.len(), parallelism, "executing plan");

  let semaphore = Arc::new(Semaphore::new(parallelism));
  let halted = Arc::new(AtomicBool::new(false));

  'waves: for (wave_idx, wave) in waves.iter().enumerate() {
    debug!(wave = wave_idx, nodes = wave.len(), "executing wave");

    let mut join_set = JoinSet::new();
    let mut tasks: HashMap<tokio::task::Id, usize> = HashMap::new();
    let (started_tx, mut started_rx) = mpsc::unbounded_channel::<usize>();

    for id in wave {
      let i = position[id];
      let node = &plan.nodes()[i];
      report.nodes[i].state = NodeState::Ready;

      if !node.guard.should_run() {
        info!(node = %id, "already done, skipping");
        report.nodes[i].state = NodeState::Skipped;
        continue;
      }

      if parallelism == 1 {
        report.nodes[i].state = NodeState::Running;
        info!(node = %id, "starting");
        let start = Instant::now();

        let result = tokio::select! {
          result = runner.run(&node.action) => result,
          _ = &mut shutdown => {
            warn!(node = %id, "interrupted");
            mark_interrupted(&mut report.nodes[i], start.elapsed());
            report.interrupted = true;
            break 'waves;
          }
        };

        if !record(&mut report.nodes[i], result, start.elapsed()) {
          break 'waves;
        }
        continue;
      }

      let runner = Arc::clone(&runner);
      let semaphore = Arc::clone(&semaphore);
      let halted = Arc::clone(&halted);
      let started_tx = started_tx.clone();
      let action = node.action.clone();

      let handle = join_set.spawn(async move {
        let Ok(_permit) = semaphore.acquire_owned().await else {
          return (i, None);
        };
        if halted.load(Ordering::SeqCst) {
          return (i, None);
        }
        let _ = started_tx.send(i);
        let start = Instant::now();
        let result = runner.run(&action).await;
        (i, Some((result, start.elapsed())))
      });
      tasks.insert(handle.id(), i);
    }

    let mut wave_failed = false;
    while !join_set.is_empty() {
      tokio::select! {
        joined = join_set.join_next_with_id() => {
          let Some(joined) = joined else { break };
          match joined {
            Ok((_, (i, Some((result, elapsed))))) => {
              if !record(&mut report.nodes[i], result, elapsed) {
                wave_failed = true;
                halted.store(true, Ordering::SeqCst);
              }
            }
            // Never started because the plan halted.
            Ok((_, (_, None))) => {}
            Err(e) => {
              if let Some(&i) = tasks.get(&e.id()) {
                error!(node = %report.nodes[i].id, error = %e, "task aborted");
                report.nodes[i].state = NodeState::Failed;
                report.nodes[i].failure = Some(FailureDetail {
                  message: e.to_string(),
                  ..FailureDetail::interrupted()
                });
              }
              wave_failed = true;
              halted.store(true, Ordering::SeqCst);
            }
          }
        }
        _ = &mut shutdown => {
          join_set.abort_all();
          while let Ok(i) = started_rx.try_recv() {
            if !report.nodes[i].state.is_terminal() {
              warn!(node = %report.nodes[i].id, "interrupted");
              mark_interrupted(&mut report.nodes[i], Duration::ZERO);
            }
          }
          report.interrupted = true;
          break 'waves;
        }
      }
    }

    if wave_failed {
      break;
    }
  }

  for node in &mut report.nodes {
    if matches!(node.state, NodeState::Ready | NodeState::Running) {
      node.state = NodeState::Pending;
    }
  }

  report.duration = Some(started.elapsed());
  info!(
    succeeded = report.count(NodeState::Succeeded),
    skipped = report.count(NodeState::Skipped),
    failed = report.count(NodeState::Failed),
    pending = report.count(NodeState::Pending),
    interrupted = report.interrupted,
    "plan execution finished"
  );

  report
}

/// Store an action's result on its node. Returns false on failure.
fn record(node: &mut NodeReport, result: Result<ActionOutput, ActionError>, elapsed: Duration) -> bool {
  node.duration = Some(elapsed);
  match result {
    Ok(output) => {
      info!(node = %node.id, duration = ?elapsed, "succeeded");
      node.state = NodeState::Succeeded;
      node.output = Some(output);
      true
    }
    Err(e) => {
      error!(node = %node.id, error = %e, "failed");
      node.state = NodeState::Failed;
      node.failure = Some(FailureDetail::from(&e));
      false
    }
  }
}

fn mark_interrupted(node: &mut NodeReport, elapsed: Duration) {
  node.state = NodeState::Failed;
  node.duration = Some(elapsed);
  node.failure = Some(FailureDetail::interrupted());
}
