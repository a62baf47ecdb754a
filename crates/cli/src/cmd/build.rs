//! Implementation of the `launchpack build` command.
//!
//! Resolves the requested variant for each launcher, checks every module
//! exists, then runs the resulting plan. Ctrl-C stops the run; the partial
//! report is still printed.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use launchpack_lib::execute::{ExecuteConfig, ExecutionReport, NodeState, execute_plan_until};
use launchpack_lib::pipeline::{LauncherSelection, PipelineError, prepare, toolchain};
use launchpack_lib::project::detect_lookup;

use super::{build_request, effective_platform};
use crate::output::{format_duration, print_json, print_stat, print_success, print_warning, state_mark};
use crate::{Selection, Session, Target};

#[derive(Serialize)]
struct BuildOutput<'a> {
  platform: &'a str,
  selections: &'a [LauncherSelection],
  report: &'a ExecutionReport,
}

/// Execute the build command.
///
/// Exits through [`PipelineError`] so the process exit code tells an invalid
/// variant, a missing module, an unreachable artifact and a failing tool apart.
pub fn cmd_build(session: &Session, selection: Selection, target: Target, parallelism: usize) -> Result<()> {
  let request = build_request(selection, target);
  let lookup = detect_lookup(&session.root).map_err(PipelineError::from)?;
  let prepared = prepare(&session.config, &session.root, &request, &lookup)?;
  let runner = Arc::new(toolchain(&session.config, &session.root)?);
  let config = ExecuteConfig { parallelism };

  let platform = effective_platform(request.options.platform.as_deref());
  info!(nodes = prepared.plan.len(), parallelism, platform = %platform, "starting build");

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt.block_on(execute_plan_until(&prepared.plan, runner, &config, async {
    if tokio::signal::ctrl_c().await.is_ok() {
      info!("interrupt received, stopping build");
    } else {
      std::future::pending::<()>().await;
    }
  }));

  if session.output.is_json() {
    print_json(&BuildOutput {
      platform: &platform,
      selections: &prepared.selections,
      report: &report,
    })?;
  } else {
    print_report(&report, &platform);
  }

  report.ensure_success().map_err(PipelineError::from)?;
  Ok(())
}

fn print_report(report: &ExecutionReport, platform: &str) {
  println!();
  print_stat("Platform", platform);
  for node in &report.nodes {
    let (mark, label) = state_mark(node.state);
    let timing = node.duration.map(|d| format!(" ({})", format_duration(d))).unwrap_or_default();
    println!("  {} {} [{}]{}", mark, node.id, label, timing);
  }

  if let Some(failed) = report.failed()
    && let Some(detail) = &failed.failure
  {
    println!();
    print_warning(&format!("{} failed: {}", failed.id, detail.message));
    for line in tail(&detail.stderr, 20) {
      eprintln!("    {}", line);
    }
  }

  println!();
  if report.is_success() {
    print_success("Build complete!");
  }
  print_stat("Succeeded", &report.count(NodeState::Succeeded).to_string());
  print_stat("Skipped", &report.count(NodeState::Skipped).to_string());
  print_stat("Not run", &report.count(NodeState::Pending).to_string());
  if let Some(duration) = report.duration {
    print_stat("Duration", &format_duration(duration));
  }
}

fn tail(text: &str, lines: usize) -> impl Iterator<Item = &str> {
  let all: Vec<&str> = text.lines().collect();
  let start = all.len().saturating_sub(lines);
  all.into_iter().skip(start)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tail_keeps_last_lines() {
    let text = "a\nb\nc\nd";
    assert_eq!(tail(text, 2).collect::<Vec<_>>(), vec!["c", "d"]);
    assert_eq!(tail(text, 10).count(), 4);
    assert_eq!(tail("", 3).count(), 0);
  }
}
