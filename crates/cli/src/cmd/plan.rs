//! Implementation of the `launchpack plan` command.
//!
//! Runs every check a build would run, then prints the plan instead of
//! executing it.

use anyhow::Result;
use serde::Serialize;

use launchpack_lib::pipeline::{LauncherSelection, PipelineError, prepare};
use launchpack_lib::plan::{Stage, TaskAction, TaskId, TaskNode};
use launchpack_lib::project::detect_lookup;

use super::{build_request, effective_platform};
use crate::output::{marks, print_heading, print_json, print_stat};
use crate::{Selection, Session, Target};

#[derive(Serialize)]
struct PlannedNode<'a> {
  id: &'a TaskId,
  module: &'a str,
  stage: Stage,
  deps: &'a [TaskId],
  action: &'a TaskAction,
  /// Whether the guard currently says the work is needed.
  would_run: bool,
}

#[derive(Serialize)]
struct PlanOutput<'a> {
  platform: String,
  selections: &'a [LauncherSelection],
  nodes: Vec<PlannedNode<'a>>,
  edges: Vec<(TaskId, TaskId)>,
  waves: Vec<Vec<TaskId>>,
}

fn planned(node: &TaskNode) -> PlannedNode<'_> {
  PlannedNode {
    id: &node.id,
    module: &node.module,
    stage: node.stage(),
    deps: &node.deps,
    action: &node.action,
    would_run: node.guard.should_run(),
  }
}

pub fn cmd_plan(session: &Session, selection: Selection, target: Target) -> Result<()> {
  let request = build_request(selection, target);
  let lookup = detect_lookup(&session.root).map_err(PipelineError::from)?;
  let prepared = prepare(&session.config, &session.root, &request, &lookup)?;
  let plan = &prepared.plan;
  let platform = effective_platform(request.options.platform.as_deref());

  if session.output.is_json() {
    print_json(&PlanOutput {
      platform,
      selections: &prepared.selections,
      nodes: plan.nodes().iter().map(planned).collect(),
      edges: plan.edges(),
      waves: plan.execution_waves(),
    })?;
    return Ok(());
  }

  for selection in &prepared.selections {
    print_heading(&format!("{} ({})", selection.launcher, selection.resolved.variant));
    print_stat("base", &selection.base.path);
    for module in selection.resolved.iter() {
      print_stat("module", &module.path);
    }
  }

  print_stat("Platform", &platform);

  println!();
  println!("Tasks:");
  for id in plan.topological_order() {
    let Some(node) = plan.node(&id) else { continue };
    let symbol = if node.guard.should_run() {
      marks::WOULD_RUN
    } else {
      marks::ALREADY_DONE
    };
    println!("  {} {}", symbol, node.id);
    for dep in &node.deps {
      println!("      {} {}", marks::DEPENDS_ON, dep);
    }
  }

  let skipped = plan.nodes().iter().filter(|n| !n.guard.should_run()).count();
  println!();
  print_stat("Tasks", &plan.len().to_string());
  print_stat("Already done", &skipped.to_string());

  Ok(())
}
