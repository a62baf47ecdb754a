//! Implementation of the `launchpack fetch` command.

use anyhow::{Context, Result};
use serde::Serialize;

use launchpack_lib::artifact::MaterializeSource;
use launchpack_lib::pipeline::{PipelineError, fetch_artifacts};
use launchpack_lib::project::detect_lookup;

use crate::output::{print_json, print_stat, print_success};
use crate::{Selection, Session};

#[derive(Serialize)]
struct Fetched {
  module: String,
  path: String,
  source: MaterializeSource,
}

/// Place the agent artifact in every selected module, reusing the project
/// cache when it holds a valid copy.
pub fn cmd_fetch(session: &Session, selection: Selection) -> Result<()> {
  let lookup = detect_lookup(&session.root).map_err(PipelineError::from)?;

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let materialized = rt.block_on(fetch_artifacts(
    &session.config,
    &session.root,
    &selection.launchers,
    &selection.vault_type,
    &lookup,
  ))?;

  let fetched: Vec<Fetched> = materialized
    .into_iter()
    .map(|(module, m)| Fetched {
      module: module.path,
      path: m.path.display().to_string(),
      source: m.source,
    })
    .collect();

  if session.output.is_json() {
    print_json(&fetched)?;
    return Ok(());
  }

  for f in &fetched {
    let source = match f.source {
      MaterializeSource::WorkingCopy => "already present",
      MaterializeSource::Cache => "from cache",
      MaterializeSource::Network => "downloaded",
    };
    print_stat(&f.module, &format!("{} ({})", f.path, source));
  }
  println!();
  print_success(&format!("{} artifact(s) in place", fetched.len()));

  Ok(())
}
