use anyhow::Result;
use serde::Serialize;

use launchpack_lib::pipeline::validate_launcher;
use launchpack_lib::variant::{ModulePrefix, VariantName, resolve_variant};

use crate::Session;
use crate::output::{print_json, print_stat};

#[derive(Serialize)]
struct VariantEntry {
  name: VariantName,
  backends: Vec<&'static str>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  modules: Vec<String>,
}

/// List every supported variant; with a launcher, also the module paths each
/// one selects.
pub fn cmd_variants(session: &Session, launcher: Option<&str>) -> Result<()> {
  if let Some(launcher) = launcher {
    validate_launcher(launcher)?;
  }
  let prefix =
    launcher.map(|l| ModulePrefix::for_launcher(l, &session.config.package.launchers_dir, &session.root));

  let entries: Vec<VariantEntry> = VariantName::ALL
    .iter()
    .map(|variant| VariantEntry {
      name: *variant,
      backends: variant.backends().iter().map(|b| b.as_str()).collect(),
      modules: prefix
        .as_ref()
        .map(|p| resolve_variant(*variant, p).iter().map(|m| m.path.clone()).collect())
        .unwrap_or_default(),
    })
    .collect();

  if session.output.is_json() {
    return print_json(&entries);
  }

  for entry in &entries {
    let detail = if entry.modules.is_empty() {
      entry.backends.join(", ")
    } else {
      entry.modules.join(", ")
    };
    print_stat(entry.name.as_str(), &detail);
  }
  Ok(())
}
