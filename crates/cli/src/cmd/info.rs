use anyhow::Result;
use serde::Serialize;

use launchpack_lib::platform::paths::config_dir;

use super::effective_platform;
use crate::Session;
use crate::output::{print_json, print_stat};

#[derive(Serialize)]
struct InfoOutput<'a> {
  version: &'static str,
  image_platform: String,
  image_tool: &'a str,
  cluster_tool: &'a str,
  cluster_name: &'a str,
  project_root: String,
  config_dir: Option<String>,
}

/// Show the platform images are built for and the tools a build would call.
pub fn cmd_info(session: &Session) -> Result<()> {
  let config = &session.config;
  let info = InfoOutput {
    version: env!("CARGO_PKG_VERSION"),
    image_platform: effective_platform(None),
    image_tool: &config.image.tool,
    cluster_tool: &config.cluster.tool,
    cluster_name: &config.cluster.name,
    project_root: session.root.display().to_string(),
    config_dir: config_dir().map(|d| d.display().to_string()),
  };

  if session.output.is_json() {
    return print_json(&info);
  }

  println!("launchpack {}", info.version);
  print_stat("Image platform", &info.image_platform);
  print_stat("Image tool", info.image_tool);
  print_stat("Cluster", &format!("{} ({})", info.cluster_name, info.cluster_tool));
  print_stat("Project root", &info.project_root);
  print_stat("Config dir", info.config_dir.as_deref().unwrap_or("unknown"));
  Ok(())
}
