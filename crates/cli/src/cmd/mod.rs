mod build;
mod fetch;
mod info;
mod plan;
mod variants;

pub use build::cmd_build;
pub use fetch::cmd_fetch;
pub use info::cmd_info;
pub use plan::cmd_plan;
pub use variants::cmd_variants;

use launchpack_lib::pipeline::BuildRequest;
use launchpack_lib::plan::PlanOptions;
use launchpack_lib::platform::ImagePlatform;

use crate::{Selection, Target};

fn build_request(selection: Selection, target: Target) -> BuildRequest {
  BuildRequest {
    launchers: selection.launchers,
    vault_type: selection.vault_type,
    options: PlanOptions {
      platform: target.platform,
      load_to_cluster: target.load_to_kind,
      cluster_name: target.cluster_name,
    },
  }
}

/// The platform images are built for: the requested one, or the host's.
fn effective_platform(requested: Option<&str>) -> String {
  match requested {
    Some(platform) => platform.to_string(),
    None => match ImagePlatform::host() {
      Some(host) => format!("{} (native)", host),
      None => "native".to_string(),
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn requested_platform_wins() {
    assert_eq!(effective_platform(Some("linux/arm64")), "linux/arm64");
  }

  #[test]
  fn host_platform_is_marked_native() {
    assert!(effective_platform(None).contains("native"));
  }
}
