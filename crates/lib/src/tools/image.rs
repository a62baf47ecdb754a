//! Container image build and export.
//!
//! Works with any CLI that accepts `build` and `save` the way podman and docker
//! do.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::ToolError;
use super::process::{ProcessError, ToolCommand, run_tool};

/// Build arguments the builder supplies on its own.
const PREDEFINED_ARGS: &[&str] = &[
  "TARGETPLATFORM",
  "TARGETOS",
  "TARGETARCH",
  "TARGETVARIANT",
  "BUILDPLATFORM",
  "BUILDOS",
  "BUILDARCH",
  "BUILDVARIANT",
  "HTTP_PROXY",
  "http_proxy",
  "HTTPS_PROXY",
  "https_proxy",
  "FTP_PROXY",
  "ftp_proxy",
  "NO_PROXY",
  "no_proxy",
  "ALL_PROXY",
  "all_proxy",
];

/// Everything needed to build one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSpec {
  /// Image reference, e.g. `control-plane-postgresql-azurevault:latest`.
  pub image: String,
  /// Target platform (`linux/arm64`); `None` builds for the host.
  pub platform: Option<String>,
  pub context: PathBuf,
  pub dockerfile: PathBuf,
  /// Build arguments, relative to the context where they name files.
  pub build_args: BTreeMap<String, String>,
}

/// Reference of a built image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ImageId(pub String);

impl fmt::Display for ImageId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Build arguments a Dockerfile declares without a default value.
///
/// Arguments the builder predefines (`TARGETARCH`, proxy settings, …) are not
/// reported.
pub fn required_build_args(dockerfile: &str) -> Vec<String> {
  let mut required: Vec<String> = Vec::new();

  for line in instructions(dockerfile) {
    let mut words = line.split_whitespace();
    let Some(instruction) = words.next() else {
      continue;
    };
    if !instruction.eq_ignore_ascii_case("ARG") {
      continue;
    }

    for decl in words {
      if decl.contains('=') || PREDEFINED_ARGS.contains(&decl) {
        continue;
      }
      if !required.iter().any(|r| r == decl) {
        required.push(decl.to_string());
      }
    }
  }

  required
}

/// Dockerfile instructions with `\` continuations joined and comments dropped.
fn instructions(dockerfile: &str) -> Vec<String> {
  let mut joined = Vec::new();
  let mut current = String::new();

  for line in dockerfile.lines() {
    let line = line.trim();
    if line.starts_with('#') {
      continue;
    }
    match line.strip_suffix('\\') {
      Some(head) => {
        current.push_str(head);
        current.push(' ');
      }
      None => {
        current.push_str(line);
        joined.push(std::mem::take(&mut current));
      }
    }
  }
  if !current.trim().is_empty() {
    joined.push(current);
  }

  joined
}

/// Adapter for the container tool's `build` and `save` subcommands.
#[derive(Debug, Clone)]
pub struct ImagePackager {
  tool: String,
}

impl ImagePackager {
  pub fn new(tool: impl Into<String>) -> Self {
    Self { tool: tool.into() }
  }

  pub fn tool(&self) -> &str {
    &self.tool
  }

  pub fn build_command(&self, spec: &ImageSpec) -> ToolCommand {
    let mut cmd = ToolCommand::new(&self.tool).arg("build");
    for (key, value) in &spec.build_args {
      cmd = cmd.arg("--build-arg").arg(format!("{}={}", key, value));
    }
    cmd = cmd
      .arg("-t")
      .arg(&spec.image)
      .arg("-f")
      .arg(spec.dockerfile.as_os_str());
    if let Some(platform) = &spec.platform {
      cmd = cmd.arg("--platform").arg(platform);
    }
    cmd.arg(spec.context.as_os_str()).current_dir(&spec.context)
  }

  pub fn export_command(&self, image: &ImageId, dest: &Path) -> ToolCommand {
    ToolCommand::new(&self.tool)
      .arg("save")
      .arg("-o")
      .arg(dest.as_os_str())
      .arg(&image.0)
  }

  /// Check that every argument the Dockerfile needs has a value.
  pub fn check_build_args(&self, spec: &ImageSpec) -> Result<(), ToolError> {
    let content = std::fs::read_to_string(&spec.dockerfile).map_err(|source| ToolError::ReadDockerfile {
      path: spec.dockerfile.clone(),
      source,
    })?;

    for name in required_build_args(&content) {
      if !spec.build_args.contains_key(&name) {
        return Err(ToolError::UnboundBuildArg {
          dockerfile: spec.dockerfile.clone(),
          name,
        });
      }
    }
    Ok(())
  }

  pub async fn build_image(&self, spec: &ImageSpec) -> Result<ImageId, ToolError> {
    self.check_build_args(spec)?;

    info!(image = %spec.image, platform = ?spec.platform, "building image");

    run_tool(&self.build_command(spec)).await.map_err(|e| match e {
      ProcessError::Spawn { program, source } => ToolError::Spawn { program, source },
      ProcessError::Failed(failure) => ToolError::BuildFailed {
        image: spec.image.clone(),
        failure,
      },
    })?;

    Ok(ImageId(spec.image.clone()))
  }

  pub async fn export_image(&self, image: &ImageId, dest: &Path) -> Result<(), ToolError> {
    info!(image = %image, dest = %dest.display(), "exporting image");

    run_tool(&self.export_command(image, dest)).await.map_err(|e| match e {
      ProcessError::Spawn { program, source } => ToolError::Spawn { program, source },
      ProcessError::Failed(failure) => ToolError::ExportFailed {
        image: image.0.clone(),
        failure,
      },
    })?;

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn spec(context: &Path, platform: Option<&str>) -> ImageSpec {
    ImageSpec {
      image: "control-plane-postgresql-hashicorpvault:latest".to_string(),
      platform: platform.map(str::to_string),
      context: context.to_path_buf(),
      dockerfile: context.join("Dockerfile"),
      build_args: BTreeMap::from([
        ("JAR".to_string(), "build/libs/control-plane-postgresql-hashicorpvault.jar".to_string()),
        ("OTEL_JAR".to_string(), "build/opentelemetry-javaagent.jar".to_string()),
      ]),
    }
  }

  #[test]
  fn build_command_without_platform() {
    let packager = ImagePackager::new("podman");
    let cmd = packager.build_command(&spec(Path::new("/m"), None));

    assert_eq!(cmd.program, "podman");
    assert_eq!(
      cmd.arg_strings(),
      vec![
        "build",
        "--build-arg",
        "JAR=build/libs/control-plane-postgresql-hashicorpvault.jar",
        "--build-arg",
        "OTEL_JAR=build/opentelemetry-javaagent.jar",
        "-t",
        "control-plane-postgresql-hashicorpvault:latest",
        "-f",
        "/m/Dockerfile",
        "/m",
      ]
    );
    assert_eq!(cmd.cwd.as_deref(), Some(Path::new("/m")));
  }

  #[test]
  fn build_command_with_platform() {
    let cmd = ImagePackager::new("docker").build_command(&spec(Path::new("/m"), Some("linux/arm64")));
    let args = cmd.arg_strings();

    let idx = args.iter().position(|a| a == "--platform").unwrap();
    assert_eq!(args[idx + 1], "linux/arm64");
    assert_eq!(args.last().unwrap(), "/m", "context stays the final positional");
  }

  #[test]
  fn export_command_args() {
    let cmd = ImagePackager::new("podman").export_command(&ImageId("img:latest".to_string()), Path::new("/m/image.tar"));
    assert_eq!(cmd.arg_strings(), vec!["save", "-o", "/m/image.tar", "img:latest"]);
  }

  #[test]
  fn required_args_skip_defaults_and_predefined() {
    let dockerfile = r#"
ARG BASE=eclipse-temurin:17
FROM ${BASE}
ARG JAR
arg OTEL_JAR
ARG TARGETARCH
ARG JAR
COPY ${JAR} /app/app.jar
"#;
    assert_eq!(required_build_args(dockerfile), vec!["JAR", "OTEL_JAR"]);
  }

  #[test]
  fn required_args_follow_line_continuations() {
    let dockerfile = "FROM scratch\nARG JAR \\\n    OTEL_JAR\n# ARG COMMENTED\nARG RUNTIME=17 \\\n  # note\n  LOG_LEVEL\n";
    assert_eq!(required_build_args(dockerfile), vec!["JAR", "OTEL_JAR", "LOG_LEVEL"]);
  }

  #[test]
  fn unbound_arg_is_rejected_before_running() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("Dockerfile"), "FROM scratch\nARG JAR\nARG EXTRA\n").unwrap();

    // The tool does not exist; reaching it would be a Spawn error instead.
    let packager = ImagePackager::new("/nonexistent/podman");
    let rt = tokio::runtime::Runtime::new().unwrap();
    let err = rt
      .block_on(packager.build_image(&spec(temp.path(), None)))
      .unwrap_err();

    assert!(matches!(err, ToolError::UnboundBuildArg { ref name, .. } if name == "EXTRA"));
  }

  #[test]
  fn missing_dockerfile_is_reported() {
    let temp = TempDir::new().unwrap();
    let packager = ImagePackager::new("podman");
    let err = packager.check_build_args(&spec(temp.path(), None)).unwrap_err();
    assert!(matches!(err, ToolError::ReadDockerfile { .. }));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn build_failure_carries_tool_output() {
    use crate::util::testutil::fake_tool;

    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("Dockerfile"), "FROM scratch\nARG JAR\nARG OTEL_JAR\n").unwrap();
    let tool = fake_tool(temp.path(), "podman", "echo 'STEP 1/3: FROM scratch'; echo 'Error: pull denied' >&2; exit 125");

    let err = ImagePackager::new(tool.to_str().unwrap())
      .build_image(&spec(temp.path(), None))
      .await
      .unwrap_err();

    let ToolError::BuildFailed { image, failure } = err else {
      panic!("expected BuildFailed, got {:?}", err);
    };
    assert_eq!(image, "control-plane-postgresql-hashicorpvault:latest");
    assert_eq!(failure.exit_code, Some(125));
    assert_eq!(failure.stderr, "Error: pull denied\n");
  }
}
