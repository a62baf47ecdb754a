//! Well-known names and defaults shared across the crate.

pub const APP_NAME: &str = "launchpack";

/// Project-level configuration file, looked up at the project root.
pub const PROJECT_CONFIG_FILE: &str = "launchpack.toml";

/// User-level configuration file, looked up in the config directory.
pub const USER_CONFIG_FILE: &str = "config.toml";

pub const DEFAULT_ARTIFACT_NAME: &str = "opentelemetry-javaagent.jar";
pub const DEFAULT_ARTIFACT_URL: &str =
  "https://github.com/open-telemetry/opentelemetry-java-instrumentation/releases/download/v2.9.0/opentelemetry-javaagent.jar";
pub const DEFAULT_ARTIFACT_CACHE_DIR: &str = "externalLibs";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 600;

pub const DEFAULT_LAUNCHERS_DIR: &str = "launchers";
/// Per-module build output directory, relative to the module root.
pub const BUILD_DIR: &str = "build";
/// Packaged archives, relative to the module build directory.
pub const DEFAULT_LIBS_DIR: &str = "libs";
pub const DEFAULT_ARCHIVE_EXTENSION: &str = "jar";

pub const DEFAULT_IMAGE_TOOL: &str = "podman";
pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";
pub const DEFAULT_IMAGE_TAG: &str = "latest";
pub const DEFAULT_IMAGE_ARCHIVE: &str = "image.tar";
pub const DEFAULT_ARCHIVE_BUILD_ARG: &str = "JAR";
pub const DEFAULT_ARTIFACT_BUILD_ARG: &str = "OTEL_JAR";

pub const DEFAULT_CLUSTER_TOOL: &str = "kind";
pub const DEFAULT_CLUSTER_NAME: &str = "dse-cluster";

/// Suffix of the always-included module of every launcher.
pub const BASE_MODULE_SUFFIX: &str = "-base";

/// Suffix appended to in-flight downloads and copies before the final rename.
pub const PARTIAL_SUFFIX: &str = ".part";

/// Settings files that declare the host build tool's project graph.
pub const SETTINGS_FILES: &[&str] = &["settings.gradle.kts", "settings.gradle"];
