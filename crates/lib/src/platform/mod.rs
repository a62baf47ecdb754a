//! Container image platforms and per-user paths.

pub mod paths;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// OCI architecture name for a Rust target architecture.
///
/// Returns `None` for architectures container tools have no image platform for.
pub fn oci_arch(rust_arch: &str) -> Option<&'static str> {
  match rust_arch {
    "x86_64" => Some("amd64"),
    "aarch64" => Some("arm64"),
    "s390x" => Some("s390x"),
    "riscv64" => Some("riscv64"),
    _ => None,
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid image platform '{0}': expected os/arch or os/arch/variant")]
pub struct ImagePlatformError(pub String);

/// An OCI image platform such as `linux/arm64` or `linux/arm/v7`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ImagePlatform {
  pub os: String,
  pub arch: String,
  pub variant: Option<String>,
}

impl ImagePlatform {
  /// The platform images built on this host target when none is requested.
  ///
  /// Images are Linux images on every host; container tools on macOS and
  /// Windows run them in a Linux VM of the host's architecture.
  pub fn host() -> Option<Self> {
    Some(Self {
      os: "linux".to_string(),
      arch: oci_arch(std::env::consts::ARCH)?.to_string(),
      variant: None,
    })
  }
}

impl FromStr for ImagePlatform {
  type Err = ImagePlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let parts: Vec<&str> = s.trim().split('/').collect();
    let valid = |p: &&str| !p.is_empty() && p.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    match parts.as_slice() {
      [os, arch] if valid(os) && valid(arch) => Ok(Self {
        os: os.to_string(),
        arch: arch.to_string(),
        variant: None,
      }),
      [os, arch, variant] if valid(os) && valid(arch) && valid(variant) => Ok(Self {
        os: os.to_string(),
        arch: arch.to_string(),
        variant: Some(variant.to_string()),
      }),
      _ => Err(ImagePlatformError(s.to_string())),
    }
  }
}

impl fmt::Display for ImagePlatform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.os, self.arch)?;
    if let Some(variant) = &self.variant {
      write!(f, "/{}", variant)?;
    }
    Ok(())
  }
}
