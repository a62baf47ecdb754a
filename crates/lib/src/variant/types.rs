//! Types for variant selection.
//!
//! A variant names which vault backends participate in a launcher build. The
//! set of names is closed; each name expands through a fixed table into the
//! concrete backend modules of a launcher.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::BASE_MODULE_SUFFIX;

/// Errors raised while validating a variant request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VariantError {
  /// The requested name is not part of the supported enumeration.
  #[error("Invalid vaultType: '{requested}'. Supported values are: {}", supported.join(", "))]
  InvalidVariant {
    requested: String,
    supported: Vec<&'static str>,
  },
}

/// A concrete secret backend a launcher can be packaged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultBackend {
  Hashicorp,
  Azure,
}

impl VaultBackend {
  /// All backends in declaration order.
  pub const ALL: [VaultBackend; 2] = [VaultBackend::Hashicorp, VaultBackend::Azure];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Hashicorp => "hashicorp",
      Self::Azure => "azure",
    }
  }

  /// Suffix appended to the launcher prefix to name this backend's module.
  pub fn module_suffix(&self) -> String {
    format!("-postgresql-{}vault", self.as_str())
  }
}

impl fmt::Display for VaultBackend {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// The closed set of variant names accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantName {
  #[default]
  Hashicorp,
  Azure,
  Both,
}

impl VariantName {
  /// All variant names in declaration order.
  pub const ALL: [VariantName; 3] = [VariantName::Hashicorp, VariantName::Azure, VariantName::Both];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Hashicorp => "hashicorp",
      Self::Azure => "azure",
      Self::Both => "both",
    }
  }

  /// Names of every supported variant, for diagnostics.
  pub fn supported() -> Vec<&'static str> {
    Self::ALL.iter().map(|v| v.as_str()).collect()
  }

  /// The backends this variant expands to, in declaration order.
  pub fn backends(&self) -> &'static [VaultBackend] {
    match self {
      Self::Hashicorp => &[VaultBackend::Hashicorp],
      Self::Azure => &[VaultBackend::Azure],
      Self::Both => &VaultBackend::ALL,
    }
  }
}

impl fmt::Display for VariantName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for VariantName {
  type Err = VariantError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .iter()
      .find(|v| v.as_str() == s)
      .copied()
      .ok_or_else(|| VariantError::InvalidVariant {
        requested: s.to_string(),
        supported: Self::supported(),
      })
  }
}

/// A buildable unit: its project path in the host build tool plus the directory
/// it must exist under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleRef {
  /// Project path, e.g. `:launchers:control-plane:control-plane-base`.
  pub path: String,
  /// Module root directory.
  pub root: PathBuf,
}

impl ModuleRef {
  /// Build a module reference from a project path, mapping each path segment
  /// to a directory below `project_root`.
  pub fn from_project_path(path: &str, project_root: &Path) -> Self {
    let root = path
      .split(':')
      .filter(|segment| !segment.is_empty())
      .fold(project_root.to_path_buf(), |dir, segment| dir.join(segment));
    Self {
      path: path.to_string(),
      root,
    }
  }

  /// The last path segment, used for image and archive names.
  pub fn name(&self) -> &str {
    self.path.rsplit(':').next().unwrap_or(&self.path)
  }
}

impl fmt::Display for ModuleRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.path)
  }
}

/// The module naming prefix of a launcher.
///
/// For launcher `control-plane` under `launchers/` this is
/// `:launchers:control-plane:control-plane`; backend modules append
/// `-postgresql-<backend>vault` and the base module appends `-base`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulePrefix {
  pub prefix: String,
  pub project_root: PathBuf,
}

impl ModulePrefix {
  pub fn new(prefix: impl Into<String>, project_root: impl Into<PathBuf>) -> Self {
    Self {
      prefix: prefix.into(),
      project_root: project_root.into(),
    }
  }

  /// Prefix for a launcher living in `launchers_dir` (relative to the project root).
  pub fn for_launcher(launcher: &str, launchers_dir: &str, project_root: &Path) -> Self {
    let group = launchers_dir
      .split(['/', '\\'])
      .filter(|segment| !segment.is_empty())
      .map(|segment| format!(":{}", segment))
      .collect::<String>();
    Self::new(format!("{}:{}:{}", group, launcher, launcher), project_root)
  }

  /// The always-included module of this launcher.
  pub fn base_module(&self) -> ModuleRef {
    self.module(BASE_MODULE_SUFFIX)
  }

  /// The module a backend contributes to this launcher.
  pub fn backend_module(&self, backend: VaultBackend) -> ModuleRef {
    self.module(&backend.module_suffix())
  }

  fn module(&self, suffix: &str) -> ModuleRef {
    ModuleRef::from_project_path(&format!("{}{}", self.prefix, suffix), &self.project_root)
  }
}

/// The ordered, duplicate-free modules a variant expands to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedVariant {
  pub variant: VariantName,
  pub modules: Vec<ModuleRef>,
}

impl ResolvedVariant {
  pub fn iter(&self) -> impl Iterator<Item = &ModuleRef> {
    self.modules.iter()
  }

  pub fn len(&self) -> usize {
    self.modules.len()
  }

  pub fn is_empty(&self) -> bool {
    self.modules.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn variant_names_round_trip_through_from_str() {
    for variant in VariantName::ALL {
      assert_eq!(variant.as_str().parse::<VariantName>().unwrap(), variant);
    }
  }

  #[test]
  fn default_variant_is_hashicorp() {
    assert_eq!(VariantName::default(), VariantName::Hashicorp);
  }

  #[test]
  fn from_str_is_case_sensitive() {
    assert!("Hashicorp".parse::<VariantName>().is_err());
  }

  #[test]
  fn module_ref_maps_path_to_directories() {
    let module = ModuleRef::from_project_path(":launchers:data-plane:data-plane-base", Path::new("/repo"));
    assert_eq!(module.root, PathBuf::from("/repo/launchers/data-plane/data-plane-base"));
    assert_eq!(module.name(), "data-plane-base");
  }

  #[test]
  fn prefix_for_launcher() {
    let prefix = ModulePrefix::for_launcher("identity-hub", "launchers", Path::new("/repo"));
    assert_eq!(prefix.prefix, ":launchers:identity-hub:identity-hub");
    assert_eq!(prefix.base_module().path, ":launchers:identity-hub:identity-hub-base");
    assert_eq!(
      prefix.backend_module(VaultBackend::Azure).path,
      ":launchers:identity-hub:identity-hub-postgresql-azurevault"
    );
  }

  #[test]
  fn prefix_for_nested_launchers_dir() {
    let prefix = ModulePrefix::for_launcher("issuer", "deploy/launchers", Path::new("/repo"));
    assert_eq!(prefix.prefix, ":deploy:launchers:issuer:issuer");
  }

  #[test]
  fn invalid_variant_message_lists_supported_values() {
    let err = "quantum".parse::<VariantName>().unwrap_err();
    assert_eq!(
      err.to_string(),
      "Invalid vaultType: 'quantum'. Supported values are: hashicorp, azure, both"
    );
  }
}
