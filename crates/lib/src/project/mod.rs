//! Module existence checks.
//!
//! Before any plan is built, every module a variant names is looked up in the
//! project. The lookup itself belongs to the host build tool; this module only
//! defines the [`ProjectLookup`] seam and two implementations of it.

mod settings;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::consts::SETTINGS_FILES;
use crate::variant::ModuleRef;

pub use settings::{SettingsError, SettingsLookup, parse_includes};

/// A module the selected variant requires is missing from the project.
#[derive(Debug, Error, PartialEq, Eq)]
#[error(
  "Module '{path}' not found (expected at {}). \
   Check it exists in the project settings, or pick a different vaultType.",
  root.display()
)]
pub struct ModuleNotFound {
  pub path: String,
  pub root: PathBuf,
}

impl From<&ModuleRef> for ModuleNotFound {
  fn from(module: &ModuleRef) -> Self {
    Self {
      path: module.path.clone(),
      root: module.root.clone(),
    }
  }
}

/// Answers whether a module is part of the project.
pub trait ProjectLookup {
  fn contains(&self, module: &ModuleRef) -> bool;
}

impl<T: ProjectLookup + ?Sized> ProjectLookup for &T {
  fn contains(&self, module: &ModuleRef) -> bool {
    (**self).contains(module)
  }
}

impl<T: ProjectLookup + ?Sized> ProjectLookup for Box<T> {
  fn contains(&self, module: &ModuleRef) -> bool {
    (**self).contains(module)
  }
}

/// Treats a module as present when its root directory exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryLookup;

impl ProjectLookup for DirectoryLookup {
  fn contains(&self, module: &ModuleRef) -> bool {
    module.root.is_dir()
  }
}

/// Check that every module exists, stopping at the first one that does not.
///
/// # Errors
///
/// Returns [`ModuleNotFound`] naming the first missing module.
pub fn check_all<'a>(
  modules: impl IntoIterator<Item = &'a ModuleRef>,
  lookup: &impl ProjectLookup,
) -> Result<(), ModuleNotFound> {
  for module in modules {
    if !lookup.contains(module) {
      info!(module = %module.path, "module not found");
      return Err(ModuleNotFound::from(module));
    }
    debug!(module = %module.path, "module found");
  }
  Ok(())
}

/// Pick the lookup for a project: its settings file when one exists, otherwise
/// the directory tree.
///
/// # Errors
///
/// Returns [`SettingsError`] when a settings file exists but cannot be read.
pub fn detect_lookup(project_root: &Path) -> Result<Box<dyn ProjectLookup + Send + Sync>, SettingsError> {
  for file in SETTINGS_FILES {
    let path = project_root.join(file);
    if path.is_file() {
      debug!(settings = %path.display(), "using settings file for module lookup");
      return Ok(Box::new(SettingsLookup::load(&path)?));
    }
  }
  debug!(root = %project_root.display(), "no settings file, using directory lookup");
  Ok(Box::new(DirectoryLookup))
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;
  use std::collections::HashSet;

  use tempfile::TempDir;

  use super::*;

  /// Lookup over a fixed set of paths that records every query.
  struct FixedLookup {
    present: HashSet<String>,
    queried: RefCell<Vec<String>>,
  }

  impl FixedLookup {
    fn new(present: &[&str]) -> Self {
      Self {
        present: present.iter().map(|s| s.to_string()).collect(),
        queried: RefCell::new(Vec::new()),
      }
    }
  }

  impl ProjectLookup for FixedLookup {
    fn contains(&self, module: &ModuleRef) -> bool {
      self.queried.borrow_mut().push(module.path.clone());
      self.present.contains(&module.path)
    }
  }

  fn module(path: &str) -> ModuleRef {
    ModuleRef::from_project_path(path, Path::new("/repo"))
  }

  #[test]
  fn all_present_passes() {
    let lookup = FixedLookup::new(&[":a:a-base", ":a:a-postgresql-azurevault"]);
    let modules = [module(":a:a-base"), module(":a:a-postgresql-azurevault")];
    assert!(check_all(&modules, &lookup).is_ok());
  }

  #[test]
  fn fails_on_first_missing_module() {
    let lookup = FixedLookup::new(&[":a:a-base"]);
    let modules = [
      module(":a:a-base"),
      module(":a:a-postgresql-hashicorpvault"),
      module(":a:a-postgresql-azurevault"),
    ];

    let err = check_all(&modules, &lookup).unwrap_err();

    assert_eq!(err.path, ":a:a-postgresql-hashicorpvault");
    assert_eq!(
      *lookup.queried.borrow(),
      vec![":a:a-base".to_string(), ":a:a-postgresql-hashicorpvault".to_string()]
    );
  }

  #[test]
  fn not_found_message_is_actionable() {
    let err = ModuleNotFound::from(&module(":launchers:x:x-postgresql-azurevault"));
    let message = err.to_string();
    assert!(message.contains("':launchers:x:x-postgresql-azurevault'"));
    assert!(message.contains("pick a different vaultType"));
  }

  #[test]
  fn directory_lookup_checks_module_root() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("launchers/x/x-base")).unwrap();

    let present = ModuleRef::from_project_path(":launchers:x:x-base", temp.path());
    let missing = ModuleRef::from_project_path(":launchers:x:x-postgresql-azurevault", temp.path());

    assert!(DirectoryLookup.contains(&present));
    assert!(!DirectoryLookup.contains(&missing));
  }

  #[test]
  fn detect_prefers_settings_file() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("settings.gradle.kts"), "include(\":launchers:x:x-base\")\n").unwrap();

    let lookup = detect_lookup(temp.path()).unwrap();

    // Declared in settings but no directory on disk.
    assert!(lookup.contains(&ModuleRef::from_project_path(":launchers:x:x-base", temp.path())));
  }

  #[test]
  fn detect_falls_back_to_directories() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("launchers/x/x-base")).unwrap();

    let lookup = detect_lookup(temp.path()).unwrap();

    assert!(lookup.contains(&ModuleRef::from_project_path(":launchers:x:x-base", temp.path())));
    assert!(!lookup.contains(&ModuleRef::from_project_path(":launchers:y:y-base", temp.path())));
  }
}
