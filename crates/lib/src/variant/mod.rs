//! Variant resolution.
//!
//! Turns a requested variant name into the concrete backend modules of a
//! launcher. Resolution is pure: it never touches the filesystem, so the result
//! still has to go through [`crate::project::check_all`] before it is planned.

mod types;

pub use types::{ModulePrefix, ModuleRef, ResolvedVariant, VariantError, VariantName, VaultBackend};

use tracing::debug;

/// Resolve `requested` against the supported variants for the launcher at `prefix`.
///
/// The base module is not part of the result; callers obtain it from
/// [`ModulePrefix::base_module`].
///
/// # Errors
///
/// Returns [`VariantError::InvalidVariant`] when `requested` is empty or not one
/// of [`VariantName::supported`].
pub fn resolve(requested: &str, prefix: &ModulePrefix) -> Result<ResolvedVariant, VariantError> {
  let variant: VariantName = requested.trim().parse().map_err(|_| VariantError::InvalidVariant {
    requested: requested.to_string(),
    supported: VariantName::supported(),
  })?;

  Ok(resolve_variant(variant, prefix))
}

/// Expand an already-validated variant.
pub fn resolve_variant(variant: VariantName, prefix: &ModulePrefix) -> ResolvedVariant {
  let mut modules: Vec<ModuleRef> = Vec::new();
  for backend in variant.backends() {
    let module = prefix.backend_module(*backend);
    if !modules.contains(&module) {
      modules.push(module);
    }
  }

  debug!(variant = %variant, modules = modules.len(), prefix = %prefix.prefix, "resolved variant");

  ResolvedVariant { variant, modules }
}

#[cfg(test)]
mod tests {
  use std::collections::HashSet;
  use std::path::Path;

  use super::*;

  fn prefix() -> ModulePrefix {
    ModulePrefix::for_launcher("control-plane", "launchers", Path::new("/repo"))
  }

  #[test]
  fn every_supported_variant_resolves_to_unique_modules() {
    for name in VariantName::supported() {
      let resolved = resolve(name, &prefix()).unwrap();
      assert!(!resolved.is_empty(), "{} resolved to nothing", name);

      let unique: HashSet<_> = resolved.iter().collect();
      assert_eq!(unique.len(), resolved.len(), "{} resolved to duplicates", name);
    }
  }

  #[test]
  fn single_backend_resolves_to_its_module_only() {
    let resolved = resolve("azure", &prefix()).unwrap();
    assert_eq!(resolved.variant, VariantName::Azure);
    assert_eq!(
      resolved.modules,
      vec![ModuleRef::from_project_path(
        ":launchers:control-plane:control-plane-postgresql-azurevault",
        Path::new("/repo"),
      )]
    );
  }

  #[test]
  fn base_module_is_not_part_of_resolution() {
    let base = prefix().base_module();
    for variant in VariantName::ALL {
      assert!(!resolve_variant(variant, &prefix()).modules.contains(&base));
    }
  }

  #[test]
  fn both_is_union_of_single_backends_in_declaration_order() {
    let both = resolve("both", &prefix()).unwrap();

    let mut expected = Vec::new();
    for name in ["hashicorp", "azure"] {
      for module in resolve(name, &prefix()).unwrap().modules {
        if !expected.contains(&module) {
          expected.push(module);
        }
      }
    }

    assert_eq!(both.modules, expected);
    assert_eq!(both.modules[0].name(), "control-plane-postgresql-hashicorpvault");
    assert_eq!(both.modules[1].name(), "control-plane-postgresql-azurevault");
  }

  #[test]
  fn resolution_is_deterministic() {
    assert_eq!(resolve("both", &prefix()).unwrap(), resolve("both", &prefix()).unwrap());
  }

  #[test]
  fn unknown_variant_is_rejected_with_supported_list() {
    let err = resolve("quantum", &prefix()).unwrap_err();
    let VariantError::InvalidVariant { requested, supported } = &err;
    assert_eq!(requested, "quantum");
    assert_eq!(supported, &vec!["hashicorp", "azure", "both"]);

    let message = err.to_string();
    for name in VariantName::supported() {
      assert!(message.contains(name), "message should list {}: {}", name, message);
    }
  }

  #[test]
  fn empty_variant_is_rejected() {
    assert!(matches!(resolve("", &prefix()), Err(VariantError::InvalidVariant { .. })));
    assert!(matches!(resolve("   ", &prefix()), Err(VariantError::InvalidVariant { .. })));
  }
}
