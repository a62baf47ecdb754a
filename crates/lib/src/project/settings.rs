//! Project lookup backed by the build tool's settings file.
//!
//! Only `include(...)` declarations are read. Both the Kotlin DSL
//! (`include(":a", ":b")`) and the Groovy DSL (`include ':a', ':b'`) forms are
//! understood, including calls spanning several lines.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::ProjectLookup;
use crate::variant::ModuleRef;

#[derive(Debug, Error)]
#[error("failed to read settings file {path}: {source}")]
pub struct SettingsError {
  pub path: PathBuf,
  #[source]
  pub source: std::io::Error,
}

/// The set of project paths declared in a settings file.
#[derive(Debug, Clone, Default)]
pub struct SettingsLookup {
  projects: BTreeSet<String>,
}

impl SettingsLookup {
  pub fn load(path: &Path) -> Result<Self, SettingsError> {
    let content = std::fs::read_to_string(path).map_err(|source| SettingsError {
      path: path.to_path_buf(),
      source,
    })?;
    let lookup = Self::parse(&content);
    debug!(path = %path.display(), projects = lookup.projects.len(), "loaded settings");
    Ok(lookup)
  }

  pub fn parse(content: &str) -> Self {
    Self {
      projects: parse_includes(content).into_iter().collect(),
    }
  }

  pub fn projects(&self) -> impl Iterator<Item = &str> {
    self.projects.iter().map(|s| s.as_str())
  }
}

impl ProjectLookup for SettingsLookup {
  fn contains(&self, module: &ModuleRef) -> bool {
    self.projects.contains(&module.path)
  }
}

/// Extract every project path declared through `include`.
///
/// Paths are normalised to start with `:`.
pub fn parse_includes(content: &str) -> Vec<String> {
  let mut includes = Vec::new();
  let mut open = OpenCall::None;

  for raw in content.lines() {
    let line = strip_comment(raw).trim();

    let args = match open {
      OpenCall::None => line
        .strip_prefix("include")
        .filter(|rest| rest.starts_with('(') || rest.starts_with(char::is_whitespace)),
      OpenCall::Paren | OpenCall::Comma => Some(line),
    };

    let Some(args) = args else {
      continue;
    };

    includes.extend(quoted_strings(args).into_iter().map(normalise));

    let paren = open == OpenCall::Paren || (open == OpenCall::None && args.trim_start().starts_with('('));
    open = if paren {
      // Kotlin: open until the closing paren.
      if args.contains(')') { OpenCall::None } else { OpenCall::Paren }
    } else if args.ends_with(',') || (args.is_empty() && open == OpenCall::Comma) {
      // Groovy: the argument list continues after a trailing comma.
      OpenCall::Comma
    } else {
      OpenCall::None
    };
  }

  includes
}

/// An `include` call spanning lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenCall {
  None,
  Paren,
  Comma,
}

fn normalise(path: String) -> String {
  if path.starts_with(':') { path } else { format!(":{}", path) }
}

fn strip_comment(line: &str) -> &str {
  match line.find("//") {
    Some(idx) => &line[..idx],
    None => line,
  }
}

fn quoted_strings(input: &str) -> Vec<String> {
  let mut out = Vec::new();
  let mut chars = input.chars();

  while let Some(c) = chars.next() {
    if c == '"' || c == '\'' {
      let value: String = chars.by_ref().take_while(|&next| next != c).collect();
      if !value.is_empty() {
        out.push(value);
      }
    }
  }

  out
}
