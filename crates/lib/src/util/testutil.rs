//! Test utilities for launchpack-lib.
//!
//! External tools are replaced in tests by small shell scripts written into a
//! temporary directory.

use std::path::{Path, PathBuf};

/// Write an executable `/bin/sh` script named `name` into `dir`.
#[cfg(unix)]
pub fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
  use std::os::unix::fs::PermissionsExt;

  let path = dir.join(name);
  std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
  std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
  path
}

/// A fake tool that appends its arguments, one invocation per line, to `log`
/// and then exits with `code`.
#[cfg(unix)]
pub fn recording_tool(dir: &Path, name: &str, log: &Path, code: i32) -> PathBuf {
  fake_tool(dir, name, &format!("echo \"$@\" >> '{}'\nexit {}", log.display(), code))
}

/// Lines recorded by [`recording_tool`], or nothing if it never ran.
pub fn recorded(log: &Path) -> Vec<String> {
  std::fs::read_to_string(log)
    .map(|s| s.lines().map(str::to_string).collect())
    .unwrap_or_default()
}
