//! Terminal output for launchpack commands.
//!
//! Text mode prints one marked line per task plus indented `label: value`
//! stats. JSON mode prints a single pretty document on stdout.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream, Style};

use launchpack_lib::execute::NodeState;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

/// Marks used in task listings.
pub mod marks {
  pub const DONE: &str = "✓";
  pub const FAILED: &str = "✗";
  pub const SKIPPED: &str = "•";
  pub const NOT_RUN: &str = "-";
  pub const WOULD_RUN: &str = "+";
  pub const ALREADY_DONE: &str = "~";
  pub const DEPENDS_ON: &str = "→";
  pub const WARNING: &str = "⚠";
}

/// Colored mark and short label for a node's final state.
pub fn state_mark(state: NodeState) -> (String, &'static str) {
  let (mark, style, label) = match state {
    NodeState::Succeeded => (marks::DONE, Style::new().green(), "done"),
    NodeState::Skipped => (marks::SKIPPED, Style::new().blue(), "skipped"),
    NodeState::Failed => (marks::FAILED, Style::new().red(), "failed"),
    NodeState::Pending => (marks::NOT_RUN, Style::new().dimmed(), "not run"),
    NodeState::Ready => (marks::NOT_RUN, Style::new().dimmed(), "ready"),
    NodeState::Running => (marks::NOT_RUN, Style::new().yellow(), "running"),
  };
  let mark = mark.if_supports_color(Stream::Stdout, |m| m.style(style)).to_string();
  (mark, label)
}

/// Short human duration: `850ms`, `12.4s`, `3m 07s`.
pub fn format_duration(duration: Duration) -> String {
  let millis = duration.as_millis();
  match millis {
    0..1_000 => format!("{}ms", millis),
    1_000..60_000 => format!("{:.1}s", duration.as_secs_f64()),
    _ => {
      let secs = duration.as_secs();
      format!("{}m {:02}s", secs / 60, secs % 60)
    }
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    marks::DONE.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    "error:".if_supports_color(Stream::Stderr, |s| s.red()),
    message
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    marks::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

/// A launcher heading in plan output.
pub fn print_heading(message: &str) {
  println!("{}", message.if_supports_color(Stream::Stdout, |s| s.bold()));
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn durations_by_magnitude() {
    assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
    assert_eq!(format_duration(Duration::from_millis(12_400)), "12.4s");
    assert_eq!(format_duration(Duration::from_secs(187)), "3m 07s");
  }

  #[test]
  fn node_states_have_labels() {
    assert_eq!(state_mark(NodeState::Pending).1, "not run");
    assert_eq!(state_mark(NodeState::Skipped).1, "skipped");
    assert!(state_mark(NodeState::Failed).0.contains(marks::FAILED));
  }
}
