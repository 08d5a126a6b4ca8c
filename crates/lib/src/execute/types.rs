//! Types for build execution.
//!
//! This module defines the error type shared by every build stage, the
//! per-target state machine and the report returned by a finished build.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::graph::Target;
use crate::rules::RulesError;
use crate::template::TemplateError;

/// Errors that can occur while planning or running a build.
#[derive(Debug, Error)]
pub enum BuildError {
  /// Configuration was missing or invalid.
  #[error(transparent)]
  Config(#[from] ConfigError),

  /// Rule extension file could not be loaded.
  #[error(transparent)]
  Rules(#[from] RulesError),

  /// No rule can make the target and it does not exist.
  #[error("no rule to make target '{target}'{}", .needed_by.as_ref().map(|t| format!(", needed by '{t}'")).unwrap_or_default())]
  NoMatch { target: String, needed_by: Option<String> },

  /// Dependency expansion revisited a target or did not terminate.
  #[error("dependency cycle at '{target}': {}", .chain.join(" -> "))]
  Cycle { target: String, chain: Vec<String> },

  /// A command exited unsuccessfully.
  #[error("building '{target}' failed with exit code {}: {command}", .code.map(|c| c.to_string()).unwrap_or_else(|| "none (terminated by signal)".to_string()))]
  BuildFailure {
    target: String,
    command: String,
    code: Option<i32>,
  },

  /// A command could not be started.
  #[error("building '{target}' failed to start '{command}': {source}")]
  Spawn {
    target: String,
    command: String,
    #[source]
    source: std::io::Error,
  },

  /// One entry of the aggregate smoke-test sequence failed.
  #[error("smoke test '{test}' failed: {source}")]
  SmokeTestFailed {
    test: String,
    #[source]
    source: Box<BuildError>,
  },

  /// A command template could not be substituted.
  #[error("invalid command for '{target}': {source}")]
  Template {
    target: String,
    #[source]
    source: TemplateError,
  },

  /// Filesystem error outside of a command.
  #[error("io error on {}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl BuildError {
  pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
    let path = path.into();
    move |source| BuildError::Io { path, source }
  }

  /// Process exit status for this error.
  ///
  /// Configuration errors use 2. Build failures propagate the failing
  /// command's code, or 1 when it was killed by a signal. Everything else is 1.
  pub fn exit_code(&self) -> i32 {
    match self {
      BuildError::Config(_) => 2,
      BuildError::BuildFailure { code, .. } => match code {
        Some(0) | None => 1,
        Some(code) => *code,
      },
      BuildError::SmokeTestFailed { source, .. } => source.exit_code(),
      _ => 1,
    }
  }
}

/// Lifecycle of a single target during one build.
///
/// `Unresolved` and `Matched` are passed while the graph is expanded, so
/// execution starts every step at `DependenciesPending`. Reports only hold
/// terminal states.
///
/// ```text
/// Unresolved -> Matched -> DependenciesPending -> Stale -> Building -> Built | Failed
///                                              -> Fresh -> Skipped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
  Unresolved,
  Matched,
  DependenciesPending,
  Stale,
  Fresh,
  Building,
  Built,
  Failed,
  Skipped,
}

impl TargetState {
  pub fn is_terminal(self) -> bool {
    matches!(self, TargetState::Built | TargetState::Failed | TargetState::Skipped)
  }

  /// Whether moving from `self` to `next` is a legal transition.
  pub fn can_advance_to(self, next: TargetState) -> bool {
    use TargetState::*;
    matches!(
      (self, next),
      (Unresolved, Matched)
        | (Matched, DependenciesPending)
        | (DependenciesPending, Stale)
        | (DependenciesPending, Fresh)
        | (Stale, Building)
        | (Fresh, Skipped)
        | (Building, Built)
        | (Building, Failed)
    )
  }
}

/// Outcome of one smoke test run by the aggregate target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmokeTestResult {
  pub test: String,
  pub success: bool,
}

/// Result of one `build` call.
#[derive(Debug, Default)]
pub struct BuildReport {
  /// Terminal state of every planned target, in execution order.
  ///
  /// Targets after a failure never reach a terminal state and are left out.
  pub outcomes: Vec<(Target, TargetState)>,
  /// Help text rendered by the `help` target.
  pub help_text: Option<String>,
  /// Per-test results of the aggregate target, in run order.
  pub smoke_tests: Vec<SmokeTestResult>,
}

impl BuildReport {
  /// Targets whose action ran successfully.
  pub fn built(&self) -> usize {
    self.count(TargetState::Built)
  }

  /// Targets found up to date.
  pub fn skipped(&self) -> usize {
    self.count(TargetState::Skipped)
  }

  pub fn state_of(&self, target: &Target) -> Option<TargetState> {
    self.outcomes.iter().find(|(t, _)| t == target).map(|(_, state)| *state)
  }

  fn count(&self, state: TargetState) -> usize {
    self.outcomes.iter().filter(|(_, s)| *s == state).count()
  }

  /// Fold the report of a nested build into this one.
  pub(crate) fn absorb(&mut self, other: BuildReport) {
    self.outcomes.extend(other.outcomes);
    self.smoke_tests.extend(other.smoke_tests);
    if self.help_text.is_none() {
      self.help_text = other.help_text;
    }
  }
}
