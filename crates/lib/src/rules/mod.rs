//! Pattern rules and rule matching.
//!
//! A [`RuleSet`] holds the built-in rules plus any architecture-specific rules
//! loaded from `<RULES_DIR>/<ARCH>.json`, kept in specificity order: exact
//! names first, then longer suffixes before shorter ones. Among equally
//! specific rules the extension rules come first, then declaration order.

mod builtin;
mod types;

use std::io;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;

pub use types::{Action, ExtraDep, Location, Rule, SourceSpec, TargetPattern, WorkDir};

/// Errors raised while loading or validating rules.
#[derive(Debug, Error)]
pub enum RulesError {
  #[error("failed to read rule file {}: {source}", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid rule file {}: {source}", .path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("invalid rule '{name}': {reason}")]
  Invalid { name: String, reason: String },
}

/// Which rules may produce a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
  /// A file directly inside the output directory: non-phony rules only.
  File,
  /// A bare symbolic name: phony rules only.
  Phony,
}

/// A rule matched against a concrete name.
#[derive(Debug, Clone, Copy)]
pub struct Match<'r, 'n> {
  pub rule: &'r Rule,
  pub stem: &'n str,
}

#[derive(Debug, Deserialize)]
struct RuleFile {
  rules: Vec<Rule>,
}

/// An ordered, immutable set of rules.
#[derive(Debug, Clone)]
pub struct RuleSet {
  rules: Vec<Rule>,
  device_rule: Rule,
}

impl RuleSet {
  /// The built-in rules only.
  pub fn builtin() -> Self {
    let mut set = Self {
      rules: builtin::rules(),
      device_rule: builtin::device_definition_rule(),
    };
    set.sort();
    set
  }

  /// A rule set made of exactly `rules`.
  ///
  /// # Errors
  ///
  /// Returns [`RulesError::Invalid`] for malformed rules.
  pub fn from_rules(rules: Vec<Rule>) -> Result<Self, RulesError> {
    rules.iter().try_for_each(validate)?;
    let mut set = Self {
      rules,
      device_rule: builtin::device_definition_rule(),
    };
    set.sort();
    Ok(set)
  }

  /// Built-in rules plus the extension file for the configured architecture.
  ///
  /// A missing extension file is not an error.
  pub fn load(config: &Config) -> Result<Self, RulesError> {
    let mut set = Self::builtin();
    let path = config.rules_file();

    let content = match std::fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "no rule extension file");
        return Ok(set);
      }
      Err(source) => return Err(RulesError::Read { path, source }),
    };

    let file: RuleFile = serde_json::from_str(&content).map_err(|source| RulesError::Parse {
      path: path.clone(),
      source,
    })?;
    info!(path = %path.display(), count = file.rules.len(), "loaded rule extensions");

    set.extend(file.rules)?;
    Ok(set)
  }

  /// Add rules that take precedence over existing rules of equal specificity.
  pub fn extend(&mut self, rules: Vec<Rule>) -> Result<(), RulesError> {
    rules.iter().try_for_each(validate)?;
    let existing = std::mem::take(&mut self.rules);
    self.rules = rules.into_iter().chain(existing).collect();
    self.sort();
    Ok(())
  }

  fn sort(&mut self) {
    // Stable, so declaration order breaks ties.
    self.rules.sort_by_key(|rule| rule.target.specificity());
  }

  pub fn rules(&self) -> &[Rule] {
    &self.rules
  }

  /// Rule used to generate a missing merged device definition.
  pub fn device_rule(&self) -> &Rule {
    &self.device_rule
  }

  /// Rules able to produce `name`, most specific first.
  pub fn candidates<'r, 'n>(&'r self, name: &'n str, kind: TargetKind) -> impl Iterator<Item = Match<'r, 'n>> {
    self
      .rules
      .iter()
      .filter(move |rule| rule.phony == (kind == TargetKind::Phony))
      .filter_map(move |rule| rule.target.stem(name).map(|stem| Match { rule, stem }))
  }

  /// The most specific rule matching `name`, of either kind.
  pub fn match_target<'r, 'n>(&'r self, name: &'n str) -> Option<Match<'r, 'n>> {
    self
      .rules
      .iter()
      .find_map(|rule| rule.target.stem(name).map(|stem| Match { rule, stem }))
  }

  /// Whether `name` is handled by a phony rule.
  pub fn is_phony(&self, name: &str) -> bool {
    self.candidates(name, TargetKind::Phony).next().is_some()
  }

  /// Usage text listing every rule and the recognized variables.
  pub fn help_text(&self, config: &Config) -> String {
    let mut out = String::from("Usage: rrmake build [TARGET|NAME=VALUE]...\n\nTargets:\n");

    for rule in &self.rules {
      let description = rule.description.as_deref().unwrap_or(&rule.name);
      out.push_str(&format!("  {:<26} {}\n", rule.target.to_string(), description));
    }

    out.push_str("\nVariables:\n");
    for name in crate::config::REQUIRED {
      out.push_str(&format!("  {name:<26} (required) {}\n", config.var(name).unwrap_or_default()));
    }
    for name in [
      crate::config::DEVICE_TYPE,
      crate::config::VPR,
      crate::config::YOSYS,
      crate::config::VPR_ARGS,
      crate::config::ROUTE_CHAN_WIDTH,
      crate::config::GDB,
      crate::config::RR_PATCH,
      crate::config::XMLSORT,
      crate::config::MAKE,
      crate::config::RULES_DIR_VAR,
    ] {
      out.push_str(&format!("  {name:<26} {}\n", config.var(name).unwrap_or_default()));
    }

    out
  }
}

fn validate(rule: &Rule) -> Result<(), RulesError> {
  let invalid = |reason: &str| RulesError::Invalid {
    name: rule.name.clone(),
    reason: reason.to_string(),
  };

  match &rule.target {
    TargetPattern::Exact(name) if name.is_empty() => Err(invalid("empty target name")),
    TargetPattern::Exact(_) if !rule.phony => Err(invalid("exact targets must be phony")),
    TargetPattern::Suffix(suffix) if suffix.is_empty() => Err(invalid("empty target suffix")),
    _ if matches!(&rule.source, Some(source) if source.suffix.is_empty()) => Err(invalid("empty source suffix")),
    _ => Ok(()),
  }
}
