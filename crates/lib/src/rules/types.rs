//! Rule definitions.

use serde::{Deserialize, Serialize};

/// What a rule's target name must look like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetPattern {
  /// Matches one symbolic name (`all`, `clean`, ...).
  Exact(String),
  /// Matches names ending in the suffix; the rest of the name is the stem.
  Suffix(String),
}

impl TargetPattern {
  /// Stem of `name` under this pattern, `None` when it does not match.
  ///
  /// Exact patterns yield an empty stem. A suffix pattern never matches a name
  /// consisting of the suffix alone.
  pub fn stem<'n>(&self, name: &'n str) -> Option<&'n str> {
    match self {
      TargetPattern::Exact(exact) => (exact == name).then_some(""),
      TargetPattern::Suffix(suffix) => name.strip_suffix(suffix.as_str()).filter(|stem| !stem.is_empty()),
    }
  }

  /// Sort key: exact names first, then longer suffixes before shorter ones.
  pub(crate) fn specificity(&self) -> (u8, std::cmp::Reverse<usize>) {
    match self {
      TargetPattern::Exact(_) => (0, std::cmp::Reverse(0)),
      TargetPattern::Suffix(suffix) => (1, std::cmp::Reverse(suffix.len())),
    }
  }
}

impl std::fmt::Display for TargetPattern {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      TargetPattern::Exact(name) => write!(f, "{name}"),
      TargetPattern::Suffix(suffix) => write!(f, "%{suffix}"),
    }
  }
}

/// Directory a prerequisite is looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
  /// The project root, where test-case sources live.
  Source,
  /// The per-architecture, per-device output directory.
  Output,
}

/// A rule's primary prerequisite: the stem plus `suffix`, in `location`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
  pub suffix: String,
  pub location: Location,
}

/// Prerequisites that do not derive from the stem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraDep {
  /// The merged device-definition file.
  DeviceDefinition,
  /// A file relative to the project root.
  File(String),
}

/// What running a rule does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
  /// Run a command template through the shell.
  Command(String),
  /// Delete the whole `build/` tree.
  RemoveBuildTree,
  /// Render the help text.
  PrintHelp,
  /// Build every smoke-test target, each as its own build.
  Aggregate,
  /// Only bring the prerequisites up to date.
  Nothing,
}

/// Working directory for a rule's command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkDir {
  /// The project root.
  #[default]
  Root,
  /// The output directory, so tool-relative outputs land next to their inputs.
  Output,
  /// The device-type directory.
  DeviceType,
}

/// A pattern rule: how to produce targets matching `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
  pub name: String,
  pub target: TargetPattern,
  #[serde(default)]
  pub source: Option<SourceSpec>,
  #[serde(default)]
  pub extra_deps: Vec<ExtraDep>,
  pub action: Action,
  #[serde(default)]
  pub workdir: WorkDir,
  /// Phony rules always run and never produce a timestamped artifact.
  #[serde(default)]
  pub phony: bool,
  #[serde(default)]
  pub description: Option<String>,
}

impl Rule {
  /// A file rule producing `%<target_suffix>` in the output directory.
  pub fn file(name: &str, target_suffix: &str, action: Action) -> Self {
    Self {
      name: name.to_string(),
      target: TargetPattern::Suffix(target_suffix.to_string()),
      source: None,
      extra_deps: Vec::new(),
      action,
      workdir: WorkDir::Output,
      phony: false,
      description: None,
    }
  }

  /// A phony rule matching names ending in `suffix`.
  pub fn phony_suffix(name: &str, suffix: &str, action: Action) -> Self {
    Self {
      target: TargetPattern::Suffix(suffix.to_string()),
      phony: true,
      ..Self::file(name, suffix, action)
    }
  }

  /// A phony rule matching exactly `target`.
  pub fn phony_exact(target: &str, action: Action) -> Self {
    Self {
      target: TargetPattern::Exact(target.to_string()),
      workdir: WorkDir::Root,
      phony: true,
      ..Self::file(target, target, action)
    }
  }

  pub fn from_source(mut self, suffix: &str, location: Location) -> Self {
    self.source = Some(SourceSpec {
      suffix: suffix.to_string(),
      location,
    });
    self
  }

  pub fn with_dep(mut self, dep: ExtraDep) -> Self {
    self.extra_deps.push(dep);
    self
  }

  pub fn in_dir(mut self, workdir: WorkDir) -> Self {
    self.workdir = workdir;
    self
  }

  pub fn describe(mut self, description: &str) -> Self {
    self.description = Some(description.to_string());
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn suffix_stem() {
    let pattern = TargetPattern::Suffix(".rr_graph.xml".to_string());
    assert_eq!(pattern.stem("const.rr_graph.xml"), Some("const"));
    assert_eq!(pattern.stem("const.patched.rr_graph.xml"), Some("const.patched"));
    assert_eq!(pattern.stem(".rr_graph.xml"), None);
    assert_eq!(pattern.stem("const.eblif"), None);
  }

  #[test]
  fn exact_stem() {
    let pattern = TargetPattern::Exact("clean".to_string());
    assert_eq!(pattern.stem("clean"), Some(""));
    assert_eq!(pattern.stem("clean.gdb"), None);
  }

  #[test]
  fn specificity_orders_exact_then_longest() {
    let exact = TargetPattern::Exact("all".to_string());
    let long = TargetPattern::Suffix(".patched.rr_graph.xml".to_string());
    let short = TargetPattern::Suffix(".xml".to_string());
    assert!(exact.specificity() < long.specificity());
    assert!(long.specificity() < short.specificity());
  }

  #[test]
  fn display_uses_percent_for_stem() {
    assert_eq!(TargetPattern::Suffix(".eblif".to_string()).to_string(), "%.eblif");
    assert_eq!(TargetPattern::Exact("help".to_string()).to_string(), "help");
  }

  #[test]
  fn rule_deserializes_with_defaults() {
    let json = r#"{
      "name": "bitstream",
      "target": { "suffix": ".bit" },
      "source": { "suffix": ".rr_graph.xml", "location": "output" },
      "action": { "command": "pack $${in} $${out}" }
    }"#;

    let rule: Rule = serde_json::from_str(json).unwrap();
    assert_eq!(rule.target, TargetPattern::Suffix(".bit".to_string()));
    assert_eq!(rule.workdir, WorkDir::Root);
    assert!(!rule.phony);
    assert!(rule.extra_deps.is_empty());
    assert_eq!(rule.action, Action::Command("pack $${in} $${out}".to_string()));
  }

  #[test]
  fn extra_deps_deserialize() {
    let json = r#"["device_definition", { "file": "utils/patch.py" }]"#;
    let deps: Vec<ExtraDep> = serde_json::from_str(json).unwrap();
    assert_eq!(
      deps,
      vec![ExtraDep::DeviceDefinition, ExtraDep::File("utils/patch.py".to_string())]
    );
  }
}
