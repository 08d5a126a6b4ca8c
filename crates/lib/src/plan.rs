//! Build plans.
//!
//! A [`BuildPlan`] is the leaves-first list of rule steps needed for one
//! requested target, each tagged with its staleness. Plans are computed fresh
//! for every invocation and never persisted.

use std::path::Path;

use serde::Serialize;

use crate::execute::BuildError;
use crate::graph::{Recipe, Step, Target, TargetGraph};
use crate::stale::{Staleness, StalenessChecker};

/// One target produced by a rule.
#[derive(Debug, Clone, Serialize)]
pub struct PlanStep {
  pub target: Target,
  /// Target as shown to users, relative to the project root.
  pub label: String,
  pub recipe: Recipe,
  pub staleness: Staleness,
}

impl PlanStep {
  pub fn needs_build(&self) -> bool {
    self.staleness.needs_build()
  }
}

/// Ordered steps for one requested target.
#[derive(Debug, Clone, Serialize)]
pub struct BuildPlan {
  /// The requested target as given.
  pub request: String,
  /// Existing inputs the steps read, in dependency order.
  pub inputs: Vec<String>,
  /// Inputs that do not exist and have no rule, such as a device definition
  /// outside any device-type directory. They carry no timestamp.
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub absent_inputs: Vec<String>,
  pub steps: Vec<PlanStep>,
  /// Plans of the smoke tests the aggregate target runs, in order.
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub smoke_tests: Vec<BuildPlan>,
}

impl BuildPlan {
  /// Evaluate staleness over `graph` and collect its steps leaves-first.
  pub fn from_graph(request: &str, graph: &TargetGraph, root: &Path) -> Result<Self, BuildError> {
    let mut checker = StalenessChecker::new(graph);
    let mut inputs = Vec::new();
    let mut absent_inputs = Vec::new();
    let mut steps = Vec::new();

    for idx in graph.build_order()? {
      let node = graph.node(idx);
      let label = node.target.label(root);
      match &node.recipe {
        None if node.target.path().is_some_and(|path| !path.exists()) => absent_inputs.push(label),
        None => inputs.push(label),
        Some(recipe) => steps.push(PlanStep {
          target: node.target.clone(),
          label,
          recipe: recipe.clone(),
          staleness: checker.check(idx)?,
        }),
      }
    }

    Ok(Self {
      request: request.to_string(),
      inputs,
      absent_inputs,
      steps,
      smoke_tests: Vec::new(),
    })
  }

  /// Whether this plan runs the smoke-test sequence.
  pub fn is_aggregate(&self) -> bool {
    self.steps.iter().any(|step| step.recipe.step == Step::Aggregate)
  }

  /// Steps that will actually run.
  pub fn pending(&self) -> impl Iterator<Item = &PlanStep> {
    self.steps.iter().filter(|step| step.needs_build())
  }

  /// Whether running the plan would do nothing.
  ///
  /// The aggregate step itself is phony, so only its smoke tests count.
  pub fn is_up_to_date(&self) -> bool {
    if self.is_aggregate() {
      return self.smoke_tests.iter().all(BuildPlan::is_up_to_date);
    }
    self.pending().next().is_none()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Config;
  use crate::paths::PathResolver;
  use crate::rules::RuleSet;
  use crate::util::testutil::{at, set_mtime, test_config, touch};
  use tempfile::TempDir;

  fn plan(config: &Config, request: &str) -> BuildPlan {
    let rules = RuleSet::builtin();
    let paths = PathResolver::new(config);
    let target = TargetGraph::request_target(request, &rules, &paths);
    let graph = TargetGraph::expand(target, &rules, &paths, config).unwrap();
    BuildPlan::from_graph(request, &graph, &config.root).unwrap()
  }

  #[test]
  fn fresh_tree_plans_every_step() {
    let temp = TempDir::new().unwrap();
    touch(&temp.path().join("const.v"));
    let config = test_config(temp.path(), &[]);

    let plan = plan(&config, "const.rr_graph.xml");
    let labels: Vec<&str> = plan.steps.iter().map(|s| s.label.as_str()).collect();

    assert_eq!(labels, vec!["build/x/d/const.eblif", "build/x/d/const.rr_graph.xml"]);
    assert!(plan.inputs.contains(&"const.v".to_string()));
    assert!(plan.smoke_tests.is_empty());
    assert!(plan.steps.iter().all(|s| s.staleness == Staleness::Missing));
    assert!(!plan.is_up_to_date());
  }

  #[test]
  fn up_to_date_tree_has_nothing_pending() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), &[]);
    for (rel, secs) in [
      ("const.v", 0),
      ("build/x/d/const.eblif", 1),
      ("build/x/d/const.rr_graph.xml", 2),
    ] {
      touch(&config.root.join(rel));
      set_mtime(&config.root.join(rel), at(secs));
    }

    let plan = plan(&config, "const.rr_graph.xml");
    assert_eq!(plan.steps.len(), 2);
    assert!(plan.is_up_to_date());
  }

  #[test]
  fn phony_request_is_last_step() {
    let temp = TempDir::new().unwrap();
    touch(&temp.path().join("const.v"));
    let config = test_config(temp.path(), &[]);

    let plan = plan(&config, "const.patched");
    let last = plan.steps.last().unwrap();
    assert_eq!(last.target, Target::Phony("const.patched".to_string()));
    assert_eq!(last.recipe.step, Step::Nothing);
    assert_eq!(last.staleness, Staleness::Phony);
    assert_eq!(plan.steps.len(), 4);
  }

  #[test]
  fn plan_serializes_to_json() {
    let temp = TempDir::new().unwrap();
    touch(&temp.path().join("const.v"));
    let config = test_config(temp.path(), &[]);

    let plan = plan(&config, "const.eblif");
    let json = serde_json::to_value(&plan).unwrap();

    assert_eq!(json["request"], "const.eblif");
    assert_eq!(json["steps"][0]["label"], "build/x/d/const.eblif");
    assert_eq!(json["steps"][0]["recipe"]["rule"], "synthesis");
    assert_eq!(json["steps"][0]["recipe"]["step"]["type"], "command");
    assert_eq!(json["steps"][0]["staleness"]["reason"], "missing");
  }

  #[test]
  fn missing_device_definition_is_not_an_existing_input() {
    let temp = TempDir::new().unwrap();
    touch(&temp.path().join("const.v"));
    let config = test_config(temp.path(), &[]);

    let plan = plan(&config, "const.rr_graph.xml");

    assert_eq!(plan.inputs, vec!["const.v".to_string()]);
    assert_eq!(plan.absent_inputs, vec!["/dev/d/arch.merged.xml".to_string()]);

    let json = serde_json::to_value(&plan).unwrap();
    assert_eq!(json["absent_inputs"][0], "/dev/d/arch.merged.xml");
  }

  #[test]
  fn existing_device_definition_is_an_input() {
    let temp = TempDir::new().unwrap();
    touch(&temp.path().join("const.v"));
    touch(&temp.path().join("devices/d/arch.merged.xml"));
    let config = test_config(temp.path(), &[("DEVICE_DIR", "devices")]);

    let plan = plan(&config, "const.rr_graph.xml");

    assert!(plan.absent_inputs.is_empty());
    assert!(plan.inputs.iter().any(|input| input.ends_with("arch.merged.xml")));
  }
}
