mod build;
mod plan;

use std::path::Path;

use rrmake_lib::config::{Config, parse_assignment};
use rrmake_lib::execute::BuildError;
use rrmake_lib::rules::RuleSet;

pub use build::cmd_build;
pub use plan::cmd_plan;

/// Positional arguments split into variable assignments and targets.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Request {
  pub assignments: Vec<(String, String)>,
  pub targets: Vec<String>,
}

impl Request {
  pub fn parse(args: &[String]) -> Self {
    let mut request = Self::default();
    for arg in args {
      match parse_assignment(arg) {
        Some(assignment) => request.assignments.push(assignment),
        None => request.targets.push(arg.clone()),
      }
    }
    request
  }

  /// Requested targets, with `None` standing for the default target.
  pub fn targets(&self) -> Vec<Option<&str>> {
    if self.targets.is_empty() {
      vec![None]
    } else {
      self.targets.iter().map(|t| Some(t.as_str())).collect()
    }
  }
}

/// Read the configuration and rules for `root`.
fn load(root: &Path, request: &Request) -> Result<(Config, RuleSet), BuildError> {
  let config = Config::from_env(root, &request.assignments)?;
  let rules = RuleSet::load(&config)?;
  Ok((config, rules))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn assignments_and_targets_are_split() {
    let request = Request::parse(&args(&["ARCH=ice40", "const.rr_graph.xml", "VPR_ARGS=--seed 3", "clean"]));

    assert_eq!(
      request.assignments,
      vec![
        ("ARCH".to_string(), "ice40".to_string()),
        ("VPR_ARGS".to_string(), "--seed 3".to_string()),
      ]
    );
    assert_eq!(request.targets, vec!["const.rr_graph.xml", "clean"]);
  }

  #[test]
  fn no_targets_means_default() {
    let request = Request::parse(&args(&["ARCH=x"]));
    assert_eq!(request.targets(), vec![None]);
  }
}
