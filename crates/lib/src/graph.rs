//! Target graph expansion.
//!
//! Starting from a requested target, rules are matched and their
//! prerequisites expanded recursively into a DAG of concrete targets. Edges
//! point from a dependency to its dependent, so a topological order is a
//! valid leaves-first build order.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::consts::MAX_EXPANSION_DEPTH;
use crate::execute::BuildError;
use crate::paths::{PathResolver, relative_to};
use crate::rules::{Action, ExtraDep, Rule, RuleSet, TargetKind};
use crate::template::{self, Placeholder, Resolver, TemplateError};

/// A concrete file or a symbolic phony name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Target {
  File(PathBuf),
  Phony(String),
}

impl Target {
  pub fn path(&self) -> Option<&Path> {
    match self {
      Target::File(path) => Some(path),
      Target::Phony(_) => None,
    }
  }

  /// Human-readable form, with file paths shown relative to `root`.
  pub fn label(&self, root: &Path) -> String {
    match self {
      Target::File(path) => relative_to(path, root),
      Target::Phony(name) => name.clone(),
    }
  }
}

impl fmt::Display for Target {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Target::File(path) => write!(f, "{}", path.display()),
      Target::Phony(name) => write!(f, "{name}"),
    }
  }
}

/// The resolved action of a matched rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "command", rename_all = "snake_case")]
pub enum Step {
  /// A fully substituted shell command line.
  Command(String),
  RemoveBuildTree,
  PrintHelp,
  Aggregate,
  Nothing,
}

/// How a target is (re)made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipe {
  pub rule: String,
  pub phony: bool,
  pub step: Step,
  pub workdir: PathBuf,
}

/// A node of the target graph. Leaves (existing sources, external inputs) have no recipe.
#[derive(Debug, Clone)]
pub struct Node {
  pub target: Target,
  pub recipe: Option<Recipe>,
}

/// The expanded dependency DAG for one requested target.
#[derive(Debug)]
pub struct TargetGraph {
  graph: DiGraph<Node, ()>,
  index: HashMap<Target, NodeIndex>,
  root: NodeIndex,
}

impl TargetGraph {
  /// Map a requested name onto a target: phony names stay symbolic, anything
  /// else is a file path.
  pub fn request_target(request: &str, rules: &RuleSet, paths: &PathResolver<'_>) -> Target {
    if !request.contains(['/', '\\']) && rules.is_phony(request) {
      Target::Phony(request.to_string())
    } else {
      Target::File(paths.target_path(request))
    }
  }

  /// Expand `target` and everything it transitively depends on.
  ///
  /// # Errors
  ///
  /// - [`BuildError::NoMatch`] if the target (or a prerequisite of every
  ///   candidate rule) can neither be built nor found on disk
  /// - [`BuildError::Cycle`] if expansion revisits a target or exceeds the depth bound
  /// - [`BuildError::Template`] if a command template cannot be substituted
  pub fn expand(target: Target, rules: &RuleSet, paths: &PathResolver<'_>, config: &Config) -> Result<Self, BuildError> {
    let mut expander = Expander {
      rules,
      paths,
      config,
      graph: DiGraph::new(),
      index: HashMap::new(),
      stack: Vec::new(),
    };

    let root = expander.visit(target, None)?;

    Ok(Self {
      graph: expander.graph,
      index: expander.index,
      root,
    })
  }

  pub fn root(&self) -> NodeIndex {
    self.root
  }

  pub fn node(&self, idx: NodeIndex) -> &Node {
    &self.graph[idx]
  }

  pub fn find(&self, target: &Target) -> Option<NodeIndex> {
    self.index.get(target).copied()
  }

  /// Direct dependencies of a node.
  pub fn dependencies(&self, idx: NodeIndex) -> Vec<NodeIndex> {
    self.graph.neighbors_directed(idx, Direction::Incoming).collect()
  }

  /// Nodes reachable from the root, leaves first.
  ///
  /// Targets expanded while probing a rule that was then abandoned are left
  /// out.
  pub fn build_order(&self) -> Result<Vec<NodeIndex>, BuildError> {
    let reversed = Reversed(&self.graph);
    let mut reachable = HashSet::new();
    let mut dfs = Dfs::new(reversed, self.root);
    while let Some(idx) = dfs.next(reversed) {
      reachable.insert(idx);
    }

    let sorted = toposort(&self.graph, None).map_err(|cycle| BuildError::Cycle {
      target: self.graph[cycle.node_id()].target.to_string(),
      chain: Vec::new(),
    })?;

    Ok(sorted.into_iter().filter(|idx| reachable.contains(idx)).collect())
  }

  /// Number of nodes reachable from the root.
  pub fn len(&self) -> usize {
    self.build_order().map(|order| order.len()).unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

struct Expander<'a, 'p> {
  rules: &'a RuleSet,
  paths: &'a PathResolver<'p>,
  config: &'a Config,
  graph: DiGraph<Node, ()>,
  index: HashMap<Target, NodeIndex>,
  /// Targets currently being expanded, outermost first.
  stack: Vec<Target>,
}

impl Expander<'_, '_> {
  fn visit(&mut self, target: Target, needed_by: Option<&Target>) -> Result<NodeIndex, BuildError> {
    if let Some(&idx) = self.index.get(&target) {
      return Ok(idx);
    }

    if let Some(pos) = self.stack.iter().position(|t| *t == target) {
      return Err(self.cycle(&target, pos));
    }
    if self.stack.len() >= MAX_EXPANSION_DEPTH {
      return Err(self.cycle(&target, 0));
    }

    trace!(target = %target, depth = self.stack.len(), "expanding");
    self.stack.push(target.clone());
    let result = self.expand(&target, needed_by);
    self.stack.pop();
    result
  }

  fn expand(&mut self, target: &Target, needed_by: Option<&Target>) -> Result<NodeIndex, BuildError> {
    let rules = self.rules;
    let mut first_miss = None;

    match target {
      Target::Phony(name) => {
        for candidate in rules.candidates(name, TargetKind::Phony) {
          match self.try_rule(target, candidate.rule, candidate.stem)? {
            Ok(idx) => return Ok(idx),
            Err(miss) => {
              first_miss.get_or_insert(miss);
            }
          }
        }
      }
      Target::File(path) => {
        if self.paths.is_device_definition(path) {
          return self.expand_device_definition(target);
        }

        if let Some(name) = self.paths.output_file_name(path) {
          for candidate in rules.candidates(name, TargetKind::File) {
            match self.try_rule(target, candidate.rule, candidate.stem)? {
              Ok(idx) => return Ok(idx),
              Err(miss) => {
                first_miss.get_or_insert(miss);
              }
            }
          }
        }

        if path.exists() {
          return Ok(self.add_node(target.clone(), None));
        }
      }
    }

    Err(first_miss.unwrap_or_else(|| self.no_match(target, needed_by)))
  }

  /// Try to produce `target` with `rule`.
  ///
  /// The outer `Result` carries fatal errors. The inner `Err` means the rule
  /// is not viable because a prerequisite cannot be made, so the caller may
  /// fall through to the next candidate.
  fn try_rule(
    &mut self,
    target: &Target,
    rule: &Rule,
    stem: &str,
  ) -> Result<Result<NodeIndex, BuildError>, BuildError> {
    let mut deps = Vec::new();
    let mut input = None;

    if let Some(source) = &rule.source {
      let prerequisite = Target::File(self.paths.source_path(stem, &source.suffix, source.location));
      match self.visit(prerequisite.clone(), Some(target)) {
        Ok(idx) => {
          deps.push(idx);
          input = Some(prerequisite);
        }
        Err(miss @ BuildError::NoMatch { .. }) => {
          debug!(rule = %rule.name, target = %target, "prerequisite unavailable, trying next rule");
          return Ok(Err(miss));
        }
        Err(e) => return Err(e),
      }
    }

    for extra in &rule.extra_deps {
      let dep = match extra {
        ExtraDep::DeviceDefinition => Target::File(self.paths.device_definition().path.clone()),
        ExtraDep::File(path) => Target::File(self.config.root.join(path)),
      };
      match self.visit(dep, Some(target)) {
        Ok(idx) => deps.push(idx),
        Err(miss @ BuildError::NoMatch { .. }) => return Ok(Err(miss)),
        Err(e) => return Err(e),
      }
    }

    let recipe = self.recipe(rule, stem, target, input.as_ref())?;
    let idx = self.add_node(target.clone(), Some(recipe));
    for dep in deps {
      self.graph.update_edge(dep, idx, ());
    }

    debug!(target = %target, rule = %rule.name, "matched");
    Ok(Ok(idx))
  }

  fn expand_device_definition(&mut self, target: &Target) -> Result<NodeIndex, BuildError> {
    let device = self.paths.device_definition();
    if device.path.exists() {
      return Ok(self.add_node(target.clone(), None));
    }

    if device.type_dir.is_none() {
      warn!(
        path = %device.path.display(),
        "device definition is missing and its device directory does not exist"
      );
      return Ok(self.add_node(target.clone(), None));
    }

    let rules = self.rules;
    let recipe = self.recipe(rules.device_rule(), "", target, None)?;
    Ok(self.add_node(target.clone(), Some(recipe)))
  }

  fn recipe(&self, rule: &Rule, stem: &str, target: &Target, input: Option<&Target>) -> Result<Recipe, BuildError> {
    let workdir = self.paths.workdir(rule.workdir);

    let step = match &rule.action {
      Action::Command(command) => {
        let context = CommandContext {
          input: input.map(|t| self.render(t, &workdir)),
          output: self.render(target, &workdir),
          stem: stem.to_string(),
          out_dir: relative_to(self.paths.output_dir(), &workdir),
          device_xml: self.paths.device_definition().path.display().to_string(),
          device_type_dir: self
            .paths
            .device_definition()
            .type_dir
            .as_ref()
            .map(|dir| dir.display().to_string()),
          config: self.config,
        };
        let command = template::substitute(command, &context).map_err(|source| BuildError::Template {
          target: target.label(&self.config.root),
          source,
        })?;
        Step::Command(command)
      }
      Action::RemoveBuildTree => Step::RemoveBuildTree,
      Action::PrintHelp => Step::PrintHelp,
      Action::Aggregate => Step::Aggregate,
      Action::Nothing => Step::Nothing,
    };

    Ok(Recipe {
      rule: rule.name.clone(),
      phony: rule.phony,
      step,
      workdir,
    })
  }

  fn render(&self, target: &Target, workdir: &Path) -> String {
    match target {
      Target::File(path) => relative_to(path, workdir),
      Target::Phony(name) => name.clone(),
    }
  }

  fn add_node(&mut self, target: Target, recipe: Option<Recipe>) -> NodeIndex {
    let idx = self.graph.add_node(Node {
      target: target.clone(),
      recipe,
    });
    self.index.insert(target, idx);
    idx
  }

  fn no_match(&self, target: &Target, needed_by: Option<&Target>) -> BuildError {
    BuildError::NoMatch {
      target: target.label(&self.config.root),
      needed_by: needed_by.map(|t| t.label(&self.config.root)),
    }
  }

  fn cycle(&self, target: &Target, from: usize) -> BuildError {
    let root = &self.config.root;
    let chain = self.stack[from..]
      .iter()
      .chain(std::iter::once(target))
      .map(|t| t.label(root))
      .collect();
    BuildError::Cycle {
      target: target.label(root),
      chain,
    }
  }
}

/// Placeholder values for one matched rule.
struct CommandContext<'c> {
  input: Option<String>,
  output: String,
  stem: String,
  out_dir: String,
  device_xml: String,
  device_type_dir: Option<String>,
  config: &'c Config,
}

impl Resolver for CommandContext<'_> {
  fn resolve_path(&self, placeholder: &Placeholder) -> Result<&str, TemplateError> {
    match placeholder {
      Placeholder::In => self.input.as_deref().ok_or(TemplateError::Unavailable("in")),
      Placeholder::Out => Ok(&self.output),
      Placeholder::Stem => Ok(&self.stem),
      Placeholder::OutDir => Ok(&self.out_dir),
      Placeholder::DeviceXml => Ok(&self.device_xml),
      Placeholder::DeviceTypeDir => self
        .device_type_dir
        .as_deref()
        .ok_or(TemplateError::Unavailable("device_type_dir")),
      Placeholder::Var(name) | Placeholder::Raw(name) => Err(TemplateError::UnknownVariable(name.clone())),
    }
  }

  fn resolve_var(&self, name: &str) -> Result<Cow<'_, str>, TemplateError> {
    self
      .config
      .var(name)
      .map(Cow::Owned)
      .ok_or_else(|| TemplateError::UnknownVariable(name.to_string()))
  }
}
