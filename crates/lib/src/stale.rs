//! Timestamp-based staleness.
//!
//! Nothing is cached between runs: every decision is recomputed from the
//! filesystem, with results memoized only for the lifetime of one checker.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use petgraph::graph::NodeIndex;
use serde::Serialize;
use tracing::trace;

use crate::execute::BuildError;
use crate::graph::{Target, TargetGraph};

/// Why a target does or does not need building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "dependency", rename_all = "snake_case")]
pub enum Staleness {
  /// Exists and is at least as new as every dependency, or is a plain input.
  Fresh,
  /// Phony targets always run.
  Phony,
  /// The artifact does not exist.
  Missing,
  /// A dependency was modified after the artifact.
  NewerDependency(Target),
  /// A dependency is itself going to be rebuilt.
  DirtyDependency(Target),
}

impl Staleness {
  pub fn needs_build(&self) -> bool {
    !matches!(self, Staleness::Fresh)
  }
}

impl std::fmt::Display for Staleness {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Staleness::Fresh => write!(f, "up to date"),
      Staleness::Phony => write!(f, "phony"),
      Staleness::Missing => write!(f, "missing"),
      Staleness::NewerDependency(dep) => write!(f, "older than {dep}"),
      Staleness::DirtyDependency(dep) => write!(f, "{dep} is out of date"),
    }
  }
}

/// Memoized staleness over one expanded graph.
pub struct StalenessChecker<'g> {
  graph: &'g TargetGraph,
  verdicts: HashMap<NodeIndex, Staleness>,
  mtimes: HashMap<NodeIndex, Option<SystemTime>>,
}

impl<'g> StalenessChecker<'g> {
  pub fn new(graph: &'g TargetGraph) -> Self {
    Self {
      graph,
      verdicts: HashMap::new(),
      mtimes: HashMap::new(),
    }
  }

  /// Whether `idx` must be (re)built.
  pub fn needs_build(&mut self, idx: NodeIndex) -> Result<bool, BuildError> {
    Ok(self.check(idx)?.needs_build())
  }

  /// Staleness of `idx`, evaluating its dependencies first.
  ///
  /// # Errors
  ///
  /// Returns [`BuildError::Io`] if a file exists but its metadata cannot be read.
  pub fn check(&mut self, idx: NodeIndex) -> Result<Staleness, BuildError> {
    if let Some(verdict) = self.verdicts.get(&idx) {
      return Ok(verdict.clone());
    }

    let verdict = self.evaluate(idx)?;
    trace!(target = %self.graph.node(idx).target, verdict = %verdict, "staleness");
    self.verdicts.insert(idx, verdict.clone());
    Ok(verdict)
  }

  fn evaluate(&mut self, idx: NodeIndex) -> Result<Staleness, BuildError> {
    let graph = self.graph;
    let node = graph.node(idx);

    // Plain inputs are never rebuilt here.
    let Some(recipe) = &node.recipe else {
      return Ok(Staleness::Fresh);
    };

    if recipe.phony {
      // Dependencies still get evaluated so their verdicts are cached.
      for dep in graph.dependencies(idx) {
        self.check(dep)?;
      }
      return Ok(Staleness::Phony);
    }

    let Some(own) = self.mtime(idx)? else {
      return Ok(Staleness::Missing);
    };

    let mut newer = None;
    for dep in graph.dependencies(idx) {
      if self.check(dep)?.needs_build() {
        return Ok(Staleness::DirtyDependency(graph.node(dep).target.clone()));
      }
      if newer.is_none()
        && let Some(dep_time) = self.mtime(dep)?
        && dep_time > own
      {
        newer = Some(graph.node(dep).target.clone());
      }
    }

    Ok(match newer {
      Some(dep) => Staleness::NewerDependency(dep),
      None => Staleness::Fresh,
    })
  }

  /// Modification time of a node's file, `None` if absent or phony.
  fn mtime(&mut self, idx: NodeIndex) -> Result<Option<SystemTime>, BuildError> {
    if let Some(time) = self.mtimes.get(&idx) {
      return Ok(*time);
    }

    let time = match self.graph.node(idx).target.path() {
      Some(path) => modified(path)?,
      None => None,
    };
    self.mtimes.insert(idx, time);
    Ok(time)
  }
}

fn modified(path: &Path) -> Result<Option<SystemTime>, BuildError> {
  match std::fs::metadata(path).and_then(|meta| meta.modified()) {
    Ok(time) => Ok(Some(time)),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
    Err(e) => Err(BuildError::io(path)(e)),
  }
}
