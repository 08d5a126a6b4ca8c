//! Build execution.
//!
//! The [`Orchestrator`] ties everything together for one request:
//! - match and expand the requested target into a graph
//! - evaluate staleness and derive a leaves-first [`BuildPlan`]
//! - run stale steps one at a time, stopping at the first failure
//!
//! Execution is strictly sequential. Every command is awaited before the next
//! step is considered.

pub mod runner;
pub mod types;

use std::io;
use std::path::Path;

use tracing::{debug, error, info, trace};

use crate::config::Config;
use crate::consts::DEFAULT_TARGET;
use crate::graph::{Step, TargetGraph};
use crate::paths::PathResolver;
use crate::plan::{BuildPlan, PlanStep};
use crate::rules::RuleSet;

pub use runner::{CommandRunner, CommandStatus, Invocation, ShellRunner};
pub use types::{BuildError, BuildReport, SmokeTestResult, TargetState};

/// Drives builds for one configuration and rule set.
pub struct Orchestrator<'a, R> {
  config: &'a Config,
  rules: &'a RuleSet,
  paths: PathResolver<'a>,
  runner: R,
}

impl<'a, R: CommandRunner> Orchestrator<'a, R> {
  pub fn new(config: &'a Config, rules: &'a RuleSet, runner: R) -> Self {
    Self {
      config,
      rules,
      paths: PathResolver::new(config),
      runner,
    }
  }

  pub fn runner(&self) -> &R {
    &self.runner
  }

  /// Compute the plan for `request` (default `all`) without running anything.
  ///
  /// When the request is the aggregate target, each smoke test is planned
  /// too and listed under [`BuildPlan::smoke_tests`].
  ///
  /// # Errors
  ///
  /// Returns [`BuildError::NoMatch`], [`BuildError::Cycle`] or
  /// [`BuildError::Template`] from expansion, and [`BuildError::Io`] when
  /// timestamps cannot be read. Errors planning a smoke test are wrapped in
  /// [`BuildError::SmokeTestFailed`].
  pub fn plan(&self, request: Option<&str>) -> Result<BuildPlan, BuildError> {
    let mut plan = self.plan_request(request.unwrap_or(DEFAULT_TARGET))?;
    if plan.is_aggregate() {
      let tests = self
        .config
        .smoke_targets()
        .map_err(BuildError::io(&self.config.root))?;
      for test in tests {
        let nested = self
          .smoke_test_plan(&test)
          .map_err(|e| BuildError::SmokeTestFailed {
            test: test.clone(),
            source: Box::new(e),
          })?;
        plan.smoke_tests.push(nested);
      }
    }
    Ok(plan)
  }

  fn plan_request(&self, request: &str) -> Result<BuildPlan, BuildError> {
    let target = TargetGraph::request_target(request, self.rules, &self.paths);
    let graph = TargetGraph::expand(target, self.rules, &self.paths, self.config)?;
    BuildPlan::from_graph(request, &graph, &self.config.root)
  }

  /// Plan one smoke test. A smoke test may not be the aggregate itself.
  fn smoke_test_plan(&self, test: &str) -> Result<BuildPlan, BuildError> {
    let plan = self.plan_request(test)?;
    if plan.is_aggregate() {
      return Err(BuildError::Cycle {
        target: test.to_string(),
        chain: vec![DEFAULT_TARGET.to_string(), test.to_string()],
      });
    }
    Ok(plan)
  }

  /// Bring `request` (default `all`) up to date.
  ///
  /// # Errors
  ///
  /// Everything [`plan`](Self::plan) returns, plus [`BuildError::BuildFailure`]
  /// for the first failing command and [`BuildError::SmokeTestFailed`] when
  /// the aggregate target stops on a failing test.
  pub async fn build(&self, request: Option<&str>) -> Result<BuildReport, BuildError> {
    let plan = self.plan_request(request.unwrap_or(DEFAULT_TARGET))?;
    info!(request = %plan.request, steps = plan.steps.len(), "starting build");

    let mut report = BuildReport::default();
    self.execute(&plan, &mut report).await?;

    if report.built() == 0 && plan.is_up_to_date() {
      info!(request = %plan.request, "nothing to be done");
    }
    Ok(report)
  }

  async fn execute(&self, plan: &BuildPlan, report: &mut BuildReport) -> Result<(), BuildError> {
    for step in &plan.steps {
      // Matching and dependency resolution already happened while planning.
      let mut state = TargetState::DependenciesPending;

      if !step.needs_build() {
        advance(&mut state, TargetState::Fresh, step);
        advance(&mut state, TargetState::Skipped, step);
        debug!(target = %step.label, "up to date");
        report.outcomes.push((step.target.clone(), state));
        continue;
      }

      advance(&mut state, TargetState::Stale, step);
      advance(&mut state, TargetState::Building, step);
      info!(target = %step.label, rule = %step.recipe.rule, reason = %step.staleness, "building");

      let result = self.run_step(step, report).await;
      let next = if result.is_ok() {
        TargetState::Built
      } else {
        TargetState::Failed
      };
      advance(&mut state, next, step);
      report.outcomes.push((step.target.clone(), state));

      if let Err(e) = result {
        error!(target = %step.label, error = %e, "build failed");
        return Err(e);
      }
    }
    Ok(())
  }

  async fn run_step(&self, step: &PlanStep, report: &mut BuildReport) -> Result<(), BuildError> {
    match &step.recipe.step {
      Step::Command(command) => self.run_command(step, command).await,
      Step::RemoveBuildTree => remove_build_tree(&self.paths.build_root()).await,
      Step::PrintHelp => {
        report.help_text = Some(self.rules.help_text(self.config));
        Ok(())
      }
      Step::Aggregate => self.run_smoke_tests(report).await,
      Step::Nothing => Ok(()),
    }
  }

  async fn run_command(&self, step: &PlanStep, command: &str) -> Result<(), BuildError> {
    let output_dir = self.paths.output_dir();
    tokio::fs::create_dir_all(output_dir)
      .await
      .map_err(BuildError::io(output_dir))?;
    if let Some(parent) = step.target.path().and_then(Path::parent) {
      tokio::fs::create_dir_all(parent).await.map_err(BuildError::io(parent))?;
    }

    let invocation = Invocation {
      target: step.target.clone(),
      command: command.to_string(),
      workdir: step.recipe.workdir.clone(),
    };
    let status = match self.runner.run(&invocation).await {
      Ok(status) => status,
      Err(source) => {
        return Err(BuildError::Spawn {
          target: step.label.clone(),
          command: invocation.command,
          source,
        });
      }
    };

    if !status.success() {
      return Err(BuildError::BuildFailure {
        target: step.label.clone(),
        command: invocation.command,
        code: status.code,
      });
    }
    Ok(())
  }

  /// Build each smoke-test target as its own independent build, in order.
  async fn run_smoke_tests(&self, report: &mut BuildReport) -> Result<(), BuildError> {
    let tests = self
      .config
      .smoke_targets()
      .map_err(BuildError::io(&self.config.root))?;
    info!(count = tests.len(), "running smoke tests");

    for test in tests {
      let mut nested = BuildReport::default();
      // Planned only now so earlier tests are already on disk.
      let result = match self.smoke_test_plan(&test) {
        Ok(plan) => Box::pin(self.execute(&plan, &mut nested)).await,
        Err(e) => Err(e),
      };

      report.absorb(nested);
      report.smoke_tests.push(SmokeTestResult {
        test: test.clone(),
        success: result.is_ok(),
      });

      match result {
        Ok(()) => info!(test = %test, "smoke test passed"),
        Err(e) => {
          error!(test = %test, error = %e, "smoke test failed");
          return Err(BuildError::SmokeTestFailed {
            test,
            source: Box::new(e),
          });
        }
      }
    }
    Ok(())
  }
}

fn advance(state: &mut TargetState, next: TargetState, step: &PlanStep) {
  debug_assert!(state.can_advance_to(next), "illegal transition {state:?} -> {next:?}");
  trace!(target = %step.label, from = ?state, to = ?next, "state");
  *state = next;
}

async fn remove_build_tree(build_root: &Path) -> Result<(), BuildError> {
  match tokio::fs::remove_dir_all(build_root).await {
    Ok(()) => {
      info!(path = %build_root.display(), "removed build tree");
      Ok(())
    }
    Err(e) if e.kind() == io::ErrorKind::NotFound => {
      debug!(path = %build_root.display(), "build tree already absent");
      Ok(())
    }
    Err(e) => Err(BuildError::io(build_root)(e)),
  }
}
