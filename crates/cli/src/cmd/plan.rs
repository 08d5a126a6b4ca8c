//! Implementation of the `rrmake plan` command.
//!
//! Expands each requested target and shows the steps a build would run,
//! without running any of them.

use std::path::Path;

use anyhow::Result;

use rrmake_lib::execute::{Orchestrator, ShellRunner};
use rrmake_lib::graph::Step;
use rrmake_lib::plan::BuildPlan;

use super::{Request, load};
use crate::output::{OutputFormat, print_command, print_info, print_json, print_step};

pub fn cmd_plan(root: &Path, args: &[String], output: OutputFormat) -> Result<()> {
  let request = Request::parse(args);
  let (config, rules) = load(root, &request)?;
  let orchestrator = Orchestrator::new(&config, &rules, ShellRunner::from_config(&config));

  let plans = request
    .targets()
    .into_iter()
    .map(|target| orchestrator.plan(target))
    .collect::<Result<Vec<BuildPlan>, _>>()?;

  if output.is_json() {
    print_json(&plans)?;
    return Ok(());
  }

  for plan in &plans {
    print_plan(plan);
    if plan.is_up_to_date() {
      print_info("Everything is up to date");
    }
  }

  Ok(())
}

fn print_plan(plan: &BuildPlan) {
  print_info(&format!("Plan for '{}'", plan.request));
  for input in &plan.absent_inputs {
    print_step(false, input, "absent input");
  }
  for step in &plan.steps {
    let note = format!("{}: {}", step.recipe.rule, step.staleness);
    print_step(step.needs_build(), &step.label, &note);
    if step.needs_build()
      && let Step::Command(command) = &step.recipe.step
    {
      print_command(command);
    }
  }
  for test in &plan.smoke_tests {
    print_plan(test);
  }
}
