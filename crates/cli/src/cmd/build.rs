//! Implementation of the `rrmake build` command.
//!
//! Builds each requested target in order (default `all`), stopping at the
//! first failure.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info};

use rrmake_lib::consts::DEFAULT_TARGET;
use rrmake_lib::execute::{BuildReport, Orchestrator, ShellRunner};

use super::{Request, load};
use crate::output::{format_duration, print_error, print_info, print_stat, print_success};

pub fn cmd_build(root: &Path, args: &[String]) -> Result<()> {
  let start = Instant::now();
  let request = Request::parse(args);

  // Configuration is checked before anything is launched.
  let (config, rules) = load(root, &request)?;
  let orchestrator = Orchestrator::new(&config, &rules, ShellRunner::from_config(&config));

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;

  for target in request.targets() {
    let name = target.unwrap_or(DEFAULT_TARGET);
    let target_start = Instant::now();
    debug!(target = name, "building request");
    let report = rt.block_on(orchestrator.build(target))?;
    info!(
      target = name,
      built = report.built(),
      skipped = report.skipped(),
      elapsed = ?target_start.elapsed(),
      "request finished"
    );
    print_report(name, &report);
  }

  print_stat("Duration", &format_duration(start.elapsed()));
  Ok(())
}

fn print_report(target: &str, report: &BuildReport) {
  if let Some(help) = &report.help_text {
    print!("{help}");
    return;
  }

  for test in &report.smoke_tests {
    if test.success {
      print_success(&format!("smoke test {}", test.test));
    } else {
      print_error(&format!("smoke test {} failed", test.test));
    }
  }

  if report.built() == 0 && report.smoke_tests.is_empty() {
    print_info(&format!("Nothing to be done for '{target}'"));
  } else {
    print_success(&format!("Built '{target}'"));
    print_stat("Targets built", &report.built().to_string());
    print_stat("Up to date", &report.skipped().to_string());
  }
}
