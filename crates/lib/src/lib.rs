//! rrmake-lib: core of the rrmake route-graph test driver
//!
//! This crate decides which external tool to run, with which arguments, in
//! which directory and in what order:
//! - `Config`: immutable settings read once from variables
//! - `RuleSet`: suffix pattern rules, built in or loaded per architecture
//! - `TargetGraph`: the dependency DAG expanded for one requested target
//! - `StalenessChecker`: timestamp comparison over that DAG
//! - `Orchestrator`: runs the resulting `BuildPlan` through a `CommandRunner`

pub mod config;
pub mod consts;
pub mod execute;
pub mod graph;
pub mod paths;
pub mod plan;
pub mod rules;
pub mod stale;
pub mod template;
pub mod util;
