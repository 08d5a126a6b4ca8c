//! Test utilities for rrmake-lib.
//!
//! Helpers for building configurations over a temporary project root and for
//! arranging files with controlled modification times.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::Path;
use std::time::{Duration, SystemTime};

use crate::config::Config;

/// A configuration rooted at `root` with the usual test settings
/// (`ARCH=x`, `DEVICE=d`, `DEVICE_DIR=/dev`, `YOSYS_SCRIPT=synth_ice40`).
///
/// `overrides` replace or extend those variables. The process environment is
/// never consulted.
pub fn test_config(root: &Path, overrides: &[(&str, &str)]) -> Config {
  let mut vars: BTreeMap<String, String> = [
    ("ARCH", "x"),
    ("DEVICE", "d"),
    ("DEVICE_DIR", "/dev"),
    ("YOSYS_SCRIPT", "synth_ice40"),
  ]
  .into_iter()
  .map(|(k, v)| (k.to_string(), v.to_string()))
  .collect();

  for (name, value) in overrides {
    vars.insert(name.to_string(), value.to_string());
  }

  Config::from_vars(root, vars).unwrap()
}

/// Create an empty file (and its parent directories), or bump its mtime.
pub fn touch(path: &Path) {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).unwrap();
  }
  fs::write(path, b"").unwrap();
}

/// Set the modification time of an existing file.
pub fn set_mtime(path: &Path, time: SystemTime) {
  File::options().write(true).open(path).unwrap().set_modified(time).unwrap();
}

/// A fixed point in time `secs` seconds after the epoch, for ordering mtimes.
pub fn at(secs: u64) -> SystemTime {
  SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000_000 + secs)
}
