//! Build configuration.
//!
//! All settings come from a flat variable map: the process environment merged
//! with make-style `NAME=value` assignments given on the command line (the
//! assignments win). The map is read exactly once, validated eagerly and
//! frozen into a [`Config`] that every other component borrows.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::consts::{DEFAULT_ROUTE_CHAN_WIDTH, RULES_DIR};

pub const ARCH: &str = "ARCH";
pub const DEVICE: &str = "DEVICE";
pub const DEVICE_DIR: &str = "DEVICE_DIR";
pub const DEVICE_TYPE: &str = "DEVICE_TYPE";
pub const YOSYS_SCRIPT: &str = "YOSYS_SCRIPT";
pub const YOSYS: &str = "YOSYS";
pub const VPR: &str = "VPR";
pub const VPR_ARGS: &str = "VPR_ARGS";
pub const ROUTE_CHAN_WIDTH: &str = "ROUTE_CHAN_WIDTH";
pub const GDB: &str = "GDB";
pub const RR_PATCH: &str = "RR_PATCH";
pub const XMLSORT: &str = "XMLSORT";
pub const MAKE: &str = "MAKE";
pub const RULES_DIR_VAR: &str = "RULES_DIR";
pub const ALL_TARGETS: &str = "ALL_TARGETS";
pub const SHELL: &str = "RRMAKE_SHELL";

/// Variables that must be set (and non-empty) before any work starts.
pub const REQUIRED: [&str; 4] = [ARCH, DEVICE_DIR, DEVICE, YOSYS_SCRIPT];

/// Errors detected while building a [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
  /// One or more required variables are unset or empty.
  #[error("missing required variable(s): {}", .0.join(", "))]
  Missing(Vec<&'static str>),

  /// A variable is set to a value that cannot be used.
  #[error("invalid value for {name}: '{value}' ({reason})")]
  Invalid {
    name: &'static str,
    value: String,
    reason: String,
  },

  /// The project root could not be resolved.
  #[error("project root {} is not accessible: {source}", .path.display())]
  Root {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Immutable build configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
  /// Canonical project root. Sources are looked up here and `build/` is created here.
  pub root: PathBuf,
  pub arch: String,
  pub device: String,
  /// Directory holding the device-type directories, absolute.
  pub device_dir: PathBuf,
  pub device_type: String,
  pub yosys_script: String,
  pub yosys: String,
  pub vpr: String,
  pub vpr_args: String,
  pub route_chan_width: u32,
  pub gdb: String,
  pub rr_patch: String,
  pub xmlsort: String,
  pub make: String,
  pub rules_dir: PathBuf,
  /// Explicit smoke-test list for `all`; `None` means wildcard expansion of the sources.
  pub all_targets: Option<Vec<String>>,
  /// Shell override for running command lines.
  pub shell: Option<String>,
  /// Every variable seen at construction, for rule templates that reference
  /// settings this struct does not model.
  vars: BTreeMap<String, String>,
}

impl Config {
  /// Build a configuration from the process environment plus `assignments`.
  ///
  /// This is the only place the environment is read.
  pub fn from_env(root: &Path, assignments: &[(String, String)]) -> Result<Self, ConfigError> {
    let mut vars: BTreeMap<String, String> = std::env::vars().collect();
    for (name, value) in assignments {
      vars.insert(name.clone(), value.clone());
    }
    Self::from_vars(root, vars)
  }

  /// Build a configuration from an explicit variable map.
  ///
  /// # Errors
  ///
  /// Returns [`ConfigError::Missing`] listing every unset required variable,
  /// [`ConfigError::Invalid`] for unusable values and [`ConfigError::Root`]
  /// when `root` cannot be canonicalized.
  pub fn from_vars(root: &Path, vars: BTreeMap<String, String>) -> Result<Self, ConfigError> {
    let lookup = |name: &str| vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());

    let missing: Vec<&'static str> = REQUIRED.into_iter().filter(|&name| lookup(name).is_none()).collect();
    if !missing.is_empty() {
      return Err(ConfigError::Missing(missing));
    }

    let root = dunce::canonicalize(root).map_err(|source| ConfigError::Root {
      path: root.to_path_buf(),
      source,
    })?;

    let route_chan_width = match lookup(ROUTE_CHAN_WIDTH) {
      Some(value) => value.parse::<u32>().map_err(|e| ConfigError::Invalid {
        name: ROUTE_CHAN_WIDTH,
        value: value.to_string(),
        reason: e.to_string(),
      })?,
      None => DEFAULT_ROUTE_CHAN_WIDTH,
    };

    let owned = |name: &str, default: &str| lookup(name).unwrap_or(default).to_string();

    let arch = owned(ARCH, "");
    let device = owned(DEVICE, "");
    let device_dir = root.join(owned(DEVICE_DIR, ""));
    let device_type = owned(DEVICE_TYPE, &device);
    let rules_dir = lookup(RULES_DIR_VAR)
      .map(|dir| root.join(dir))
      .unwrap_or_else(|| root.join(RULES_DIR));
    let all_targets = lookup(ALL_TARGETS).map(|list| list.split_whitespace().map(str::to_string).collect());

    Ok(Self {
      arch,
      device,
      device_dir,
      device_type,
      yosys_script: owned(YOSYS_SCRIPT, ""),
      yosys: owned(YOSYS, "yosys"),
      vpr: owned(VPR, "vpr"),
      // VPR_ARGS is spliced verbatim, keep inner spacing as given.
      vpr_args: vars.get(VPR_ARGS).map(|v| v.trim().to_string()).unwrap_or_default(),
      route_chan_width,
      gdb: owned(GDB, "gdb"),
      rr_patch: owned(RR_PATCH, "rr_graph_patch"),
      xmlsort: owned(XMLSORT, "xmlsort"),
      make: owned(MAKE, "make"),
      rules_dir,
      all_targets,
      shell: lookup(SHELL).map(str::to_string),
      root,
      vars,
    })
  }

  /// Effective value of a configuration variable, defaults applied.
  ///
  /// Names this struct models resolve to their validated value; anything else
  /// falls back to the raw variable map.
  pub fn var(&self, name: &str) -> Option<String> {
    let value = match name {
      ARCH => self.arch.clone(),
      DEVICE => self.device.clone(),
      DEVICE_DIR => self.device_dir.display().to_string(),
      DEVICE_TYPE => self.device_type.clone(),
      YOSYS_SCRIPT => self.yosys_script.clone(),
      YOSYS => self.yosys.clone(),
      VPR => self.vpr.clone(),
      VPR_ARGS => self.vpr_args.clone(),
      ROUTE_CHAN_WIDTH => self.route_chan_width.to_string(),
      GDB => self.gdb.clone(),
      RR_PATCH => self.rr_patch.clone(),
      XMLSORT => self.xmlsort.clone(),
      MAKE => self.make.clone(),
      RULES_DIR_VAR => self.rules_dir.display().to_string(),
      _ => return self.vars.get(name).cloned(),
    };
    Some(value)
  }

  /// Path of the rule extension file for the configured architecture.
  pub fn rules_file(&self) -> PathBuf {
    self.rules_dir.join(format!("{}.json", self.arch))
  }

  /// Targets built, in order, by the aggregate `all` target.
  ///
  /// Without an explicit `ALL_TARGETS` list this expands `*.v` and `*.eblif`
  /// in the project root into one `<stem>.rr_graph.xml` per distinct stem.
  pub fn smoke_targets(&self) -> io::Result<Vec<String>> {
    if let Some(targets) = &self.all_targets {
      return Ok(targets.clone());
    }

    let mut stems = Vec::new();
    for entry in std::fs::read_dir(&self.root)? {
      let entry = entry?;
      if !entry.file_type()?.is_file() {
        continue;
      }
      let name = entry.file_name();
      let Some(name) = name.to_str() else {
        continue;
      };
      if let Some(stem) = name.strip_suffix(".v").or_else(|| name.strip_suffix(".eblif"))
        && !stem.is_empty()
      {
        stems.push(stem.to_string());
      }
    }
    stems.sort();
    stems.dedup();

    Ok(stems.into_iter().map(|stem| format!("{stem}.rr_graph.xml")).collect())
  }
}

/// Split a make-style `NAME=value` command-line assignment.
///
/// Returns `None` for anything that is not an assignment (such as a target name).
pub fn parse_assignment(arg: &str) -> Option<(String, String)> {
  let (name, value) = arg.split_once('=')?;
  let valid = !name.is_empty()
    && !name.starts_with(|c: char| c.is_ascii_digit())
    && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
  valid.then(|| (name.to_string(), value.to_string()))
}
