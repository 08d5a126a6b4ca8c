//! Shared test helpers for CLI integration tests.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Records its arguments, then writes the netlist named in the last word of
/// the `write_blif` script.
const FAKE_YOSYS: &str = r#"#!/bin/sh
echo "yosys $*" >> "$RRMAKE_TOOL_LOG"
out=${4##* }
cp "$5" "$out"
"#;

/// Records its arguments and touches the file given to `--write_rr_graph`.
const FAKE_VPR: &str = r#"#!/bin/sh
echo "vpr $*" >> "$RRMAKE_TOOL_LOG"
while [ $# -gt 0 ]; do
  if [ "$1" = "--write_rr_graph" ]; then
    echo "<rr_graph/>" > "$2"
  fi
  shift
done
"#;

const FAILING_TOOL: &str = r#"#!/bin/sh
echo "fail $*" >> "$RRMAKE_TOOL_LOG"
exit 3
"#;

/// Isolated project root with stand-in tools.
///
/// Each test gets its own temporary directory holding the test-case sources,
/// a `tools/` directory with fake yosys and VPR scripts, and a log of every
/// tool invocation.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    let env = Self {
      temp: TempDir::new().unwrap(),
    };
    env.write_tool("yosys", FAKE_YOSYS);
    env.write_tool("vpr", FAKE_VPR);
    env.write_tool("fail", FAILING_TOOL);
    env
  }

  pub fn root(&self) -> PathBuf {
    dunce::canonicalize(self.temp.path()).unwrap()
  }

  /// Write a file relative to the project root.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  fn write_tool(&self, name: &str, script: &str) {
    let path = self.tool(name);
    self.write_file(&format!("tools/{name}"), script);
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
  }

  pub fn tool(&self, name: &str) -> PathBuf {
    self.temp.path().join("tools").join(name)
  }

  pub fn log_path(&self) -> PathBuf {
    self.temp.path().join("tools.log")
  }

  /// Tool invocations so far, one per line.
  pub fn tool_log(&self) -> Vec<String> {
    std::fs::read_to_string(self.log_path())
      .unwrap_or_default()
      .lines()
      .map(str::to_string)
      .collect()
  }

  pub fn exists(&self, relative_path: &str) -> bool {
    self.temp.path().join(relative_path).exists()
  }

  /// `rrmake -C <root> build` with the standard variables and fake tools.
  pub fn build(&self) -> Command {
    self.subcommand("build")
  }

  pub fn plan(&self) -> Command {
    self.subcommand("plan")
  }

  fn subcommand(&self, name: &str) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("rrmake");
    cmd.env("RRMAKE_TOOL_LOG", self.log_path());
    cmd.env_remove("ALL_TARGETS");
    cmd.env_remove("VPR_ARGS");
    cmd.arg("-C").arg(self.temp.path()).arg(name);
    cmd.args(["ARCH=x", "DEVICE=d", "DEVICE_DIR=/dev", "YOSYS_SCRIPT=synth_ice40"]);
    cmd.arg(assign("YOSYS", &self.tool("yosys")));
    cmd.arg(assign("VPR", &self.tool("vpr")));
    cmd
  }
}

pub fn assign(name: &str, path: &Path) -> String {
  format!("{name}={}", path.display())
}
