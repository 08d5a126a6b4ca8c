//! Running rule commands.
//!
//! Command lines are handed to a shell, like make recipes, so redirections
//! and verbatim argument splices behave as written in the rule.

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::config::Config;
use crate::graph::Target;

/// One command to run for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
  pub target: Target,
  pub command: String,
  pub workdir: PathBuf,
}

/// Exit status of a finished command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
  /// Exit code, `None` if the process was terminated by a signal.
  pub code: Option<i32>,
}

impl CommandStatus {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }
}

/// Executes invocations to completion.
pub trait CommandRunner {
  /// Run `invocation` and wait for it to exit.
  ///
  /// An `Err` means the process could not be started at all.
  fn run(&self, invocation: &Invocation) -> impl Future<Output = io::Result<CommandStatus>>;
}

/// Runs command lines through the system shell with inherited stdio.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
  shell: Option<String>,
}

impl ShellRunner {
  pub fn new(shell: Option<String>) -> Self {
    Self { shell }
  }

  pub fn from_config(config: &Config) -> Self {
    Self::new(config.shell.clone())
  }
}

impl CommandRunner for ShellRunner {
  async fn run(&self, invocation: &Invocation) -> io::Result<CommandStatus> {
    info!(cmd = %invocation.command, "executing command");

    let (shell_cmd, shell_args) = get_shell(self.shell.as_deref());
    debug!(shell = %shell_cmd, working_dir = ?invocation.workdir, "spawning process");

    // Debuggers and display modes are interactive, so nothing is captured.
    let status = Command::new(&shell_cmd)
      .args(&shell_args)
      .arg(&invocation.command)
      .current_dir(&invocation.workdir)
      .stdin(Stdio::inherit())
      .stdout(Stdio::inherit())
      .stderr(Stdio::inherit())
      .status()
      .await?;

    debug!(code = ?status.code(), "process exited");
    Ok(CommandStatus { code: status.code() })
  }
}

/// Get the shell command and argument for the current platform.
///
/// `override_shell` comes from `RRMAKE_SHELL`; otherwise `/bin/sh` is used on
/// Unix and `cmd.exe` on Windows. The user's `$SHELL` is ignored so profile
/// scripts cannot change how recipes behave.
fn get_shell(override_shell: Option<&str>) -> (String, Vec<String>) {
  if let Some(shell) = override_shell {
    let args = if shell.contains("powershell") || shell.contains("pwsh") {
      vec!["-NoProfile".to_string(), "-Command".to_string()]
    } else if shell.contains("cmd") {
      vec!["/C".to_string()]
    } else {
      vec!["-c".to_string()]
    };
    return (shell.to_string(), args);
  }

  #[cfg(unix)]
  {
    ("/bin/sh".to_string(), vec!["-c".to_string()])
  }

  #[cfg(windows)]
  {
    ("cmd.exe".to_string(), vec!["/C".to_string()])
  }
}
