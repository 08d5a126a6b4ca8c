mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rrmake_lib::consts::APP_NAME;
use rrmake_lib::execute::BuildError;

use crate::cmd::{cmd_build, cmd_plan};
use crate::output::{OutputFormat, print_error};

/// rrmake - route-graph regression test driver
#[derive(Parser)]
#[command(name = APP_NAME)]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Project root holding the test cases (default: current directory)
  #[arg(short = 'C', long = "directory", global = true)]
  directory: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build targets, rebuilding only what is out of date
  Build {
    /// Targets (default: all) and NAME=VALUE variable assignments
    args: Vec<String>,
  },

  /// Show what would be built without running anything
  Plan {
    /// Targets (default: all) and NAME=VALUE variable assignments
    args: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "info" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let root = cli.directory.unwrap_or_else(|| PathBuf::from("."));

  let result = match cli.command {
    Commands::Build { args } => cmd_build(&root, &args),
    Commands::Plan { args, output } => cmd_plan(&root, &args, output),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => match err.downcast_ref::<BuildError>() {
      // Build errors already carry their cause in the message.
      Some(build) => {
        print_error(&build.to_string());
        ExitCode::from(u8::try_from(build.exit_code()).unwrap_or(1))
      }
      None => {
        print_error(&format!("{err:#}"));
        ExitCode::FAILURE
      }
    },
  }
}
