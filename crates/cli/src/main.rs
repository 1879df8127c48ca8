mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use nodebuild_lib::{StoreConfig, WorkerConfig};

/// nodebuild - Fetch, build, and publish Node.js sources for lifecycle events
#[derive(Parser)]
#[command(name = "nodebuild")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Parent directory for build workspaces (default: system temp dir)
  #[arg(long, global = true, value_name = "DIR")]
  scratch_dir: Option<PathBuf>,

  /// Serve objects from a local directory instead of S3
  #[arg(long, global = true, value_name = "DIR")]
  local_store: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Handle one lifecycle event and report its outcome to the callback URL
  Invoke {
    /// Path to the event JSON (default: stdin)
    event: Option<String>,
  },

  /// Check an event's resource properties without building
  Validate {
    /// Path to the event JSON (default: stdin)
    event: Option<String>,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Invoke { event } => {
      let config = worker_config(cli.scratch_dir, cli.local_store);
      cmd::cmd_invoke(event.as_deref(), config)
    }
    Commands::Validate { event } => cmd::cmd_validate(event.as_deref()),
  }
}

/// Environment configuration with command-line overrides applied on top.
fn worker_config(scratch_dir: Option<PathBuf>, local_store: Option<PathBuf>) -> WorkerConfig {
  let mut config = WorkerConfig::from_env();
  if let Some(dir) = scratch_dir {
    config.scratch_dir = dir;
  }
  if let Some(root) = local_store {
    config.store = StoreConfig::Local(root);
  }
  config
}
