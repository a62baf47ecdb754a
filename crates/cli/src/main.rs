mod cmd;
mod output;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use launchpack_lib::config::LaunchpackConfig;
use launchpack_lib::pipeline::{EXIT_FAILURE, PipelineError};
use launchpack_lib::platform::ImagePlatform;

use cmd::{cmd_build, cmd_fetch, cmd_info, cmd_plan, cmd_variants};
use output::{OutputFormat, print_error};

/// Build and package launcher images for a chosen vault variant
#[derive(Parser)]
#[command(name = "launchpack")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Root of the launcher project
  #[arg(long, global = true, default_value = ".", env = "LAUNCHPACK_PROJECT_ROOT")]
  project_root: PathBuf,

  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Fetch the agent, package, build and export images for the given launchers
  Build {
    #[command(flatten)]
    selection: Selection,

    #[command(flatten)]
    target: Target,

    /// Maximum number of tasks run at once
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    parallelism: u16,
  },

  /// Show what a build would do without running anything
  Plan {
    #[command(flatten)]
    selection: Selection,

    #[command(flatten)]
    target: Target,
  },

  /// Place the agent artifact in every selected module without building
  Fetch {
    #[command(flatten)]
    selection: Selection,
  },

  /// List the supported variants and the modules they select
  Variants {
    /// Show module paths for this launcher
    launcher: Option<String>,
  },

  /// Show the image platform, configured tools and config location
  Info,
}

/// Which launchers and which variant to work on.
#[derive(Args)]
pub struct Selection {
  /// Launcher names, e.g. `control-plane`
  #[arg(required = true, num_args = 1..)]
  pub launchers: Vec<String>,

  /// Vault backend variant: hashicorp, azure or both
  #[arg(long, env = "LAUNCHPACK_VAULT_TYPE", default_value = "hashicorp")]
  pub vault_type: String,
}

/// Image platform and cluster options.
#[derive(Args)]
pub struct Target {
  /// Target image platform (os/arch[/variant]); defaults to the host
  #[arg(long, env = "LAUNCHPACK_PLATFORM", value_parser = parse_platform)]
  pub platform: Option<String>,

  /// Load exported images into the local kind cluster
  #[arg(long, env = "LAUNCHPACK_LOAD_TO_KIND", value_parser = clap::builder::BoolishValueParser::new())]
  pub load_to_kind: bool,

  /// Cluster to load images into
  #[arg(long, env = "LAUNCHPACK_CLUSTER_NAME")]
  pub cluster_name: Option<String>,
}

fn parse_platform(s: &str) -> Result<String, String> {
  s.parse::<ImagePlatform>().map(|p| p.to_string()).map_err(|e| e.to_string())
}

/// Resolved global options shared by every command.
pub struct Session {
  pub root: PathBuf,
  pub config: LaunchpackConfig,
  pub output: OutputFormat,
}

impl Session {
  fn open(project_root: &Path, output: OutputFormat) -> Result<Self> {
    let root = dunce::canonicalize(project_root)
      .with_context(|| format!("Project root not found: {}", project_root.display()))?;
    let config = LaunchpackConfig::load(&root).map_err(PipelineError::from)?;
    Ok(Self { root, config, output })
  }
}

fn main() {
  let cli = Cli::parse();

  let filter = if cli.verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  if let Err(err) = run(cli) {
    print_error(&format!("{:#}", err));
    std::process::exit(exit_code(&err));
  }
}

fn run(cli: Cli) -> Result<()> {
  match cli.command {
    Commands::Build {
      selection,
      target,
      parallelism,
    } => {
      let session = Session::open(&cli.project_root, cli.output)?;
      cmd_build(&session, selection, target, usize::from(parallelism))
    }
    Commands::Plan { selection, target } => {
      let session = Session::open(&cli.project_root, cli.output)?;
      cmd_plan(&session, selection, target)
    }
    Commands::Fetch { selection } => {
      let session = Session::open(&cli.project_root, cli.output)?;
      cmd_fetch(&session, selection)
    }
    Commands::Variants { launcher } => {
      let session = Session::open(&cli.project_root, cli.output)?;
      cmd_variants(&session, launcher.as_deref())
    }
    Commands::Info => {
      let session = Session::open(&cli.project_root, cli.output)?;
      cmd_info(&session)
    }
  }
}

fn exit_code(err: &anyhow::Error) -> i32 {
  err
    .downcast_ref::<PipelineError>()
    .map(PipelineError::exit_code)
    .unwrap_or(EXIT_FAILURE)
}
