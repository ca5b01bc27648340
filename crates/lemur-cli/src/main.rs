mod cmd;
mod config_path;
mod output;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "chaos-lemur",
    about = "Continuous fault injection: randomly destroy members of a managed fleet",
    version,
    propagate_version = true
)]
struct Cli {
    /// Configuration file (default: nearest chaos-lemur.yaml)
    #[arg(long, global = true, env = "CHAOS_LEMUR_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the control API and destroy members on the configured schedule
    Serve {
        /// Port to listen on (0 = OS-assigned)
        #[arg(long, default_value = "8080", env = "PORT")]
        port: u16,
    },

    /// Run a single destruction pass now and wait for it to finish
    Destroy {
        /// Decide fates but do not destroy anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Inspect and validate configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } | Commands::Destroy { .. } => tracing::Level::INFO,
        Commands::Config { .. } => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = config_path::resolve_config(cli.config.as_deref());

    let result = match cli.command {
        Commands::Serve { port } => cmd::serve::run(&config, port),
        Commands::Destroy { dry_run } => cmd::destroy::run(&config, dry_run, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&config, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
