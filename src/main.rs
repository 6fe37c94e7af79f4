use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

use drillsmith::cli;

#[derive(Parser)]
#[command(name = "drillsmith")]
#[command(about = "Generate validated practice programming activities", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an activity from a spec file
    Generate {
        /// Path to the activity spec (JSON)
        #[arg(short, long)]
        spec: String,

        /// Path to config file (defaults to ./drillsmith.toml or the user
        /// config directory)
        #[arg(long)]
        config: Option<String>,

        /// Output file path (stdout if omitted)
        #[arg(short, long)]
        out: Option<String>,

        /// Use the canned LLM client and offline judge (python specs only)
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the deterministic slot plan for a spec file
    Plan {
        /// Path to the activity spec (JSON)
        #[arg(short, long)]
        spec: String,
    },

    /// Validate configuration and report which API keys resolve
    ConfigCheck {
        /// Path to config file
        #[arg(long)]
        config: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Cli::parse();

    match args.command {
        Commands::Generate {
            spec,
            config,
            out,
            dry_run,
        } => cli::generate::run(spec, config, out, dry_run).await?,
        Commands::Plan { spec } => cli::plan::run(spec)?,
        Commands::ConfigCheck { config } => cli::config_check::run(config)?,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
        }
    }

    Ok(())
}
