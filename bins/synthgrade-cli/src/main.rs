mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "synthgrade-cli")]
#[command(about = "Synthgrade CLI - Inspect submissions, variants, and grading results", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a grading workspace with default variant config
    Init {
        /// Project path
        #[arg(short, long, default_value = ".")]
        path: String,
    },

    /// Show the configured runtime variants
    ListVariants {
        /// Variant config file
        #[arg(short, long, default_value = "config/variants.json")]
        config: String,
    },

    /// Validate a submissions file without running anything
    Check {
        /// Submissions file (JSON lines)
        #[arg(short, long)]
        input: String,
    },

    /// Count solved problems per difficulty tier in a results file
    Report {
        /// Results file (JSON lines)
        #[arg(short, long)]
        results: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { path } => {
            commands::init_project(&path).await?;
        }
        Commands::ListVariants { config } => {
            commands::list_variants(&config).await?;
        }
        Commands::Check { input } => {
            commands::check_input(&input).await?;
        }
        Commands::Report { results } => {
            commands::report_results(&results).await?;
        }
    }

    Ok(())
}
