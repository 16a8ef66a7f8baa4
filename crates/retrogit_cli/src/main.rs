//! Retrogit CLI - repository vintages and same-day-last-year commit digests.

mod commands;
mod config;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use console::Term;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "retrogit")]
#[command(version)]
#[command(about = "Look back at what you were committing on GitHub")]
#[command(
    long_about = "Retrogit lists every GitHub repository you can access with the date of your \
first commit in it, and shows what you committed on this day in past years. Vintages are \
computed once and stored in a local database."
)]
#[command(after_long_help = r#"EXAMPLES
    List your repositories with their vintages:
        $ retrogit repos

    Wait up to a minute for GitHub to finish computing statistics:
        $ retrogit repos --wait 60

    Show what you committed a year ago today:
        $ retrogit digest

    Generate shell completions:
        $ retrogit completions bash > ~/.local/share/bash-completion/completions/retrogit

CONFIGURATION
    Retrogit reads configuration from:
      1. ~/.config/retrogit/config.toml (or $XDG_CONFIG_HOME/retrogit/config.toml)
      2. ./retrogit.toml
      3. Environment variables (RETROGIT_* prefix, e.g., RETROGIT_GITHUB_TOKEN)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    RETROGIT_DATABASE_URL     Database connection string (default: ~/.local/state/retrogit/retrogit.db)
    RETROGIT_GITHUB_TOKEN     GitHub personal access token
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List accessible repositories with the date of your first commit in each
    Repos {
        /// Wait up to this many seconds for deferred vintage computations
        /// (default: one retry cycle)
        #[arg(short, long, value_name = "SECS")]
        wait: Option<u64>,

        /// Replace names, URLs and avatars with placeholders
        #[arg(long)]
        redact: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show the commits you made on this day in a past year
    Digest {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
    /// Generate man page(s)
    Man {
        /// Output directory for man pages (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Rollback the last migration
    Down,
    /// Show migration status
    Status,
    /// Fresh install - drop all tables and reapply migrations
    Fresh,
}

fn init_tracing() {
    // Interactive runs print plain output unless RUST_LOG asks for logs.
    let from_env = EnvFilter::try_from_default_env().ok();
    if Term::stdout().is_term() && from_env.is_none() {
        return;
    }
    let env_filter =
        from_env.unwrap_or_else(|| EnvFilter::new("retrogit=info,retrogit_cli=info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Create the parent directory of a file-backed SQLite database.
fn ensure_sqlite_dir(database_url: &str) -> std::io::Result<()> {
    let Some(db_path) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    // Strip query parameters (e.g., ?mode=rwc) before path operations
    let db_path = db_path.split('?').next().unwrap_or(db_path);
    let db_path = std::path::Path::new(db_path);

    if db_path.is_relative() && !db_path.as_os_str().is_empty() {
        tracing::warn!(
            "Database path '{}' is relative - behavior depends on current directory.",
            db_path.display()
        );
    }

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

    // Load configuration (config file -> env vars -> defaults)
    let config = config::Config::load();

    let cli = Cli::parse();

    // Handle commands that don't require database access first
    match &cli.command {
        Commands::Completions { shell } => {
            commands::meta::handle_completions(*shell)?;
            return Ok(());
        }
        Commands::Man { output } => {
            commands::meta::handle_man(output.clone())?;
            return Ok(());
        }
        _ => {}
    }

    let database_url = config
        .database_url()
        .ok_or("Could not determine a database location; set RETROGIT_DATABASE_URL")?;
    ensure_sqlite_dir(&database_url)?;

    match cli.command {
        Commands::Migrate { action } => {
            let db = retrogit::db::connect(&database_url).await?;
            commands::migrate::handle_migrate(action, &db).await?;
        }
        Commands::Repos { wait, redact, json } => {
            let db = Arc::new(retrogit::connect_and_migrate(&database_url).await?);
            let args = commands::repos::ReposArgs { wait, redact, json };
            commands::repos::handle_repos(args, &config, &db).await?;
        }
        Commands::Digest { json } => {
            let db = Arc::new(retrogit::connect_and_migrate(&database_url).await?);
            commands::digest::handle_digest(json, &config, &db).await?;
        }
        Commands::Completions { .. } | Commands::Man { .. } => {}
    }

    Ok(())
}
