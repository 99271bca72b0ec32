use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bitsync::config::LoggingConfig;
use bitsync::{Config, ProgressSink, RawReconciler, SourceSync};

#[derive(Parser)]
#[command(name = "bitsync")]
#[command(about = "Fetch rules, database scripts and pages from a Bitbucket repository")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and print everything synced from a revision
    Sync {
        /// Repository as owner/name or https://bitbucket.org/owner/name
        repository: String,

        /// Commit the content is read from
        #[arg(short, long)]
        revision: String,

        /// Branch the revision belongs to
        #[arg(short, long, default_value = "master")]
        branch: String,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// List the files that would be synced from a revision
    Tree {
        /// Repository as owner/name or https://bitbucket.org/owner/name
        repository: String,

        /// Commit the tree is read from
        #[arg(short, long)]
        revision: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        config_command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Config { config_command } => {
            init_logging(cli.verbose, &LoggingConfig::default())?;
            cmd_config(config_command, cli.config)
        }
        Commands::Sync {
            repository,
            revision,
            branch,
            pretty,
        } => {
            let config = load_config(cli.config)?;
            init_logging(cli.verbose, &config.logging)?;
            cmd_sync(&config, &repository, &branch, &revision, pretty).await
        }
        Commands::Tree {
            repository,
            revision,
        } => {
            let config = load_config(cli.config)?;
            init_logging(cli.verbose, &config.logging)?;
            cmd_tree(&config, &repository, &revision).await
        }
    }
}

/// Initialize logging from the config; `RUST_LOG` wins, `--verbose` forces debug
fn init_logging(verbose: bool, logging: &LoggingConfig) -> Result<()> {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let layer = fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter);
    match logging.format.as_str() {
        "pretty" => registry.with(layer.pretty()).init(),
        "full" => registry.with(layer).init(),
        _ => registry.with(layer.compact()).init(),
    }

    Ok(())
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<std::path::PathBuf>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(&path),
        None => Config::load_or_default(),
    }
}

/// Forwards remote diagnostics to the log
fn report_to_log(entry: &Value) {
    warn!("Bitbucket report: {}", entry);
}

async fn cmd_sync(
    config: &Config,
    repository: &str,
    branch: &str,
    revision: &str,
    pretty: bool,
) -> Result<()> {
    let sync = SourceSync::from_config(config, RawReconciler)?;
    let progress: &dyn ProgressSink = &report_to_log;

    let output = sync
        .sync(repository, branch, revision, Some(progress))
        .await
        .with_context(|| format!("Failed to sync {} at {}", repository, revision))?;

    let json = if pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{}", json);

    Ok(())
}

async fn cmd_tree(config: &Config, repository: &str, revision: &str) -> Result<()> {
    let sync = SourceSync::from_config(config, RawReconciler)?;
    let progress: &dyn ProgressSink = &report_to_log;

    let repo = sync
        .check_repository(repository)
        .await
        .with_context(|| format!("Cannot access repository {}", repository))?;
    let files = sync
        .fetch_tree(&repo, revision, Some(progress))
        .await
        .with_context(|| format!("Failed to list {} at {}", repo, revision))?;

    info!("{} files synced from {} at {}", files.len(), repo, revision);
    for file in files {
        println!("{}\t{}", file.sha, file.path);
    }

    Ok(())
}

fn cmd_config(command: ConfigCommands, config_path: Option<std::path::PathBuf>) -> Result<()> {
    match command {
        ConfigCommands::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_config_path()?,
            };

            if path.exists() && !force {
                println!("Configuration already exists at {:?} (use --force to overwrite)", path);
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }
            Config::default().save(&path)?;
            println!("Configuration written to {:?}", path);
            Ok(())
        }
        ConfigCommands::Show => {
            let mut config = load_config(config_path)?;
            if config.bitbucket.password.is_some() {
                config.bitbucket.password = Some("********".to_string());
            }
            print!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
    }
}
