//! listing-watch CLI
//!
//! Runs the sweep loop and offers the admin operations on the keyword list
//! and the seen-link files.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use listing_watch::{
    control::{AppendOutcome, ControlState, KeywordFile},
    error::{AppError, Result},
    models::Config,
    pipeline::Watcher,
    storage::{DedupStore, LocalStorage, SeenStore},
};

/// listing-watch - marketplace listing watcher
#[derive(Parser, Debug)]
#[command(
    name = "listing-watch",
    version,
    about = "Watches marketplaces for new listings matching keywords"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "storage/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sweep all sites on the configured interval until Ctrl-C
    Run {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },

    /// Validate the configuration file
    Validate,

    /// Manage the keyword list
    Keywords {
        #[command(subcommand)]
        action: KeywordsAction,
    },

    /// Show the seen-link file of a site
    Seen {
        /// Site id, e.g. `bazos`
        site: String,
    },
}

#[derive(Subcommand, Debug)]
enum KeywordsAction {
    /// Print the keyword file to stdout
    Export,

    /// Append one keyword
    Add { keyword: String },

    /// Replace the keyword list with the contents of a file
    Import { file: PathBuf },
}

/// Initialize logging from the verbosity flag and the configured level.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = Config::load(&cli.config);
    let level = loaded
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_logging(cli.verbose, &level);

    let config = match loaded {
        Ok(config) => {
            log::info!("Loaded configuration from {}", cli.config.display());
            config
        }
        Err(e) => {
            log::warn!(
                "Config load failed from {}: {}. Using defaults.",
                cli.config.display(),
                e
            );
            Config::default()
        }
    };

    let control = Arc::new(ControlState::new());

    match cli.command {
        Command::Run { once } => {
            config.validate()?;
            let config = Arc::new(config);
            let watcher = Watcher::from_config(Arc::clone(&config), Arc::clone(&control))?;

            log::info!(
                "Watching {} sites every {}s",
                watcher.sites().len(),
                config.watcher.cycle_interval_secs
            );
            let max_cycles = once.then_some(1);
            let completed = watcher.run_until(shutdown_signal(), max_cycles).await;
            log::info!("Stopped after {} cycles", completed);
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK ({} sites)", config.sites.len());

            let keywords = KeywordFile::new(&config.paths.keywords_file, control);
            log::info!(
                "✓ {} keywords in {}",
                keywords.load().await.len(),
                keywords.path().display()
            );
        }

        Command::Keywords { action } => {
            let keywords = KeywordFile::new(&config.paths.keywords_file, control);
            match action {
                KeywordsAction::Export => print!("{}", keywords.export().await?),
                KeywordsAction::Add { keyword } => match keywords.append(&keyword).await? {
                    AppendOutcome::Added => log::info!("Added '{}'", keyword.trim()),
                    AppendOutcome::AlreadyPresent => {
                        log::warn!("'{}' is already in the list", keyword.trim())
                    }
                },
                KeywordsAction::Import { file } => {
                    let contents = tokio::fs::read_to_string(&file).await?;
                    let count = keywords.replace(&contents).await?;
                    log::info!("Imported {} keywords from {}", count, file.display());
                }
            }
        }

        Command::Seen { site } => {
            let site_config = config
                .site(&site)
                .ok_or_else(|| AppError::config(format!("Unknown site '{site}'")))?;
            let backend: Arc<dyn SeenStore> =
                Arc::new(LocalStorage::new(&config.paths.seen_dir));
            // Opening rewrites a legacy file in the current format
            let store = DedupStore::open(&site_config.id, site_config.seen_file(), backend).await?;
            let links = store.snapshot().await;

            log::info!("Seen file: {}", config.seen_path(site_config).display());
            log::info!("Links: {}", links.len());
            for link in links.iter() {
                println!("{link}");
            }
        }
    }

    Ok(())
}
