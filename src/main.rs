use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use file_compressor::app::{self, state::AppState, RunEvent};
use file_compressor::config::{settings, CompressorConfig};
use file_compressor::core::clean;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(
    name = "file-compressor",
    about = "Recursively compress save files into per-file zip archives",
    version
)]
struct Cli {
    /// Use this config file instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compress every eligible file under a directory
    Compress {
        directory: PathBuf,

        /// Delete each original after its archive is written
        #[arg(long)]
        delete: bool,

        /// Keep the original extension in the archive name (a.sav -> a.sav.zip)
        #[arg(long)]
        keep_extension: bool,

        /// Eligible extension; repeat to replace the configured allow-list
        #[arg(long = "ext")]
        extensions: Vec<String>,

        /// Glob pattern to skip; repeatable
        #[arg(long = "exclude")]
        exclude_patterns: Vec<String>,

        /// Compress files in parallel
        #[arg(long)]
        parallel: bool,

        /// Count all eligible files before starting
        #[arg(long)]
        prescan: bool,

        /// Write all eligible files into this single archive instead
        #[arg(long, value_name = "NAME")]
        batch: Option<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove archives and run logs under a directory
    Clean { directory: PathBuf },
    /// Fill a directory with generated save files for testing
    Generate {
        directory: PathBuf,
        #[arg(long, default_value_t = 10)]
        count: usize,
        #[arg(long, default_value = ".sav")]
        ext: String,
        #[arg(long, default_value_t = 100_000)]
        ints: usize,
    },
    /// Show, export or import the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    Show,
    Export { path: PathBuf },
    Import { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();
    let mut config = settings::load_config(config_path)?;

    match cli.command {
        Command::Compress {
            directory,
            delete,
            keep_extension,
            extensions,
            exclude_patterns,
            parallel,
            prescan,
            batch,
            json,
        } => {
            let persisted = config.clone();
            if !extensions.is_empty() {
                config.extensions = extensions.into_iter().collect();
            }
            config.exclude_patterns.extend(exclude_patterns);
            config.parallel |= parallel;
            config.prescan |= prescan;
            let delete = delete || config.delete_originals;
            let keep_extension = keep_extension || config.preserve_extension;

            let directory = directory
                .canonicalize()
                .with_context(|| format!("Cannot open directory {:?}", directory))?;
            compress(config, directory.clone(), delete, keep_extension, batch, json).await?;

            // Only the directory is remembered; flag overrides stay per-invocation.
            let remembered = CompressorConfig {
                last_directory: Some(directory),
                ..persisted
            };
            if let Err(e) = settings::save_config(&remembered, config_path) {
                tracing::warn!("Failed to remember last directory: {}", e);
            }
            Ok(())
        }
        Command::Clean { directory } => {
            let stats = clean::clean_artifacts(&directory, &config.log_file_name)?;
            println!(
                "Removed {} archives and {} logs ({} failures).",
                stats.archives_removed, stats.logs_removed, stats.failures
            );
            Ok(())
        }
        Command::Generate {
            directory,
            count,
            ext,
            ints,
        } => {
            let files = clean::generate_fixture(&directory, count, &ext, ints)?;
            println!("Generated {} files in {}.", files.len(), directory.display());
            Ok(())
        }
        Command::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", serde_json::to_string_pretty(&config)?);
                Ok(())
            }
            ConfigAction::Export { path } => settings::export_config(&config, &path),
            ConfigAction::Import { path } => {
                let imported = settings::import_config(&path)?;
                settings::save_config(&imported, config_path)
            }
        },
    }
}

async fn compress(
    config: CompressorConfig,
    directory: PathBuf,
    delete: bool,
    keep_extension: bool,
    batch: Option<String>,
    json: bool,
) -> Result<()> {
    let state = Arc::new(Mutex::new(AppState::new(config)));
    let (sender, mut events) = mpsc::unbounded_channel();

    match batch {
        Some(archive_name) => {
            app::tasks::start_batch_run(directory, delete, archive_name, sender, state.clone())?
        }
        None => app::tasks::start_run(directory, delete, keep_extension, sender, state.clone())?,
    }

    let mut last_percent = None;
    while let Some(event) = events.recv().await {
        match event {
            RunEvent::Progress(progress) => {
                if last_percent != Some(progress.percent) {
                    eprintln!(
                        "[{:>3}%] {}/{} {}",
                        progress.percent,
                        progress.processed,
                        progress.total_eligible,
                        progress.current_file.display()
                    );
                    last_percent = Some(progress.percent);
                }
            }
            RunEvent::Finished(summary) => {
                if json {
                    println!("{}", serde_json::to_string_pretty(&*summary)?);
                } else {
                    println!("{}", summary.message());
                }
                break;
            }
            RunEvent::Failed(reason) => {
                anyhow::bail!("Compression failed: {}", reason);
            }
        }
    }

    Ok(())
}
