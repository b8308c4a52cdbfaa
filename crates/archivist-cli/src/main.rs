//! Archivist CLI: archive media behind URLs into the configured storage.
//!
//! Storage and tool settings come from the environment or a `.env` file.

use anyhow::Context;
use archivist_cli::{build_chain, init_tracing, ArchiveRecord};
use archivist_core::Config;
use archivist_storage::{create_storage, Storage};
use clap::{Parser, Subcommand};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "archivist", about = "Archive social media videos")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive the media behind one or more URLs
    Archive {
        /// URLs to archive, processed in order
        #[arg(required = true)]
        urls: Vec<String>,
        /// Skip the upload when the media is already stored
        #[arg(long)]
        check_if_exists: bool,
        /// Storage folder for this run (overrides STORAGE_FOLDER)
        #[arg(long)]
        folder: Option<String>,
    },
    /// Show whether a storage key exists and where it can be viewed
    Lookup {
        /// Storage key, e.g. tiktok_7012345.mp4
        key: String,
        /// Storage folder (overrides STORAGE_FOLDER)
        #[arg(long)]
        folder: Option<String>,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize result")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = Config::from_env().context("Invalid configuration")?;

    match cli.command {
        Commands::Archive {
            urls,
            check_if_exists,
            folder,
        } => {
            if let Some(folder) = folder {
                config.set_folder(folder);
            }
            if check_if_exists {
                config.set_check_if_exists(true);
            }
            config.validate()?;

            let storage = create_storage(&config)
                .await
                .context("Failed to create storage backend")?;
            let chain = build_chain(&config, storage);
            tracing::info!(
                urls = urls.len(),
                backend = %config.storage_backend(),
                folder = %config.storage_folder(),
                check_if_exists = config.check_if_exists(),
                "Archiving"
            );

            for url in urls {
                let outcome = chain.archive(&url, config.check_if_exists()).await;
                let (archiver, result) = match outcome {
                    Some((archiver, result)) => (Some(archiver), Some(result)),
                    None => (None, None),
                };
                print_json(&ArchiveRecord {
                    url,
                    archiver,
                    result,
                })?;
            }
        }
        Commands::Lookup { key, folder } => {
            if let Some(folder) = folder {
                config.set_folder(folder);
            }
            config.validate()?;

            let storage = create_storage(&config)
                .await
                .context("Failed to create storage backend")?;
            let exists = storage.exists(&key).await?;
            let cdn_url = if exists {
                Some(storage.get_cdn_url(&key).await?)
            } else {
                None
            };
            print_json(&serde_json::json!({
                "backend": storage.backend_type().to_string(),
                "folder": storage.folder(),
                "key": key,
                "exists": exists,
                "cdn_url": cdn_url,
            }))?;
        }
    }

    Ok(())
}
