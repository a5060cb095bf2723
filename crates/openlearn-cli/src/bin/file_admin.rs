//! Operator tool for stored course files.
//!
//! Reads the same environment as the services (DATABASE_URL, STORAGE_BACKEND,
//! UPLOAD_BUCKET, ...) and acts as an administrator principal.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::TryStreamExt;
use openlearn_cli::{init_tracing, operator, parse_file_ids, report_error};
use openlearn_core::Config;
use openlearn_db::{setup_database, PgContextDirectory, PgFileRepository};
use openlearn_services::ScopedFileService;
use openlearn_storage::{create_blob_store, keys, StorageGateway};
use tokio::io::AsyncWriteExt;

#[derive(Parser, Debug)]
#[command(name = "file_admin")]
#[command(about = "Inspect and clean up stored course files")]
struct Args {
    /// Id of the administrator running the command
    #[arg(long, env = "OPENLEARN_ADMIN_ID", default_value = "0")]
    admin_id: i64,

    /// Organization of the administrator
    #[arg(long, env = "OPENLEARN_ADMIN_ORGANIZATION_ID", default_value = "0")]
    organization_id: i64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a stored reference into bucket and key
    Resolve {
        reference: String,
    },
    /// Download a file by id
    Fetch {
        file_id: i64,
        /// Output path (defaults to the file name of the stored key)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Delete files by id (space or comma separated)
    Delete {
        #[arg(required = true)]
        file_ids: Vec<String>,
    },
    /// Delete every file of a portfolio item
    PurgePortfolio {
        portfolio_item_id: i64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = Config::from_env()?;

    if let Command::Resolve { ref reference } = args.command {
        let address = keys::resolve(reference, config.upload_bucket());
        println!("bucket: {}", address.bucket);
        println!("key:    {}", address.key);
        return Ok(());
    }

    let pool = setup_database(&config).await?;
    let store = create_blob_store(&config.storage)?;
    tracing::info!(
        backend = %store.backend_type(),
        bucket = %config.upload_bucket(),
        "Object store ready"
    );
    let service = ScopedFileService::new(
        Arc::new(PgFileRepository::new(pool.clone())),
        Arc::new(PgContextDirectory::new(pool)),
        StorageGateway::new(store, &config.storage),
    );
    let principal = operator(args.admin_id, args.organization_id);

    match args.command {
        Command::Resolve { .. } => {}
        Command::Fetch { file_id, output } => {
            let (record, mut stream) = service.fetch_file(&principal, file_id).await?;
            let output = match output {
                Some(path) => path,
                None => {
                    let address = service.storage().resolve(&record.file_url);
                    let name = address.key.rsplit('/').next().unwrap_or(&address.key);
                    PathBuf::from(name)
                }
            };

            let mut file = tokio::fs::File::create(&output)
                .await
                .with_context(|| format!("Failed to create {}", output.display()))?;
            let mut written = 0u64;
            while let Some(chunk) = stream.try_next().await? {
                written += chunk.len() as u64;
                file.write_all(&chunk).await?;
            }
            file.flush().await?;

            println!(
                "Wrote {} bytes of file {} to {}",
                written,
                record.id,
                output.display()
            );
        }
        Command::Delete { file_ids } => {
            let ids = parse_file_ids(&file_ids)?;
            match ids.as_slice() {
                [single] => {
                    service.delete_file(&principal, *single).await?;
                    println!("Deleted file {}", single);
                }
                _ => {
                    let summary = service.delete_files(&principal, &ids).await?;
                    println!(
                        "Deleted {} file(s): {}",
                        summary.deleted.len(),
                        serde_json::to_string(&summary.deleted)?
                    );
                }
            }
        }
        Command::PurgePortfolio { portfolio_item_id } => {
            let summary = service
                .purge_portfolio_files(&principal, portfolio_item_id)
                .await?;
            println!(
                "Purged {} file(s) of portfolio item {}",
                summary.deleted.len(),
                portfolio_item_id
            );
        }
    }

    Ok(())
}
