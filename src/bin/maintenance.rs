use std::collections::HashSet;
use std::env;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use review_backend::{
    config::AppConfig,
    db,
    repository::{PgRepository, Repository},
    s3::build_document_store,
    storage::{orphaned_keys, ObjectStorage, PROJECT_PREFIX},
};

const USAGE: &str = "Usage: maintenance purge-orphaned-documents [--dry-run]";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("purge-orphaned-documents") => {
            let dry_run = args.any(|arg| arg == "--dry-run");
            purge_orphaned_documents(dry_run).await?
        }
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Removes stored documents left behind when a submission failed after
/// upload. Do not run while submissions are in flight: a document uploaded
/// moments before its project row commits looks orphaned too.
async fn purge_orphaned_documents(dry_run: bool) -> Result<()> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        s3_bucket = %config.s3_bucket,
        dry_run,
        "loaded backend configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    let repository = PgRepository::new(pool);
    let documents = build_document_store(&config).await?;

    let referenced: HashSet<String> = repository
        .list_file_locators()
        .await
        .context("failed to load project document locators")?
        .iter()
        .filter_map(|locator| documents.key_for(locator))
        .collect();

    let stored = documents
        .backend()
        .list_keys(PROJECT_PREFIX)
        .await
        .context("failed to list stored documents")?;
    let total = stored.len();
    let orphaned = orphaned_keys(stored, &referenced);

    if orphaned.is_empty() {
        println!("No orphaned documents among {total} stored objects.");
        return Ok(());
    }

    println!(
        "{} orphaned documents among {total} stored objects{}",
        orphaned.len(),
        if dry_run { " (dry run)" } else { "" }
    );

    let mut failures = 0usize;
    for key in &orphaned {
        if dry_run {
            println!("  would delete {key}");
            continue;
        }
        match documents.backend().delete_object(key).await {
            Ok(()) => println!("  deleted {key}"),
            Err(err) => {
                failures += 1;
                eprintln!("Failed to delete object {key} from storage: {err}");
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} orphaned documents could not be deleted");
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
