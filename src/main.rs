//! shelfmark: a personal book-metadata authority.
//!
//! The catalog database is the source of truth for what you own and what
//! each book is; the filesystem and the metadata sources are just evidence.
//! This binary wires configuration, catalog, and resolution together behind
//! four commands: `scan`, `enrich`, `classify`, `stats`.

use clap::{Parser, Subcommand};
use derive_more::{Display, Error as DeriveError};
use exn::{OptionExt, ResultExt};
use futures::StreamExt;
use shelfmark_catalog::{BookRepository, CacheStore, Database};
use shelfmark_config::Config;
use shelfmark_library::{FileOutcome, ScanEvent, Scanner};
use shelfmark_resolve::{Resolver, SourceClient};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

type Error = exn::Exn<ErrorKind>;
type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, DeriveError)]
enum ErrorKind {
    #[display("configuration problem")]
    Config,
    #[display("catalog problem")]
    Catalog,
    #[display("could not build the source client")]
    Sources,
    #[display("scan failed")]
    Scan,
    #[display("no library root: pass a path or set library.root in the config")]
    NoRoot,
}

#[derive(Parser)]
#[command(name = "shelfmark", version, about = "Personal book-metadata authority")]
struct Cli {
    /// Config file to use instead of the platform default location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a full library scan: cleanup, indexing, enrichment.
    Scan {
        /// Library root; defaults to `library.root` from the config.
        path: Option<PathBuf>,
    },
    /// Re-run metadata enrichment over records still open to automation.
    Enrich,
    /// Fill in missing call numbers; reaches confirmed records too.
    Classify,
    /// Show catalog counts per match status.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shelfmark=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .or_raise(|| ErrorKind::Config)?;

    let db_path = config.database_path().or_raise(|| ErrorKind::Config)?;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).or_raise(|| ErrorKind::Catalog)?;
    }
    let db = Database::connect(&db_path).await.or_raise(|| ErrorKind::Catalog)?;
    let books = BookRepository::from(&db);
    let scanner = build_scanner(&config, &db, books.clone())?;

    let outcome = match cli.command {
        Command::Scan { path } => {
            let root = path
                .or_else(|| config.library.root.clone())
                .ok_or_raise(|| ErrorKind::NoRoot)?;
            run_scan(&scanner, root).await
        }
        Command::Enrich => {
            let summary = scanner.enrich_pending().await.or_raise(|| ErrorKind::Scan)?;
            println!(
                "enriched {} records ({} classified, {} unresolved, {} skipped)",
                summary.enriched, summary.classified, summary.unresolved, summary.skipped,
            );
            Ok(())
        }
        Command::Classify => {
            let filled = scanner.classify_missing().await.or_raise(|| ErrorKind::Scan)?;
            println!("{filled} call numbers filled");
            Ok(())
        }
        Command::Stats => {
            for (status, count) in books.stats().await.or_raise(|| ErrorKind::Catalog)? {
                println!("{status:>14}  {count}");
            }
            Ok(())
        }
    };
    db.close().await;
    outcome
}

fn build_scanner(config: &Config, db: &Database, books: BookRepository) -> Result<Scanner> {
    let cache = CacheStore::new(db, config.sources.cache_ttl_days);
    let client = SourceClient::new(
        cache,
        Duration::from_secs(config.sources.timeout_secs),
        Duration::from_millis(config.sources.min_interval_ms),
    )
    .or_raise(|| ErrorKind::Sources)?;
    let resolver = Arc::new(Resolver::new(client, config.sources.google_api_key.clone()));
    Ok(Scanner::new(
        books,
        resolver,
        config.library.missing_file_policy,
        config.library.enrich_concurrency,
    ))
}

async fn run_scan(scanner: &Scanner, root: PathBuf) -> Result<()> {
    println!("scanning {}", root.display());
    let stream = scanner.scan(root);
    futures::pin_mut!(stream);
    while let Some(event) = stream.next().await {
        match event.or_raise(|| ErrorKind::Scan)? {
            ScanEvent::Started { discovered } => println!("{discovered} book files on disk"),
            ScanEvent::CleanupComplete(cleanup) => println!(
                "cleanup: {} moved, {} deleted, {} detached ({} flagged for review)",
                cleanup.moved, cleanup.deleted, cleanup.detached, cleanup.flagged,
            ),
            ScanEvent::Indexed { path, outcome } => match outcome {
                FileOutcome::Added(_) => println!("  + {}", path.display()),
                FileOutcome::Moved(_) => println!("  > {}", path.display()),
                FileOutcome::Refreshed(_) => println!("  ~ {}", path.display()),
                FileOutcome::Unchanged(_) => {}
                FileOutcome::Unreadable => println!("  ! {} (unreadable, skipped)", path.display()),
            },
            ScanEvent::IndexingComplete(indexing) => println!(
                "indexed: {} added, {} moved, {} refreshed, {} unchanged",
                indexing.added, indexing.moved, indexing.refreshed, indexing.unchanged,
            ),
            ScanEvent::Enriched { id, title } => {
                println!("  * #{id} {}", title.as_deref().unwrap_or("(unidentified)"));
            }
            ScanEvent::Complete(summary) => println!(
                "done: {} enriched, {} classified, {} unresolved",
                summary.enrichment.enriched,
                summary.enrichment.classified,
                summary.enrichment.unresolved,
            ),
        }
    }
    Ok(())
}
