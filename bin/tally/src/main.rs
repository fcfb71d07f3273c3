//! Tally - staking and balance ledger indexer for Substrate chains.
//!
//! # Usage
//!
//! ```bash
//! # Dry run against an archive, ledger kept in memory
//! tally --input blocks.ndjson
//!
//! # Persist to PostgreSQL with a staking snapshot
//! DATABASE_URL=postgres://localhost/tally tally --input blocks.ndjson --staking-snapshot staking.json
//! ```

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tokio::sync::watch;
use tracing::{Instrument, debug, error, info, info_span, warn};
use tracing_subscriber::{EnvFilter, fmt};

use tally_archive::{ArchiveSource, SnapshotLookup};
use tally_core::error::IndexerError;
use tally_core::ledger::LedgerConfig;
use tally_core::metrics::init_metrics;
use tally_core::models::Chain;
use tally_core::ports::{BlockSource, Repositories, StakingLookup};
use tally_core::schema::SchemaMode;
use tally_core::services::{IndexerConfig, IndexerService};
use tally_storage::{Database, DatabaseConfig, MemoryStore, PgRepositories};

/// Tally CLI - staking and balance ledger indexer.
#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(about = "Tally - staking and balance ledger indexer for Substrate chains")]
#[command(version)]
struct Cli {
    /// Block archive to index (newline-delimited JSON).
    #[arg(long, env = "ARCHIVE_PATH")]
    input: Option<PathBuf>,

    /// PostgreSQL database URL. Without it the ledger is kept in memory.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Chain name attached to every entry.
    #[arg(long, env = "CHAIN_NAME", default_value = "polkadot")]
    chain_name: String,

    /// SS58 address prefix of the chain.
    #[arg(long, env = "ADDRESS_PREFIX", default_value = "0")]
    address_prefix: u16,

    /// Namespace of entry ids (`{prefix}-{block}-{index}`).
    #[arg(long, env = "ID_PREFIX", default_value = "dot")]
    id_prefix: String,

    /// Extra schema variants (JSON), on top of the built-in table.
    #[arg(long, env = "SCHEMA_FILE")]
    schemas: Option<PathBuf>,

    /// Schema resolution: historical (by content hash) or latest (tip only).
    #[arg(long, env = "SCHEMA_MODE", default_value = "historical", value_parser = parse_schema_mode)]
    schema_mode: SchemaMode,

    /// Staking ledgers and era boundaries (JSON).
    #[arg(long, env = "STAKING_SNAPSHOT")]
    staking_snapshot: Option<PathBuf>,

    /// First block to index. Defaults to the block after the cursor.
    #[arg(long, env = "START_BLOCK")]
    start_block: Option<u64>,

    /// Reprocess blocks at or below the cursor (already recorded entries are skipped).
    #[arg(long)]
    replay: bool,

    /// Number of blocks decoded ahead of processing.
    #[arg(long, env = "PREFETCH", default_value = "16")]
    prefetch: usize,

    /// Prometheus metrics port.
    #[arg(long, env = "METRICS_PORT", default_value = "9090")]
    metrics_port: u16,

    /// Enable JSON log output.
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,

    /// Run database migrations and exit.
    #[arg(long)]
    migrate_only: bool,

    /// Purge the chain's ledger entries, accounts and cursor, then exit.
    #[arg(long)]
    purge: bool,

    /// Skip confirmation prompt for destructive operations (like --purge).
    #[arg(long, short = 'y')]
    yes: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

fn parse_schema_mode(s: &str) -> Result<SchemaMode, String> {
    s.parse()
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    // Prometheus metrics exporter (optional - failures don't crash the app)
    let metrics_enabled = match format!("0.0.0.0:{}", cli.metrics_port).parse::<std::net::SocketAddr>() {
        Ok(metrics_addr) => match PrometheusBuilder::new().with_http_listener(metrics_addr).install() {
            Ok(()) => {
                init_metrics();
                true
            }
            Err(e) => {
                warn!("⚠️  Failed to start metrics exporter: {}. Continuing without metrics.", e);
                false
            }
        },
        Err(e) => {
            warn!("⚠️  Invalid metrics address: {}. Continuing without metrics.", e);
            false
        }
    };

    // ─────────────────────────────────────────────────────────────────────────
    // 🚀 STARTUP
    // ─────────────────────────────────────────────────────────────────────────
    info!(chain = %cli.chain_name, "🚀 Starting Tally");
    if metrics_enabled {
        info!("   📊 Metrics:  http://localhost:{}/metrics", cli.metrics_port);
    } else {
        info!("   📊 Metrics:  disabled");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 🗄️ DATABASE
    // ─────────────────────────────────────────────────────────────────────────
    let Some(database_url) = cli.database_url.clone() else {
        if cli.migrate_only || cli.purge {
            bail!("--migrate-only and --purge need a database (--database-url)");
        }
        info!("🧠 No database configured, ledger kept in memory");
        let store = Arc::new(MemoryStore::new());
        run_indexer(&cli, store.clone()).await?;
        match (
            store.accounts().count_accounts().await,
            store.entries().count_entries().await,
        ) {
            (Ok(accounts), Ok(entries)) => info!(accounts, entries, "🧠 In-memory ledger discarded"),
            (Err(e), _) | (_, Err(e)) => warn!("⚠️  In-memory ledger discarded, summary unavailable: {}", e),
        }
        return Ok(());
    };

    debug!(database_url = %mask_password(&database_url), "Database endpoint");
    info!("🗄️  Connecting to database...");
    let db = Database::connect(&DatabaseConfig::for_indexer(&database_url))
        .await
        .context("Failed to connect to database")?;

    db.migrate().await.context("Failed to run migrations")?;
    info!("🗄️  Database ready (migrations applied)");

    if cli.migrate_only {
        info!("🛑 --migrate-only flag set, exiting");
        return Ok(());
    }

    let db = Arc::new(db);
    let repositories = Arc::new(PgRepositories::new(db.clone()));

    if cli.purge {
        let result = handle_purge(repositories.as_ref(), &cli.chain_name, cli.yes).await;
        db.close().await;
        return result;
    }

    let result = run_indexer(&cli, repositories).await;
    db.close().await;
    result
}

/// Wire the indexer and run it until the archive is exhausted or Ctrl+C.
async fn run_indexer<R: Repositories + 'static>(cli: &Cli, repositories: Arc<R>) -> Result<()> {
    // ─────────────────────────────────────────────────────────────────────────
    // 📡 BLOCK SOURCE
    // ─────────────────────────────────────────────────────────────────────────
    let Some(input) = &cli.input else {
        bail!("no block archive given (--input or ARCHIVE_PATH)");
    };
    let source = ArchiveSource::open(input)
        .await
        .context("Failed to open block archive")?;
    if let Some(head) = source.head().await.context("Failed to scan block archive")? {
        info!(head = head.number, hash = %head.hash, "📡 Archive opened");
    } else {
        warn!("⚠️  Archive is empty");
    }

    let lookup: Arc<dyn StakingLookup> = match &cli.staking_snapshot {
        Some(path) => Arc::new(
            SnapshotLookup::load_file(path).context("Failed to load staking snapshot")?,
        ),
        None => {
            warn!("⚠️  No staking snapshot: payees unknown, rewards will not be restaked");
            Arc::new(SnapshotLookup::empty())
        }
    };

    // ─────────────────────────────────────────────────────────────────────────
    // 📐 HANDLERS & SCHEMAS
    // ─────────────────────────────────────────────────────────────────────────
    let handlers = tally_handlers::polkadot_handlers();
    let schemas = tally_handlers::schema_registry(&handlers, cli.schemas.as_deref())
        .context("Failed to load schema registry")?;
    if cli.schema_mode == SchemaMode::Latest {
        warn!("⚠️  Schema mode 'latest': only valid for blocks of the current runtime");
    }

    let ledger = LedgerConfig {
        chain: Chain {
            name: cli.chain_name.clone(),
            address_prefix: cli.address_prefix,
        },
        id_prefix: cli.id_prefix.clone(),
        schema_mode: cli.schema_mode,
    };
    let config = IndexerConfig {
        start_block: cli.start_block,
        replay: cli.replay,
        prefetch: cli.prefetch,
    };

    let indexer = IndexerService::new(
        ledger,
        config,
        Arc::new(source),
        repositories,
        Arc::new(handlers),
        Arc::new(schemas),
        lookup,
    );

    // ─────────────────────────────────────────────────────────────────────────
    // ⚡ RUN
    // ─────────────────────────────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut indexer_handle = tokio::spawn(
        async move { indexer.run(shutdown_rx).await }.instrument(info_span!("indexer")),
    );
    info!("   Press Ctrl+C to stop");

    let outcome = tokio::select! {
        joined = &mut indexer_handle => joined,
        _ = shutdown_signal() => {
            info!("🛑 Shutting down...");
            let _ = shutdown_tx.send(true);
            match tokio::time::timeout(std::time::Duration::from_secs(30), indexer_handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!("⚠️  Indexer shutdown timed out");
                    return Ok(());
                }
            }
        }
    };

    match outcome.context("Indexer task panicked")? {
        Ok(stats) => {
            info!("✅ Archive indexed");
            info!("   ⛓️  Blocks indexed: {}", stats.blocks_indexed);
            info!("   ⏭️  Blocks skipped: {}", stats.blocks_skipped);
            info!("   📝 Entries recorded: {}", stats.entries_recorded);
            info!("   🔁 Duplicates skipped: {}", stats.entries_duplicate);
            info!("   🛡️  Calls suppressed: {}", stats.entries_suppressed);
            if stats.entries_dropped > 0 {
                warn!("   ⚠️  Entries dropped: {}", stats.entries_dropped);
            }
            Ok(())
        }
        Err(IndexerError::ShutdownRequested) => {
            info!("🛑 Shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "❌ Indexer stopped");
            Err(e).context("Indexing failed")
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    }
}

/// Mask password in database URL for logging.
fn mask_password(url_str: &str) -> String {
    match url::Url::parse(url_str) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("****"));
            }
            url.to_string()
        }
        Err(_) => url_str.to_string(),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "❌ Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "❌ Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Handle the --purge command.
async fn handle_purge(
    repositories: &dyn Repositories,
    chain: &str,
    skip_confirmation: bool,
) -> Result<()> {
    warn!("⚠️  PURGE MODE: This will delete the ledger of chain '{}'!", chain);
    warn!("   - All ledger entries of the chain");
    warn!("   - Accounts left without entries");
    warn!("   - The indexer cursor will be reset");
    warn!("   - Schema and migrations will be preserved");

    if !skip_confirmation {
        print!("\n🔴 Are you sure you want to purge the ledger? [y/N] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            info!("❌ Purge cancelled");
            return Ok(());
        }
    }

    info!("🗑️  Purging ledger...");
    let deleted = repositories
        .purge(chain)
        .await
        .context("Failed to purge ledger")?;

    info!("✅ Ledger purged successfully");
    info!("   📝 Entries removed: {}", deleted);
    info!("   The indexer will start from block 0 on next run");

    Ok(())
}
