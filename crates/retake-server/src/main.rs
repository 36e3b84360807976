//! Retake — VALORANT round search server.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use retake_core::{Error, RetakeConfig};
use retake_infer::create_embedder;
use retake_ingest::{reindex_all, HttpFetcher};
use retake_server::{build_router, AppState};
use retake_store::SqliteStore;

fn resolve_data_dir(arg: Option<&String>) -> PathBuf {
    arg.map(PathBuf::from)
        .or_else(|| std::env::var("RETAKE_DATA_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("data"))
}

fn open_store(config: &RetakeConfig) -> anyhow::Result<SqliteStore> {
    SqliteStore::open(config.db_path())
        .map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        None | Some("serve") => serve(resolve_data_dir(args.get(2))).await,
        Some("reindex") => reindex(resolve_data_dir(args.get(2))).await,
        Some("--help") | Some("-h") | Some("help") => {
            println!("Retake — search VALORANT rounds by description");
            println!();
            println!("Usage: retake [command] [data-dir]");
            println!();
            println!("Commands:");
            println!("  serve [data-dir]     Start the server (default)");
            println!("  reindex [data-dir]   Regenerate summaries and embeddings with the configured embedder");
            println!("  help                 Show this help message");
            Ok(())
        }
        Some(other) => {
            eprintln!("Unknown command: {}. Use 'retake help' for usage.", other);
            std::process::exit(1);
        }
    }
}

async fn serve(data_dir: PathBuf) -> anyhow::Result<()> {
    info!("Data directory: {}", data_dir.display());
    let config = RetakeConfig::from_env(&data_dir)?;
    let port = config.port;

    let store = open_store(&config)?;
    let embedder = create_embedder(&config)?;
    let fetcher = Arc::new(HttpFetcher::from_config(&config)?);

    let state = match AppState::new(config, store, embedder, fetcher) {
        Ok(state) => Arc::new(state),
        Err(e @ Error::EmbeddingMismatch(_)) => {
            error!("{}", e);
            anyhow::bail!("{}; run `retake reindex` to re-embed stored rounds", e);
        }
        Err(e) => return Err(e.into()),
    };

    let app = build_router(state.clone());

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Retake server listening on {}", addr);

    let shutdown = state.shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested, cancelling in-flight ingestion");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

async fn reindex(data_dir: PathBuf) -> anyhow::Result<()> {
    let config = RetakeConfig::from_env(&data_dir)?;
    let store = open_store(&config)?;
    let embedder = create_embedder(&config)?;

    let report = reindex_all(&store, embedder.as_ref()).await?;
    println!(
        "Reindexed {} rounds across {} matches with {}",
        report.rounds, report.matches, report.version
    );
    Ok(())
}
