use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::Utc;
use clap::Parser;
use conversational_commerce::{
    catalog::Product, helpdesk::HelpdeskClient, router::create_app_router,
    settings::ServerConfig, state::AppState, store::SqliteStore,
};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about = "Conversational commerce MCP server")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// JSON array of products to upsert into the catalog at startup.
    #[arg(long)]
    seed_catalog: Option<PathBuf>,

    /// Reclaim expired reservations once and exit.
    #[arg(long)]
    sweep_once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();

    let config = ServerConfig::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;

    let store = SqliteStore::open(&config.store_path)
        .await
        .with_context(|| format!("failed to open store at {:?}", config.store_path))?;

    if let Some(path) = &cli.seed_catalog {
        let count = seed_catalog(&store, path).await?;
        tracing::info!(count, path = ?path, "catalog seeded");
    }

    let helpdesk = match config.helpdesk.clone() {
        Some(helpdesk) => {
            Some(HelpdeskClient::new(helpdesk).context("failed to build helpdesk client")?)
        }
        None => {
            tracing::warn!("no [helpdesk] configured; handoffs will fail and notifications are skipped");
            None
        }
    };

    let state = AppState::new(store, helpdesk, config.reservation_window());

    if cli.sweep_once {
        let reclaimed = state
            .handoff
            .reaper()
            .cleanup_expired_reservations(Utc::now())
            .await
            .context("reservation sweep failed")?;
        tracing::info!(count = reclaimed.len(), "reservation sweep finished");
        return Ok(());
    }

    let sweeper = state.handoff.reaper().clone().spawn(config.reaper_interval());
    let app = create_app_router(state.shared());
    let address = config.address();

    tracing::info!("Listening on http://{address}");
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    let served = axum::serve(listener, app).await.context("server error");
    sweeper.abort();
    served
}

async fn seed_catalog(store: &SqliteStore, path: &Path) -> anyhow::Result<usize> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read catalog {path:?}"))?;
    let products: Vec<Product> =
        serde_json::from_str(&raw).with_context(|| format!("invalid catalog JSON in {path:?}"))?;
    store
        .upsert_products(products)
        .await
        .context("failed to seed catalog")
}
