use std::sync::Arc;
use std::time::Duration;

use dotenv::dotenv;
use timeledger_core::ledger::{spawn_ticker, TimerEngine};
use timeledger_core::replicator::{HttpRemoteStore, Replicator, SyncNotifier};
use timeledger_core::{config::AppConfig, create_router, db, ledger, AppState};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(LevelFilter::INFO.into());

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    info!("Starting Timeledger Core Server...");

    let config = Arc::new(AppConfig::from_env()?);

    // Initialize database connection pool and schema
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    // Sessions left ACTIVE by a crash have no live timer anymore; demote them
    // so their recorded time is kept and they can be restarted.
    let recovered = ledger::store::recover_orphaned_active(&pool).await?;
    if recovered > 0 {
        warn!("Recovered {} session(s) stuck in ACTIVE from a previous run", recovered);
    }

    // Start the shared timer engine and its once-a-second tick.
    let timers = TimerEngine::new();
    spawn_ticker(timers.clone());

    // Replication is optional: without a remote URL the notifier swallows
    // marks and the ledger stays purely local.
    let http = reqwest::Client::new();
    let sync = match &config.remote_sync_url {
        Some(url) => {
            let (notifier, rx) = SyncNotifier::channel();
            let store = HttpRemoteStore::new(
                http.clone(),
                url.clone(),
                config.remote_sync_token.clone(),
            );
            let replicator = Replicator::new(
                pool.clone(),
                store,
                notifier.clone(),
                rx,
                Duration::from_millis(config.sync_debounce_ms),
            );
            tokio::spawn(replicator.run());
            info!("Workspace replication enabled against {}", url);
            notifier
        }
        None => {
            info!("No REMOTE_SYNC_URL configured, running local-only");
            SyncNotifier::disabled()
        }
    };

    // Create application state
    let app_state = AppState {
        db: pool,
        config: config.clone(),
        timers,
        sync,
        http,
    };

    // Create router
    let app = create_router(app_state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}:{}: {}", config.host, config.port, e))?;

    info!("Server listening on {}:{}", config.host, config.port);

    // Start the server
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Server stopped");
    Ok(())
}

/// Resolves when the process receives ctrl-c.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
}
