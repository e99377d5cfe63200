use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use ob_rs_simulator::config::Config;
use ob_rs_simulator::db::{CallbackUrlStore, MemoryStore, PgStore, SubmissionStore};
use ob_rs_simulator::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(&config.log_level)
        }))
        .init();

    tracing::info!("Starting Open Banking RS simulator");

    let (submissions, callback_urls): (Arc<dyn SubmissionStore>, Arc<dyn CallbackUrlStore>) =
        match &config.database_url {
            Some(url) => {
                let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
                sqlx::migrate!("./migrations").run(&pool).await?;
                tracing::info!("Migrations applied");

                let store = Arc::new(PgStore::new(pool));
                let submissions: Arc<dyn SubmissionStore> = store.clone();
                let callback_urls: Arc<dyn CallbackUrlStore> = store;
                (submissions, callback_urls)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, submissions are kept in memory");
                let store = Arc::new(MemoryStore::new());
                let submissions: Arc<dyn SubmissionStore> = store.clone();
                let callback_urls: Arc<dyn CallbackUrlStore> = store;
                (submissions, callback_urls)
            }
        };

    tracing::info!("Idempotency policy: {:?}", config.idempotency_policy);

    let addr = SocketAddr::new(config.host, config.port);
    let state = Arc::new(AppState::new(config, submissions, callback_urls)?);
    let app = ob_rs_simulator::build_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
