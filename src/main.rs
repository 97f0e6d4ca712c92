use clap::Parser;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tot_api::api::{self, AppState};
use tot_api::auth::JwtManager;
use tot_api::config::{AppConfig, LogFormat};
use tot_api::storage::LocalStorage;
use tot_api::store::InMemoryUserStore;
use tot_api::{ClientIdentifier, RateLimiter};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "tot_api=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let dotenv = dotenvy::dotenv();
    let config = AppConfig::parse();
    init_tracing(config.log_format);

    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded environment file"),
        Err(err) if err.not_found() => {}
        Err(err) => warn!(error = %err, "Could not read environment file"),
    }

    let jwt = Arc::new(JwtManager::new(
        &config.jwt_secret,
        config.jwt_issuer.clone(),
        config.jwt_expiry,
    )?);
    let identifier = ClientIdentifier::new(jwt.clone());

    let auth_limiter = Arc::new(RateLimiter::with_identifier(
        config.auth_limiter_config(),
        identifier.clone(),
    )?);
    let generic_limiter = Arc::new(RateLimiter::with_identifier(
        config.generic_limiter_config(),
        identifier,
    )?);
    info!(
        limit = config.auth_rate_limit,
        window_secs = config.auth_rate_window.as_secs(),
        "Auth rate limiter ready"
    );
    info!(
        limit = config.generic_rate_limit,
        window_secs = config.generic_rate_window.as_secs(),
        "Generic rate limiter ready"
    );

    let storage = Arc::new(LocalStorage::new(
        config.upload_dir.clone(),
        config.public_base_url.clone(),
    ));
    let state = AppState {
        store: Arc::new(InMemoryUserStore::new()),
        storage: storage.clone(),
        jwt,
        auth_limiter: auth_limiter.clone(),
        generic_limiter: generic_limiter.clone(),
    };
    let app = api::router(state, &storage);

    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, version = tot_api::VERSION, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped accepting connections");
    if let Err(err) = auth_limiter.close() {
        warn!(error = %err, "Auth rate limiter did not shut down cleanly");
    }
    if let Err(err) = generic_limiter.close() {
        warn!(error = %err, "Generic rate limiter did not shut down cleanly");
    }
    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to listen for SIGTERM");
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
    info!("Shutdown signal received");
}
