use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::Method;
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use tradepost_gateway::{create_router, GatewayState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(env_filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    info!("starting Tradepost backend");

    let config = tradepost_config::load().context("failed to load configuration")?;

    let pool = tradepost_database::initialize_database(&config.database)
        .await
        .context("failed to initialize database")?;

    let state = Arc::new(GatewayState::new(pool));

    if config.presence.idle_timeout_seconds > 0 {
        spawn_presence_reaper(state.clone(), &config.presence);
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let app = create_router(state).layer(cors);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;

    info!("backend shut down");
    Ok(())
}

/// Sweep out connections whose heartbeats have gone quiet.
fn spawn_presence_reaper(state: Arc<GatewayState>, config: &tradepost_config::PresenceConfig) {
    let idle_for = Duration::from_secs(config.idle_timeout_seconds);
    let sweep_every = Duration::from_secs(config.sweep_interval_seconds.max(1));

    info!(
        idle_timeout_seconds = config.idle_timeout_seconds,
        sweep_interval_seconds = config.sweep_interval_seconds,
        "presence reaper running"
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_every);
        loop {
            ticker.tick().await;
            state.relay().prune_idle(idle_for).await;
        }
    });
}

fn shutdown_signal() -> impl std::future::Future<Output = ()> {
    async {
        if let Err(error) = signal::ctrl_c().await {
            error!(?error, "failed to listen for shutdown signal");
        }
        info!("shutdown signal received");
    }
}
