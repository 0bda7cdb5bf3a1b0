use anyhow::Context;
use ecoride_api::{app, worker, AppState, Stores};
use ecoride_core::{Clock, EcoFactors, SystemClock};
use ecoride_store::{Config, DbClient, InMemoryStore, RedisClient};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ecoride_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting EcoRide API on port {}", config.server.port);

    let eco_factors: EcoFactors = (&config.eco).into();
    let stores = match &config.database {
        Some(db) => {
            let db = DbClient::new(&db.url, db.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Stores::postgres(&db, eco_factors)
        }
        None => {
            tracing::warn!("No database configured, trips and bookings live in memory only");
            Stores::in_memory(Arc::new(InMemoryStore::with_eco_factors(eco_factors)))
        }
    };

    let redis = match &config.redis {
        Some(redis) => Some(Arc::new(RedisClient::new(&redis.url).context("Invalid redis url")?)),
        None => {
            tracing::info!("No redis configured, rate limiting is off");
            None
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = AppState::new(&config, stores, clock, redis);

    worker::spawn_departure_sweeper(
        state.trips.clone(),
        Duration::from_secs(config.lifecycle.sweep_interval_seconds),
    );

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
