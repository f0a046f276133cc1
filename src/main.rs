use mimalloc::MiMalloc;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seat_booking::{
    app,
    cache::CacheService,
    config::{Config, LogFormat},
    database::Database,
    services::{notify::OrderNotifier, sweeper::ExpirySweeper, Clock, SystemClock},
    store::SeatStore,
    AppState, EngineSettings,
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let filter = tracing_subscriber::EnvFilter::new(&config.app.rust_log);
    match config.app.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }

    info!("Starting seat booking engine ({})", config.app.environment);

    // Connect to the database
    let db = Database::connect(&config.database.url, config.database.pool_size).await?;
    db.run_migrations().await?;

    // Redis is optional: without it the seat map is read straight from the store
    let cache = match &config.redis.url {
        Some(url) => match CacheService::connect(url, config.redis.seatmap_ttl_seconds).await {
            Ok(cache) => cache,
            Err(e) => {
                warn!("Redis unavailable, seat map cache disabled: {}", e);
                CacheService::disabled()
            }
        },
        None => CacheService::disabled(),
    };

    let notifier = OrderNotifier::from_config(&config.notify)?.map(Arc::new);
    if notifier.is_some() {
        info!("Order confirmation webhook enabled");
    }

    let store: Arc<dyn SeatStore> = Arc::new(db.seat_store());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let app_state = Arc::new(AppState::new(
        store.clone(),
        clock.clone(),
        EngineSettings::from_config(&config),
        cache.clone(),
        Arc::new(db.pool.clone()),
        notifier,
    ));

    // --- Start background tasks ---
    let shutdown = CancellationToken::new();
    let sweeper = ExpirySweeper::new(
        store,
        clock,
        cache,
        Duration::from_secs(config.holds.sweep_interval_seconds),
    )
    .spawn(shutdown.clone());

    // --- Start the web server ---
    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server_shutdown = shutdown.clone();
    axum::serve(listener, app(app_state).into_make_service())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
            server_shutdown.cancel();
        })
        .await?;

    shutdown.cancel();
    sweeper.await?;
    info!("Bye");
    Ok(())
}
