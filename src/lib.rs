pub mod config;
pub mod database;
pub mod models;
pub mod store;
pub mod error;
pub mod controllers;
pub mod middleware;
pub mod cache;
pub mod services;

use axum::{routing::get, Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::cache::CacheService;
use crate::config::Config;
use crate::middleware::AccountDirectory;
use crate::services::{
    events::EventService,
    holds::HoldManager,
    notify::OrderNotifier,
    orders::{BookingPolicy, OrderFinalizer},
    promo::PromoValidator,
    Clock,
};
use crate::store::SeatStore;

/// Параметры движка, общие для всех сервисов.
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub hold_ttl: chrono::Duration,
    pub policy: BookingPolicy,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            hold_ttl: chrono::Duration::seconds(config.holds.ttl_seconds),
            policy: config.booking.policy,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self { hold_ttl: chrono::Duration::seconds(600), policy: BookingPolicy::HoldRequired }
    }
}

// Shared state для всего приложения
pub struct AppState {
    pub holds: HoldManager,
    pub orders: OrderFinalizer,
    pub promos: PromoValidator,
    pub events: EventService,
    pub cache: CacheService,
    pub accounts: Arc<dyn AccountDirectory>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn SeatStore>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
        cache: CacheService,
        accounts: Arc<dyn AccountDirectory>,
        notifier: Option<Arc<OrderNotifier>>,
    ) -> Self {
        let mut orders = OrderFinalizer::new(store.clone(), clock.clone(), settings.policy);
        if let Some(notifier) = notifier {
            orders = orders.with_notifier(notifier);
        }

        Self {
            holds: HoldManager::new(store.clone(), clock.clone(), settings.hold_ttl),
            orders,
            promos: PromoValidator::new(store.clone(), clock.clone()),
            events: EventService::new(store, clock),
            cache,
            accounts,
        }
    }
}

/// Полный роутер приложения: `/health` и API под `/api`.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", controllers::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true, "time": chrono::Utc::now() }))
}
