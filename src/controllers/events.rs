use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::cache::seats::CachedSeatMap;
use crate::controllers::payload;
use crate::error::BookingError;
use crate::models::{NewEvent, ZonePrice};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events/{id}/seats", get(get_seat_map))
        .route("/admin/events", post(create_event))
}

// GET /api/events/{id}/seats
pub async fn get_seat_map(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
) -> Result<Response, BookingError> {
    // 1. Пытаемся отдать карту из кеша
    let generation = match state.cache.get_seat_map(event_id).await {
        CachedSeatMap::Hit(seats) => {
            let mut response = Json(seats).into_response();
            response.headers_mut().insert("x-cache", HeaderValue::from_static("HIT"));
            return Ok(response);
        }
        CachedSeatMap::Miss(generation) => generation,
    };

    // 2. Промах: читаем из стора и кладём в кеш под прочитанным поколением
    let seats = state.events.seat_map(event_id).await?;
    if let Some(generation) = generation {
        state.cache.put_seat_map(event_id, generation, &seats).await;
    }

    let mut response = Json(seats).into_response();
    response.headers_mut().insert("x-cache", HeaderValue::from_static("MISS"));
    Ok(response)
}

// POST /api/admin/events
#[derive(Debug, Deserialize, Validate)]
pub struct CreateEventRequest {
    #[validate(range(min = 1))]
    pub venue_id: i64,
    #[validate(length(max = 300))]
    pub title: Option<String>,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub prices: Vec<ZonePrice>,
}

pub async fn create_event(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateEventRequest>, JsonRejection>,
) -> Result<impl IntoResponse, BookingError> {
    let req = payload(body)?;

    let event_id = state
        .events
        .initialize_event(NewEvent {
            venue_id: req.venue_id,
            title: req.title,
            starts_at: req.starts_at,
            prices: req.prices,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "id": event_id }))))
}
