use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::controllers::payload;
use crate::error::BookingError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/holds", post(create_holds))
        .route("/holds/renew", post(renew_holds))
        .route("/holds/release", post(release_holds))
}

// POST /api/holds
#[derive(Debug, Deserialize, Validate)]
pub struct CreateHoldsRequest {
    #[validate(range(min = 1))]
    pub event_id: i64,
    #[validate(length(min = 1, max = 50))]
    pub seat_ids: Vec<i64>,
    #[validate(length(min = 1, max = 128))]
    pub user_token: String,
}

pub async fn create_holds(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateHoldsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, BookingError> {
    let req = payload(body)?;

    let grant = state
        .holds
        .create_holds(req.event_id, &req.seat_ids, &req.user_token)
        .await?;

    if !grant.hold_ids.is_empty() {
        state.cache.invalidate_seats(req.event_id).await;
    }

    Ok(Json(json!({
        "ok": true,
        "hold_ids": grant.hold_ids,
        "seat_ids": grant.seat_ids,
        "expires_at": grant.expires_at,
    })))
}

#[derive(Debug, Deserialize, Validate)]
pub struct HoldIdsRequest {
    #[validate(length(min = 1, max = 50))]
    pub hold_ids: Vec<Uuid>,
    #[validate(length(min = 1, max = 128))]
    pub user_token: String,
}

// POST /api/holds/renew
pub async fn renew_holds(
    State(state): State<Arc<AppState>>,
    body: Result<Json<HoldIdsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, BookingError> {
    let req = payload(body)?;
    let expires_at = state.holds.renew_holds(&req.hold_ids, &req.user_token).await?;
    Ok(Json(json!({ "ok": true, "expires_at": expires_at })))
}

// POST /api/holds/release
pub async fn release_holds(
    State(state): State<Arc<AppState>>,
    body: Result<Json<HoldIdsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, BookingError> {
    let req = payload(body)?;
    let outcome = state.holds.release_holds(&req.hold_ids, &req.user_token).await?;

    for event_id in &outcome.events {
        state.cache.invalidate_seats(*event_id).await;
    }

    Ok(Json(json!({ "ok": true, "released": outcome.released })))
}
