use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::controllers::payload;
use crate::error::BookingError;
use crate::models::PromoQuote;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/promos/validate", post(validate_promo))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ValidatePromoRequest {
    // пустой или отсутствующий код -> code_required
    #[serde(default)]
    #[validate(length(max = 64))]
    pub code: String,
}

// POST /api/promos/validate
pub async fn validate_promo(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ValidatePromoRequest>, JsonRejection>,
) -> Result<Json<Option<PromoQuote>>, BookingError> {
    let req = payload(body)?;
    let quote = state.promos.validate(&req.code).await?;
    Ok(Json(quote))
}
