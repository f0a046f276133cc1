pub mod events;
pub mod holds;
pub mod orders;
pub mod promos;

use axum::{extract::rejection::JsonRejection, Json, Router};
use std::sync::Arc;
use validator::Validate;

use crate::error::BookingError;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(events::routes())
        .merge(holds::routes())
        .merge(promos::routes())
        .merge(orders::routes())
}

/// Тело запроса: ошибка разбора JSON и ошибки валидации дают `bad_payload`.
pub(crate) fn payload<T: Validate>(body: Result<Json<T>, JsonRejection>) -> Result<T, BookingError> {
    let Json(body) = body.map_err(|e| BookingError::BadPayload(e.body_text()))?;
    body.validate()
        .map_err(|e| BookingError::BadPayload(e.to_string()))?;
    Ok(body)
}
