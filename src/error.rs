use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::store::StoreError;

/// Ошибки движка бронирования. Каждая относится к одному запросу или
/// одному циклу очистки и не валит процесс.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("bad payload: {0}")]
    BadPayload(String),

    #[error("promo code is required")]
    CodeRequired,

    #[error("event {0} not found")]
    UnknownEvent(i64),

    #[error("event {0} is not open for booking")]
    EventNotBookable(i64),

    #[error("not found")]
    NotFound,

    #[error("seats are not held by this holder: {0:?}")]
    HoldMismatch(Vec<i64>),

    #[error("seats are not available: {0:?}")]
    SeatUnavailable(Vec<i64>),

    #[error("seats do not belong to the event: {0:?}")]
    SeatNotFound(Vec<i64>),

    #[error("no price configured for seats: {0:?}")]
    ZoneUnpriced(Vec<i64>),

    #[error("promo code is invalid or exhausted")]
    PromoInvalid,

    #[error("invalid credentials")]
    Unauthorized,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BookingError {
    /// Код ошибки для клиента.
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::BadPayload(_) => "bad_payload",
            BookingError::CodeRequired => "code_required",
            BookingError::UnknownEvent(_) | BookingError::EventNotBookable(_) => "bad_event",
            BookingError::NotFound => "not_found",
            BookingError::HoldMismatch(_) => "hold_mismatch",
            BookingError::SeatUnavailable(_) => "seat_unavailable",
            BookingError::SeatNotFound(_) => "seat_not_found",
            BookingError::ZoneUnpriced(_) => "zone_unpriced",
            BookingError::PromoInvalid => "promo_invalid",
            BookingError::Unauthorized => "unauthorized",
            BookingError::Store(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            BookingError::BadPayload(_) | BookingError::CodeRequired => StatusCode::BAD_REQUEST,
            BookingError::Unauthorized => StatusCode::UNAUTHORIZED,
            BookingError::UnknownEvent(_) | BookingError::NotFound | BookingError::SeatNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            BookingError::EventNotBookable(_)
            | BookingError::HoldMismatch(_)
            | BookingError::SeatUnavailable(_) => StatusCode::CONFLICT,
            BookingError::ZoneUnpriced(_) | BookingError::PromoInvalid => StatusCode::UNPROCESSABLE_ENTITY,
            BookingError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Места, из-за которых запрос отклонён: клиент может повторить без них.
    pub fn seat_ids(&self) -> Option<&[i64]> {
        match self {
            BookingError::HoldMismatch(ids)
            | BookingError::SeatUnavailable(ids)
            | BookingError::SeatNotFound(ids)
            | BookingError::ZoneUnpriced(ids) => Some(ids),
            _ => None,
        }
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        if let BookingError::Store(ref e) = self {
            tracing::error!("Internal Server Error: {}", e);
        }

        let body = match self.seat_ids() {
            Some(ids) => json!({ "error": self.code(), "seat_ids": ids }),
            None => json!({ "error": self.code() }),
        };

        (self.status(), Json(body)).into_response()
    }
}
