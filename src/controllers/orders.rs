use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::controllers::payload;
use crate::error::BookingError;
use crate::middleware::BuyerAccount;
use crate::models::{Buyer, Order, OrderStatus};
use crate::services::orders::FinalizeRequest;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/{id}", get(get_order))
}

// POST /api/orders
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(range(min = 1))]
    pub event_id: i64,
    #[validate(length(min = 1, max = 50))]
    pub seat_ids: Vec<i64>,
    #[validate(nested)]
    pub buyer: Buyer,
    #[validate(length(max = 64))]
    pub promo_code: Option<String>,
    #[validate(length(max = 128))]
    pub user_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub id: Uuid,
    pub subtotal: f64,
    pub discount: f64,
    pub total: f64,
    pub status: OrderStatus,
}

pub async fn create_order(
    State(state): State<Arc<AppState>>,
    BuyerAccount(account): BuyerAccount,
    body: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<impl IntoResponse, BookingError> {
    let req = payload(body)?;
    let event_id = req.event_id;

    let order = state
        .orders
        .finalize(FinalizeRequest {
            event_id,
            seat_ids: req.seat_ids,
            buyer: req.buyer,
            promo_code: req.promo_code,
            holder_token: req.user_token,
            user_id: account.map(|a| a.user_id),
        })
        .await?;

    state.cache.invalidate_seats(event_id).await;

    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            id: order.id,
            subtotal: order.subtotal,
            discount: order.discount,
            total: order.total,
            status: order.status,
        }),
    ))
}

// GET /api/orders/{id}
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, BookingError> {
    Ok(Json(state.orders.order(order_id).await?))
}
