//! Оформление заказа: превращает удержанные места в оплаченный по цене
//! заказ. Всё происходит в одной транзакции стора: любая ошибка откатывает
//! и статусы мест, и заказ, и расход промокода.

use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::BookingError;
use crate::models::{Buyer, Order, OrderItem, OrderStatus, SeatState, SeatStatus};
use crate::services::notify::OrderNotifier;
use crate::services::{pricing, Clock};
use crate::store::SeatStore;

/// Какие места можно выкупить.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingPolicy {
    /// Только места с живым холдом этого покупателя
    #[default]
    HoldRequired,
    /// Свободные места или места с холдом этого покупателя
    Direct,
}

impl BookingPolicy {
    fn accepts(&self, seat: &SeatState, holder_token: Option<&str>) -> bool {
        let own_hold = seat.status == SeatStatus::Hold
            && holder_token.is_some()
            && seat.holder_token.as_deref() == holder_token;

        match self {
            BookingPolicy::HoldRequired => own_hold,
            BookingPolicy::Direct => own_hold || seat.status == SeatStatus::Available,
        }
    }

    fn rejection(&self, seat_ids: Vec<i64>) -> BookingError {
        match self {
            BookingPolicy::HoldRequired => BookingError::HoldMismatch(seat_ids),
            BookingPolicy::Direct => BookingError::SeatUnavailable(seat_ids),
        }
    }
}

impl FromStr for BookingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hold_required" => Ok(BookingPolicy::HoldRequired),
            "direct" => Ok(BookingPolicy::Direct),
            other => Err(format!("unknown booking policy: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FinalizeRequest {
    pub event_id: i64,
    pub seat_ids: Vec<i64>,
    pub buyer: Buyer,
    pub promo_code: Option<String>,
    pub holder_token: Option<String>,
    /// Аккаунт покупателя, если запрос пришёл с учётными данными
    pub user_id: Option<i64>,
}

pub struct OrderFinalizer {
    store: Arc<dyn SeatStore>,
    clock: Arc<dyn Clock>,
    policy: BookingPolicy,
    notifier: Option<Arc<OrderNotifier>>,
}

impl OrderFinalizer {
    pub fn new(store: Arc<dyn SeatStore>, clock: Arc<dyn Clock>, policy: BookingPolicy) -> Self {
        Self { store, clock, policy, notifier: None }
    }

    pub fn with_notifier(mut self, notifier: Arc<OrderNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn policy(&self) -> BookingPolicy {
        self.policy
    }

    pub async fn finalize(&self, req: FinalizeRequest) -> Result<Order, BookingError> {
        let seat_ids = self.validate(&req)?;
        let holder_token = req.holder_token.as_deref().map(str::trim).filter(|t| !t.is_empty());
        let promo_code = req.promo_code.as_deref().map(str::trim).filter(|c| !c.is_empty());
        let now = self.clock.now();

        let mut tx = self.store.begin().await?;

        // 1. событие
        let event = tx
            .event(req.event_id)
            .await?
            .ok_or(BookingError::UnknownEvent(req.event_id))?;
        if !event.is_bookable() {
            return Err(BookingError::EventNotBookable(req.event_id));
        }

        // 2. места и цены
        let prices = pricing::price_map(&tx.zone_prices(req.event_id).await?);
        let locked = tx.lock_seats(req.event_id, &seat_ids, now).await?;

        let found: BTreeSet<i64> = locked.iter().map(|s| s.seat_id).collect();
        let missing: Vec<i64> = seat_ids.iter().copied().filter(|id| !found.contains(id)).collect();
        if !missing.is_empty() {
            return Err(BookingError::SeatNotFound(missing));
        }

        let unpriced: Vec<i64> = locked
            .iter()
            .filter(|s| !prices.contains_key(&s.zone))
            .map(|s| s.seat_id)
            .collect();
        if !unpriced.is_empty() {
            return Err(BookingError::ZoneUnpriced(unpriced));
        }

        // 3. права на места
        let rejected: Vec<i64> = locked
            .iter()
            .filter(|s| !self.policy.accepts(s, holder_token))
            .map(|s| s.seat_id)
            .collect();
        if !rejected.is_empty() {
            return Err(self.policy.rejection(rejected));
        }

        // 4-5. суммы и промокод
        let items: Vec<OrderItem> = locked
            .iter()
            .map(|s| OrderItem { seat_id: s.seat_id, price: unit_price(&prices, &s.zone) })
            .collect();
        let subtotal = pricing::subtotal(items.iter().map(|i| i.price));

        let promo = match promo_code {
            Some(code) => {
                let promo = tx.promo(code, true).await?.ok_or(BookingError::PromoInvalid)?;
                if !promo.is_valid_at(now) {
                    return Err(BookingError::PromoInvalid);
                }
                Some(promo)
            }
            None => None,
        };
        let discount = promo
            .as_ref()
            .map(|p| pricing::discount(subtotal, p.discount_pct))
            .unwrap_or(0.0);
        let total = pricing::total(subtotal, discount);

        // 6. места в booked из наблюдённого статуса
        for seat in &locked {
            if !tx.try_transition(req.event_id, seat.seat_id, seat.status, SeatStatus::Booked).await? {
                return Err(BookingError::SeatUnavailable(vec![seat.seat_id]));
            }
        }

        // 7. заказ и позиции, затем расход промокода под id заказа
        let order = Order {
            id: Uuid::new_v4(),
            event_id: req.event_id,
            buyer: Buyer { name: req.buyer.name.trim().to_string(), email: req.buyer.email.trim().to_string() },
            user_id: req.user_id,
            promo_code: promo.as_ref().map(|p| p.code.clone()),
            subtotal,
            discount,
            total,
            status: OrderStatus::Pending,
            items,
            created_at: now,
        };
        tx.insert_order(&order).await?;

        if let Some(promo) = &promo {
            if !tx.consume_promo(&promo.code, order.id).await? {
                return Err(BookingError::PromoInvalid);
            }
        }

        // 8. холды выкупленных мест больше не нужны
        tx.delete_holds_for_seats(req.event_id, &seat_ids).await?;

        // 9. фиксация
        tx.commit().await?;

        info!(
            "🎟️ Order {} for event {}: {} seats, total {:.2}",
            order.id,
            order.event_id,
            order.items.len(),
            order.total
        );

        if let Some(notifier) = &self.notifier {
            let notifier = notifier.clone();
            let order = order.clone();
            tokio::spawn(async move {
                if let Err(e) = notifier.notify(&order).await {
                    warn!("Order {} confirmation not delivered: {}", order.id, e);
                }
            });
        }

        Ok(order)
    }

    pub async fn order(&self, order_id: Uuid) -> Result<Order, BookingError> {
        let mut tx = self.store.begin().await?;
        tx.order(order_id).await?.ok_or(BookingError::NotFound)
    }

    /// Проверки до любых изменений. Возвращает отсортированные id мест.
    fn validate(&self, req: &FinalizeRequest) -> Result<Vec<i64>, BookingError> {
        if req.event_id <= 0 {
            return Err(BookingError::BadPayload("event_id must be positive".into()));
        }
        if req.seat_ids.is_empty() {
            return Err(BookingError::BadPayload("seat_ids must not be empty".into()));
        }
        if let Some(bad) = req.seat_ids.iter().find(|&&id| id <= 0) {
            return Err(BookingError::BadPayload(format!("invalid seat id {bad}")));
        }

        let mut seat_ids = req.seat_ids.clone();
        seat_ids.sort_unstable();
        seat_ids.dedup();
        if seat_ids.len() != req.seat_ids.len() {
            return Err(BookingError::BadPayload("seat_ids contain duplicates".into()));
        }

        req.buyer
            .validate()
            .map_err(|e| BookingError::BadPayload(e.to_string()))?;
        if req.buyer.name.trim().is_empty() {
            return Err(BookingError::BadPayload("buyer name must not be blank".into()));
        }

        let has_token = req.holder_token.as_deref().is_some_and(|t| !t.trim().is_empty());
        if self.policy == BookingPolicy::HoldRequired && !has_token {
            return Err(BookingError::BadPayload("user_token is required".into()));
        }

        Ok(seat_ids)
    }
}

fn unit_price(prices: &HashMap<String, f64>, zone: &str) -> f64 {
    prices.get(zone).copied().unwrap_or_default()
}
