//! Хранилище в памяти для тестов и локального запуска без БД.
//!
//! Транзакции сериализуются одним асинхронным мьютексом: транзакция работает
//! с копией состояния и публикует её при `commit`. Наблюдаемые инварианты те же,
//! что у PostgreSQL-реализации.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{HoldScope, SeatStore, SeatTx, StoreError, StoreResult};
use crate::models::{Event, EventStatus, Hold, NewEvent, Order, Promo, SeatState, SeatStatus, ZonePrice};

#[derive(Debug, Clone)]
pub struct VenueSeat {
    pub id: i64,
    pub venue_id: i64,
    pub row: i32,
    pub seat: i32,
    pub zone: String,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    venues: BTreeSet<i64>,
    venue_seats: BTreeMap<i64, VenueSeat>,
    events: BTreeMap<i64, Event>,
    prices: BTreeMap<i64, Vec<ZonePrice>>,
    availability: BTreeMap<(i64, i64), SeatStatus>,
    holds: HashMap<Uuid, Hold>,
    promos: BTreeMap<String, Promo>,
    promo_usages: Vec<(String, Uuid)>,
    orders: BTreeMap<Uuid, Order>,
    booked_items: BTreeSet<(i64, i64)>,
    next_event_id: i64,
}

impl MemoryState {
    fn live_holder(&self, event_id: i64, seat_id: i64, now: DateTime<Utc>) -> Option<String> {
        self.holds
            .values()
            .find(|h| h.event_id == event_id && h.seat_id == seat_id && h.is_live(now))
            .map(|h| h.holder_token.clone())
    }

    fn seat_state(&self, event_id: i64, seat_id: i64, now: DateTime<Utc>) -> Option<SeatState> {
        let status = *self.availability.get(&(event_id, seat_id))?;
        let seat = self.venue_seats.get(&seat_id)?;
        Some(SeatState {
            seat_id,
            row: seat.row,
            seat: seat.seat,
            zone: seat.zone.clone(),
            status,
            holder_token: self.live_holder(event_id, seat_id, now),
        })
    }
}

#[derive(Clone, Default)]
pub struct MemorySeatStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySeatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Регистрирует площадку без мест.
    pub async fn add_venue(&self, venue_id: i64) {
        self.state.lock().await.venues.insert(venue_id);
    }

    /// Регистрирует места площадки (в проде их создаёт внешний сервис).
    pub async fn add_venue_seats(&self, seats: impl IntoIterator<Item = VenueSeat>) {
        let mut state = self.state.lock().await;
        for seat in seats {
            state.venues.insert(seat.venue_id);
            state.venue_seats.insert(seat.id, seat);
        }
    }

    pub async fn add_promo(&self, promo: Promo) {
        let mut state = self.state.lock().await;
        state.promos.insert(promo.code.to_lowercase(), promo);
    }

    pub async fn set_event_status(&self, event_id: i64, status: EventStatus) {
        let mut state = self.state.lock().await;
        if let Some(event) = state.events.get_mut(&event_id) {
            event.status = status;
        }
    }

    pub async fn hold_count(&self) -> usize {
        self.state.lock().await.holds.len()
    }

    pub async fn promo_usages(&self, code: &str) -> Vec<Uuid> {
        let state = self.state.lock().await;
        state
            .promo_usages
            .iter()
            .filter(|(c, _)| c.eq_ignore_ascii_case(code))
            .map(|(_, order_id)| *order_id)
            .collect()
    }
}

#[async_trait]
impl SeatStore for MemorySeatStore {
    async fn begin(&self) -> StoreResult<Box<dyn SeatTx>> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemorySeatTx { guard, work }))
    }
}

pub struct MemorySeatTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

#[async_trait]
impl SeatTx for MemorySeatTx {
    async fn event(&mut self, event_id: i64) -> StoreResult<Option<Event>> {
        Ok(self.work.events.get(&event_id).cloned())
    }

    async fn zone_prices(&mut self, event_id: i64) -> StoreResult<Vec<ZonePrice>> {
        Ok(self.work.prices.get(&event_id).cloned().unwrap_or_default())
    }

    async fn seat_map(&mut self, event_id: i64, now: DateTime<Utc>) -> StoreResult<Vec<SeatState>> {
        let mut seats: Vec<SeatState> = self
            .work
            .availability
            .range((event_id, i64::MIN)..=(event_id, i64::MAX))
            .filter_map(|(&(e, s), _)| self.work.seat_state(e, s, now))
            .collect();
        seats.sort_by_key(|s| (s.row, s.seat));
        Ok(seats)
    }

    async fn seat_status(&mut self, event_id: i64, seat_id: i64) -> StoreResult<Option<SeatStatus>> {
        Ok(self.work.availability.get(&(event_id, seat_id)).copied())
    }

    async fn lock_seats(
        &mut self,
        event_id: i64,
        seat_ids: &[i64],
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<SeatState>> {
        let wanted: BTreeSet<i64> = seat_ids.iter().copied().collect();
        Ok(wanted
            .into_iter()
            .filter_map(|seat_id| self.work.seat_state(event_id, seat_id, now))
            .collect())
    }

    async fn try_transition(
        &mut self,
        event_id: i64,
        seat_id: i64,
        expected: SeatStatus,
        next: SeatStatus,
    ) -> StoreResult<bool> {
        match self.work.availability.get_mut(&(event_id, seat_id)) {
            Some(status) if *status == expected => {
                *status = next;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_hold(&mut self, hold: &Hold) -> StoreResult<()> {
        let taken = self
            .work
            .holds
            .values()
            .any(|h| h.event_id == hold.event_id && h.seat_id == hold.seat_id);
        if taken || self.work.holds.contains_key(&hold.id) {
            return Err(StoreError::Corrupt(format!(
                "duplicate hold for event {} seat {}",
                hold.event_id, hold.seat_id
            )));
        }
        self.work.holds.insert(hold.id, hold.clone());
        Ok(())
    }

    async fn extend_holds(
        &mut self,
        hold_ids: &[Uuid],
        holder_token: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut extended = 0;
        for id in hold_ids {
            if let Some(hold) = self.work.holds.get_mut(id) {
                if hold.holder_token == holder_token && hold.is_live(now) {
                    hold.expires_at = expires_at;
                    extended += 1;
                }
            }
        }
        Ok(extended)
    }

    async fn owned_holds(&mut self, hold_ids: &[Uuid], holder_token: &str) -> StoreResult<Vec<Hold>> {
        let mut holds: Vec<Hold> = hold_ids
            .iter()
            .filter_map(|id| self.work.holds.get(id))
            .filter(|h| h.holder_token == holder_token)
            .cloned()
            .collect();
        holds.sort_by_key(|h| (h.event_id, h.seat_id));
        holds.dedup_by_key(|h| h.id);
        Ok(holds)
    }

    async fn expired_holds(&mut self, now: DateTime<Utc>) -> StoreResult<Vec<Hold>> {
        let mut holds: Vec<Hold> = self
            .work
            .holds
            .values()
            .filter(|h| h.expires_at < now)
            .cloned()
            .collect();
        holds.sort_by_key(|h| (h.event_id, h.seat_id));
        Ok(holds)
    }

    async fn delete_holds(&mut self, hold_ids: &[Uuid], scope: HoldScope<'_>) -> StoreResult<Vec<Hold>> {
        let mut deleted = Vec::new();
        for id in hold_ids {
            let matches = match (self.work.holds.get(id), scope) {
                (Some(h), HoldScope::Owner(token)) => h.holder_token == token,
                (Some(h), HoldScope::ExpiredBefore(cutoff)) => h.expires_at < cutoff,
                (None, _) => false,
            };
            if matches {
                if let Some(hold) = self.work.holds.remove(id) {
                    deleted.push(hold);
                }
            }
        }
        Ok(deleted)
    }

    async fn delete_holds_for_seats(&mut self, event_id: i64, seat_ids: &[i64]) -> StoreResult<u64> {
        let before = self.work.holds.len();
        self.work
            .holds
            .retain(|_, h| !(h.event_id == event_id && seat_ids.contains(&h.seat_id)));
        Ok((before - self.work.holds.len()) as u64)
    }

    async fn promo(&mut self, code: &str, _lock: bool) -> StoreResult<Option<Promo>> {
        Ok(self.work.promos.get(&code.to_lowercase()).cloned())
    }

    async fn consume_promo(&mut self, code: &str, order_id: Uuid) -> StoreResult<bool> {
        if !self.work.orders.contains_key(&order_id) {
            return Err(StoreError::Corrupt(format!("promo usage for unknown order {order_id}")));
        }
        let Some(promo) = self.work.promos.get_mut(&code.to_lowercase()) else {
            return Ok(false);
        };
        if promo.max_usage.is_some_and(|max| promo.used_count >= max) {
            return Ok(false);
        }
        promo.used_count += 1;
        let canonical = promo.code.clone();
        self.work.promo_usages.push((canonical, order_id));
        Ok(true)
    }

    async fn insert_order(&mut self, order: &Order) -> StoreResult<()> {
        // тот же уникальный ключ (event_id, seat_id), что и у order_items в БД
        for item in &order.items {
            if !self.work.booked_items.insert((order.event_id, item.seat_id)) {
                return Err(StoreError::Corrupt(format!(
                    "seat {} of event {} already sold",
                    item.seat_id, order.event_id
                )));
            }
        }
        self.work.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn order(&mut self, order_id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.work.orders.get(&order_id).cloned())
    }

    async fn create_event(&mut self, new_event: &NewEvent) -> StoreResult<i64> {
        if !self.work.venues.contains(&new_event.venue_id) {
            return Err(StoreError::UnknownVenue(new_event.venue_id));
        }
        let seat_ids: Vec<i64> = self
            .work
            .venue_seats
            .values()
            .filter(|s| s.venue_id == new_event.venue_id)
            .map(|s| s.id)
            .collect();

        self.work.next_event_id += 1;
        let event_id = self.work.next_event_id;
        self.work.events.insert(
            event_id,
            Event {
                id: event_id,
                venue_id: new_event.venue_id,
                title: new_event.title.clone(),
                starts_at: new_event.starts_at,
                status: EventStatus::Scheduled,
            },
        );

        let mut prices: BTreeMap<String, ZonePrice> = BTreeMap::new();
        for price in &new_event.prices {
            prices.insert(price.zone_code.clone(), price.clone());
        }
        self.work.prices.insert(event_id, prices.into_values().collect());

        for seat_id in seat_ids {
            self.work.availability.insert((event_id, seat_id), SeatStatus::Available);
        }

        Ok(event_id)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemorySeatTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}
