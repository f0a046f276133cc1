//! Хранилище доступности мест.
//!
//! Единственная точка синхронизации движка - [`SeatTx::try_transition`]:
//! условный переход статуса пары (событие, место) из ожидаемого значения
//! в новое. Любой код, меняющий статус места, обязан идти через него.
//!
//! Вся многострочная работа выполняется внутри транзакции, полученной из
//! [`SeatStore::begin`]. Транзакция, которую уронили без `commit`,
//! откатывается целиком.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Event, Hold, NewEvent, Order, Promo, SeatState, SeatStatus, ZonePrice};

pub use memory::MemorySeatStore;
pub use postgres::PgSeatStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("venue {0} not found")]
    UnknownVenue(i64),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Условие, при котором холд ещё можно удалить.
#[derive(Debug, Clone, Copy)]
pub enum HoldScope<'a> {
    /// Холд принадлежит этому владельцу
    Owner(&'a str),
    /// Холд истёк раньше указанного момента
    ExpiredBefore(DateTime<Utc>),
}

#[async_trait]
pub trait SeatStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn SeatTx>>;
}

#[async_trait]
pub trait SeatTx: Send {
    // --- каталог (данные внешних сервисов, только чтение) ---

    async fn event(&mut self, event_id: i64) -> StoreResult<Option<Event>>;

    async fn zone_prices(&mut self, event_id: i64) -> StoreResult<Vec<ZonePrice>>;

    /// Все места события, упорядоченные по ряду и номеру.
    async fn seat_map(&mut self, event_id: i64, now: DateTime<Utc>) -> StoreResult<Vec<SeatState>>;

    // --- доступность ---

    async fn seat_status(&mut self, event_id: i64, seat_id: i64) -> StoreResult<Option<SeatStatus>>;

    /// Блокирует строки доступности запрошенных мест (в порядке возрастания id)
    /// и возвращает их состояние. Неизвестные событию места в ответ не попадают.
    async fn lock_seats(
        &mut self,
        event_id: i64,
        seat_ids: &[i64],
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<SeatState>>;

    /// Compare-and-swap статуса. `false` означает конфликт: фактический статус
    /// отличается от `expected` или строки нет.
    async fn try_transition(
        &mut self,
        event_id: i64,
        seat_id: i64,
        expected: SeatStatus,
        next: SeatStatus,
    ) -> StoreResult<bool>;

    // --- холды ---

    async fn insert_hold(&mut self, hold: &Hold) -> StoreResult<()>;

    /// Продлевает только живые холды этого владельца. Возвращает число продлённых.
    async fn extend_holds(
        &mut self,
        hold_ids: &[Uuid],
        holder_token: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<u64>;

    /// Холды из списка, принадлежащие владельцу. Чтение без блокировок.
    async fn owned_holds(&mut self, hold_ids: &[Uuid], holder_token: &str) -> StoreResult<Vec<Hold>>;

    /// Истёкшие холды. Чтение без блокировок.
    async fn expired_holds(&mut self, now: DateTime<Utc>) -> StoreResult<Vec<Hold>>;

    /// Удаляет холды из списка, ещё подходящие под `scope`, и возвращает
    /// удалённые. Вызывать после [`SeatTx::lock_seats`] по тем же местам,
    /// чтобы порядок блокировок везде был "место, затем холд".
    async fn delete_holds(&mut self, hold_ids: &[Uuid], scope: HoldScope<'_>) -> StoreResult<Vec<Hold>>;

    async fn delete_holds_for_seats(&mut self, event_id: i64, seat_ids: &[i64]) -> StoreResult<u64>;

    // --- промокоды ---

    /// Поиск без учёта регистра. `lock = true` блокирует строку до конца транзакции.
    async fn promo(&mut self, code: &str, lock: bool) -> StoreResult<Option<Promo>>;

    /// Увеличивает used_count, если лимит ещё не исчерпан, и пишет запись
    /// об использовании для заказа. `false` - лимит исчерпан.
    /// Заказ `order_id` должен быть уже вставлен в этой транзакции.
    async fn consume_promo(&mut self, code: &str, order_id: Uuid) -> StoreResult<bool>;

    // --- заказы ---

    async fn insert_order(&mut self, order: &Order) -> StoreResult<()>;

    async fn order(&mut self, order_id: Uuid) -> StoreResult<Option<Order>>;

    // --- инициализация события ---

    async fn create_event(&mut self, new_event: &NewEvent) -> StoreResult<i64>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
