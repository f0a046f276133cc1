use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{HoldScope, SeatStore, SeatTx, StoreError, StoreResult};
use crate::models::{
    Buyer, Event, Hold, NewEvent, Order, OrderItem, Promo, SeatState, SeatStatus, ZonePrice,
};

/// Хранилище поверх PostgreSQL. Compare-and-swap - это условный UPDATE,
/// который берёт блокировку строки и перепроверяет статус.
#[derive(Clone)]
pub struct PgSeatStore {
    pool: PgPool,
}

impl PgSeatStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SeatStore for PgSeatStore {
    async fn begin(&self) -> StoreResult<Box<dyn SeatTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgSeatTx { tx }))
    }
}

pub struct PgSeatTx {
    tx: Transaction<'static, Postgres>,
}

// Структуры для результата из БД

#[derive(FromRow)]
struct EventRow {
    id: i64,
    venue_id: i64,
    title: Option<String>,
    starts_at: DateTime<Utc>,
    status: String,
}

#[derive(FromRow)]
struct SeatRow {
    seat_id: i64,
    row_number: i32,
    seat_number: i32,
    zone_code: String,
    status: String,
    user_token: Option<String>,
}

impl SeatRow {
    fn into_state(self) -> StoreResult<SeatState> {
        Ok(SeatState {
            seat_id: self.seat_id,
            row: self.row_number,
            seat: self.seat_number,
            zone: self.zone_code,
            status: self.status.parse().map_err(StoreError::Corrupt)?,
            holder_token: self.user_token,
        })
    }
}

#[derive(FromRow)]
struct HoldRow {
    id: Uuid,
    event_id: i64,
    seat_id: i64,
    user_token: String,
    expires_at: DateTime<Utc>,
}

impl From<HoldRow> for Hold {
    fn from(r: HoldRow) -> Self {
        Hold {
            id: r.id,
            event_id: r.event_id,
            seat_id: r.seat_id,
            holder_token: r.user_token,
            expires_at: r.expires_at,
        }
    }
}

#[derive(FromRow)]
struct PromoRow {
    code: String,
    discount_pct: f64,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
    max_usage: Option<i32>,
    used_count: i32,
}

#[derive(FromRow)]
struct OrderRow {
    id: Uuid,
    event_id: i64,
    user_id: Option<i64>,
    buyer_name: String,
    buyer_email: String,
    promo_code: Option<String>,
    subtotal: f64,
    discount: f64,
    total: f64,
    status: String,
    created_at: DateTime<Utc>,
}

const SEAT_COLUMNS: &str = r#"
    SELECT sa.seat_id, vs.row_number, vs.seat_number, vs.zone_code, sa.status, h.user_token
    FROM seat_availability sa
    JOIN venue_seats vs ON vs.id = sa.seat_id
    LEFT JOIN holds h
           ON h.event_id = sa.event_id AND h.seat_id = sa.seat_id AND h.expires_at > $2
"#;

const HOLD_COLUMNS: &str = "id, event_id, seat_id, user_token, expires_at";

#[async_trait]
impl SeatTx for PgSeatTx {
    async fn event(&mut self, event_id: i64) -> StoreResult<Option<Event>> {
        let row: Option<EventRow> = sqlx::query_as(
            "SELECT id, venue_id, title, starts_at, status FROM events WHERE id = $1"
        )
        .bind(event_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(|r| {
            Ok(Event {
                id: r.id,
                venue_id: r.venue_id,
                title: r.title,
                starts_at: r.starts_at,
                status: r.status.parse().map_err(StoreError::Corrupt)?,
            })
        })
        .transpose()
    }

    async fn zone_prices(&mut self, event_id: i64) -> StoreResult<Vec<ZonePrice>> {
        let rows: Vec<(String, f64, f64)> = sqlx::query_as(
            "SELECT zone_code, base_price::float8, multiplier::float8
             FROM event_prices WHERE event_id = $1 ORDER BY zone_code"
        )
        .bind(event_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(zone_code, base_price, multiplier)| ZonePrice { zone_code, base_price, multiplier })
            .collect())
    }

    async fn seat_map(&mut self, event_id: i64, now: DateTime<Utc>) -> StoreResult<Vec<SeatState>> {
        let sql = format!("{SEAT_COLUMNS} WHERE sa.event_id = $1 ORDER BY vs.row_number, vs.seat_number");
        let rows: Vec<SeatRow> = sqlx::query_as(&sql)
            .bind(event_id)
            .bind(now)
            .fetch_all(&mut *self.tx)
            .await?;

        rows.into_iter().map(SeatRow::into_state).collect()
    }

    async fn seat_status(&mut self, event_id: i64, seat_id: i64) -> StoreResult<Option<SeatStatus>> {
        let status: Option<String> = sqlx::query_scalar(
            "SELECT status FROM seat_availability WHERE event_id = $1 AND seat_id = $2"
        )
        .bind(event_id)
        .bind(seat_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        status.map(|s| s.parse().map_err(StoreError::Corrupt)).transpose()
    }

    async fn lock_seats(
        &mut self,
        event_id: i64,
        seat_ids: &[i64],
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<SeatState>> {
        // FOR UPDATE OF sa: блокируем только строки доступности, в порядке seat_id
        let sql = format!(
            "{SEAT_COLUMNS} WHERE sa.event_id = $1 AND sa.seat_id = ANY($3) ORDER BY sa.seat_id FOR UPDATE OF sa"
        );
        let rows: Vec<SeatRow> = sqlx::query_as(&sql)
            .bind(event_id)
            .bind(now)
            .bind(seat_ids)
            .fetch_all(&mut *self.tx)
            .await?;

        rows.into_iter().map(SeatRow::into_state).collect()
    }

    async fn try_transition(
        &mut self,
        event_id: i64,
        seat_id: i64,
        expected: SeatStatus,
        next: SeatStatus,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE seat_availability SET status = $4, updated_at = NOW()
             WHERE event_id = $1 AND seat_id = $2 AND status = $3"
        )
        .bind(event_id)
        .bind(seat_id)
        .bind(expected.as_str())
        .bind(next.as_str())
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_hold(&mut self, hold: &Hold) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO holds (id, event_id, seat_id, user_token, expires_at) VALUES ($1, $2, $3, $4, $5)"
        )
        .bind(hold.id)
        .bind(hold.event_id)
        .bind(hold.seat_id)
        .bind(&hold.holder_token)
        .bind(hold.expires_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn extend_holds(
        &mut self,
        hold_ids: &[Uuid],
        holder_token: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE holds SET expires_at = $4
             WHERE id = ANY($1) AND user_token = $2 AND expires_at > $3"
        )
        .bind(hold_ids)
        .bind(holder_token)
        .bind(now)
        .bind(expires_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn owned_holds(&mut self, hold_ids: &[Uuid], holder_token: &str) -> StoreResult<Vec<Hold>> {
        let sql = format!(
            "SELECT {HOLD_COLUMNS} FROM holds WHERE id = ANY($1) AND user_token = $2 ORDER BY event_id, seat_id"
        );
        let rows: Vec<HoldRow> = sqlx::query_as(&sql)
            .bind(hold_ids)
            .bind(holder_token)
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(rows.into_iter().map(Hold::from).collect())
    }

    async fn expired_holds(&mut self, now: DateTime<Utc>) -> StoreResult<Vec<Hold>> {
        let sql = format!(
            "SELECT {HOLD_COLUMNS} FROM holds WHERE expires_at < $1 ORDER BY event_id, seat_id"
        );
        let rows: Vec<HoldRow> = sqlx::query_as(&sql)
            .bind(now)
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(rows.into_iter().map(Hold::from).collect())
    }

    async fn delete_holds(&mut self, hold_ids: &[Uuid], scope: HoldScope<'_>) -> StoreResult<Vec<Hold>> {
        let rows: Vec<HoldRow> = match scope {
            HoldScope::Owner(token) => {
                let sql = format!(
                    "DELETE FROM holds WHERE id = ANY($1) AND user_token = $2 RETURNING {HOLD_COLUMNS}"
                );
                sqlx::query_as(&sql)
                    .bind(hold_ids)
                    .bind(token)
                    .fetch_all(&mut *self.tx)
                    .await?
            }
            HoldScope::ExpiredBefore(cutoff) => {
                let sql = format!(
                    "DELETE FROM holds WHERE id = ANY($1) AND expires_at < $2 RETURNING {HOLD_COLUMNS}"
                );
                sqlx::query_as(&sql)
                    .bind(hold_ids)
                    .bind(cutoff)
                    .fetch_all(&mut *self.tx)
                    .await?
            }
        };

        Ok(rows.into_iter().map(Hold::from).collect())
    }

    async fn delete_holds_for_seats(&mut self, event_id: i64, seat_ids: &[i64]) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM holds WHERE event_id = $1 AND seat_id = ANY($2)")
            .bind(event_id)
            .bind(seat_ids)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn promo(&mut self, code: &str, lock: bool) -> StoreResult<Option<Promo>> {
        let mut sql = String::from(
            "SELECT code, discount_pct::float8 AS discount_pct, valid_from, valid_until, max_usage, used_count
             FROM promos WHERE LOWER(code) = LOWER($1)"
        );
        if lock {
            sql.push_str(" FOR UPDATE");
        }

        let row: Option<PromoRow> = sqlx::query_as(&sql)
            .bind(code)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.map(|r| Promo {
            code: r.code,
            discount_pct: r.discount_pct,
            valid_from: r.valid_from,
            valid_until: r.valid_until,
            max_usage: r.max_usage,
            used_count: r.used_count,
        }))
    }

    async fn consume_promo(&mut self, code: &str, order_id: Uuid) -> StoreResult<bool> {
        let updated = sqlx::query(
            "UPDATE promos SET used_count = used_count + 1
             WHERE code = $1 AND (max_usage IS NULL OR used_count < max_usage)"
        )
        .bind(code)
        .execute(&mut *self.tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query("INSERT INTO promo_usages (code, order_id) VALUES ($1, $2)")
            .bind(code)
            .bind(order_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(true)
    }

    async fn insert_order(&mut self, order: &Order) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO orders (id, event_id, user_id, buyer_name, buyer_email, promo_code,
                                 subtotal, discount, total, status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7::numeric, $8::numeric, $9::numeric, $10, $11)"
        )
        .bind(order.id)
        .bind(order.event_id)
        .bind(order.user_id)
        .bind(&order.buyer.name)
        .bind(&order.buyer.email)
        .bind(&order.promo_code)
        .bind(order.subtotal)
        .bind(order.discount)
        .bind(order.total)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .execute(&mut *self.tx)
        .await?;

        // переносим позиции заказа
        for item in &order.items {
            sqlx::query(
                "INSERT INTO order_items (order_id, event_id, seat_id, price) VALUES ($1, $2, $3, $4::numeric)"
            )
            .bind(order.id)
            .bind(order.event_id)
            .bind(item.seat_id)
            .bind(item.price)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn order(&mut self, order_id: Uuid) -> StoreResult<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(
            "SELECT id, event_id, user_id, buyer_name, buyer_email, promo_code,
                    subtotal::float8 AS subtotal, discount::float8 AS discount, total::float8 AS total,
                    status, created_at
             FROM orders WHERE id = $1"
        )
        .bind(order_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items: Vec<(i64, f64)> = sqlx::query_as(
            "SELECT seat_id, price::float8 FROM order_items WHERE order_id = $1 ORDER BY seat_id"
        )
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(Some(Order {
            id: row.id,
            event_id: row.event_id,
            buyer: Buyer { name: row.buyer_name, email: row.buyer_email },
            user_id: row.user_id,
            promo_code: row.promo_code,
            subtotal: row.subtotal,
            discount: row.discount,
            total: row.total,
            status: row.status.parse().map_err(StoreError::Corrupt)?,
            items: items
                .into_iter()
                .map(|(seat_id, price)| OrderItem { seat_id, price })
                .collect(),
            created_at: row.created_at,
        }))
    }

    async fn create_event(&mut self, new_event: &NewEvent) -> StoreResult<i64> {
        let venue_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM venues WHERE id = $1)")
            .bind(new_event.venue_id)
            .fetch_one(&mut *self.tx)
            .await?;
        if !venue_exists {
            return Err(StoreError::UnknownVenue(new_event.venue_id));
        }

        let event_id: i64 = sqlx::query_scalar(
            "INSERT INTO events (venue_id, title, starts_at, status) VALUES ($1, $2, $3, 'scheduled') RETURNING id"
        )
        .bind(new_event.venue_id)
        .bind(&new_event.title)
        .bind(new_event.starts_at)
        .fetch_one(&mut *self.tx)
        .await?;

        // цены по зонам
        for price in &new_event.prices {
            sqlx::query(
                "INSERT INTO event_prices (event_id, zone_code, base_price, multiplier)
                 VALUES ($1, $2, $3::numeric, $4::numeric)
                 ON CONFLICT (event_id, zone_code) DO UPDATE
                 SET base_price = EXCLUDED.base_price, multiplier = EXCLUDED.multiplier"
            )
            .bind(event_id)
            .bind(&price.zone_code)
            .bind(price.base_price)
            .bind(price.multiplier)
            .execute(&mut *self.tx)
            .await?;
        }

        // инициализируем доступность: одна строка на каждое место площадки
        sqlx::query(
            "INSERT INTO seat_availability (event_id, seat_id, status)
             SELECT $1, vs.id, 'available' FROM venue_seats vs WHERE vs.venue_id = $2
             ON CONFLICT DO NOTHING"
        )
        .bind(event_id)
        .bind(new_event.venue_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(event_id)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
