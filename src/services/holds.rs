use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::BookingError;
use crate::models::{Hold, SeatStatus};
use crate::services::Clock;
use crate::store::{HoldScope, SeatStore, StoreError};

/// Результат успешного запроса на удержание мест.
#[derive(Debug, Clone, Serialize)]
pub struct HoldGrant {
    pub hold_ids: Vec<Uuid>,
    pub seat_ids: Vec<i64>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReleaseOutcome {
    pub released: usize,
    pub events: Vec<i64>,
}

pub struct HoldManager {
    store: Arc<dyn SeatStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl HoldManager {
    pub fn new(store: Arc<dyn SeatStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { store, clock, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Пытается удержать каждое место независимо. Занятые и неизвестные
    /// события места пропускаются без ошибки.
    pub async fn create_holds(
        &self,
        event_id: i64,
        seat_ids: &[i64],
        holder_token: &str,
    ) -> Result<HoldGrant, BookingError> {
        if event_id <= 0 {
            return Err(BookingError::BadPayload("event_id must be positive".into()));
        }
        validate_token(holder_token)?;
        let seat_ids = normalize_seat_ids(seat_ids)?;

        let now = self.clock.now();
        let expires_at = now + self.ttl;

        let mut tx = self.store.begin().await?;

        let event = tx.event(event_id).await?.ok_or(BookingError::UnknownEvent(event_id))?;
        if !event.is_bookable() {
            return Err(BookingError::EventNotBookable(event_id));
        }

        let locked = tx.lock_seats(event_id, &seat_ids, now).await?;

        let mut grant = HoldGrant { hold_ids: Vec::new(), seat_ids: Vec::new(), expires_at };
        for seat in locked {
            if seat.status != SeatStatus::Available {
                continue;
            }
            if !tx.try_transition(event_id, seat.seat_id, SeatStatus::Available, SeatStatus::Hold).await? {
                continue;
            }

            let hold = Hold {
                id: Uuid::new_v4(),
                event_id,
                seat_id: seat.seat_id,
                holder_token: holder_token.to_string(),
                expires_at,
            };
            tx.insert_hold(&hold).await?;
            grant.hold_ids.push(hold.id);
            grant.seat_ids.push(hold.seat_id);
        }

        tx.commit().await?;

        debug!(
            "Holds for event {}: {} of {} seats granted",
            event_id,
            grant.seat_ids.len(),
            seat_ids.len()
        );
        Ok(grant)
    }

    /// Продлевает живые холды владельца до now + ttl. Чужие и истёкшие
    /// холды не трогаются.
    pub async fn renew_holds(
        &self,
        hold_ids: &[Uuid],
        holder_token: &str,
    ) -> Result<DateTime<Utc>, BookingError> {
        validate_token(holder_token)?;
        if hold_ids.is_empty() {
            return Err(BookingError::BadPayload("hold_ids must not be empty".into()));
        }

        let now = self.clock.now();
        let expires_at = now + self.ttl;

        let mut tx = self.store.begin().await?;
        let extended = tx.extend_holds(hold_ids, holder_token, now, expires_at).await?;
        tx.commit().await?;

        debug!("Renewed {} of {} holds", extended, hold_ids.len());
        Ok(expires_at)
    }

    /// Досрочно отпускает холды владельца: место снова available, холд удалён.
    pub async fn release_holds(
        &self,
        hold_ids: &[Uuid],
        holder_token: &str,
    ) -> Result<ReleaseOutcome, BookingError> {
        validate_token(holder_token)?;
        if hold_ids.is_empty() {
            return Err(BookingError::BadPayload("hold_ids must not be empty".into()));
        }

        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let mut by_event: BTreeMap<i64, Vec<Hold>> = BTreeMap::new();
        for hold in tx.owned_holds(hold_ids, holder_token).await? {
            by_event.entry(hold.event_id).or_default().push(hold);
        }

        let mut outcome = ReleaseOutcome::default();
        for (event_id, holds) in by_event {
            let seat_ids: Vec<i64> = holds.iter().map(|h| h.seat_id).collect();
            let ids: Vec<Uuid> = holds.iter().map(|h| h.id).collect();

            // сначала строки мест, затем холды
            tx.lock_seats(event_id, &seat_ids, now).await?;
            let deleted = tx.delete_holds(&ids, HoldScope::Owner(holder_token)).await?;

            for hold in &deleted {
                if !tx.try_transition(event_id, hold.seat_id, SeatStatus::Hold, SeatStatus::Available).await? {
                    return Err(StoreError::Corrupt(format!(
                        "seat {} of event {} had a hold row but was not in hold",
                        hold.seat_id, event_id
                    ))
                    .into());
                }
            }

            if !deleted.is_empty() {
                outcome.released += deleted.len();
                outcome.events.push(event_id);
            }
        }

        tx.commit().await?;

        if outcome.released > 0 {
            info!("🔓 Released {} holds across {} events", outcome.released, outcome.events.len());
        }
        Ok(outcome)
    }
}

fn validate_token(holder_token: &str) -> Result<(), BookingError> {
    if holder_token.trim().is_empty() {
        return Err(BookingError::BadPayload("user_token must not be empty".into()));
    }
    Ok(())
}

/// Сортирует и убирает повторы. Пустой список и неположительные id отклоняются.
fn normalize_seat_ids(seat_ids: &[i64]) -> Result<Vec<i64>, BookingError> {
    if seat_ids.is_empty() {
        return Err(BookingError::BadPayload("seat_ids must not be empty".into()));
    }
    if let Some(bad) = seat_ids.iter().find(|&&id| id <= 0) {
        return Err(BookingError::BadPayload(format!("invalid seat id {bad}")));
    }

    let mut ids = seat_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_seats_collapse_in_order() {
        assert_eq!(normalize_seat_ids(&[5, 2, 5, 3]).unwrap(), vec![2, 3, 5]);
    }

    #[test]
    fn rejects_empty_and_non_positive_seats() {
        assert!(matches!(normalize_seat_ids(&[]), Err(BookingError::BadPayload(_))));
        assert!(matches!(normalize_seat_ids(&[1, 0]), Err(BookingError::BadPayload(_))));
        assert!(matches!(normalize_seat_ids(&[-4]), Err(BookingError::BadPayload(_))));
    }

    #[test]
    fn blank_token_is_bad_payload() {
        assert!(validate_token("  ").is_err());
        assert!(validate_token("abc").is_ok());
    }
}
