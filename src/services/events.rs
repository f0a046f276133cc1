use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

use crate::error::BookingError;
use crate::models::{NewEvent, SeatView};
use crate::services::{pricing, Clock};
use crate::store::{SeatStore, StoreError};

pub struct EventService {
    store: Arc<dyn SeatStore>,
    clock: Arc<dyn Clock>,
}

impl EventService {
    pub fn new(store: Arc<dyn SeatStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Карта мест события с ценами. `price = None`, если у зоны нет цены.
    pub async fn seat_map(&self, event_id: i64) -> Result<Vec<SeatView>, BookingError> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        if tx.event(event_id).await?.is_none() {
            return Err(BookingError::NotFound);
        }

        let prices = pricing::price_map(&tx.zone_prices(event_id).await?);
        let seats = tx.seat_map(event_id, now).await?;

        Ok(seats
            .into_iter()
            .map(|s| SeatView {
                price: prices.get(&s.zone).copied(),
                seat_id: s.seat_id,
                row: s.row,
                seat: s.seat,
                zone: s.zone,
                status: s.status,
            })
            .collect())
    }

    /// Создаёт событие, цены зон и строку доступности на каждое место площадки.
    pub async fn initialize_event(&self, new_event: NewEvent) -> Result<i64, BookingError> {
        validate_new_event(&new_event)?;

        let mut tx = self.store.begin().await?;
        let event_id = match tx.create_event(&new_event).await {
            Ok(id) => id,
            Err(StoreError::UnknownVenue(venue_id)) => {
                return Err(BookingError::BadPayload(format!("venue {venue_id} not found")))
            }
            Err(e) => return Err(e.into()),
        };
        tx.commit().await?;

        info!("🏟️ Event {} initialized for venue {}", event_id, new_event.venue_id);
        Ok(event_id)
    }
}

fn validate_new_event(new_event: &NewEvent) -> Result<(), BookingError> {
    if new_event.venue_id <= 0 {
        return Err(BookingError::BadPayload("venue_id must be positive".into()));
    }

    let mut zones = BTreeSet::new();
    for price in &new_event.prices {
        if price.zone_code.trim().is_empty() {
            return Err(BookingError::BadPayload("zone_code must not be empty".into()));
        }
        if !price.base_price.is_finite() || price.base_price < 0.0 {
            return Err(BookingError::BadPayload(format!("invalid base price for zone {}", price.zone_code)));
        }
        if !price.multiplier.is_finite() || price.multiplier <= 0.0 {
            return Err(BookingError::BadPayload(format!("invalid multiplier for zone {}", price.zone_code)));
        }
        if !zones.insert(price.zone_code.as_str()) {
            return Err(BookingError::BadPayload(format!("zone {} priced twice", price.zone_code)));
        }
    }
    Ok(())
}
