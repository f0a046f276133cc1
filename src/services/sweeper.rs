use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cache::CacheService;
use crate::error::BookingError;
use crate::models::{Hold, SeatStatus};
use crate::services::Clock;
use crate::store::{HoldScope, SeatStore};

/// Итог одного цикла очистки.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub holds_removed: usize,
    pub seats_released: usize,
    pub events: Vec<i64>,
}

/// Фоновая задача, которая возвращает места с истёкшими холдами в продажу.
pub struct ExpirySweeper {
    store: Arc<dyn SeatStore>,
    clock: Arc<dyn Clock>,
    cache: CacheService,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(
        store: Arc<dyn SeatStore>,
        clock: Arc<dyn Clock>,
        cache: CacheService,
        interval: Duration,
    ) -> Self {
        Self { store, clock, cache, interval }
    }

    /// Один цикл очистки в одной транзакции.
    pub async fn sweep_once(&self) -> Result<SweepReport, BookingError> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let expired = tx.expired_holds(now).await?;
        if expired.is_empty() {
            debug!("🧹 No expired holds to sweep");
            return Ok(SweepReport::default());
        }

        let mut by_event: BTreeMap<i64, Vec<Hold>> = BTreeMap::new();
        for hold in expired {
            by_event.entry(hold.event_id).or_default().push(hold);
        }

        let mut report = SweepReport::default();
        for (event_id, holds) in by_event {
            let seat_ids: Vec<i64> = holds.iter().map(|h| h.seat_id).collect();
            let ids: Vec<Uuid> = holds.iter().map(|h| h.id).collect();

            // строки мест, затем холды; продлённые за это время холды не удалятся
            tx.lock_seats(event_id, &seat_ids, now).await?;
            let deleted = tx.delete_holds(&ids, HoldScope::ExpiredBefore(now)).await?;

            for hold in &deleted {
                if tx.try_transition(event_id, hold.seat_id, SeatStatus::Hold, SeatStatus::Available).await? {
                    report.seats_released += 1;
                } else {
                    warn!("🧹 Seat {} of event {} was not in hold, skipping", hold.seat_id, event_id);
                }
            }

            if !deleted.is_empty() {
                report.holds_removed += deleted.len();
                report.events.push(event_id);
            }
        }

        tx.commit().await?;

        for event_id in &report.events {
            self.cache.invalidate_seats(*event_id).await;
        }

        info!(
            "🧹 Sweep done: {} holds removed, {} seats released, {} events",
            report.holds_removed,
            report.seats_released,
            report.events.len()
        );
        Ok(report)
    }

    /// Крутит очистку каждые `interval`, пока не отменят `shutdown`.
    /// Ошибка цикла логируется, следующий тик пробует снова.
    pub async fn run(self, shutdown: CancellationToken) {
        info!("🧹 Expiry sweeper started, interval {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        error!("🧹 Sweep cycle failed: {}", e);
                    }
                }
            }
        }

        info!("🧹 Expiry sweeper stopped");
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
