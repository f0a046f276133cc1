use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::BookingError;
use crate::models::PromoQuote;
use crate::services::Clock;
use crate::store::SeatStore;

/// Проверка промокодов. Только чтение: счётчик использований меняет
/// финализатор заказа в своей транзакции.
pub struct PromoValidator {
    store: Arc<dyn SeatStore>,
    clock: Arc<dyn Clock>,
}

impl PromoValidator {
    pub fn new(store: Arc<dyn SeatStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn validate(&self, code: &str) -> Result<Option<PromoQuote>, BookingError> {
        self.validate_at(code, self.clock.now()).await
    }

    /// `None`, если кода нет, окно действия закрыто или лимит исчерпан.
    pub async fn validate_at(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PromoQuote>, BookingError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(BookingError::CodeRequired);
        }

        let mut tx = self.store.begin().await?;
        let promo = tx.promo(code, false).await?;

        Ok(promo.filter(|p| p.is_valid_at(now)).map(PromoQuote::from))
    }
}
