use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Promo {
    pub code: String,
    pub discount_pct: f64,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub max_usage: Option<i32>,
    pub used_count: i32,
}

impl Promo {
    /// Промокод действует внутри окна и пока не исчерпан лимит использований.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        let in_window = self.valid_from <= now && now <= self.valid_until;
        let has_capacity = match self.max_usage {
            Some(max) => self.used_count < max,
            None => true,
        };
        in_window && has_capacity
    }
}

/// Ответ на проверку промокода.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoQuote {
    pub code: String,
    pub discount_pct: f64,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl From<Promo> for PromoQuote {
    fn from(p: Promo) -> Self {
        PromoQuote {
            code: p.code,
            discount_pct: p.discount_pct,
            valid_from: p.valid_from,
            valid_until: p.valid_until,
        }
    }
}
