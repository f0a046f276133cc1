use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub venue_id: i64,
    pub title: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub status: EventStatus,
}

impl Event {
    // Бронировать можно только запланированные события
    pub fn is_bookable(&self) -> bool {
        self.status == EventStatus::Scheduled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Scheduled,
    Cancelled,
    Finished,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Scheduled => "scheduled",
            EventStatus::Cancelled => "cancelled",
            EventStatus::Finished => "finished",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(EventStatus::Scheduled),
            "cancelled" => Ok(EventStatus::Cancelled),
            "finished" => Ok(EventStatus::Finished),
            other => Err(format!("unknown event status: {other}")),
        }
    }
}

/// Базовая цена и множитель для ценовой зоны события.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZonePrice {
    pub zone_code: String,
    pub base_price: f64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_multiplier() -> f64 {
    1.0
}

/// Данные для инициализации события: цены по зонам и доступность мест.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    pub venue_id: i64,
    pub title: Option<String>,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub prices: Vec<ZonePrice>,
}
