use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Статус пары (событие, место). Меняется только через compare-and-swap стора.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatStatus {
    Available,
    Hold,
    Booked,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Available => "available",
            SeatStatus::Hold => "hold",
            SeatStatus::Booked => "booked",
        }
    }
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(SeatStatus::Available),
            "hold" => Ok(SeatStatus::Hold),
            "booked" => Ok(SeatStatus::Booked),
            other => Err(format!("unknown seat status: {other}")),
        }
    }
}

/// Место площадки вместе с его текущим статусом на событии.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatState {
    pub seat_id: i64,
    pub row: i32,
    pub seat: i32,
    pub zone: String,
    pub status: SeatStatus,
    /// Владелец живого холда, если место удерживается и холд не истёк
    pub holder_token: Option<String>,
}

/// Строка карты мест, отдаваемая покупателю.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatView {
    pub seat_id: i64,
    pub row: i32,
    pub seat: i32,
    pub zone: String,
    pub status: SeatStatus,
    pub price: Option<f64>,
}
