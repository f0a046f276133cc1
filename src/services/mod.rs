pub mod clock;
pub mod events;
pub mod holds;
pub mod notify;
pub mod orders;
pub mod pricing;
pub mod promo;
pub mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
