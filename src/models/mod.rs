pub mod event;
pub mod seat;
pub mod hold;
pub mod promo;
pub mod order;
pub mod user;

pub use event::{Event, EventStatus, NewEvent, ZonePrice};
pub use seat::{SeatState, SeatStatus, SeatView};
pub use hold::Hold;
pub use promo::{Promo, PromoQuote};
pub use order::{Buyer, Order, OrderItem, OrderStatus};
pub use user::User;
