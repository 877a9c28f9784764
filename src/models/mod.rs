pub mod booking;
pub mod category;
pub mod layout;
pub mod seat;

pub use booking::{Booking, BookingStatus};
pub use category::{CategoryDef, SeatCategory};
pub use layout::SeatLayout;
pub use seat::{EventSeat, SeatStatus};
