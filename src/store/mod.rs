//! Хранилище сетки мест. Единственная точка записи статусов мест и броней.
//!
//! Two backends implement the same contract: `PgSeatStore` for production and
//! `MemorySeatStore` for deterministic tests and local runs. Every mutating
//! operation is atomic over the whole requested set; partial application is
//! never observable through either backend.

pub mod memory;
pub mod postgres;

pub use memory::MemorySeatStore;
pub use postgres::PgSeatStore;

use crate::error::SeatingError;
use crate::models::{Booking, EventSeat, SeatLayout};

/// Result of a cancellation attempt.
#[derive(Debug, Clone)]
pub struct CancelOutcome {
    pub booking: Booking,
    /// True when the booking was already CANCELLED and nothing was touched
    pub already_cancelled: bool,
    /// Seats this call transitioned BOOKED -> AVAILABLE
    pub freed_seat_ids: Vec<i64>,
    /// Seats the booking references that are now linked to someone else;
    /// left untouched by the store, reported so the engine can log them
    pub stray_seat_ids: Vec<i64>,
}

#[allow(async_fn_in_trait)]
pub trait SeatStore: Send + Sync {
    /// Atomically replaces an event's grid with a freshly built layout.
    /// Fails with `LayoutLocked` if any existing seat of the event is BOOKED.
    async fn replace_layout(&self, layout: &SeatLayout) -> Result<(), SeatingError>;

    /// Read-only projection: categories by `sort_order`, seats by
    /// `(row_label, seat_number)`.
    async fn fetch_layout(&self, event_id: i64) -> Result<SeatLayout, SeatingError>;

    /// All-or-nothing AVAILABLE -> BOOKED over the whole set plus one
    /// CONFIRMED booking referencing every seat. On conflict nothing is
    /// applied and the unavailable seat ids are reported.
    async fn book_seats(
        &self,
        event_id: i64,
        user_id: i64,
        seat_ids: &[i64],
    ) -> Result<Booking, SeatingError>;

    async fn fetch_booking(&self, booking_id: i64) -> Result<Booking, SeatingError>;

    async fn bookings_for_user(&self, user_id: i64) -> Result<Vec<Booking>, SeatingError>;

    /// CONFIRMED -> CANCELLED, freeing every seat still linked to this
    /// booking. Idempotent: cancelling a CANCELLED booking reports
    /// `already_cancelled` instead of failing.
    async fn cancel_booking(&self, booking_id: i64) -> Result<CancelOutcome, SeatingError>;

    /// AVAILABLE <-> BLOCKED under the same check-and-set discipline as
    /// booking. Blocking a BOOKED seat fails with `SeatOccupied`.
    async fn set_seat_blocked(
        &self,
        event_id: i64,
        seat_id: i64,
        blocked: bool,
    ) -> Result<EventSeat, SeatingError>;
}
