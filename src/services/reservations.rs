//! reservations.rs
//!
//! Движок бронирования: единственный владелец переходов статусов мест.
//!
//! Все пять операций (построение схемы, чтение, бронирование, отмена,
//! блокировка) проходят через этот сервис. Движок валидирует вход, выполняет
//! атомарную операцию в хранилище и переводит результат в доменные ошибки;
//! гонки разрешает само хранилище, проигравший получает тот же ответ, что и
//! опоздавший покупатель.

use std::future::Future;

use tracing::{error, info, warn};

use crate::error::SeatingError;
use crate::models::{Booking, CategoryDef, EventSeat, SeatLayout};
use crate::services::layout::build_layout;
use crate::store::SeatStore;

// Extra attempts after the first, for transient storage failures only
const STORAGE_RETRY_LIMIT: u32 = 2;

pub struct ReservationEngine<S: SeatStore> {
    store: S,
}

impl<S: SeatStore> ReservationEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Materializes and persists an event's seat grid, replacing any prior
    /// grid wholesale. Fails with `LayoutLocked` once any seat is BOOKED.
    pub async fn build_layout(
        &self,
        event_id: i64,
        defs: &[CategoryDef],
    ) -> Result<SeatLayout, SeatingError> {
        let layout = build_layout(event_id, defs)?;
        with_retry(|| self.store.replace_layout(&layout)).await?;
        info!(
            event_id,
            categories = layout.categories.len(),
            seats = layout.total_seats(),
            "seat layout materialized"
        );
        Ok(layout)
    }

    /// Read-only projection for display; reads committed state only.
    pub async fn layout(&self, event_id: i64) -> Result<SeatLayout, SeatingError> {
        with_retry(|| self.store.fetch_layout(event_id)).await
    }

    /// Books the whole set or nothing. `total_amount` sums the seat prices
    /// stored at materialization time.
    pub async fn reserve_seats(
        &self,
        event_id: i64,
        user_id: i64,
        seat_ids: &[i64],
    ) -> Result<Booking, SeatingError> {
        if seat_ids.is_empty() {
            return Err(SeatingError::EmptySelection);
        }
        let mut sorted = seat_ids.to_vec();
        sorted.sort_unstable();
        if sorted.windows(2).any(|w| w[0] == w[1]) {
            return Err(SeatingError::DuplicateSelection);
        }

        let booking = with_retry(|| self.store.book_seats(event_id, user_id, seat_ids)).await?;
        info!(
            event_id,
            user_id,
            booking_id = booking.id,
            seats = booking.seat_ids.len(),
            total = booking.total_amount,
            "seats booked"
        );
        Ok(booking)
    }

    /// Cancels a booking and frees its seats. Idempotent: a second cancel of
    /// the same booking succeeds without touching anything.
    pub async fn cancel_booking(&self, booking_id: i64) -> Result<Booking, SeatingError> {
        let outcome = with_retry(|| self.store.cancel_booking(booking_id)).await?;

        if !outcome.stray_seat_ids.is_empty() {
            // Места, ушедшие другой брони, не трогаем — только фиксируем
            error!(
                booking_id,
                seats = ?outcome.stray_seat_ids,
                "invariant violation: seats of this booking are linked elsewhere, left untouched"
            );
        }

        if outcome.already_cancelled {
            info!(booking_id, "booking already cancelled, no-op");
        } else {
            info!(
                booking_id,
                freed = outcome.freed_seat_ids.len(),
                "booking cancelled"
            );
        }
        Ok(outcome.booking)
    }

    /// Admin block/unblock. Only AVAILABLE <-> BLOCKED; a BOOKED seat must be
    /// released through cancellation first.
    pub async fn set_seat_blocked(
        &self,
        event_id: i64,
        seat_id: i64,
        blocked: bool,
    ) -> Result<EventSeat, SeatingError> {
        let seat = with_retry(|| self.store.set_seat_blocked(event_id, seat_id, blocked)).await?;
        info!(event_id, seat_id, blocked, "seat block state changed");
        Ok(seat)
    }

    pub async fn booking(&self, booking_id: i64) -> Result<Booking, SeatingError> {
        with_retry(|| self.store.fetch_booking(booking_id)).await
    }

    pub async fn user_bookings(&self, user_id: i64) -> Result<Vec<Booking>, SeatingError> {
        with_retry(|| self.store.bookings_for_user(user_id)).await
    }
}

async fn with_retry<T, Fut>(mut op: impl FnMut() -> Fut) -> Result<T, SeatingError>
where
    Fut: Future<Output = Result<T, SeatingError>>,
{
    let mut attempts = 0;
    loop {
        match op().await {
            Err(e) if e.is_transient() && attempts < STORAGE_RETRY_LIMIT => {
                attempts += 1;
                warn!(attempt = attempts, error = %e, "transient storage error, retrying");
            }
            other => return other,
        }
    }
}
