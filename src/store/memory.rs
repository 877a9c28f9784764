//! In-memory хранилище: один мьютекс на сетку события.
//!
//! Holding the event's mutex for the length of one check-and-apply step gives
//! the same atomicity the Postgres backend gets from a transaction. Grids of
//! different events never share a lock, so contention stays partitioned per
//! event.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::error::SeatingError;
use crate::models::{Booking, BookingStatus, EventSeat, SeatCategory, SeatLayout, SeatStatus};
use crate::store::{CancelOutcome, SeatStore};

#[derive(Default)]
struct EventGrid {
    categories: Vec<SeatCategory>,
    seats: BTreeMap<i64, EventSeat>,
    bookings: HashMap<i64, Booking>,
}

#[derive(Default)]
pub struct MemorySeatStore {
    grids: RwLock<HashMap<i64, Arc<Mutex<EventGrid>>>>,
    // booking id -> event id, so cancellation can find the right grid
    booking_index: RwLock<HashMap<i64, i64>>,
    next_booking_id: AtomicI64,
}

impl MemorySeatStore {
    pub fn new() -> Self {
        Self {
            grids: RwLock::new(HashMap::new()),
            booking_index: RwLock::new(HashMap::new()),
            next_booking_id: AtomicI64::new(1),
        }
    }

    async fn grid(&self, event_id: i64) -> Option<Arc<Mutex<EventGrid>>> {
        self.grids.read().await.get(&event_id).cloned()
    }

    async fn grid_or_create(&self, event_id: i64) -> Arc<Mutex<EventGrid>> {
        let mut grids = self.grids.write().await;
        grids.entry(event_id).or_default().clone()
    }
}

impl SeatStore for MemorySeatStore {
    async fn replace_layout(&self, layout: &SeatLayout) -> Result<(), SeatingError> {
        let grid = self.grid_or_create(layout.event_id).await;
        let mut grid = grid.lock().await;

        if grid
            .seats
            .values()
            .any(|s| s.status == SeatStatus::Booked)
        {
            return Err(SeatingError::LayoutLocked {
                event_id: layout.event_id,
            });
        }

        grid.categories = layout.categories.clone();
        grid.seats = layout.seats.iter().map(|s| (s.id, s.clone())).collect();
        Ok(())
    }

    async fn fetch_layout(&self, event_id: i64) -> Result<SeatLayout, SeatingError> {
        let grid = self
            .grid(event_id)
            .await
            .ok_or(SeatingError::LayoutNotFound { event_id })?;
        let grid = grid.lock().await;

        if grid.categories.is_empty() {
            return Err(SeatingError::LayoutNotFound { event_id });
        }

        let mut categories = grid.categories.clone();
        categories.sort_by_key(|c| c.sort_order);

        let mut seats: Vec<EventSeat> = grid.seats.values().cloned().collect();
        seats.sort_by(|a, b| {
            a.row_label
                .cmp(&b.row_label)
                .then(a.seat_number.cmp(&b.seat_number))
        });

        Ok(SeatLayout {
            event_id,
            categories,
            seats,
        })
    }

    async fn book_seats(
        &self,
        event_id: i64,
        user_id: i64,
        seat_ids: &[i64],
    ) -> Result<Booking, SeatingError> {
        let grid = self
            .grid(event_id)
            .await
            .ok_or(SeatingError::LayoutNotFound { event_id })?;
        let mut grid = grid.lock().await;

        let unknown: Vec<i64> = seat_ids
            .iter()
            .copied()
            .filter(|id| !grid.seats.contains_key(id))
            .collect();
        if !unknown.is_empty() {
            return Err(SeatingError::UnknownSeats {
                event_id,
                seat_ids: unknown,
            });
        }

        // Проверяем весь набор до первого изменения: либо всё, либо ничего
        let mut conflicts: Vec<i64> = seat_ids
            .iter()
            .copied()
            .filter(|id| grid.seats[id].status != SeatStatus::Available)
            .collect();
        if !conflicts.is_empty() {
            conflicts.sort_unstable();
            return Err(SeatingError::SeatsUnavailable {
                seat_ids: conflicts,
            });
        }

        let booking_id = self.next_booking_id.fetch_add(1, Ordering::Relaxed);
        let mut total_amount = 0.0;
        for id in seat_ids {
            if let Some(seat) = grid.seats.get_mut(id) {
                seat.status = SeatStatus::Booked;
                seat.booking_id = Some(booking_id);
                total_amount += seat.price;
            }
        }

        let booking = Booking {
            id: booking_id,
            event_id,
            user_id,
            seat_ids: seat_ids.to_vec(),
            total_amount,
            status: BookingStatus::Confirmed,
            created_at: chrono::Utc::now().naive_utc(),
        };
        grid.bookings.insert(booking_id, booking.clone());
        drop(grid);

        self.booking_index
            .write()
            .await
            .insert(booking_id, event_id);
        Ok(booking)
    }

    async fn fetch_booking(&self, booking_id: i64) -> Result<Booking, SeatingError> {
        let event_id = self
            .booking_index
            .read()
            .await
            .get(&booking_id)
            .copied()
            .ok_or(SeatingError::BookingNotFound { booking_id })?;
        let grid = self
            .grid(event_id)
            .await
            .ok_or(SeatingError::BookingNotFound { booking_id })?;
        let grid = grid.lock().await;
        grid.bookings
            .get(&booking_id)
            .cloned()
            .ok_or(SeatingError::BookingNotFound { booking_id })
    }

    async fn bookings_for_user(&self, user_id: i64) -> Result<Vec<Booking>, SeatingError> {
        let handles: Vec<Arc<Mutex<EventGrid>>> =
            self.grids.read().await.values().cloned().collect();

        let mut out = Vec::new();
        for handle in handles {
            let grid = handle.lock().await;
            out.extend(
                grid.bookings
                    .values()
                    .filter(|b| b.user_id == user_id)
                    .cloned(),
            );
        }
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn cancel_booking(&self, booking_id: i64) -> Result<CancelOutcome, SeatingError> {
        let event_id = self
            .booking_index
            .read()
            .await
            .get(&booking_id)
            .copied()
            .ok_or(SeatingError::BookingNotFound { booking_id })?;
        let grid = self
            .grid(event_id)
            .await
            .ok_or(SeatingError::BookingNotFound { booking_id })?;
        let mut grid = grid.lock().await;

        let mut booking = grid
            .bookings
            .get(&booking_id)
            .cloned()
            .ok_or(SeatingError::BookingNotFound { booking_id })?;

        if booking.status == BookingStatus::Cancelled {
            return Ok(CancelOutcome {
                booking,
                already_cancelled: true,
                freed_seat_ids: vec![],
                stray_seat_ids: vec![],
            });
        }

        let mut freed = Vec::new();
        let mut stray = Vec::new();
        for seat_id in &booking.seat_ids {
            match grid.seats.get_mut(seat_id) {
                Some(seat)
                    if seat.booking_id == Some(booking_id)
                        && seat.status == SeatStatus::Booked =>
                {
                    seat.status = SeatStatus::Available;
                    seat.booking_id = None;
                    freed.push(*seat_id);
                }
                // Переназначенное место не трогаем, только сообщаем
                Some(seat) if seat.booking_id.is_some() => stray.push(*seat_id),
                _ => {}
            }
        }

        booking.status = BookingStatus::Cancelled;
        grid.bookings.insert(booking_id, booking.clone());

        Ok(CancelOutcome {
            booking,
            already_cancelled: false,
            freed_seat_ids: freed,
            stray_seat_ids: stray,
        })
    }

    async fn set_seat_blocked(
        &self,
        event_id: i64,
        seat_id: i64,
        blocked: bool,
    ) -> Result<EventSeat, SeatingError> {
        let grid = self
            .grid(event_id)
            .await
            .ok_or(SeatingError::LayoutNotFound { event_id })?;
        let mut grid = grid.lock().await;

        let seat = grid
            .seats
            .get_mut(&seat_id)
            .ok_or(SeatingError::UnknownSeats {
                event_id,
                seat_ids: vec![seat_id],
            })?;

        match (blocked, seat.status) {
            (true, SeatStatus::Available) => seat.status = SeatStatus::Blocked,
            (false, SeatStatus::Blocked) => seat.status = SeatStatus::Available,
            // Already in the requested state: no-op
            (true, SeatStatus::Blocked) | (false, SeatStatus::Available) => {}
            (true, SeatStatus::Booked) => return Err(SeatingError::SeatOccupied { seat_id }),
            (false, SeatStatus::Booked) => {
                return Err(SeatingError::InvalidTransition { seat_id })
            }
        }

        Ok(seat.clone())
    }
}
