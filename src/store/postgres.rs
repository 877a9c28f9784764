//! Postgres-хранилище сетки мест.
//!
//! Every mutating operation runs inside one short transaction: the checked
//! rows are pinned with `SELECT ... FOR UPDATE`, the apply step is a
//! conditional `UPDATE` whose `rows_affected` must match the requested set,
//! and any mismatch rolls the whole transaction back. Nothing is held across
//! anything slower than the database round trip.

use chrono::NaiveDateTime;

use crate::database::Database;
use crate::error::SeatingError;
use crate::models::{
    Booking, BookingStatus, EventSeat, SeatCategory, SeatLayout, SeatStatus,
};
use crate::store::{CancelOutcome, SeatStore};

#[derive(Clone)]
pub struct PgSeatStore {
    db: Database,
}

impl PgSeatStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

type BookingRow = (i64, i64, i64, Vec<i64>, f64, String, NaiveDateTime);

fn booking_from_row(row: BookingRow) -> Result<Booking, SeatingError> {
    let (id, event_id, user_id, seat_ids, total_amount, status, created_at) = row;
    let status = BookingStatus::parse(&status).ok_or_else(|| {
        SeatingError::InvariantViolation(format!("booking {id} has status {status:?}"))
    })?;
    Ok(Booking {
        id,
        event_id,
        user_id,
        seat_ids,
        total_amount,
        status,
        created_at,
    })
}

fn seat_status(seat_id: i64, status: &str) -> Result<SeatStatus, SeatingError> {
    SeatStatus::parse(status).ok_or_else(|| {
        SeatingError::InvariantViolation(format!("seat {seat_id} has status {status:?}"))
    })
}

impl SeatStore for PgSeatStore {
    async fn replace_layout(&self, layout: &SeatLayout) -> Result<(), SeatingError> {
        let mut tx = self.db.pool.begin().await?;

        // Категории неизменяемы после начала продаж
        let booked: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM event_seats WHERE event_id = $1 AND status = 'BOOKED'",
        )
        .bind(layout.event_id)
        .fetch_one(&mut *tx)
        .await?;

        if booked > 0 {
            tx.rollback().await.ok();
            return Err(SeatingError::LayoutLocked {
                event_id: layout.event_id,
            });
        }

        sqlx::query("DELETE FROM event_seats WHERE event_id = $1")
            .bind(layout.event_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM seat_categories WHERE event_id = $1")
            .bind(layout.event_id)
            .execute(&mut *tx)
            .await?;

        for cat in &layout.categories {
            sqlx::query(
                r#"
                INSERT INTO seat_categories
                    (event_id, id, name, price, color, row_labels, seats_per_row, aisle_after, sort_order)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(cat.event_id)
            .bind(cat.id)
            .bind(&cat.name)
            .bind(cat.price)
            .bind(&cat.color)
            .bind(&cat.rows)
            .bind(cat.seats_per_row)
            .bind(&cat.aisle_after)
            .bind(cat.sort_order)
            .execute(&mut *tx)
            .await?;
        }

        // Места вставляем одним запросом, чтобы транзакция оставалась короткой
        let ids: Vec<i64> = layout.seats.iter().map(|s| s.id).collect();
        let category_ids: Vec<i64> = layout.seats.iter().map(|s| s.category_id).collect();
        let row_labels: Vec<String> = layout.seats.iter().map(|s| s.row_label.clone()).collect();
        let seat_numbers: Vec<i32> = layout.seats.iter().map(|s| s.seat_number).collect();
        let prices: Vec<f64> = layout.seats.iter().map(|s| s.price).collect();

        sqlx::query(
            r#"
            INSERT INTO event_seats (event_id, id, category_id, row_label, seat_number, price, status)
            SELECT $1, u.id, u.category_id, u.row_label, u.seat_number, u.price, 'AVAILABLE'
            FROM UNNEST($2::bigint[], $3::bigint[], $4::text[], $5::int[], $6::float8[])
                AS u(id, category_id, row_label, seat_number, price)
            "#,
        )
        .bind(layout.event_id)
        .bind(&ids)
        .bind(&category_ids)
        .bind(&row_labels)
        .bind(&seat_numbers)
        .bind(&prices)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn fetch_layout(&self, event_id: i64) -> Result<SeatLayout, SeatingError> {
        let cat_rows: Vec<(i64, String, f64, String, Vec<String>, i32, Vec<i32>, i32)> =
            sqlx::query_as(
                r#"
                SELECT id, name, price, color, row_labels, seats_per_row, aisle_after, sort_order
                FROM seat_categories
                WHERE event_id = $1
                ORDER BY sort_order
                "#,
            )
            .bind(event_id)
            .fetch_all(&self.db.pool)
            .await?;

        if cat_rows.is_empty() {
            return Err(SeatingError::LayoutNotFound { event_id });
        }

        let categories = cat_rows
            .into_iter()
            .map(
                |(id, name, price, color, rows, seats_per_row, aisle_after, sort_order)| {
                    SeatCategory {
                        id,
                        event_id,
                        name,
                        price,
                        color,
                        rows,
                        seats_per_row,
                        aisle_after,
                        sort_order,
                    }
                },
            )
            .collect();

        let seat_rows: Vec<(i64, i64, String, i32, f64, String, Option<i64>)> = sqlx::query_as(
            r#"
            SELECT id, category_id, row_label, seat_number, price, status, booking_id
            FROM event_seats
            WHERE event_id = $1
            ORDER BY row_label, seat_number
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.db.pool)
        .await?;

        let mut seats = Vec::with_capacity(seat_rows.len());
        for (id, category_id, row_label, seat_number, price, status, booking_id) in seat_rows {
            seats.push(EventSeat {
                id,
                event_id,
                category_id,
                row_label,
                seat_number,
                price,
                status: seat_status(id, &status)?,
                booking_id,
            });
        }

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
        let requested = seat_ids.to_vec();
        let mut tx = self.db.pool.begin().await?;

        // Пиннинг строк на время одной транзакции
        let rows: Vec<(i64, String, f64)> = sqlx::query_as(
            r#"
            SELECT id, status, price
            FROM event_seats
            WHERE event_id = $1 AND id = ANY($2)
            FOR UPDATE
            "#,
        )
        .bind(event_id)
        .bind(&requested)
        .fetch_all(&mut *tx)
        .await?;

        if rows.len() != requested.len() {
            let mut unknown = requested.clone();
            unknown.retain(|id| !rows.iter().any(|(rid, _, _)| rid == id));
            tx.rollback().await.ok();
            return Err(SeatingError::UnknownSeats {
                event_id,
                seat_ids: unknown,
            });
        }

        let mut conflicts: Vec<i64> = rows
            .iter()
            .filter(|(_, status, _)| status != "AVAILABLE")
            .map(|(id, _, _)| *id)
            .collect();
        if !conflicts.is_empty() {
            conflicts.sort_unstable();
            tx.rollback().await.ok();
            return Err(SeatingError::SeatsUnavailable {
                seat_ids: conflicts,
            });
        }

        let total_amount: f64 = rows.iter().map(|(_, _, price)| price).sum();

        let (booking_id, created_at): (i64, NaiveDateTime) = sqlx::query_as(
            r#"
            INSERT INTO bookings (event_id, user_id, seat_ids, total_amount, status)
            VALUES ($1, $2, $3, $4, 'CONFIRMED')
            RETURNING id, created_at
            "#,
        )
        .bind(event_id)
        .bind(user_id)
        .bind(&requested)
        .bind(total_amount)
        .fetch_one(&mut *tx)
        .await?;

        let updated = sqlx::query(
            r#"
            UPDATE event_seats
            SET status = 'BOOKED', booking_id = $1
            WHERE event_id = $2 AND id = ANY($3) AND status = 'AVAILABLE'
            "#,
        )
        .bind(booking_id)
        .bind(event_id)
        .bind(&requested)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        // FOR UPDATE выше делает это недостижимым; страховка от частичного
        // применения остаётся
        if updated != requested.len() as u64 {
            tx.rollback().await.ok();
            return Err(SeatingError::SeatsUnavailable {
                seat_ids: requested,
            });
        }

        tx.commit().await?;

        Ok(Booking {
            id: booking_id,
            event_id,
            user_id,
            seat_ids: requested,
            total_amount,
            status: BookingStatus::Confirmed,
            created_at,
        })
    }

    async fn fetch_booking(&self, booking_id: i64) -> Result<Booking, SeatingError> {
        let row: Option<BookingRow> = sqlx::query_as(
            r#"
            SELECT id, event_id, user_id, seat_ids, total_amount, status, created_at
            FROM bookings
            WHERE id = $1
            "#,
        )
        .bind(booking_id)
        .fetch_optional(&self.db.pool)
        .await?;

        match row {
            Some(row) => booking_from_row(row),
            None => Err(SeatingError::BookingNotFound { booking_id }),
        }
    }

    async fn bookings_for_user(&self, user_id: i64) -> Result<Vec<Booking>, SeatingError> {
        let rows: Vec<BookingRow> = sqlx::query_as(
            r#"
            SELECT id, event_id, user_id, seat_ids, total_amount, status, created_at
            FROM bookings
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db.pool)
        .await?;

        rows.into_iter().map(booking_from_row).collect()
    }

    async fn cancel_booking(&self, booking_id: i64) -> Result<CancelOutcome, SeatingError> {
        let mut tx = self.db.pool.begin().await?;

        let row: Option<BookingRow> = sqlx::query_as(
            r#"
            SELECT id, event_id, user_id, seat_ids, total_amount, status, created_at
            FROM bookings
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(booking_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await.ok();
            return Err(SeatingError::BookingNotFound { booking_id });
        };
        let mut booking = booking_from_row(row)?;

        // Повторная отмена — no-op успех для at-least-once вызывающих
        if booking.status == BookingStatus::Cancelled {
            tx.rollback().await.ok();
            return Ok(CancelOutcome {
                booking,
                already_cancelled: true,
                freed_seat_ids: vec![],
                stray_seat_ids: vec![],
            });
        }

        sqlx::query("UPDATE bookings SET status = 'CANCELLED' WHERE id = $1")
            .bind(booking_id)
            .execute(&mut *tx)
            .await?;

        // Освобождаем только места, всё ещё принадлежащие этой брони
        let freed_seat_ids: Vec<i64> = sqlx::query_scalar(
            r#"
            UPDATE event_seats
            SET status = 'AVAILABLE', booking_id = NULL
            WHERE event_id = $1 AND booking_id = $2 AND status = 'BOOKED'
            RETURNING id
            "#,
        )
        .bind(booking.event_id)
        .bind(booking_id)
        .fetch_all(&mut *tx)
        .await?;

        // Всё, что из набора брони осталось привязанным, ушло кому-то другому
        let stray_seat_ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT id FROM event_seats
            WHERE event_id = $1 AND id = ANY($2) AND booking_id IS NOT NULL
            "#,
        )
        .bind(booking.event_id)
        .bind(&booking.seat_ids)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        booking.status = BookingStatus::Cancelled;
        Ok(CancelOutcome {
            booking,
            already_cancelled: false,
            freed_seat_ids,
            stray_seat_ids,
        })
    }

    async fn set_seat_blocked(
        &self,
        event_id: i64,
        seat_id: i64,
        blocked: bool,
    ) -> Result<EventSeat, SeatingError> {
        let mut tx = self.db.pool.begin().await?;

        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT status FROM event_seats
            WHERE event_id = $1 AND id = $2
            FOR UPDATE
            "#,
        )
        .bind(event_id)
        .bind(seat_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((status,)) = row else {
            tx.rollback().await.ok();
            return Err(SeatingError::UnknownSeats {
                event_id,
                seat_ids: vec![seat_id],
            });
        };

        let new_status = match (blocked, seat_status(seat_id, &status)?) {
            (true, SeatStatus::Available) => Some(SeatStatus::Blocked),
            (false, SeatStatus::Blocked) => Some(SeatStatus::Available),
            // Already in the requested state: no-op
            (true, SeatStatus::Blocked) | (false, SeatStatus::Available) => None,
            (true, SeatStatus::Booked) => {
                tx.rollback().await.ok();
                return Err(SeatingError::SeatOccupied { seat_id });
            }
            (false, SeatStatus::Booked) => {
                tx.rollback().await.ok();
                return Err(SeatingError::InvalidTransition { seat_id });
            }
        };

        if let Some(new_status) = new_status {
            sqlx::query(
                "UPDATE event_seats SET status = $1 WHERE event_id = $2 AND id = $3",
            )
            .bind(new_status.as_str())
            .bind(event_id)
            .bind(seat_id)
            .execute(&mut *tx)
            .await?;
        }

        let (id, category_id, row_label, seat_number, price, status, booking_id): (
            i64,
            i64,
            String,
            i32,
            f64,
            String,
            Option<i64>,
        ) = sqlx::query_as(
            r#"
            SELECT id, category_id, row_label, seat_number, price, status, booking_id
            FROM event_seats
            WHERE event_id = $1 AND id = $2
            "#,
        )
        .bind(event_id)
        .bind(seat_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(EventSeat {
            id,
            event_id,
            category_id,
            row_label,
            seat_number,
            price,
            status: seat_status(id, &status)?,
            booking_id,
        })
    }
}
