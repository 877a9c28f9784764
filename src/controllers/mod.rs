pub mod bookings;
pub mod layouts;
pub mod seats;

use axum::{http::StatusCode, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::SeatingError;

pub fn routes() -> axum::Router<Arc<crate::AppState>> {
    axum::Router::new()
        .merge(layouts::routes())
        .merge(bookings::routes())
        .merge(seats::routes())
}

/* ---------- helpers ---------- */

// 419 — занято кем-то другим, перевыбирайте места
pub(crate) fn status_419() -> StatusCode {
    StatusCode::from_u16(419).unwrap_or(StatusCode::CONFLICT)
}

// Перевод доменной ошибки в HTTP-ответ. Конфликтные ответы перечисляют
// конкретные места, чтобы клиент мог подсветить их для перевыбора.
pub(crate) fn error_reply(e: SeatingError) -> (StatusCode, Json<Value>) {
    match e {
        SeatingError::SeatsUnavailable { seat_ids } => (
            status_419(),
            Json(json!({
                "error": "Часть мест уже занята или заблокирована",
                "unavailable_seats": seat_ids,
            })),
        ),
        SeatingError::UnknownSeats { event_id, seat_ids } => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Запрошенные места не существуют для этого события",
                "event_id": event_id,
                "unknown_seats": seat_ids,
            })),
        ),
        SeatingError::DuplicateRow { label } => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Ряд принадлежит более чем одной категории",
                "row": label,
            })),
        ),
        SeatingError::InvalidCategory { name, reason } => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Некорректное описание категории",
                "category": name,
                "reason": reason,
            })),
        ),
        SeatingError::EmptyCategories => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Нужна хотя бы одна категория мест"})),
        ),
        SeatingError::EmptySelection => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Не выбрано ни одного места"})),
        ),
        SeatingError::DuplicateSelection => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Места в запросе повторяются"})),
        ),
        SeatingError::LayoutLocked { event_id } => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "Продажи начались — схема зала заблокирована",
                "event_id": event_id,
            })),
        ),
        SeatingError::LayoutNotFound { event_id } => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "Схема зала не найдена",
                "event_id": event_id,
            })),
        ),
        SeatingError::SeatOccupied { seat_id } => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "Место занято покупателем, сначала отмените бронь",
                "seat_id": seat_id,
            })),
        ),
        SeatingError::InvalidTransition { seat_id } => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "Недопустимый переход статуса места",
                "seat_id": seat_id,
            })),
        ),
        SeatingError::BookingNotFound { booking_id } => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "Бронирование не найдено",
                "booking_id": booking_id,
            })),
        ),
        SeatingError::InvariantViolation(ref detail) => {
            tracing::error!("invariant violation surfaced to caller: {detail}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Внутренняя ошибка целостности данных"})),
            )
        }
        SeatingError::Storage { ref message, .. } => {
            tracing::error!("storage error surfaced to caller: {message}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Ошибка базы данных"})),
            )
        }
    }
}
