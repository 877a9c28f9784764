use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::controllers::error_reply;
use crate::middleware::AuthUser;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", get(get_user_bookings).post(create_booking))
        .route("/bookings/cancel", patch(cancel_booking))
}

/* ---------- BOOKINGS ---------- */

// POST /api/bookings
#[derive(Debug, Deserialize)]
struct CreateBookingRequest {
    event_id: i64,
    seat_ids: Vec<i64>,
}

// Атомарное бронирование всего набора мест: либо весь набор, либо ничего
async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    if req.event_id <= 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "event_id должен быть > 0"})),
        ));
    }

    let booking = state
        .engine
        .reserve_seats(req.event_id, user.user_id, &req.seat_ids)
        .await
        .map_err(error_reply)?;

    state.cache.invalidate_layout(req.event_id).await;

    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /api/bookings
async fn get_user_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    let bookings = state
        .engine
        .user_bookings(user.user_id)
        .await
        .map_err(error_reply)?;
    Ok((StatusCode::OK, Json(bookings)))
}

// PATCH /api/bookings/cancel
#[derive(Debug, Deserialize)]
struct CancelBookingRequest {
    booking_id: i64,
}

async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CancelBookingRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    if req.booking_id <= 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "booking_id должен быть > 0"})),
        ));
    }

    // Проверка владельца; админ может отменить любую бронь
    let booking = state
        .engine
        .booking(req.booking_id)
        .await
        .map_err(error_reply)?;
    if booking.user_id != user.user_id && !user.is_admin {
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({"error": "Бронирование не принадлежит вам"})),
        ));
    }

    let cancelled = state
        .engine
        .cancel_booking(req.booking_id)
        .await
        .map_err(error_reply)?;

    state.cache.invalidate_layout(cancelled.event_id).await;

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "Бронь успешно отменена",
            "booking": cancelled,
        })),
    ))
}
