use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::controllers::error_reply;
use crate::middleware::AdminUser;
use crate::models::SeatStatus;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/seats", get(get_seats))
        .route("/seats/block", patch(set_seat_blocked))
}

/* ---------- SEATS ---------- */

#[derive(Debug, Deserialize)]
struct SeatsQuery {
    event_id: i64,
    page: Option<u32>,
    #[serde(rename = "pageSize")]
    page_size: Option<u32>,
    row: Option<String>,
    status: Option<String>, // AVAILABLE, BOOKED, BLOCKED
}

#[derive(Debug, Serialize)]
struct SeatResponse {
    id: i64,
    row_label: String,
    seat_number: i32,
    status: SeatStatus,
    price: f64,
}

async fn get_seats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SeatsQuery>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    if params.event_id <= 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "event_id должен быть > 0"})),
        ));
    }
    let status = match params.status.as_deref() {
        Some(raw) => match SeatStatus::parse(raw) {
            Some(status) => Some(status),
            None => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": "status должен быть AVAILABLE | BOOKED | BLOCKED"})),
                ))
            }
        },
        None => None,
    };

    let page = params.page.unwrap_or(1).max(1);
    let page_size = params.page_size.unwrap_or(20).clamp(1, 20);
    let offset = ((page - 1) * page_size) as usize;

    let layout = state
        .engine
        .layout(params.event_id)
        .await
        .map_err(error_reply)?;

    let payload: Vec<SeatResponse> = layout
        .seats
        .into_iter()
        .filter(|s| params.row.as_deref().map_or(true, |r| s.row_label == r))
        .filter(|s| status.map_or(true, |st| s.status == st))
        .skip(offset)
        .take(page_size as usize)
        .map(|s| SeatResponse {
            id: s.id,
            row_label: s.row_label,
            seat_number: s.seat_number,
            status: s.status,
            price: s.price,
        })
        .collect();

    Ok((StatusCode::OK, Json(payload)))
}

// PATCH /api/seats/block — только для админов
#[derive(Debug, Deserialize)]
struct BlockSeatRequest {
    event_id: i64,
    seat_id: i64,
    blocked: bool,
}

async fn set_seat_blocked(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(req): Json<BlockSeatRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    if req.event_id <= 0 || req.seat_id <= 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "event_id и seat_id должны быть > 0"})),
        ));
    }

    let seat = state
        .engine
        .set_seat_blocked(req.event_id, req.seat_id, req.blocked)
        .await
        .map_err(error_reply)?;

    state.cache.invalidate_layout(req.event_id).await;
    tracing::info!(
        "admin {} set seat {} of event {} blocked={}",
        admin.user_id,
        req.seat_id,
        req.event_id,
        req.blocked
    );

    Ok((StatusCode::OK, Json(seat)))
}
