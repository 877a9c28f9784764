use axum::{
    body::Body,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::controllers::error_reply;
use crate::middleware::AuthUser;
use crate::models::CategoryDef;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/events/{event_id}/layout",
        post(build_layout).get(get_layout),
    )
}

/* ---------- LAYOUTS ---------- */

// POST /api/events/{event_id}/layout
#[derive(Debug, Deserialize)]
struct BuildLayoutRequest {
    categories: Vec<CategoryDef>,
}

// Владельца события проверяет вышестоящий сервис событий; здесь достаточно
// аутентифицированного вызова.
async fn build_layout(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
    _user: AuthUser,
    Json(req): Json<BuildLayoutRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    if event_id <= 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "event_id должен быть > 0"})),
        ));
    }

    let layout = state
        .engine
        .build_layout(event_id, &req.categories)
        .await
        .map_err(error_reply)?;

    state.cache.invalidate_layout(event_id).await;

    Ok((StatusCode::CREATED, Json(layout)))
}

// GET /api/events/{event_id}/layout
async fn get_layout(State(state): State<Arc<AppState>>, Path(event_id): Path<i64>) -> Response {
    // 1. Пытаемся отдать схему из кеша
    if let Some(cached) = state.cache.get_layout(event_id).await {
        return Response::builder()
            .header("Content-Type", "application/json")
            .header("X-Cache", "HIT")
            .body(Body::from(cached))
            .unwrap();
    }

    // 2. Cache Miss: читаем из хранилища и кешируем
    let layout = match state.engine.layout(event_id).await {
        Ok(layout) => layout,
        Err(e) => return error_reply(e).into_response(),
    };

    match serde_json::to_string(&layout) {
        Ok(json_str) => {
            state.cache.store_layout(event_id, &json_str).await;
            Response::builder()
                .header("Content-Type", "application/json")
                .header("X-Cache", "MISS")
                .body(Body::from(json_str))
                .unwrap()
        }
        // Fallback в случае ошибки сериализации
        Err(e) => {
            tracing::error!("failed to serialize layout for event {}: {:?}", event_id, e);
            Json(layout).into_response()
        }
    }
}
