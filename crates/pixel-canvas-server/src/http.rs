//! Snapshot API and user/health HTTP endpoints (Component F + ambient)
//!
//! Three read endpoints serve the Canvas Cache exactly as spec §4.F
//! describes; `POST /api/users` / `GET /api/users/me` front the User
//! Directory and stamp the HTTP-only session cookie.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use pixel_canvas_core::{binary, model::validate_coord, Color};

use crate::cookie::{build_session_cookie, read_session_cookie};
use crate::error_response::ApiError;
use crate::state::AppState;

/// Build the router for every HTTP endpoint in spec §6 (`/health` plus the
/// `/api/...` surface). Mount under the application's base router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/users", post(create_user))
        .route("/api/users/me", get(get_current_user))
        .route("/api/pixels", get(get_pixels))
        .route("/api/pixels/region", get(get_pixels_region))
        .route("/api/pixels/binary", get(get_pixels_binary))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    environment: String,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339(),
        environment: state.config.server.environment.clone(),
    })
}

#[derive(Serialize)]
struct UserResponse {
    #[serde(rename = "userId")]
    user_id: String,
    nickname: String,
    color: Color,
}

async fn create_user(State(state): State<AppState>) -> Result<Response, ApiError> {
    let record = state.users.create_user().await?;
    let body = Json(UserResponse {
        user_id: record.user_id.clone(),
        nickname: record.nickname,
        color: record.color,
    });
    let mut response = (StatusCode::CREATED, body).into_response();
    response.headers_mut().insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&build_session_cookie(&record.user_id))
            .expect("cookie value is valid ASCII"),
    );
    Ok(response)
}

async fn get_current_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let Some(user_id) = read_session_cookie(&headers) else {
        return Ok(StatusCode::UNAUTHORIZED.into_response());
    };
    let Some(record) = state.users.get_user(&user_id).await? else {
        return Ok(StatusCode::UNAUTHORIZED.into_response());
    };
    Ok(Json(UserResponse {
        user_id: record.user_id,
        nickname: record.nickname,
        color: record.color,
    })
    .into_response())
}

#[derive(Serialize)]
struct PixelPayload {
    x: u16,
    y: u16,
    color: Color,
}

#[derive(Serialize)]
struct PixelsResponse {
    pixels: Vec<PixelPayload>,
}

async fn get_pixels(State(state): State<AppState>) -> Json<PixelsResponse> {
    let pixels = state
        .cache
        .get_all()
        .await
        .into_iter()
        .map(|ev| PixelPayload {
            x: ev.x,
            y: ev.y,
            color: ev.color,
        })
        .collect();
    Json(PixelsResponse { pixels })
}

#[derive(Deserialize)]
struct RegionQuery {
    #[serde(rename = "minX")]
    min_x: i64,
    #[serde(rename = "minY")]
    min_y: i64,
    #[serde(rename = "maxX")]
    max_x: i64,
    #[serde(rename = "maxY")]
    max_y: i64,
}

async fn get_pixels_region(
    State(state): State<AppState>,
    Query(query): Query<RegionQuery>,
) -> Result<Json<PixelsResponse>, ApiError> {
    let (min_x, min_y) = validate_coord(query.min_x, query.min_y)
        .map_err(|_| pixel_canvas_core::Error::validation("minX/minY out of range"))?;
    let (max_x, max_y) = validate_coord(query.max_x, query.max_y)
        .map_err(|_| pixel_canvas_core::Error::validation("maxX/maxY out of range"))?;
    if min_x > max_x || min_y > max_y {
        return Err(pixel_canvas_core::Error::validation("min must not exceed max").into());
    }

    let pixels = state
        .cache
        .get_region(min_x, min_y, max_x, max_y)
        .await
        .into_iter()
        .map(|ev| PixelPayload {
            x: ev.x,
            y: ev.y,
            color: ev.color,
        })
        .collect();
    Ok(Json(PixelsResponse { pixels }))
}

async fn get_pixels_binary(State(state): State<AppState>) -> Response {
    let pixels = state.cache.get_all().await;
    let count = pixels.len();
    let bytes = binary::encode(&pixels);
    debug_assert_eq!(bytes.len(), count * binary::RECORD_SIZE);

    let mut response = bytes.into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
    response.headers_mut().insert(
        "X-Pixel-Count",
        HeaderValue::from_str(&count.to_string()).expect("count is ASCII digits"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use pixel_canvas_core::{CanvasCache, EventStore};
    use std::sync::Arc;

    async fn cache() -> Arc<CanvasCache> {
        let store = Arc::new(EventStore::in_memory().await.unwrap());
        Arc::new(CanvasCache::new(store))
    }

    #[tokio::test]
    async fn test_get_pixels_empty_canvas() {
        let cache = cache().await;
        let state = test_state(cache).await;
        let Json(resp) = get_pixels(State(state)).await;
        assert!(resp.pixels.is_empty());
    }

    #[tokio::test]
    async fn test_region_rejects_inverted_bounds() {
        let cache = cache().await;
        let state = test_state(cache).await;
        let err = get_pixels_region(
            State(state),
            Query(RegionQuery {
                min_x: 10,
                min_y: 10,
                max_x: 0,
                max_y: 0,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0.code(), "validation_error");
    }

    #[tokio::test]
    async fn test_region_rejects_out_of_range() {
        let cache = cache().await;
        let state = test_state(cache).await;
        let err = get_pixels_region(
            State(state),
            Query(RegionQuery {
                min_x: -1,
                min_y: 0,
                max_x: 10,
                max_y: 10,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0.code(), "validation_error");
    }

    #[tokio::test]
    async fn test_binary_endpoint_sets_pixel_count_header() {
        let cache = cache().await;
        cache
            .apply_update(pixel_canvas_core::PixelEvent::new(
                1,
                1,
                Color::from_rgb(1, 2, 3),
                "u1",
            ))
            .await;
        let state = test_state(cache).await;
        let response = get_pixels_binary(State(state)).await;
        assert_eq!(
            response.headers().get("X-Pixel-Count").unwrap(),
            "1"
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.len(), binary::RECORD_SIZE);
    }

    async fn test_state(cache: Arc<CanvasCache>) -> AppState {
        let store = Arc::new(EventStore::in_memory().await.unwrap());
        let users = Arc::new(pixel_canvas_core::UserDirectory::new(store.pool().clone()));
        users.run_migrations().await.unwrap();
        let sessions = Arc::new(pixel_canvas_core::SessionManager::new());
        let broadcast = Arc::new(pixel_canvas_core::BroadcastEngine::new(sessions.clone()));
        let repository = Arc::new(pixel_canvas_core::PixelRepository::new(
            store,
            cache.clone(),
            broadcast.clone(),
        ));
        AppState {
            cache,
            repository,
            sessions,
            broadcast,
            users,
            config: Arc::new(crate::config::load_test_config()),
            shutdown: tokio_util::sync::CancellationToken::new(),
        }
    }
}
