//! HTTP error shape
//!
//! Maps [`pixel_canvas_core::Error`] to the wire shape from spec §7:
//! `{error, message, statusCode}`. Grounded on the teacher's convention of
//! one `IntoResponse` impl at the binary crate's HTTP boundary, translating
//! each library error kind to a status code.

use axum::{http::StatusCode, response::IntoResponse, response::Json, response::Response};
use pixel_canvas_core::Error;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(rename = "statusCode")]
    status_code: u16,
}

/// Newtype so this crate can provide `IntoResponse` for the core error type.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Validation(_) | Error::Decoding(_) => StatusCode::BAD_REQUEST,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Persistence(_) | Error::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.0.code(),
            message: self.0.to_string(),
            status_code: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn test_validation_error_maps_to_400() {
        let resp = ApiError(Error::validation("bad bounds")).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["statusCode"], 400);
        assert_eq!(json["error"], "validation_error");
    }

    #[tokio::test]
    async fn test_conflict_error_maps_to_409() {
        let resp = ApiError(Error::conflict("dup")).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_persistence_error_maps_to_500() {
        let resp = ApiError(Error::persistence("disk full")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
