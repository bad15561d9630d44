use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use memoria_core::MemoriaError;
use serde_json::json;

/// Wraps `MemoriaError` so every handler can just `?` into an axum response.
/// Status and `error_code` come straight from `MemoriaError::status_code`/
/// `code` (§7) — handlers never choose their own status codes.
pub struct ApiError(pub MemoriaError);

impl From<MemoriaError> for ApiError {
    fn from(e: MemoriaError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({
            "status": "error",
            "error_code": self.0.code(),
            "error": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
