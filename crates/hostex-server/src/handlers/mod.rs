pub mod health;
pub mod index;
pub mod metrics;

use axum::{Json, http::StatusCode, response::IntoResponse};
use hostex_common::error::HostexError;

pub struct ApiError(pub HostexError);

impl From<HostexError> for ApiError {
    fn from(value: HostexError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        (
            status,
            Json(serde_json::json!({
                "code": self.0.error_code(),
                "message": self.0.to_string(),
            })),
        )
            .into_response()
    }
}
