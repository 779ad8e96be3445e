use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use otlp::PayloadError;
use thiserror::Error;

/// Errors raised at the HTTP boundary, before anything reaches the store
#[derive(Debug, Error)]
pub enum ServerError {
    /// Body could not be decoded or parsed
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Payload parsed but failed identifier or kind checks
    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] PayloadError),

    /// Only OTLP/JSON is accepted
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Decompressed body exceeds the configured limit
    #[error("Payload too large: more than {0} bytes")]
    PayloadTooLarge(usize),
}

/// Result type alias for ServerError
pub type Result<T> = std::result::Result<T, ServerError>;

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) | ServerError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ServerError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::warn!(status = status.as_u16(), error = %self, "Rejected request");

        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
