//! Maps [`auction_engine::EngineError`] onto HTTP responses per the propagation policy the
//! engine crate documents for its callers: caller-input mistakes surface with their message,
//! invariant violations are logged and hidden behind a generic 500.

use auction_engine::EngineError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::error;
use serde::Serialize;
use serde_json::json;

/// Wraps every successful handler result in the `{ok, data}` envelope (§6).
pub struct Envelope<T>(pub T);

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        Json(json!({ "ok": true, "data": self.0 })).into_response()
    }
}

pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            EngineError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            EngineError::StateConflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            EngineError::Authorization(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            EngineError::NotFound { entity, id } => {
                (StatusCode::NOT_FOUND, format!("{entity} {id} not found"))
            }
            EngineError::ResourceExhausted(msg) => (StatusCode::CONFLICT, msg.clone()),
            EngineError::Transient(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            EngineError::InvariantViolation(msg) => {
                error!("invariant violation surfaced to an HTTP caller: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(json!({ "ok": false, "error": message }))).into_response()
    }
}
