pub mod ai;
pub mod classification;
pub mod documents;
pub mod health;

pub use ai::*;
pub use classification::*;
pub use documents::*;
pub use health::*;

use axum::http::StatusCode;
use lexbid_utils::{ErrorResponse, LexbidError};

/// Map a service error onto the status code and JSON error body returned to clients.
pub fn reject(error: LexbidError) -> (StatusCode, String) {
    let status = StatusCode::from_u16(error.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = serde_json::to_string(&ErrorResponse::from(error))
        .unwrap_or_else(|_| "Internal server error".to_string());
    (status, body)
}
