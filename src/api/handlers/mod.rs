pub mod snapshots;
pub mod stats;

pub use snapshots::*;
pub use stats::*;

use axum::http::StatusCode;
use tracing::error;

use crate::error::TrackerError;

pub type ApiError = (StatusCode, String);

/// Validation problems are the caller's fault; anything else is ours
pub(crate) fn api_error(err: TrackerError) -> ApiError {
    match err {
        TrackerError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
        TrackerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        other => {
            error!("API request failed: {}", other);
            (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}
