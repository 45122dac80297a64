use chrono::{DateTime, Utc};

use crate::services::QueryService;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct AppState {
    pub query: QueryService,
    /// Application start time
    pub start_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(query: QueryService) -> Self {
        Self {
            query,
            start_time: Utc::now(),
        }
    }
}
