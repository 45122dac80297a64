//! Run coordination
//!
//! Cancellation and process signal handling for scrape runs and the API server.

pub mod shutdown;

pub use shutdown::{cancel_on_signal, shutdown_signal, CancelToken};
