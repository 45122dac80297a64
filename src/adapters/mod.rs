pub mod api_server;
pub mod rates_client;
pub mod sqlite_store;

pub use api_server::start_api_server;
#[cfg(test)]
pub use rates_client::MockRateProvider;
pub use rates_client::{HttpRateProvider, RateProvider};
pub use sqlite_store::{BusyRetry, SnapshotStore};
