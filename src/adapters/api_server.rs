use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

use crate::api::{create_router, AppState};
use crate::coordination::shutdown_signal;
use crate::error::Result;
use crate::services::QueryService;

/// Serve the read API until Ctrl+C or SIGTERM
pub async fn start_api_server(query: QueryService, port: u16) -> Result<()> {
    let app = create_router(AppState::new(query));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("API server listening on http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API server stopped");
    Ok(())
}
