//! REST API implementation
//!
//! Read access and rule/notification management for the dashboard UI.

pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::create_router;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::alerting::SharedEngine;
use crate::error::Result;

/// HTTP API server
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server over a shared engine
    pub fn new(engine: SharedEngine) -> Self {
        Self {
            state: AppState { engine },
        }
    }

    /// Serve until `shutdown` is cancelled
    pub async fn serve(self, addr: &str, shutdown: CancellationToken) -> Result<()> {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let app = create_router(self.state)
            .layer(cors)
            .layer(TraceLayer::new_for_http());

        let listener = TcpListener::bind(addr).await?;

        info!("HTTP server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        Ok(())
    }
}
