//! HTTP API
//!
//! A thin adapter over [`LokalisointiService`]; authentication is left to
//! the fronting proxy, which passes the acting user in `X-User`.

mod error;
mod handlers;

pub use error::{ApiError, ApiResult};
pub use handlers::{AppState, ANONYMOUS, USER_HEADER};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::service::LokalisointiService;
use handlers::*;

/// Build the router.
///
/// # Routes
///
/// - `GET /health`
/// - `GET /lokalisointi/api/v1/localisation` - query localisations
/// - `POST /lokalisointi/api/v1/localisation/update` - mass update
/// - `GET|POST /lokalisointi/api/v1/override` - list / create overrides
/// - `POST|DELETE /lokalisointi/api/v1/override/:id` - update / delete an override
/// - `GET /lokalisointi/api/v1/override/available-namespaces`
/// - `POST /lokalisointi/api/v1/copy` - copy from another environment
/// - `GET /lokalisointi/api/v1/copy/available-namespaces`
/// - `GET /lokalisointi/api/v1/copy/localisation-files` - zip export
/// - `GET /lokalisointi/api/v1/ui-config`
/// - `GET /lokalisointi/tolgee/:slug/:locale.json` and
///   `/lokalisointi/tolgee/:slug/:namespace/:locale.json` - base files
pub fn router(service: Arc<LokalisointiService>) -> Router {
    let api = Router::new()
        .route("/localisation", get(query_localisations))
        .route("/localisation/update", post(update_localisations))
        .route("/override", get(list_overrides).post(create_override))
        .route(
            "/override/available-namespaces",
            get(override_namespaces),
        )
        .route("/override/:id", post(update_override).delete(delete_override))
        .route("/copy", post(copy_localisations))
        .route("/copy/available-namespaces", get(copy_available_namespaces))
        .route("/copy/localisation-files", get(localisation_files))
        .route("/ui-config", get(ui_config));

    let files = Router::new()
        .route("/:slug/:file", get(root_file))
        .route("/:slug/:namespace/:file", get(namespace_file));

    Router::new()
        .route("/health", get(health))
        .nest("/lokalisointi/api/v1", api)
        .nest("/lokalisointi/tolgee", files)
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// HTTP server
pub struct ApiServer {
    service: Arc<LokalisointiService>,
    addr: SocketAddr,
}

impl ApiServer {
    pub fn new(service: Arc<LokalisointiService>, addr: SocketAddr) -> Self {
        Self { service, addr }
    }

    /// Serve until `shutdown` resolves
    pub async fn start<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let app = router(self.service);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("Lokalisointi API listening on {}", listener.local_addr()?);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}
