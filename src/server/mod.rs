//! HTTP server: router, shared state and the serve loop.

pub mod error;
mod routes;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::counter::VisitorCounter;
use crate::error::Result;
use crate::runner::BoundedRunner;

pub use error::{ApiError, ApiErrorBody, ApiResult};
pub use routes::HealthResponse;

/// Default cap on upload request bodies.
pub const DEFAULT_UPLOAD_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Shared application state for all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub runner: BoundedRunner,
    pub visitors: Arc<VisitorCounter>,
    pub upload_body_limit: usize,
}

impl AppState {
    pub fn new(runner: BoundedRunner, visitors: Arc<VisitorCounter>) -> Self {
        Self {
            runner,
            visitors,
            upload_body_limit: DEFAULT_UPLOAD_BODY_LIMIT,
        }
    }

    pub fn upload_body_limit(mut self, limit: usize) -> Self {
        self.upload_body_limit = limit;
        self
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let upload_limit = state.upload_body_limit;
    let api = Router::new()
        .route(
            "/upload",
            post(routes::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/testPhrase", post(routes::test_phrase))
        .route("/logUsage", get(routes::log_usage))
        .route("/addVisitor", get(routes::add_visitor))
        .route("/subtractVisitor", get(routes::subtract_visitor));

    Router::new()
        .route("/health", get(routes::health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("server stopped");
    Ok(())
}
