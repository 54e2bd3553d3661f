//! HTTP server for Prometheus metrics endpoint.

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::collector::SharedCollector;

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

const CACHE_CONTROL: &str = "must-revalidate,no-cache,no-store";

/// Query parameter selecting metrics by name; may be repeated.
const NAME_PARAM: &str = "name[]";

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    collector: SharedCollector,
    allowed_origin: Option<HeaderValue>,
}

/// Create the HTTP router.
fn create_router(
    collector: SharedCollector,
    metrics_path: &str,
    allowed_origin: Option<HeaderValue>,
) -> Router {
    let state = AppState {
        collector,
        allowed_origin,
    };

    Router::new()
        .route(metrics_path, get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handler for the metrics endpoint.
async fn metrics_handler(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let wanted: HashSet<String> = params
        .into_iter()
        .filter(|(key, _)| key == NAME_PARAM)
        .map(|(_, value)| value)
        .collect();

    if !wanted.is_empty() {
        debug!(names = ?wanted, "Scrape restricted to requested names");
    }

    let mut response = match state.collector.render(&wanted) {
        Ok(body) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, CONTENT_TYPE),
                (header::CACHE_CONTROL, CACHE_CONTROL),
            ],
            body,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to export metrics: {}\n", e),
        )
            .into_response(),
    };

    if let Some(origin) = &state.allowed_origin {
        response
            .headers_mut()
            .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
    }

    response
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

/// Handler for the /ready endpoint.
///
/// Ready once the exported registry holds a metric other than the
/// collector's own scrape timer.
async fn ready_handler(State(state): State<AppState>) -> Response {
    if !state.collector.has_metrics() {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "not ready - no metrics registered yet\n",
        )
            .into_response()
    } else {
        (StatusCode::OK, "ready\n").into_response()
    }
}

/// HTTP server configuration.
pub struct HttpServer {
    collector: SharedCollector,
    listen_addr: SocketAddr,
    metrics_path: String,
    allowed_origin: Option<String>,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(collector: SharedCollector, listen_addr: SocketAddr, metrics_path: String) -> Self {
        Self {
            collector,
            listen_addr,
            metrics_path,
            allowed_origin: None,
        }
    }

    /// Send `Access-Control-Allow-Origin: <origin>` with every metrics response.
    pub fn with_allowed_origin(mut self, origin: Option<String>) -> Self {
        self.allowed_origin = origin;
        self
    }

    /// Run the HTTP server until the shutdown signal is received.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let allowed_origin = self
            .allowed_origin
            .as_deref()
            .map(HeaderValue::from_str)
            .transpose()
            .map_err(|e| anyhow::anyhow!("Invalid allowed origin: {}", e))?;

        let router = create_router(self.collector, &self.metrics_path, allowed_origin);

        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        info!(
            addr = %listener.local_addr().unwrap_or(self.listen_addr),
            path = %self.metrics_path,
            "HTTP server listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}
