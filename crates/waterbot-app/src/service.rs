use axum::Router;
use axum::response::Html;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::ServeConfig;
use crate::error::ServeError;

const PAGE: &str = "<!doctype html>\n\
<html>\n\
  <head><title>FastHTML</title></head>\n\
  <body>\n\
    <h1>FastHTML</h1>\n\
    <p>Let's do this!</p>\n\
  </body>\n\
</html>\n";

/// Serves a single static page at `/`.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderService;

impl PlaceholderService {
    pub fn new() -> Self {
        Self
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(index))
            .layer(TraceLayer::new_for_http())
    }
}

async fn index() -> Html<&'static str> {
    Html(PAGE)
}

/// Bind `config` and serve until the process is stopped.
pub async fn serve(service: PlaceholderService, config: &ServeConfig) -> Result<(), ServeError> {
    let listener = config.bind().await?;
    serve_listener(listener, service).await
}

/// Serve on an already-bound listener.
pub async fn serve_listener(
    listener: TcpListener,
    service: PlaceholderService,
) -> Result<(), ServeError> {
    match listener.local_addr() {
        Ok(addr) => tracing::info!("listening on {addr}"),
        Err(e) => tracing::warn!(error = %e, "listening on unknown address"),
    }
    axum::serve(listener, service.router())
        .await
        .map_err(|e| ServeError::Serve { source: e })
}
