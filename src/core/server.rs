//! HTTP scrape endpoint.
//!
//! Binding happens separately from serving so that a busy port is reported as
//! a startup failure, before any device is polled.

use std::{fmt::Display, future::Future, io, net::SocketAddr, sync::Arc};

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

use super::{exposition, registry::MetricsRegistry};
use crate::config::server::ServerConfig;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind metrics listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Metrics server failed: {0}")]
    Serve(#[source] io::Error),
}

async fn metrics_handler(State(registry): State<Arc<MetricsRegistry>>) -> Response {
    let snapshot = registry.snapshot();
    trace!("Scrape with {} device sample(s)", snapshot.len());

    match exposition::render(&snapshot) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, exposition::CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

fn index_page(metrics_path: &str) -> String {
    format!(
        "<html><head><title>Shelly Exporter</title></head><body>\
         <h1>Shelly Exporter</h1><p><a href=\"{path}\">{path}</a></p>\
         </body></html>",
        path = metrics_path
    )
}

/// Routes of the exposure endpoint: `metrics_path` plus a small index at `/`.
pub fn router(registry: Arc<MetricsRegistry>, metrics_path: &str) -> Router {
    let index = index_page(metrics_path);
    Router::new()
        .route(metrics_path, get(metrics_handler))
        .route(
            "/",
            get(move || std::future::ready(Html(index.clone()))),
        )
        .with_state(registry)
}

/// A bound, not yet serving, metrics listener.
pub struct ExposureServer {
    listener: TcpListener,
    path: String,
}

impl ExposureServer {
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if the configured address is unavailable.
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.listen)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.listen,
                source,
            })?;

        Ok(Self {
            listener,
            path: config.path.clone(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves scrapes until `shutdown` is cancelled.
    ///
    /// New connections stop being accepted on cancellation; responses already
    /// in progress are allowed to complete.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Serve` when the accept loop fails.
    pub async fn serve(
        self,
        registry: Arc<MetricsRegistry>,
        shutdown: CancellationToken,
    ) -> Result<(), ServerError> {
        if let Ok(addr) = self.listener.local_addr() {
            info!("Serving metrics on http://{}{}", addr, self.path);
        }

        axum::serve(self.listener, router(registry, &self.path))
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
            .map_err(ServerError::Serve)?;

        info!("Metrics server stopped");
        Ok(())
    }

    /// Serves scrapes and cancels `shutdown` once serving ends for any reason,
    /// which also stops a scheduler sharing the same token.
    pub async fn run(
        self,
        registry: Arc<MetricsRegistry>,
        shutdown: CancellationToken,
    ) -> Result<(), ServerError> {
        let serving = self.serve(registry, shutdown.clone());
        cancel_on_exit(serving, &shutdown).await
    }
}

/// Awaits `task`, logs its error if any, then cancels `shutdown`.
pub async fn cancel_on_exit<F, E>(task: F, shutdown: &CancellationToken) -> Result<(), E>
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    let result = task.await;
    if let Err(e) = &result {
        error!("{}", e);
    }
    if !shutdown.is_cancelled() {
        warn!("Metrics server exited, requesting shutdown");
        shutdown.cancel();
    }
    result
}
