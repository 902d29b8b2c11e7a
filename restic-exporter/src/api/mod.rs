//! HTTP exposition: `/metrics` and an index page.

pub mod error;

use crate::metrics::exposition::content_type;
use crate::metrics::{Exposition, MetricsStore};
use axum::extract::State;
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use error::AppError;

const INDEX_HTML: &str =
    r#"<h1>Restic Exporter</h1><pre><a href="/metrics">/metrics</a></pre>"#;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<MetricsStore>,
    pub exposition: Arc<Exposition>,
}

impl AppState {
    pub fn new(metrics: Arc<MetricsStore>, exposition: Exposition) -> Self {
        Self {
            metrics,
            exposition: Arc::new(exposition),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET / - static landing page
async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /metrics - gauges of the last published run
async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let Some(run) = state.metrics.latest() else {
        return Err(AppError::ServiceUnavailable(
            "No collection has completed yet".into(),
        ));
    };

    let body = state.exposition.render(&run, chrono::Utc::now())?;
    Ok(([(header::CONTENT_TYPE, content_type())], body))
}
