// HTTP surface: GET /feed?slug=<slug>

use crate::feed::ATOM_CONTENT_TYPE;
use crate::pipeline::{FeedError, FeedPipeline};
use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::Level;

const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<FeedPipeline>,
}

#[derive(Debug, Deserialize)]
pub struct FeedParams {
    pub slug: Option<String>,
}

impl FeedError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            FeedError::NotFound { .. } => StatusCode::NOT_FOUND,
            FeedError::Fetch { .. } => StatusCode::BAD_GATEWAY,
            FeedError::Render { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for FeedError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            [(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)],
            self.public_message(),
        )
            .into_response()
    }
}

async fn feed(State(state): State<AppState>, Query(params): Query<FeedParams>) -> Response {
    // A missing slug is just another unknown one
    let slug = params.slug.unwrap_or_default();

    match state.pipeline.feed(&slug).await {
        Ok(document) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, ATOM_CONTENT_TYPE)],
            document.body,
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn router(state: AppState) -> Router {
    let trace = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
            )
        })
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );

    Router::new()
        .route("/feed", get(feed))
        .layer(trace)
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, router: Router) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutdown requested");
    }
}
