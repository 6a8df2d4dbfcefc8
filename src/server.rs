//! HTTP surface of the translator.
//!
//! - `POST /api/process` translate or fill a locale map
//! - `GET  /api/languages` selectable languages
//! - `GET  /health` liveness

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tracing::info;

use crate::languages::{Language, LANGUAGES};
use crate::pipeline::{HandlerResponse, ProcessRequest, RequestHandler};

#[derive(Clone)]
pub struct ApiState {
    pub handler: Arc<RequestHandler>,
}

#[derive(Serialize)]
pub struct LanguagesResponse {
    pub languages: &'static [Language],
}

impl IntoResponse for HandlerResponse {
    fn into_response(self) -> Response {
        let status = if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::OK
        };
        (status, Json(self.envelope())).into_response()
    }
}

pub fn create_router(handler: Arc<RequestHandler>) -> Router {
    let state = ApiState { handler };

    Router::new()
        .route("/api/process", post(process))
        .route("/api/languages", get(languages))
        .route("/health", get(health))
        .with_state(state)
}

async fn process(
    State(state): State<ApiState>,
    Json(req): Json<ProcessRequest>,
) -> HandlerResponse {
    info!(
        mode = req.mode.as_deref().unwrap_or(""),
        has_key = req.key.as_deref().is_some_and(|k| !k.is_empty()),
        "POST /api/process"
    );
    state.handler.handle(req).await
}

async fn languages() -> Json<LanguagesResponse> {
    Json(LanguagesResponse {
        languages: LANGUAGES,
    })
}

async fn health() -> &'static str {
    "ok"
}

pub async fn serve(listen: SocketAddr, handler: Arc<RequestHandler>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("bind {listen}"))?;
    info!(addr = %listener.local_addr().unwrap_or(listen), "listening");
    axum::serve(listener, create_router(handler))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await
        .context("http server")?;
    Ok(())
}
