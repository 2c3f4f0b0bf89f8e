use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::config::RelayConfig;
use super::types::{ApiError, HealthStatus, TextQuery};
use super::upload::{UploadForm, FILE_SLOTS};
use crate::relay::pdf_relay::{PdfRelay, PdfRelayInput};
use crate::relay::text_relay::{TextRelay, TextRelayInput};
use crate::relay::zip_relay::{ZipRelay, ZipRelayInput};
use crate::utils::gemini::GenerationProvider;

#[derive(Clone)]
pub struct AppState {
    pdf: Arc<PdfRelay>,
    zip: Arc<ZipRelay>,
    text: Arc<TextRelay>,
}

impl AppState {
    pub fn new(provider: Arc<dyn GenerationProvider>, config: &RelayConfig) -> Self {
        Self {
            pdf: Arc::new(PdfRelay::new(provider.clone(), config.document_settings())),
            zip: Arc::new(ZipRelay::new(provider.clone(), config.document_settings())),
            text: Arc::new(TextRelay::new(provider, config.text_settings())),
        }
    }
}

/// Builds the router. The `/ocr-*` and `/query` paths are aliases kept for
/// existing clients.
pub fn build_router(state: AppState, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/relay/pdf", post(relay_pdf))
        .route("/relay/zip", post(relay_zip))
        .route("/relay/text", post(relay_text))
        .route("/ocr-pdf-gemini", post(relay_pdf))
        .route("/ocr-zip-gemini", post(relay_zip))
        .route("/query", post(relay_text))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthStatus {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

async fn relay_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = UploadForm::from_multipart(multipart).await?;

    let answer = state
        .pdf
        .execute(PdfRelayInput {
            prompt: form.field("prompt"),
            api_key: form.field("apiKey"),
            file: form.file(FILE_SLOTS),
        })
        .await?;

    Ok(answer.into_response())
}

async fn relay_zip(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = UploadForm::from_multipart(multipart).await?;

    let answers = state
        .zip
        .execute(ZipRelayInput {
            prompt: form.field("prompt"),
            api_key: form.field("apiKey"),
            file: form.file(FILE_SLOTS),
        })
        .await?;

    Ok(Json(answers).into_response())
}

async fn relay_text(
    State(state): State<AppState>,
    body: Result<Json<TextQuery>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(query) = body?;

    let answer = state
        .text
        .execute(TextRelayInput {
            prompt: query.prompt,
            query: query.query,
            api_key: query.api_key,
        })
        .await?;

    Ok(answer.into_response())
}

pub struct RelayServer {
    config: RelayConfig,
    provider: Arc<dyn GenerationProvider>,
}

impl RelayServer {
    pub fn new(config: RelayConfig, provider: Arc<dyn GenerationProvider>) -> Self {
        Self { config, provider }
    }

    pub async fn start(&self) -> Result<()> {
        let state = AppState::new(self.provider.clone(), &self.config);
        let router = build_router(state, self.config.body_limit_bytes);

        let address = self.config.bind_address();
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("failed to bind {}", address))?;

        info!("Relay server listening on http://{}", address);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("server error")?;

        info!("Relay server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
