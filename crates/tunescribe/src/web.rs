//! HTTP surface: conversion endpoints, health, and discovery.

use crate::error::ConvertError;
use crate::pipeline::{ConversionRequest, Converter, UploadRequest};
use axum::{
    extract::{
        multipart::{Multipart, MultipartRejection},
        rejection::JsonRejection,
        DefaultBodyLimit, State,
    },
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use scribeconf::LimitsConfig;
use serde_json::json;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

pub const SONG_FAILED: &str = "Failed to convert song";
pub const UPLOAD_FAILED: &str = "Failed to convert audio file";

/// Shared state for web handlers
#[derive(Clone)]
pub struct AppState {
    pub converter: Converter,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(converter: Converter) -> Self {
        Self {
            converter,
            start_time: Instant::now(),
        }
    }
}

pub fn router(state: AppState, limits: &LimitsConfig) -> Router {
    Router::new()
        .route("/convert-from-prompt", post(convert_from_prompt))
        .route("/api/convert-song", post(convert_from_prompt))
        .route("/convert-from-upload", post(convert_from_upload))
        .route("/api/upload-audio", post(convert_from_upload))
        .route("/health", get(health))
        .route("/", get(serve_root))
        .layer(DefaultBodyLimit::max(limits.max_upload_bytes))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Browser clients on any origin may call the conversion endpoints.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// A failed request: the pipeline's error plus the summary used when the
/// error itself is not fit to show as the headline.
#[derive(Debug)]
pub struct ApiFailure {
    label: &'static str,
    error: ConvertError,
}

impl ApiFailure {
    pub fn new(label: &'static str, error: ConvertError) -> Self {
        Self { label, error }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let (status, summary) = match &self.error {
            ConvertError::Validation(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ConvertError::Configuration(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, self.label.to_string()),
        };

        if status.is_server_error() {
            error!(error = ?self.error, summary = %summary, "conversion failed");
        } else {
            warn!(error = %self.error, "rejected conversion request");
        }

        let mut body = json!({
            "error": summary,
            "details": self.error.to_string(),
        });
        if let Some(code) = self.error.upstream_status() {
            body["statusCode"] = json!(code);
        }
        (status, Json(body)).into_response()
    }
}

async fn convert_from_prompt(
    State(state): State<AppState>,
    body: Result<Json<ConversionRequest>, JsonRejection>,
) -> Result<Response, ApiFailure> {
    let Json(request) = body.map_err(|rejection| {
        ApiFailure::new(
            SONG_FAILED,
            ConvertError::Validation(format!("Invalid request body: {}", rejection.body_text())),
        )
    })?;

    let conversion = state
        .converter
        .convert_prompt(&request)
        .await
        .map_err(|e| ApiFailure::new(SONG_FAILED, e))?;
    Ok(Json(conversion).into_response())
}

async fn convert_from_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiFailure> {
    let fail = |e: ConvertError| ApiFailure::new(UPLOAD_FAILED, e);

    let mut multipart = multipart.map_err(|rejection| {
        fail(ConvertError::Validation(format!(
            "Invalid upload body: {}",
            rejection.body_text()
        )))
    })?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        fail(ConvertError::Validation(format!(
            "Failed to read upload: {}",
            e.body_text()
        )))
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await.map_err(|e| {
            fail(ConvertError::Validation(format!(
                "Failed to read upload: {}",
                e.body_text()
            )))
        })?;
        upload = Some(UploadRequest { filename, bytes });
    }

    let conversion = state.converter.convert_upload(upload).await.map_err(fail)?;
    Ok(Json(conversion).into_response())
}

/// Health check endpoint
async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "generation_configured": state.converter.generation_configured(),
    }))
}

/// Serve root discovery endpoint
async fn serve_root() -> impl IntoResponse {
    Json(json!({
        "name": "tunescribe",
        "version": env!("CARGO_PKG_VERSION"),
        "links": {
            "convert_from_prompt": "/convert-from-prompt",
            "convert_from_upload": "/convert-from-upload",
            "health": "/health",
        }
    }))
}
