//! Actix-Web HTTP surface.
//!
//! | Method | Path           | Body                                   |
//! |--------|----------------|----------------------------------------|
//! | POST   | `/process-pdf` | multipart form, PDF in the `file` field |
//! | GET    | `/health`      |                                        |
//!
//! A successful upload answers `{"data": [...]}` with one object per
//! normalised row (an empty list when no table was recognised). Failures
//! answer `{"detail": "..."}`: 400 for bad input, 413 for oversized
//! uploads, 500 when extraction itself fails.

use crate::config::ExtractionConfig;
use crate::convert::extract_from_bytes_with;
use crate::error::Pdf2TableError;
use crate::pipeline::extract::{PdfiumTableSource, TableSource};
use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::{middleware, web, App, HttpResponse, HttpServer, ResponseError};
use futures::TryStreamExt;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn, Instrument};

/// Form field that carries the uploaded PDF.
pub const UPLOAD_FIELD: &str = "file";

/// Bind address and upload limits.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted upload in bytes. Default: 50 MiB.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Shared application state.
pub struct AppState {
    /// Table source shared by all requests.
    pub source: Arc<dyn TableSource>,
    /// Extraction settings applied to every upload.
    pub config: ExtractionConfig,
    /// Largest accepted upload in bytes.
    pub max_upload_bytes: usize,
}

impl AppState {
    /// State backed by the pdfium table source.
    pub fn new(config: ExtractionConfig, max_upload_bytes: usize) -> Self {
        Self::with_source(Arc::new(PdfiumTableSource), config, max_upload_bytes)
    }

    pub fn with_source(
        source: Arc<dyn TableSource>,
        config: ExtractionConfig,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            source,
            config,
            max_upload_bytes,
        }
    }
}

/// Register the API routes on an [`App`].
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/process-pdf", web::post().to(process_pdf));
}

/// Run the server until it is stopped.
pub async fn serve(server: ServerConfig, state: AppState) -> std::io::Result<()> {
    let state = web::Data::new(state);

    info!(
        "Starting server on {}:{} (pages {}, alignment {})",
        server.host, server.port, state.config.pages, state.config.alignment
    );

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((server.host, server.port))?
    .run()
    .await
}

// ── Handlers ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiHealth {
    healthy: bool,
    version: String,
}

/// `GET /health`
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `POST /process-pdf`
async fn process_pdf(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let span = tracing::info_span!("process_pdf");

    async move {
        let bytes = read_upload(payload, state.max_upload_bytes).await?;
        info!("Received upload: {} bytes", bytes.len());

        let source = Arc::clone(&state.source);
        let output = extract_from_bytes_with(source, &bytes, &state.config).await?;
        Ok::<_, ApiError>(HttpResponse::Ok().json(output.envelope()))
    }
    .instrument(span)
    .await
}

/// Pull the `file` field out of the form, enforcing content type and size.
async fn read_upload(mut payload: Multipart, limit: usize) -> Result<Vec<u8>, ApiError> {
    while let Some(mut field) = payload.try_next().await.map_err(ApiError::multipart)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let content_type = field.content_type().map(|m| m.essence_str().to_string());
        if content_type.as_deref() != Some("application/pdf") {
            return Err(Pdf2TableError::UnsupportedContentType { content_type }.into());
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(ApiError::multipart)? {
            if bytes.len() + chunk.len() > limit {
                return Err(Pdf2TableError::UploadTooLarge { limit }.into());
            }
            bytes.extend_from_slice(&chunk);
        }
        return Ok(bytes);
    }

    Err(ApiError::MissingFile)
}

// ── Errors ───────────────────────────────────────────────────────────────

/// Errors surfaced by the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Extraction(#[from] Pdf2TableError),

    #[error("Invalid multipart upload: {0}")]
    Multipart(String),

    #[error("Missing form field 'file'")]
    MissingFile,
}

impl ApiError {
    fn multipart(e: actix_multipart::MultipartError) -> Self {
        ApiError::Multipart(e.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    detail: String,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Extraction(Pdf2TableError::UploadTooLarge { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            ApiError::Extraction(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Extraction(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Multipart(_) | ApiError::MissingFile => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let detail = if status.is_server_error() {
            warn!("PDF processing failed: {}", self);
            format!("Error processing PDF: {self}")
        } else {
            self.to_string()
        };
        HttpResponse::build(status).json(ApiErrorBody { detail })
    }
}
