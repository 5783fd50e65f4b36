use crate::config::ServerConfig;
use crate::error::AppError;
use crate::response::attachment;
use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Json, Multipart, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use docforge_core::{
    ConversionRequest, ConversionResult, Converter, ModelKind, UploadedFile, Uploads,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info};

/// Default request body limit (16 MiB)
pub const DEFAULT_BODY_LIMIT: usize = 16 * 1024 * 1024;

/// Shared handler state. The converter holds the process-wide inpainting model.
#[derive(Clone)]
pub struct AppState {
    pub converter: Arc<Converter>,
}

impl AppState {
    pub fn new(converter: Converter) -> Self {
        Self {
            converter: Arc::new(converter),
        }
    }

    /// Load `kind` once and share it with every request.
    pub fn with_model(kind: ModelKind) -> Self {
        Self::new(Converter::with_model(kind))
    }
}

/// Build the application router with all routes configured
pub fn app() -> Router {
    router(AppState::with_model(ModelKind::default()), DEFAULT_BODY_LIMIT)
}

/// Build the router described by a server configuration.
pub fn app_with(config: &ServerConfig) -> Router {
    let state = AppState::with_model(config.inpaint_model);
    info!(
        "Cleaning images with the '{}' model, uploads limited to {} bytes",
        state.converter.model_name(),
        config.max_upload_bytes
    );
    router(state, config.max_upload_bytes)
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/convert", post(convert_markdown))
        .route("/clean-image", post(clean_image))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Liveness probe
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Convert an uploaded markdown file (`file`) to PDF
pub async fn convert_markdown(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let uploads = collect_uploads(multipart?).await?;
    let request = ConversionRequest::document(uploads)?;
    let result = run_conversion(&state, request).await?;
    Ok(attachment(result))
}

/// Inpaint the masked region of an uploaded image (`image` + `mask`)
pub async fn clean_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let uploads = collect_uploads(multipart?).await?;
    let request = ConversionRequest::clean(uploads)?;
    let result = run_conversion(&state, request).await?;
    Ok(attachment(result))
}

/// Read every file field of the body. Plain form fields are skipped and the
/// first occurrence of a repeated field name wins.
async fn collect_uploads(mut multipart: Multipart) -> Result<Uploads, AppError> {
    let mut uploads = Uploads::new();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let Some(filename) = field.file_name().map(str::to_string) else {
            debug!("Skipping non-file field '{name}'");
            continue;
        };

        let bytes = field.bytes().await?;
        debug!("Received '{name}' ({filename}, {} bytes)", bytes.len());
        uploads.insert(name, UploadedFile::new(filename, bytes.to_vec()));
    }

    Ok(uploads)
}

/// Conversions are CPU-bound, so they run off the async reactor.
async fn run_conversion(
    state: &AppState,
    request: ConversionRequest,
) -> Result<ConversionResult, AppError> {
    let converter = Arc::clone(&state.converter);
    let kind = request.kind();
    let started = Instant::now();

    let result = tokio::task::spawn_blocking(move || converter.convert(request))
        .await
        .map_err(|e| AppError::Internal(format!("{kind} conversion task failed: {e}")))??;

    info!(
        kind,
        bytes = result.bytes.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Conversion finished"
    );
    Ok(result)
}
