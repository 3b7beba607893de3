use crate::config::Config;
use crate::error::AppError;
use crate::provider::DocumentTranslator;
use crate::storage::{Storage, DOWNLOAD_ROUTE};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{services::ServeDir, set_header::SetResponseHeader, trace::TraceLayer};
use tracing::info;

/// Extra time given to the translator to report its own deadline, which
/// carries the job handle, before the request is cut off here
const TIMEOUT_GRACE: Duration = Duration::from_secs(2);

/// Shared by every request; the translator is injected so tests can stub it
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub storage: Arc<Storage>,
    pub translator: Arc<dyn DocumentTranslator>,
}

impl AppState {
    pub fn new(config: Config, translator: Arc<dyn DocumentTranslator>) -> Self {
        let storage = Storage::from_config(&config);
        Self {
            config: Arc::new(config),
            storage: Arc::new(storage),
            translator,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let downloads = SetResponseHeader::overriding(
        ServeDir::new(state.storage.download_dir()),
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("attachment"),
    );
    let public = ServeDir::new(&state.config.public_dir);
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health))
        .route("/translate", post(translate).layer(DefaultBodyLimit::max(body_limit)))
        .nest_service(DOWNLOAD_ROUTE, downloads)
        .fallback_service(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

/// Upload a document, translate it, and redirect to the result
async fn translate(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut file: Option<(String, Bytes)> = None;
    let mut language: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await?;
                // Browsers send an empty filename when nothing was selected
                if !file_name.is_empty() {
                    file = Some((file_name, data));
                }
            }
            Some("language") => {
                let value = field.text().await?;
                let value = value.trim();
                if !value.is_empty() {
                    language = Some(value.to_string());
                }
            }
            _ => {}
        }
    }

    let (file_name, data) = file.ok_or(AppError::MissingFile)?;
    let target_lang = language.ok_or(AppError::MissingLanguage)?;

    let upload = state
        .storage
        .store_upload(&file_name, &data)
        .await
        .map_err(AppError::Storage)?;
    info!(
        "Received {:?} ({} bytes) as {}, target language {}",
        upload.original_name,
        data.len(),
        upload.stored_name,
        target_lang
    );

    let output = state.storage.output_path(&upload);
    if state
        .storage
        .output_exists(&upload)
        .await
        .map_err(AppError::Storage)?
    {
        return Err(AppError::OutputExists(upload.translated_name()));
    }

    let timeout = state.config.translation_timeout;
    tokio::time::timeout(
        timeout + TIMEOUT_GRACE,
        state
            .translator
            .translate_document(&upload.path, &output, None, &target_lang),
    )
    .await
    .map_err(|_| AppError::Timeout(timeout))??;

    let location = state.storage.download_url(&upload);
    info!("Translated {} -> {}", upload.stored_name, location);

    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}
