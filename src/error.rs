use crate::provider::TranslationError;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::time::Duration;
use tracing::{error, warn};

/// Body returned for provider failures that carry no job handle
pub const GENERIC_TRANSLATION_FAILURE: &str = "An error occurred during translation";

/// Everything that can end a `/translate` request early
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("No file part in the request")]
    MissingFile,

    #[error("Please select a target language")]
    MissingLanguage,

    #[error("Malformed upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Failed to store the uploaded file: {0}")]
    Storage(#[source] std::io::Error),

    #[error("Translated file {0} already exists")]
    OutputExists(String),

    #[error("Translation timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Translation(#[from] TranslationError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingFile | Self::MissingLanguage => StatusCode::BAD_REQUEST,
            Self::Multipart(e) => e.status(),
            Self::Timeout(_) | Self::Translation(TranslationError::Timeout { .. }) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            Self::Storage(_) | Self::Translation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::OutputExists(_) => StatusCode::CONFLICT,
        }
    }

    /// Plain-text body sent to the client
    fn body(&self) -> String {
        match self {
            Self::Multipart(e) => format!("Malformed upload: {}", e.body_text()),
            Self::Storage(_) => "Failed to store the uploaded file".to_string(),
            Self::Translation(TranslationError::Timeout { after, handle }) => match handle {
                Some(handle) => format!(
                    "Translation timed out after {:?}. The document was accepted \
                     and may still finish. Document ID: {}, Document key: {}",
                    after, handle.document_id, handle.document_key
                ),
                None => format!("Translation timed out after {:?}", after),
            },
            Self::Translation(e) => match e.handle() {
                Some(handle) => format!(
                    "Translation failed after the document was accepted. \
                     Document ID: {}, Document key: {}",
                    handle.document_id, handle.document_key
                ),
                None => GENERIC_TRANSLATION_FAILURE.to_string(),
            },
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Translate request failed ({}): {}", status, self);
        } else {
            warn!("Translate request rejected ({}): {}", status, self);
        }

        (status, self.body()).into_response()
    }
}
