use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// Identifies a document job the provider has accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentHandle {
    pub document_id: String,
    pub document_key: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TranslationError {
    /// The provider accepted the document, but translating it or fetching
    /// the result failed afterwards. The handle allows manual recovery.
    #[error("document translation failed (document_id: {document_id}, document_key: {document_key}): {reason}")]
    Document {
        document_id: String,
        document_key: String,
        reason: String,
    },

    /// The deadline passed. `handle` is set when the provider had already
    /// accepted the document.
    #[error("translation timed out after {after:?}{}", timeout_suffix(.handle))]
    Timeout {
        after: Duration,
        handle: Option<DocumentHandle>,
    },

    #[error("translation API error ({status}): {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("request to translation API failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected response from translation API: {0}")]
    InvalidResponse(String),
}

impl TranslationError {
    pub fn document(handle: &DocumentHandle, reason: impl ToString) -> Self {
        Self::Document {
            document_id: handle.document_id.clone(),
            document_key: handle.document_key.clone(),
            reason: reason.to_string(),
        }
    }

    /// Job handle, present only when the provider had accepted the document
    pub fn handle(&self) -> Option<DocumentHandle> {
        match self {
            Self::Document {
                document_id,
                document_key,
                ..
            } => Some(DocumentHandle {
                document_id: document_id.clone(),
                document_key: document_key.clone(),
            }),
            Self::Timeout { handle, .. } => handle.clone(),
            _ => None,
        }
    }
}

fn timeout_suffix(handle: &Option<DocumentHandle>) -> String {
    match handle {
        Some(handle) => format!(
            " (document_id: {}, document_key: {})",
            handle.document_id, handle.document_key
        ),
        None => String::new(),
    }
}

/// Document translation provider
///
/// Implementations read `input`, translate it, and write the result to
/// `output`. `source_lang: None` asks the provider to detect the language.
#[async_trait]
pub trait DocumentTranslator: Send + Sync {
    async fn translate_document(
        &self,
        input: &Path,
        output: &Path,
        source_lang: Option<&str>,
        target_lang: &str,
    ) -> Result<(), TranslationError>;
}
