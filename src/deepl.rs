use crate::config::Config;
use crate::poll::{poll_until, PollConfig, PollStatus};
use crate::provider::{DocumentHandle, DocumentTranslator, TranslationError};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

const DEEPL_PRO_API_URL: &str = "https://api.deepl.com";
const DEEPL_FREE_API_URL: &str = "https://api-free.deepl.com";

/// Default bound on a whole translation (upload, polling, download)
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Free-tier keys carry this suffix and must use the free endpoint
const FREE_KEY_SUFFIX: &str = ":fx";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    document_id: String,
    document_key: String,
}

#[derive(Debug, Serialize)]
struct DocumentKeyRequest<'a> {
    document_key: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum DocumentStatus {
    Queued,
    Translating,
    Done,
    Error,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: DocumentStatus,
    seconds_remaining: Option<u64>,
    billed_characters: Option<u64>,
    error_message: Option<String>,
}

/// Pick the API endpoint matching the account type of `api_key`
pub fn default_api_url(api_key: &str) -> &'static str {
    if api_key.ends_with(FREE_KEY_SUFFIX) {
        DEEPL_FREE_API_URL
    } else {
        DEEPL_PRO_API_URL
    }
}

/// DeepL document translation over the v2 REST API
///
/// A translation is three calls: upload the document, poll its status
/// until it is done, then download the result. The whole sequence runs
/// under one deadline so a job that outlives it still reports its handle.
#[derive(Debug, Clone)]
pub struct DeepLClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    poll: PollConfig,
    timeout: Duration,
}

impl DeepLClient {
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Self {
        let api_key = api_key.into();
        let base_url = base_url
            .unwrap_or_else(|| default_api_url(&api_key).to_string())
            .trim_end_matches('/')
            .to_string();

        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            poll: PollConfig::document_status(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.deepl_api_key.clone(), config.deepl_api_url.clone())
            .with_timeout(config.translation_timeout)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn auth_header(&self) -> String {
        format!("DeepL-Auth-Key {}", self.api_key)
    }

    /// Send the document; DeepL answers with the job handle
    async fn upload(
        &self,
        input: &Path,
        source_lang: Option<&str>,
        target_lang: &str,
    ) -> Result<DocumentHandle, TranslationError> {
        let bytes = tokio::fs::read(input).await?;
        let file_name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());

        let mut form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name))
            .text("target_lang", target_lang.to_string());
        if let Some(source_lang) = source_lang {
            form = form.text("source_lang", source_lang.to_string());
        }

        let response = self
            .client
            .post(format!("{}/v2/document", self.base_url))
            .header("Authorization", self.auth_header())
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(TranslationError::Api { status, body });
        }

        let upload: UploadResponse = response
            .json()
            .await
            .map_err(|e| TranslationError::InvalidResponse(format!("upload response: {}", e)))?;

        Ok(DocumentHandle {
            document_id: upload.document_id,
            document_key: upload.document_key,
        })
    }

    /// One status check; `Ready` carries the billed character count
    async fn check_status(
        &self,
        handle: &DocumentHandle,
    ) -> Result<PollStatus<Option<u64>>, TranslationError> {
        let response = self
            .client
            .post(format!("{}/v2/document/{}", self.base_url, handle.document_id))
            .header("Authorization", self.auth_header())
            .json(&DocumentKeyRequest {
                document_key: &handle.document_key,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TranslationError::Api { status, body });
        }

        let status: StatusResponse = response
            .json()
            .await
            .map_err(|e| TranslationError::InvalidResponse(format!("status response: {}", e)))?;

        match status.status {
            DocumentStatus::Done => Ok(PollStatus::Ready(status.billed_characters)),
            DocumentStatus::Queued | DocumentStatus::Translating => Ok(PollStatus::Pending {
                hint: status.seconds_remaining.map(Duration::from_secs),
            }),
            DocumentStatus::Error => Err(TranslationError::document(
                handle,
                status
                    .error_message
                    .unwrap_or_else(|| "translation failed".to_string()),
            )),
            DocumentStatus::Unknown => Err(TranslationError::InvalidResponse(
                "unknown document status".to_string(),
            )),
        }
    }

    /// Fetch the translated document and write it to `output`
    async fn download(&self, handle: &DocumentHandle, output: &Path) -> Result<(), TranslationError> {
        let response = self
            .client
            .post(format!(
                "{}/v2/document/{}/result",
                self.base_url, handle.document_id
            ))
            .header("Authorization", self.auth_header())
            .json(&DocumentKeyRequest {
                document_key: &handle.document_key,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TranslationError::Api { status, body });
        }

        let bytes = response.bytes().await?;
        let len = bytes.len();

        // Written to a hidden temp file next to the output and moved into
        // place when complete, so the download directory never exposes a
        // truncated file. The temp file removes itself if anything fails.
        let dir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        let target = output.to_path_buf();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut partial = tempfile::Builder::new()
                .prefix(".partial-")
                .tempfile_in(&dir)?;
            partial.write_all(&bytes)?;
            partial.as_file().sync_all()?;
            partial.persist_noclobber(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(std::io::Error::other)??;

        debug!("Wrote {} bytes to {}", len, output.display());
        Ok(())
    }
}

#[async_trait]
impl DocumentTranslator for DeepLClient {
    async fn translate_document(
        &self,
        input: &Path,
        output: &Path,
        source_lang: Option<&str>,
        target_lang: &str,
    ) -> Result<(), TranslationError> {
        let deadline = Instant::now() + self.timeout;

        let handle = timeout_at(deadline, self.upload(input, source_lang, target_lang))
            .await
            .map_err(|_| TranslationError::Timeout {
                after: self.timeout,
                handle: None,
            })??;
        info!(
            "DeepL accepted {} (document_id: {})",
            input.display(),
            handle.document_id
        );

        let finished = timeout_at(deadline, async {
            let billed = poll_until(&self.poll, "DeepL document status", || {
                self.check_status(&handle)
            })
            .await?;
            self.download(&handle, output).await?;
            Ok::<_, TranslationError>(billed)
        })
        .await;

        match finished {
            Ok(Ok(billed)) => {
                info!(
                    "Translation finished: {} (billed characters: {})",
                    output.display(),
                    billed.map_or_else(|| "unknown".to_string(), |c| c.to_string())
                );
                Ok(())
            }
            Err(_) => {
                warn!(
                    "DeepL job {} still unfinished after {:?}",
                    handle.document_id, self.timeout
                );
                Err(TranslationError::Timeout {
                    after: self.timeout,
                    handle: Some(handle),
                })
            }
            // Anything failing after the upload keeps the handle for recovery
            Ok(Err(e @ TranslationError::Document { .. })) => Err(e),
            Ok(Err(e)) => Err(TranslationError::document(&handle, e)),
        }
    }
}
