use crate::config::Config;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Prefix of every translated output file
pub const TRANSLATED_PREFIX: &str = "translated-";

/// Public route the download directory is mounted under
pub const DOWNLOAD_ROUTE: &str = "/downloads";

/// Used when nothing usable is left of the client filename
const FALLBACK_FILENAME: &str = "document";

/// An upload written to the upload directory
#[derive(Debug, Clone)]
pub struct StoredUpload {
    /// Generated name on disk
    pub stored_name: String,
    /// Filename as sent by the client; metadata only, never used in a path
    pub original_name: String,
    pub path: PathBuf,
    pub received_at: DateTime<Utc>,
}

impl StoredUpload {
    pub fn translated_name(&self) -> String {
        format!("{}{}", TRANSLATED_PREFIX, self.stored_name)
    }
}

/// Builds the on-disk name of an upload from the client filename
pub type NameGenerator = fn(&str, DateTime<Utc>) -> String;

/// Upload and download directories shared by all requests
#[derive(Debug, Clone)]
pub struct Storage {
    upload_dir: PathBuf,
    download_dir: PathBuf,
    name_generator: NameGenerator,
}

impl Storage {
    pub fn new(upload_dir: impl Into<PathBuf>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            download_dir: download_dir.into(),
            name_generator: generate_upload_name,
        }
    }

    pub fn with_name_generator(mut self, name_generator: NameGenerator) -> Self {
        self.name_generator = name_generator;
        self
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.upload_dir, &config.download_dir)
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Create both directories if missing
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.upload_dir).context(format!(
            "Failed to create upload directory {}",
            self.upload_dir.display()
        ))?;
        std::fs::create_dir_all(&self.download_dir).context(format!(
            "Failed to create download directory {}",
            self.download_dir.display()
        ))?;
        Ok(())
    }

    /// Write an upload under a freshly generated name
    ///
    /// The file is created exclusively, so an existing upload is never
    /// overwritten.
    pub async fn store_upload(
        &self,
        original_name: &str,
        bytes: &[u8],
    ) -> std::io::Result<StoredUpload> {
        let received_at = Utc::now();
        let stored_name = (self.name_generator)(original_name, received_at);
        let path = self.upload_dir.join(&stored_name);

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        debug!(
            "Stored upload {:?} as {} ({} bytes)",
            original_name,
            path.display(),
            bytes.len()
        );

        Ok(StoredUpload {
            stored_name,
            original_name: original_name.to_string(),
            path,
            received_at,
        })
    }

    /// Where the provider should write the translation of `upload`
    pub fn output_path(&self, upload: &StoredUpload) -> PathBuf {
        self.download_dir.join(upload.translated_name())
    }

    /// True when a translation for `upload` is already on disk
    pub async fn output_exists(&self, upload: &StoredUpload) -> std::io::Result<bool> {
        tokio::fs::try_exists(self.output_path(upload)).await
    }

    /// Public URL of the translated file
    pub fn download_url(&self, upload: &StoredUpload) -> String {
        format!("{}/{}", DOWNLOAD_ROUTE, upload.translated_name())
    }
}

/// Build `<timestamp>-<random>-<sanitized name>` for a new upload
pub fn generate_upload_name(original_name: &str, at: DateTime<Utc>) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        at.format("%Y%m%dT%H%M%S%3fZ"),
        &id[..8],
        sanitize_filename(original_name)
    )
}

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]").expect("valid filename regex"))
}

/// Reduce a client-supplied filename to a single safe path component
///
/// Stem and extension are cleaned separately so the extension survives
/// even when nothing of the stem does (`отчёт.pdf` -> `document.pdf`).
/// The provider detects the document type from the extension.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let (stem, extension) = match base.rfind('.') {
        Some(dot) if dot > 0 => (&base[..dot], &base[dot + 1..]),
        _ => (base, ""),
    };

    let stem = unsafe_chars().replace_all(stem, "_");
    let stem = match stem.trim_start_matches(['.', '_']) {
        "" => FALLBACK_FILENAME,
        cleaned => cleaned,
    };

    let extension = unsafe_chars().replace_all(extension, "_");
    let extension = extension.trim_matches(['.', '_']);

    if extension.is_empty() {
        stem.to_string()
    } else {
        format!("{}.{}", stem, extension)
    }
}
