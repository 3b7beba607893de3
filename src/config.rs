use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // DeepL
    pub deepl_api_key: String,
    pub deepl_api_url: Option<String>,

    // Storage
    pub upload_dir: PathBuf,
    pub download_dir: PathBuf,
    pub public_dir: PathBuf,

    // Server
    pub host: String,
    pub port: u16,

    // Limits
    pub translation_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            // DeepL - the key is the only required setting
            deepl_api_key: std::env::var("DEEPL_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .context("DEEPL_API_KEY not set")?,
            deepl_api_url: std::env::var("DEEPL_API_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),

            // Storage
            upload_dir: std::env::var("UPLOAD_DIR")
                .unwrap_or_else(|_| "uploads".to_string())
                .into(),
            download_dir: std::env::var("DOWNLOAD_DIR")
                .unwrap_or_else(|_| "downloads".to_string())
                .into(),
            public_dir: std::env::var("PUBLIC_DIR")
                .unwrap_or_else(|_| "public".to_string())
                .into(),

            // Server
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),

            // Limits
            translation_timeout: Duration::from_secs(
                std::env::var("TRANSLATION_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(300),
            ),
            max_upload_bytes: std::env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30 * 1024 * 1024),
        })
    }

    /// Socket address string the server binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
