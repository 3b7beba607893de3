use anyhow::{Context, Result};
use document_translator::config::Config;
use document_translator::deepl::DeepLClient;
use document_translator::server::{create_router, AppState};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when the variables come from the environment)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("document_translator=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    info!("Starting document translator");

    // Load configuration from environment
    let config = Config::from_env()?;

    let translator = DeepLClient::from_config(&config);
    info!("Using DeepL API at {}", translator.base_url());

    let state = AppState::new(config.clone(), Arc::new(translator));
    state.storage.ensure_dirs()?;
    info!(
        "Uploads in {}, downloads in {}",
        state.storage.upload_dir().display(),
        state.storage.download_dir().display()
    );

    let app = create_router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
