mod api;
mod app;
mod config;
mod db;
mod domain;
mod error;
mod logging;
mod middleware;
mod repository;
mod routes;
mod services;

#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use std::sync::Arc;

use repository::{InMemoryProfileRepository, PostgresProfileRepository, ProfileRepository};
use services::{CredentialStore, FileStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = config::Settings::from_env()?;

    // Initialize logging
    logging::init_logging(&settings);

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        "Starting profile registry"
    );

    // Profile store
    let profiles: Arc<dyn ProfileRepository> = match &settings.database_url {
        Some(url) => {
            let pool = db::create_pool(url, settings.database_max_connections).await?;
            Arc::new(PostgresProfileRepository::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set - profiles are kept in memory and lost on restart");
            Arc::new(InMemoryProfileRepository::new())
        }
    };

    // Photo storage
    let files = FileStore::open(
        &settings.upload_dir,
        &settings.upload_public_path,
        settings.upload_policy(),
    )
    .await
    .with_context(|| format!("Failed to open upload directory {}", settings.upload_dir.display()))?;
    tracing::info!(dir = %settings.upload_dir.display(), "Upload storage ready");

    let credentials = CredentialStore::new(settings.password_hash)?;

    // Create application state
    let state = app::AppState::new(settings.clone(), profiles, files, credentials);

    // Build application
    let app = app::create_app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    tracing::info!("Listening on {}", settings.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
