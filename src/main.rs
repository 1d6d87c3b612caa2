use anyhow::Context;
use dealsync::config::AppConfig;
use dealsync::store::PostgresConnector;
use dealsync::{create_app, init_tracing, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::debug!(?config, "Loaded configuration");

    // The frontend mount needs the directory to exist even when empty.
    tokio::fs::create_dir_all(&config.server.static_dir)
        .await
        .with_context(|| format!("could not create {}", config.server.static_dir.display()))?;

    let state = AppState::new(PostgresConnector::new(config.database.clone()));
    let app = create_app(state, &config.server.static_dir);

    let listener = tokio::net::TcpListener::bind(config.server.bind_addr)
        .await
        .with_context(|| format!("could not bind {}", config.server.bind_addr))?;
    tracing::info!("Server running on http://{}", config.server.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
