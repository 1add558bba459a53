//! Manualdesk server binary

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use manualdesk::config::Config;
use manualdesk::store::Store;
use manualdesk::{api, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "manualdesk=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();

    // Database connection and migrations
    let store = Store::connect(&config.database_url, config.max_connections).await?;

    if let Some(email) = &config.bootstrap_superadmin {
        let user = store.ensure_superadmin(email).await?;
        tracing::info!(user_id = %user.id, "Superadmin {} ready", user.email);
    }

    let state = AppState::from_store(store);
    let app = api::router(state, config.max_photo_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
