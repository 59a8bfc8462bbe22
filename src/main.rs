use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use paperdesk::config::Config;
use paperdesk::server::{self, AppState};
use paperdesk::store::SavedArticles;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    let store = SavedArticles::open(&config.save_dir)
        .with_context(|| format!("could not open save directory {}", config.save_dir.display()))?;

    let state = AppState::new(&config, store);
    for host in state.registry.statuses() {
        tracing::info!(host = host.code, implemented = host.implemented, "host registered");
    }

    let listener = TcpListener::bind(("127.0.0.1", config.port))
        .await
        .with_context(|| format!("could not bind 127.0.0.1:{}", config.port))?;
    tracing::info!(
        "Listening on http://127.0.0.1:{}, saving articles to {}",
        config.port,
        config.save_dir.display()
    );

    axum::serve(listener, server::router(state)).await?;
    Ok(())
}
