use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tone_studio::api;
use tone_studio::app_state::AppState;
use tone_studio::config::{self, StudioConfig};

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let figment = config::figment();
    let studio = StudioConfig::from_figment(&figment).context("invalid `studio` configuration")?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = ?studio.backend,
        max_concurrent_infer = studio.max_concurrent_infer,
        sentiment = %studio.sentiment.repo,
        generator = %studio.generator.repo,
        "starting tone-studio"
    );

    // first run downloads ~1 GB of weights into the hf cache
    let state = tokio::task::spawn_blocking(move || AppState::load(&studio))
        .await
        .context("model loading task panicked")?
        .context("failed to load models")?;

    let _ = api::build(figment, state).launch().await?;
    Ok(())
}
