use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use genai_relay_server::config::AppConfig;
use genai_relay_server::model_client::GeminiClient;
use genai_relay_server::{build_rocket, AppState};

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    info!(?config, "starting genai-relay-server");

    let client = GeminiClient::new(&config).context("failed to build model client")?;
    let state =
        AppState::new(&config, Arc::new(client)).context("failed to build image fetcher")?;

    let _ = build_rocket(state).launch().await?;
    Ok(())
}
