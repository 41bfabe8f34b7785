//! Cutbrain server binary

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cutbrain::api::handlers::ApiState;
use cutbrain::background;
use cutbrain::config::AppConfig;
use cutbrain::storage::Store;

#[derive(Debug, Parser)]
#[command(name = "cutbrain", about = "Retention tuning engine for automated video editing")]
struct Cli {
    /// Path to the server config file.
    #[arg(long, default_value = "cutbrain.toml", env = "CUTBRAIN_CONFIG")]
    config: String,

    /// Override the listen address from the config file.
    #[arg(long, env = "CUTBRAIN_ADDR")]
    addr: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut app_config =
        AppConfig::load(&cli.config).context("loading server configuration")?;
    if let Some(addr) = cli.addr {
        app_config.server.addr = addr;
        app_config.validate().context("validating address override")?;
    }

    let store = Store::open(&app_config.storage.path);
    if !store.is_persistent() {
        tracing::warn!("running without persistence; state lives for this process only");
    }

    let state = ApiState::build(&store, &app_config);
    state
        .versions
        .ensure_default(&state.jobs)
        .await
        .context("seeding default config version")?;

    let _scheduler = background::spawn_feedback_scheduler(
        state.feedback_loop.clone(),
        app_config.feedback.interval_minutes,
    );

    let app = cutbrain::api::app(state);
    let listener = tokio::net::TcpListener::bind(&app_config.server.addr)
        .await
        .with_context(|| format!("binding {}", app_config.server.addr))?;
    tracing::info!(addr = %app_config.server.addr, "cutbrain listening");
    axum::serve(listener, app).await.context("server exited")?;
    Ok(())
}
