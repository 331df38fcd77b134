use anyhow::Context;
use flightsurety::{cli::config_path_from_args, config::Config, logging::init_tracing, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = config_path_from_args()?;
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let logging = init_tracing(&config.logging).context("failed to initialize logging")?;

    tracing::info!(
        target: "main",
        run_id = %logging.run_id(),
        config = %config_path.display(),
        "flightsurety_starting"
    );
    let outcome = server::run(config).await;
    if let Err(err) = &outcome {
        tracing::error!(target: "main", error = %format!("{err:#}"), "flightsurety_failed");
    }
    outcome
}
