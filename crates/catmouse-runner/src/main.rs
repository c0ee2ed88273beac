//! Runs one cat and mouse episode and prints its summary as JSON.

mod driver;
mod telemetry;

use anyhow::{Context, Result};
use catmouse_core::RunnerConfig;
use catmouse_world::RoundScheduler;
use driver::EpisodeDriver;
use tokio::signal;
use tracing::{error, info, trace};

#[tokio::main]
async fn main() -> Result<()> {
    let runner = RunnerConfig::from_env();

    telemetry::init_telemetry(runner.log_json)?;

    let config = runner
        .load_simulation_config()
        .context("failed to load simulation config")?;

    info!(
        config_path = runner.config_path.as_deref().unwrap_or("<default>"),
        seed = config.seed,
        map_size = config.world.map_size,
        num_cats = config.num_cats,
        num_mice = config.num_mice,
        auto_advance = config.auto_advance,
        round_delay_ms = config.round_delay_ms,
        "Starting cat and mouse episode"
    );

    let scheduler = RoundScheduler::new(config).context("failed to set up episode")?;
    let driver = EpisodeDriver::new(scheduler);
    trace!("Initial grid\n{}", driver.scheduler().grid());

    let summary = driver.run(shutdown_signal()).await;

    match summary.outcome {
        Some(outcome) => info!(%outcome, rounds = summary.stats.rounds_played, "Episode over"),
        None => info!(rounds = summary.stats.rounds_played, "Episode stopped without a winner"),
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
