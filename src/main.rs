//! Action entrypoint: verify a CI-built NuGet package and republish it.

use anyhow::{Result, anyhow};
use tracing::{error, info};

use nuget_relay::{
    config::{Config, Mode},
    env::set_output,
    github::Client,
    pipeline,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env()?;
    let client = Client::new(config.source_token.clone());

    let outcome = match &config.mode {
        Mode::Single(target) => {
            info!(
                "checking run #{} of workflow {:?} in {}/{}",
                target.run_number, target.workflow, config.source_owner, target.repo
            );
            pipeline::run_single(&client, &config, target)
                .await
                .map_err(anyhow::Error::from)
        }
        Mode::Batch(targets) => {
            info!("scanning {} targets", targets.len());
            let report = pipeline::run_batch(&client, &config, targets).await;
            if report.is_failed() {
                Err(anyhow!(
                    "{} of the scanned packages failed verification or publishing",
                    report.failures().len()
                ))
            } else {
                Ok(())
            }
        }
    };

    if let Err(err) = set_output("time", &chrono::Local::now().to_rfc3339()) {
        error!("failed to record the time output: {err}");
    }

    if let Err(err) = &outcome {
        error!("{err}");
    }
    outcome
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
