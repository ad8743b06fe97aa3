use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::Result;
use interleave_event_server::{CoordinatorConfig, Runner, load_deployment};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path of the yaml-encoded deployment definition
    deployment: PathBuf,
    /// Path of the yaml-encoded coordinator config. Defaults apply when
    /// omitted.
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// Dry-run flag. If active, the binary loads and verifies both files and
    /// then exits.
    #[arg(long = "check-config", action)]
    check_config_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let Args {
        deployment,
        config,
        check_config_only,
    } = Args::parse();

    let config = match config {
        Some(path) => CoordinatorConfig::load_from_file(&path)?,
        None => CoordinatorConfig::default(),
    };
    let deployment = load_deployment(&deployment)?;

    if check_config_only {
        interleave_core::verify(&deployment)?;
        println!("Deployment `{}` is valid", deployment.name());
        return Ok(());
    }

    let _guard = interleave_tracing::init(&config.tracing)?;
    let runner = Runner::start(deployment, config).await?;
    for (name, value) in runner.node_environment() {
        println!("{name}={value}");
    }

    let outcome = tokio::select! {
        outcome = runner.wait_for_completion() => outcome,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted before the run sequence completed");
            Ok(())
        }
    };
    runner.stop().await;
    outcome?;
    info!("done");
    Ok(())
}
