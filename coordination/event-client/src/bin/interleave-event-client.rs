use std::{process, time::Duration};

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use interleave_api_common::env::{COORDINATOR_HOST, COORDINATOR_PORT};
use interleave_event_client::{ClientError, CoordinationClient};
use interleave_tracing::{LoggerLayer, TracingSettings};
use tokio::time::sleep;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long, env = COORDINATOR_HOST, default_value = "127.0.0.1")]
    host: String,
    #[arg(long, env = COORDINATOR_PORT)]
    port: u16,
    /// Deadline of waiting commands, in seconds. Waits forever when unset.
    #[arg(long)]
    timeout: Option<u64>,
    /// Attempts for one-shot commands before giving up.
    #[arg(long, env = "INTERLEAVE_CLIENT_RETRIES", default_value_t = 10)]
    retries: u32,
    #[arg(long, env = "INTERLEAVE_CLIENT_RETRY_DELAY_MS", default_value_t = 1000)]
    retry_delay_ms: u64,
    #[arg(long)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Waits until the prerequisites of an event have been received.
    Wait {
        name: String,
        #[arg(long)]
        include_self: bool,
    },
    /// Waits for the prerequisites of an event, then reports it.
    Enforce { name: String },
    /// Reports an event as received.
    Report { name: String },
    /// Exits with 0 when the event has been received, 1 otherwise.
    Received { name: String },
}

async fn run_once(
    client: &CoordinationClient,
    command: &Command,
    deadline: Option<Duration>,
) -> Result<bool, ClientError> {
    match command {
        Command::Wait { name, include_self } => client
            .block_and_poll(name, *include_self, deadline)
            .await
            .map(|()| true),
        Command::Enforce { name } => client.enforce_order(name, deadline).await.map(|()| true),
        Command::Report { name } => client.report(name).await.map(|()| true),
        Command::Received { name } => client.has_received(name).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let _guard = interleave_tracing::init(&TracingSettings {
        logger: if args.verbose {
            LoggerLayer::Stdout
        } else {
            LoggerLayer::None
        },
        ..TracingSettings::default()
    })?;

    let client = CoordinationClient::from_host(&args.host, args.port)?;
    let deadline = args.timeout.map(Duration::from_secs);
    let retry_delay = Duration::from_millis(args.retry_delay_ms);

    let mut last_error = None;
    for attempt in 0..=args.retries {
        match run_once(&client, &args.command, deadline).await {
            Ok(true) => return Ok(()),
            Ok(false) => process::exit(1),
            // Waits already retried until their deadline.
            Err(err @ (ClientError::Timeout { .. } | ClientError::Unreachable { .. })) => {
                return Err(err.into());
            }
            Err(err) => {
                eprintln!(
                    "interleave-event-client attempt {}/{} failed: {err}",
                    attempt + 1,
                    args.retries + 1
                );
                last_error = Some(err);
                if attempt < args.retries {
                    sleep(retry_delay).await;
                }
            }
        }
    }

    match last_error {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}
