use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dotenv::dotenv;
use futures::StreamExt;
use musifyr_client::{
    utils, ClientConfig, ControllerConfig, HttpJobClient, JobController, JobState,
    DEFAULT_BASE_URL,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Text to generate background music and sound effects for
    #[arg(short, long)]
    text: String,

    /// Base URL of the generation service
    #[arg(short, long, env = "MUSIFYR_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Where to write the combined audio file
    #[arg(short, long, default_value = "combined.mp3")]
    output: PathBuf,

    /// Progress poll interval (in milliseconds, at least 1)
    #[arg(short, long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval_ms: u64,

    /// Per-request timeout (in seconds); requests are unbounded by default
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Print every state change as a JSON line
    #[arg(long)]
    json: bool,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "musifyr_client=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn report(state: &JobState, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string(state)?);
        return Ok(());
    }
    match state {
        JobState::Submitting => println!("🎼 Generating..."),
        JobState::Running(snapshot) if snapshot.message.is_empty() => {
            println!("⏳ {:>3}%", snapshot.percent)
        }
        JobState::Running(snapshot) => {
            println!("⏳ {:>3}% {}", snapshot.percent, snapshot.message)
        }
        JobState::Failed(info) => eprintln!("❌ {}", info.message),
        JobState::Idle | JobState::Succeeded(_) => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_tracing();
    let args = Args::parse();

    let mut config = ClientConfig::new(&args.base_url)?;
    if let Some(secs) = args.timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    let client = HttpJobClient::new(config)?;
    let controller = JobController::new(
        Arc::new(client),
        ControllerConfig {
            poll_interval: Duration::from_millis(args.poll_interval_ms),
        },
    );

    let mut states = Box::pin(controller.states());
    controller.start(args.text.clone())?;

    let outcome = loop {
        tokio::select! {
            next = states.next() => match next {
                Some(state) => {
                    report(&state, args.json)?;
                    if state.is_terminal() {
                        break state;
                    }
                }
                None => return Err("controller stopped unexpectedly".into()),
            },
            _ = tokio::signal::ctrl_c() => {
                controller.cancel();
                eprintln!("⚠️ Cancelled.");
                return Ok(());
            }
        }
    };

    match outcome {
        JobState::Succeeded(result) => {
            utils::save_audio(controller.artifacts(), &result.handle, &args.output)?;
            Ok(())
        }
        _ => {
            drop(controller);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_poll_interval_is_rejected() {
        let parsed = Args::try_parse_from(["musifyr_client", "-t", "rain", "-p", "0"]);
        assert!(parsed.is_err());

        let args = Args::try_parse_from(["musifyr_client", "-t", "rain", "-p", "250"]).unwrap();
        assert_eq!(args.poll_interval_ms, 250);
        assert_eq!(args.output, PathBuf::from("combined.mp3"));
    }
}
