use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod constants;
mod contracts;
mod error;
mod models;
mod services;
mod session;

use config::Config;
use error::AppError;
use session::GameSession;

const USAGE: &str = "usage: apoc-fight <status|watch|toggle|fight|methods>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "apoc_fight=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let command = std::env::args().nth(1).unwrap_or_default();
    if command == "methods" {
        println!("{}", serde_json::to_string_pretty(contracts::METHODS)?);
        return Ok(());
    }
    if !matches!(command.as_str(), "status" | "watch" | "toggle" | "fight") {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    }

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!(
        "Environment: {} (testnet: {})",
        config.environment,
        config.is_testnet()
    );
    tracing::info!(
        "Required chain: {} ({})",
        config.required_chain_id,
        config.chain_name
    );

    let session = GameSession::from_config(&config)?;
    tracing::info!("Player: {:?}", session.player());

    let result = match command.as_str() {
        "fight" => run_fight(&session).await,
        "watch" => run_watch(&session).await,
        "toggle" => run_toggle(&session).await,
        _ => run_status(&session).await,
    };

    if let Err(err) = result {
        eprintln!("{}", serde_json::to_string_pretty(&err.to_response())?);
        std::process::exit(1);
    }
    Ok(())
}

// Internal helper that supports `status` operations.
async fn run_status(session: &GameSession) -> Result<(), AppError> {
    session.refresh().finished().await?;
    print_json(&session.settled_readiness()?)
}

// Streams one JSON line per field update while a reload runs.
async fn run_watch(session: &GameSession) -> Result<(), AppError> {
    let mut updates = session.synchronizer().subscribe();
    let finished = session.refresh().finished();
    tokio::pin!(finished);

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(update) => print_line(&update)?,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Skipped {} field updates", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            result = &mut finished => {
                result?;
                break;
            }
        }
    }
    while let Ok(update) = updates.try_recv() {
        print_line(&update)?;
    }
    print_json(&session.readiness())
}

// Reload with NFT art, then flip the display mode, which reloads again.
async fn run_toggle(session: &GameSession) -> Result<(), AppError> {
    session.refresh().finished().await?;
    session.toggle_display().finished().await?;
    print_json(&session.readiness())
}

// Internal helper that supports `fight` operations.
async fn run_fight(session: &GameSession) -> Result<(), AppError> {
    let report = session.fight().await?;
    print_json(&report.outcome)?;
    report.refresh.finished().await?;
    print_json(&session.readiness())
}

fn print_line<T: serde::Serialize>(value: &T) -> Result<(), AppError> {
    let line = serde_json::to_string(value)
        .map_err(|e| AppError::Internal(format!("Cannot render output: {}", e)))?;
    println!("{}", line);
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), AppError> {
    let body = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Internal(format!("Cannot render output: {}", e)))?;
    println!("{}", body);
    Ok(())
}
