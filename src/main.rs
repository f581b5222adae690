mod config;
mod schedule;
mod source;

use config::{Config, Invocation, UpdateRequest};
use schedule::ScheduleBoard;
use source::{refresh, ApiClient, LogNotifier, Refresh};
use std::{env, io::Write};

use anyhow::{anyhow, Context, Error};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_logging()?;
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().skip(1).collect();
    let config = match config::parse(&args, |key| env::var(key).ok())? {
        Invocation::Help(usage) => {
            println!("{usage}");
            return Ok(());
        }
        Invocation::Run(config) => config,
    };

    let client = ApiClient::new(config.token.clone());
    match &config.update {
        Some(request) => post_update(&client, request).await,
        None => render(&client, config).await,
    }
}

fn init_logging() -> Result<(), Error> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| anyhow!("failed to set up logging: {err}"))
}

async fn render(client: &ApiClient, config: Config) -> Result<(), Error> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut board = ScheduleBoard::default();
    match refresh(
        &mut board,
        client,
        &config.source,
        config.timezone,
        &cancel,
        &LogNotifier,
    )
    .await
    {
        Refresh::Cancelled => {
            info!("interrupted before the schedule was loaded");
            return Ok(());
        }
        Refresh::Loaded(count) => debug!(count, "rendering loaded schedule"),
        // the notifier already reported it; an empty view is still written
        Refresh::Failed => {}
    }

    board.select(config.selection);
    let view = board.view();
    info!(
        entries = board.entries().len(),
        parties = board.facets().parties.len() - 1,
        shown = view.filtered_count,
        days = view.days.len(),
        "schedule view ready"
    );

    let json = serde_json::to_string_pretty(&view)?;
    match &config.output {
        Some(path) => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create file: {}", path.to_string_lossy()))?;
            file.write_all(json.as_bytes())?;
        }
        None => println!("{json}"),
    }

    Ok(())
}

async fn post_update(client: &ApiClient, request: &UpdateRequest) -> Result<(), Error> {
    let update = &request.change;
    let message = client
        .update_status(&request.base, update.action_id, &update.status)
        .await
        .with_context(|| format!("failed to update action {}", update.action_id))?;
    info!(action_id = update.action_id, status = %update.status, "status updated");
    println!("{message}");

    Ok(())
}
