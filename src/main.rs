use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use statusmail::config::Config;
use statusmail::notion::NotionClient;
use statusmail::utils::mask_secret;
use statusmail::watcher::Watcher;

#[derive(Parser)]
#[command(
    name = "statusmail",
    version,
    about = "Watches a Notion database and emails task status changes",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides STATUSMAIL_LOG_FORMAT
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// Read configuration from a TOML file instead of the environment
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the database until interrupted (default)
    Watch,

    /// Take a baseline, wait one interval, run a single cycle and print its report
    Once,

    /// Fetch the current snapshot and print it as JSON
    Snapshot,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    config.validate().context("Invalid configuration")?;

    let log_format = cli
        .log_format
        .as_deref()
        .unwrap_or(config.logging.format.as_str());
    setup_tracing(log_format, &config.logging.level, cli.verbose)?;

    tracing::info!(
        database_id = %config.notion.database_id,
        notion_key = %mask_secret(&config.notion.api_key),
        sendgrid_key = %mask_secret(&config.email.api_key),
        interval_ms = config.watcher.poll_interval_ms,
        "statusmail starting"
    );

    match cli.command.unwrap_or(Commands::Watch) {
        Commands::Watch => watch(&config).await?,
        Commands::Once => once(&config).await?,
        Commands::Snapshot => snapshot(&config).await?,
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("statusmail=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("statusmail={level},warn")))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()?;
        }
    }

    Ok(())
}

async fn watch(config: &Config) -> Result<()> {
    let mut watcher = Watcher::from_config(config)?;
    let mut held = watcher.baseline().await?;

    watcher
        .run(&mut held)
        .await
        .context("Polling stopped on an unrecoverable fetch error")?;

    Ok(())
}

async fn once(config: &Config) -> Result<()> {
    let mut watcher = Watcher::from_config(config)?;
    let mut held = watcher.baseline().await?;

    tokio::time::sleep(watcher.interval()).await;
    let report = watcher.run_cycle(&mut held).await?;
    watcher.flush().await;

    let stats = watcher.dispatch_stats();
    tracing::info!(
        delivered = stats.delivered,
        failed = stats.failed,
        "Single cycle complete"
    );

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn snapshot(config: &Config) -> Result<()> {
    let client = NotionClient::new(&config.notion, config.request_timeout())?;
    let snapshot = client.fetch_snapshot().await?;

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
