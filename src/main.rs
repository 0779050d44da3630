//! AI Football Betting Advisor
//!
//! Daily scheduling and notification loop: tips at noon, results in the
//! evening, heartbeats in between.

use betting_advisor::{
    config::Config,
    jobs::{JobKind, JobOutcome, ScheduledJob},
    monitor::{self, HealthState},
    notify::Notifier,
    runner::JobRunner,
    scheduler::Scheduler,
    storage::Database,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "betting-advisor")]
#[command(about = "AI football betting advisor - scheduling and notification loop")]
struct Cli {
    /// Defaults to the continuous loop when omitted.
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the continuous scheduling loop
    Run,
    /// Run a single job and exit (for external cron triggers)
    Once {
        /// Which job to run
        #[arg(long, value_enum)]
        mode: JobKind,
    },
    /// Show the persisted job table
    Status,
    /// Test Telegram notification
    TestNotify,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Configuration errors (malformed triggers, missing credentials) are
    // fatal here, before any scheduling starts.
    let config = Config::load(&cli.config)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_loop(config).await,
        Commands::Once { mode } => run_once(config, mode).await,
        Commands::Status => show_status(config).await,
        Commands::TestNotify => test_notify(config).await,
    }
}

fn build_notifier(config: &Config) -> Notifier {
    match &config.telegram {
        Some(tg) => Notifier::new(tg.bot_token.clone(), tg.chat_id.clone(), config.mode)
            .with_max_attempts(tg.max_attempts),
        None => {
            tracing::warn!("Telegram not configured, notifications disabled");
            Notifier::disabled()
        }
    }
}

async fn run_loop(config: Config) -> anyhow::Result<()> {
    tracing::info!(mode = ?config.mode, "Starting betting advisor scheduler");

    // An unreachable state store is fatal: better to refuse to start than
    // to run with unknown scheduling state.
    let db = Arc::new(Database::connect(&config.database.path).await?);
    let notifier = build_notifier(&config);

    let mut scheduler = Scheduler::from_config(&config, db.clone(), notifier)?;

    if config.health.enabled {
        let health = Arc::new(HealthState::new(db.clone()));
        scheduler = scheduler.with_health(health.clone());
        let host = config.health.host.clone();
        let port = config.health.port;
        tokio::spawn(async move {
            if let Err(e) = monitor::serve(health, &host, port).await {
                tracing::error!("Health check server error: {e}");
            }
        });
    }

    scheduler.run().await?;
    Ok(())
}

async fn run_once(config: Config, mode: JobKind) -> anyhow::Result<()> {
    let db = Arc::new(Database::connect(&config.database.path).await?);
    let notifier = build_notifier(&config);

    // Prefer the configured job of this kind so one-shot runs share state
    // with the continuous loop.
    let job = match config.jobs.iter().find(|j| j.kind == mode) {
        Some(j) => ScheduledJob::new(j.name.clone(), j.kind, j.parsed_trigger()?),
        None => ScheduledJob::new(mode.as_str(), mode, "every:24h".parse()?),
    };
    db.register_job(&job).await?;
    let job = db.get_job(&job.name).await?.unwrap_or(job);

    let runner = JobRunner::new(
        db.clone(),
        notifier,
        config.mode,
        Duration::from_secs(config.scheduler.job_timeout_secs),
        config.scheduler.escalation_threshold,
    );

    let record = runner.run(&job, Utc::now()).await;
    match record.outcome {
        JobOutcome::Success => {
            println!("✅ Job '{}' completed", record.job_name);
            Ok(())
        }
        _ => anyhow::bail!(
            "job '{}' failed: {}",
            record.job_name,
            record.error_message.unwrap_or_else(|| "unknown error".to_string())
        ),
    }
}

async fn show_status(config: Config) -> anyhow::Result<()> {
    let db = Database::connect(&config.database.path).await?;
    let jobs = db.list_jobs().await?;

    println!("\n📅 Scheduled Jobs\n");
    println!(
        "{:<12} {:<10} {:<14} {:<22} {:<9} {}",
        "Name", "Kind", "Trigger", "Last Run", "Status", "Failures"
    );
    println!("{}", "-".repeat(80));

    for job in jobs {
        println!(
            "{:<12} {:<10} {:<14} {:<22} {:<9} {}",
            job.name,
            job.kind.to_string(),
            job.trigger.to_string(),
            job.last_run
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "never".to_string()),
            job.last_status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
            job.consecutive_failures,
        );
    }

    Ok(())
}

async fn test_notify(config: Config) -> anyhow::Result<()> {
    let tg = config
        .telegram
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("Telegram not configured in config.toml"))?;

    let notifier = Notifier::new(tg.bot_token.clone(), tg.chat_id.clone(), config.mode);
    let delivered = notifier
        .notify("🧪 <b>Test Notification</b>\n\nIf you see this, Telegram integration is working!")
        .await?;

    if delivered {
        println!("✅ Test notification sent!");
        Ok(())
    } else {
        anyhow::bail!("test notification could not be delivered")
    }
}
