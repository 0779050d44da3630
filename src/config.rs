//! Configuration loading and validation
//!
//! Configuration is layered: `config.toml` (optional), then `ADVISOR__*`
//! environment variables, then the `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID`
//! variables the deployment environment already provides. All trigger specs
//! are parsed during validation so a malformed schedule aborts startup
//! instead of surfacing at poll time.

use crate::error::{AdvisorError, Result};
use crate::jobs::JobKind;
use crate::trigger::TriggerSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Top-level configuration passed into the scheduling loop at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mode: RunMode,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default = "default_jobs")]
    pub jobs: Vec<JobConfig>,
}

/// Production sends real tips; shadow tags every message and risks nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Production,
    Shadow,
}

impl RunMode {
    pub fn is_shadow(&self) -> bool {
        matches!(self, RunMode::Shadow)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between trigger evaluations.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Upper bound on a single job execution.
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,
    /// Minutes after a daily slot during which a missed fire is still taken.
    #[serde(default = "default_grace_window")]
    pub grace_window_mins: u64,
    /// Consecutive failures before notifications escalate in severity.
    #[serde(default = "default_escalation_threshold")]
    pub escalation_threshold: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            job_timeout_secs: default_job_timeout(),
            grace_window_mins: default_grace_window(),
            escalation_threshold: default_escalation_threshold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    /// Bounded attempt count for transient delivery failures.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_health_host")]
    pub host: String,
    #[serde(default = "default_health_port")]
    pub port: u16,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_health_host(),
            port: default_health_port(),
        }
    }
}

/// One scheduled job as declared in configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub name: String,
    pub kind: JobKind,
    /// Trigger spec string, e.g. `daily@12:00` or `every:6h`.
    pub trigger: String,
}

impl JobConfig {
    pub fn parsed_trigger(&self) -> Result<TriggerSpec> {
        self.trigger.parse()
    }
}

fn default_poll_interval() -> u64 {
    60
}

fn default_job_timeout() -> u64 {
    300
}

fn default_grace_window() -> u64 {
    60
}

fn default_escalation_threshold() -> u32 {
    3
}

fn default_db_path() -> String {
    "data/advisor.db".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_health_host() -> String {
    "0.0.0.0".to_string()
}

fn default_health_port() -> u16 {
    8080
}

/// The advisor's stock schedule: tips at noon, results in the evening,
/// a heartbeat every six hours.
fn default_jobs() -> Vec<JobConfig> {
    vec![
        JobConfig {
            name: "tips".to_string(),
            kind: JobKind::Tips,
            trigger: "daily@12:00".to_string(),
        },
        JobConfig {
            name: "results".to_string(),
            kind: JobKind::Results,
            trigger: "daily@22:00".to_string(),
        },
        JobConfig {
            name: "heartbeat".to_string(),
            kind: JobKind::Heartbeat,
            trigger: "every:6h".to_string(),
        },
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: RunMode::default(),
            scheduler: SchedulerConfig::default(),
            database: DatabaseConfig::default(),
            telegram: None,
            health: HealthConfig::default(),
            jobs: default_jobs(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment, then validate it.
    pub fn load(path: &str) -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("ADVISOR").separator("__"));

        let mut cfg: Config = builder
            .build()
            .map_err(|e| AdvisorError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| AdvisorError::Config(e.to_string()))?;

        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Honor the bare `TELEGRAM_*` variables the deployment already sets.
    fn apply_env_overrides(&mut self) {
        let token = std::env::var("TELEGRAM_BOT_TOKEN")
            .or_else(|_| std::env::var("TELEGRAM_TOKEN"))
            .ok();
        let chat_id = std::env::var("TELEGRAM_CHAT_ID").ok();

        if let Some(tg) = &mut self.telegram {
            if let Some(token) = token {
                tg.bot_token = token;
            }
            if let Some(chat_id) = chat_id {
                tg.chat_id = chat_id;
            }
        } else if let (Some(token), Some(chat_id)) = (token, chat_id) {
            self.telegram = Some(TelegramConfig {
                bot_token: token,
                chat_id,
                max_attempts: default_max_attempts(),
            });
        }
    }

    /// Reject bad configuration before the loop starts.
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.poll_interval_secs == 0 {
            return Err(AdvisorError::Config(
                "scheduler.poll_interval_secs must be positive".to_string(),
            ));
        }
        if self.scheduler.job_timeout_secs == 0 {
            return Err(AdvisorError::Config(
                "scheduler.job_timeout_secs must be positive".to_string(),
            ));
        }
        if self.jobs.is_empty() {
            return Err(AdvisorError::Config(
                "at least one job must be configured".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for job in &self.jobs {
            if job.name.is_empty() {
                return Err(AdvisorError::Config("job name must not be empty".to_string()));
            }
            if !names.insert(job.name.as_str()) {
                return Err(AdvisorError::Config(format!(
                    "duplicate job name '{}'",
                    job.name
                )));
            }
            // Malformed trigger specs fail here, never at trigger-check time.
            job.parsed_trigger()?;
        }

        if let Some(tg) = &self.telegram {
            if tg.bot_token.is_empty() {
                return Err(AdvisorError::Config(
                    "telegram.bot_token must not be empty".to_string(),
                ));
            }
            if tg.chat_id.is_empty() {
                return Err(AdvisorError::Config(
                    "telegram.chat_id must not be empty".to_string(),
                ));
            }
            if tg.max_attempts == 0 {
                return Err(AdvisorError::Config(
                    "telegram.max_attempts must be positive".to_string(),
                ));
            }
        }

        Ok(())
    }
}
