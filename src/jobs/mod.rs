//! Scheduled job catalogue and run bookkeeping
//!
//! The advisor runs a small fixed set of job kinds. Each kind maps to one
//! [`JobAction`] that produces the Telegram message body for the run; the
//! runner owns timeouts, persistence and notification.

pub mod actions;


use crate::config::RunMode;
use crate::error::{AdvisorError, Result};
use crate::storage::Database;
use crate::trigger::TriggerSpec;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// The advisor's job kinds, dispatched through a single runner contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Generate and send the daily betting tips digest.
    Tips,
    /// Check settled bets and send the results digest.
    Results,
    /// Periodic liveness message.
    Heartbeat,
    /// On-demand performance report.
    Report,
    /// Kick off a model retraining cycle.
    Retrain,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Tips => "tips",
            JobKind::Results => "results",
            JobKind::Heartbeat => "heartbeat",
            JobKind::Report => "report",
            JobKind::Retrain => "retrain",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = AdvisorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tips" => Ok(JobKind::Tips),
            "results" => Ok(JobKind::Results),
            "heartbeat" => Ok(JobKind::Heartbeat),
            "report" => Ok(JobKind::Report),
            "retrain" => Ok(JobKind::Retrain),
            other => Err(AdvisorError::Config(format!("unknown job kind '{other}'"))),
        }
    }
}

/// Outcome of one run attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobOutcome {
    Success,
    Failure,
    Skipped,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Success => "success",
            JobOutcome::Failure => "failure",
            JobOutcome::Skipped => "skipped",
        }
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobOutcome {
    type Err = AdvisorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "success" => Ok(JobOutcome::Success),
            "failure" => Ok(JobOutcome::Failure),
            "skipped" => Ok(JobOutcome::Skipped),
            other => Err(AdvisorError::Config(format!("unknown outcome '{other}'"))),
        }
    }
}

/// A job as known to the scheduler: static identity plus persisted run state.
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub name: String,
    pub kind: JobKind,
    pub trigger: TriggerSpec,
    pub last_run: Option<DateTime<Utc>>,
    pub last_status: Option<JobOutcome>,
    pub consecutive_failures: u32,
}

impl ScheduledJob {
    pub fn new(name: impl Into<String>, kind: JobKind, trigger: TriggerSpec) -> Self {
        Self {
            name: name.into(),
            kind,
            trigger,
            last_run: None,
            last_status: None,
            consecutive_failures: 0,
        }
    }
}

/// Immutable audit entry for one execution attempt, appended after the
/// notification step so the delivery result is part of the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub job_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: JobOutcome,
    pub error_message: Option<String>,
    pub notified: bool,
}

/// Everything a job action may touch while running.
pub struct JobContext {
    pub db: Arc<Database>,
    pub mode: RunMode,
    /// Clock reading at the start of the run; actions use this instead of
    /// `Utc::now()` so runs are reproducible in tests.
    pub now: DateTime<Utc>,
    pub process_started_at: DateTime<Utc>,
}

/// One executable job body. Returns the notification text for the run.
#[async_trait]
pub trait JobAction: Send + Sync {
    async fn run(&self, ctx: &JobContext) -> Result<String>;
}

/// Resolve the built-in action for a job kind.
pub fn action_for(kind: JobKind) -> Box<dyn JobAction> {
    match kind {
        JobKind::Tips => Box::new(actions::TipsAction),
        JobKind::Results => Box::new(actions::ResultsAction),
        JobKind::Heartbeat => Box::new(actions::HeartbeatAction),
        JobKind::Report => Box::new(actions::ReportAction),
        JobKind::Retrain => Box::new(actions::RetrainAction),
    }
}
