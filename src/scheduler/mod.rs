//! Single-threaded polling loop
//!
//! Wakes on a fixed interval, evaluates every configured trigger against the
//! persisted `last_run`, and runs due jobs sequentially to completion before
//! sleeping again. No two jobs execute concurrently, so the state store
//! never sees concurrent writers. Shutdown is honored between jobs.
//!
//! Cycle state machine: IDLE → DUE → RUNNING → {SUCCESS, FAILED} → NOTIFIED → IDLE.

#[cfg(test)]
mod tests;

use crate::config::{Config, RunMode};
use crate::error::Result;
use crate::jobs::{action_for, JobAction, JobKind, RunRecord, ScheduledJob};
use crate::monitor::HealthState;
use crate::notify::Notifier;
use crate::runner::JobRunner;
use crate::storage::Database;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

pub struct Scheduler {
    db: Arc<Database>,
    runner: JobRunner,
    notifier: Notifier,
    jobs: Vec<ScheduledJob>,
    poll_interval: Duration,
    grace: chrono::Duration,
    mode: RunMode,
    health: Option<Arc<HealthState>>,
    resolver: Box<dyn Fn(JobKind) -> Box<dyn JobAction> + Send + Sync>,
}

impl Scheduler {
    pub fn from_config(config: &Config, db: Arc<Database>, notifier: Notifier) -> Result<Self> {
        let mut jobs = Vec::with_capacity(config.jobs.len());
        for job in &config.jobs {
            jobs.push(ScheduledJob::new(
                job.name.clone(),
                job.kind,
                job.parsed_trigger()?,
            ));
        }

        let runner = JobRunner::new(
            db.clone(),
            notifier.clone(),
            config.mode,
            Duration::from_secs(config.scheduler.job_timeout_secs),
            config.scheduler.escalation_threshold,
        );

        Ok(Self {
            db,
            runner,
            notifier,
            jobs,
            poll_interval: Duration::from_secs(config.scheduler.poll_interval_secs),
            grace: chrono::Duration::minutes(config.scheduler.grace_window_mins as i64),
            mode: config.mode,
            health: None,
            resolver: Box::new(action_for),
        })
    }

    pub fn with_health(mut self, health: Arc<HealthState>) -> Self {
        self.health = Some(health);
        self
    }

    /// Replace how job kinds map to actions (tests inject failures here).
    pub fn with_action_resolver(
        mut self,
        resolver: impl Fn(JobKind) -> Box<dyn JobAction> + Send + Sync + 'static,
    ) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    /// Make the store aware of every configured job before the loop starts.
    pub async fn sync_jobs(&self) -> Result<()> {
        for job in &self.jobs {
            self.db.register_job(job).await?;
        }
        Ok(())
    }

    /// One scheduling cycle at `now`: evaluate all triggers, run whatever is
    /// due. Per-job store errors are logged and retried on the next cycle;
    /// nothing here can abort the loop.
    pub async fn poll_once(&self, now: DateTime<Utc>) -> Vec<RunRecord> {
        let mut records = Vec::new();

        for job in &self.jobs {
            // Run state comes from the store each cycle so a restart mid-slot
            // cannot double-fire.
            let stored = match self.db.get_job(&job.name).await {
                Ok(Some(stored)) => stored,
                Ok(None) => job.clone(),
                Err(e) => {
                    tracing::error!(job = %job.name, "Store read failed, skipping cycle: {e}");
                    continue;
                }
            };

            if !job.trigger.is_due(now, stored.last_run, self.grace) {
                continue;
            }

            // Config wins for identity and trigger; the store supplies state.
            let mut due = job.clone();
            due.last_run = stored.last_run;
            due.last_status = stored.last_status;
            due.consecutive_failures = stored.consecutive_failures;

            let action = (self.resolver)(due.kind);
            records.push(self.runner.run_with(&due, action.as_ref(), now).await);
        }

        records
    }

    /// Continuous scheduling until a shutdown signal arrives.
    pub async fn run(&self) -> Result<()> {
        if let Err(e) = self.sync_jobs().await {
            if let Err(ne) = self
                .notifier
                .error("Scheduler failed to start", &e.to_string())
                .await
            {
                tracing::warn!("Failed to send error notification: {ne}");
            }
            return Err(e);
        }

        if let Err(e) = self.notifier.startup(self.mode).await {
            tracing::warn!("Failed to send startup notification: {e}");
        }

        tracing::info!(
            jobs = self.jobs.len(),
            poll_interval_secs = self.poll_interval.as_secs(),
            "Scheduler started"
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let records = self.poll_once(Utc::now()).await;
                    if let Some(health) = &self.health {
                        health.mark_poll(Utc::now()).await;
                    }
                    if !records.is_empty() {
                        tracing::info!(ran = records.len(), "Scheduling cycle complete");
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    // Between jobs only: a running job finished before we got here.
                    tracing::info!("Shutdown signal received, stopping scheduler");
                    break;
                }
            }
        }

        if let Err(e) = self.notifier.shutdown().await {
            tracing::warn!("Failed to send shutdown notification: {e}");
        }
        Ok(())
    }
}
