//! Job execution
//!
//! Runs one job's action under a bounded timeout, persists the outcome, and
//! sends exactly one notification per run attempt. Job errors are recorded,
//! never propagated into the scheduling loop. A failed run leaves `last_run`
//! untouched so the slot is retried at the next poll; repeated consecutive
//! failures escalate the notification severity.


use crate::config::RunMode;
use crate::error::AdvisorError;
use crate::jobs::{action_for, JobAction, JobContext, JobOutcome, RunRecord, ScheduledJob};
use crate::notify::Notifier;
use crate::storage::Database;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

pub struct JobRunner {
    db: Arc<Database>,
    notifier: Notifier,
    mode: RunMode,
    timeout: Duration,
    escalation_threshold: u32,
    process_started_at: DateTime<Utc>,
}

impl JobRunner {
    pub fn new(
        db: Arc<Database>,
        notifier: Notifier,
        mode: RunMode,
        timeout: Duration,
        escalation_threshold: u32,
    ) -> Self {
        Self {
            db,
            notifier,
            mode,
            timeout,
            escalation_threshold,
            process_started_at: Utc::now(),
        }
    }

    /// Run a job with its built-in action.
    pub async fn run(&self, job: &ScheduledJob, now: DateTime<Utc>) -> RunRecord {
        let action = action_for(job.kind);
        self.run_with(job, action.as_ref(), now).await
    }

    /// Run a job with an explicit action (the scheduler and tests inject here).
    pub async fn run_with(
        &self,
        job: &ScheduledJob,
        action: &dyn JobAction,
        now: DateTime<Utc>,
    ) -> RunRecord {
        tracing::info!(job = %job.name, kind = %job.kind, "Running job");
        let started_at = now;

        let ctx = JobContext {
            db: self.db.clone(),
            mode: self.mode,
            now,
            process_started_at: self.process_started_at,
        };

        let result = match tokio::time::timeout(self.timeout, action.run(&ctx)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(AdvisorError::JobTimeout {
                job: job.name.clone(),
                timeout_secs: self.timeout.as_secs(),
            }),
        };
        let finished_at = Utc::now();

        let (outcome, text, mut error_message) = match result {
            Ok(text) => {
                let anchor = job.trigger.run_anchor(now);
                if let Err(e) = self.db.record_success(&job.name, anchor).await {
                    // Retried on the next poll cycle; the slot stays due.
                    tracing::error!(job = %job.name, "Failed to persist success: {e}");
                }
                tracing::info!(job = %job.name, "Job succeeded");
                (JobOutcome::Success, text, None)
            }
            Err(e) => {
                let streak = match self.db.record_failure(&job.name).await {
                    Ok(streak) => streak,
                    Err(db_err) => {
                        tracing::error!(job = %job.name, "Failed to persist failure: {db_err}");
                        job.consecutive_failures + 1
                    }
                };
                tracing::error!(job = %job.name, streak, "Job failed: {e}");
                let text = self.failure_text(&job.name, &e, streak);
                (JobOutcome::Failure, text, Some(e.to_string()))
            }
        };

        // Exactly one notification per run attempt, success or failure.
        let mut message = self.notifier.message(&text);
        let notified = match self.notifier.send(&mut message).await {
            Ok(delivered) => delivered,
            Err(e) => {
                tracing::error!(job = %job.name, "Notification failed permanently: {e}");
                let note = format!("notification failed: {e}");
                error_message = Some(match error_message {
                    Some(existing) => format!("{existing}; {note}"),
                    None => note,
                });
                false
            }
        };

        let record = RunRecord {
            job_name: job.name.clone(),
            started_at,
            finished_at,
            outcome,
            error_message,
            notified,
        };

        if let Err(e) = self.db.append_run_record(&record).await {
            tracing::error!(job = %job.name, "Failed to append run record: {e}");
        }

        record
    }

    fn failure_text(&self, job_name: &str, error: &AdvisorError, streak: u32) -> String {
        let header = if streak >= self.escalation_threshold {
            format!("🚨 <b>JOB FAILING REPEATEDLY</b> ({streak} in a row)")
        } else {
            "⚠️ <b>JOB FAILED</b>".to_string()
        };
        format!("{header}\n\nJob: <code>{job_name}</code>\nError: <code>{error}</code>")
    }
}
