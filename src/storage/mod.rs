//! Durable scheduling state
//!
//! SQLite-backed store holding the job table (one row per scheduled job,
//! keyed by name) and the append-only run-record log. The polling loop is
//! the only writer, so every read-modify-write is a single SQL statement.
//! If the store cannot be opened at startup the process refuses to run.

#[cfg(test)]
mod tests;

use crate::error::{AdvisorError, Result};
use crate::jobs::{JobOutcome, RunRecord, ScheduledJob};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;

/// Scheduling state store.
pub struct Database {
    pool: SqlitePool,
}

/// Aggregate run counts for one calendar day.
#[derive(Debug, Clone, Copy, Default)]
pub struct DailyStats {
    pub runs: i64,
    pub succeeded: i64,
    pub failed: i64,
}

impl Database {
    /// Open (creating if missing) the store at `path`. `:memory:` gives an
    /// in-process store for tests and dry runs.
    pub async fn connect(path: &str) -> Result<Self> {
        let options = if path == ":memory:" {
            SqliteConnectOptions::new().in_memory(true)
        } else {
            let expanded = shellexpand::tilde(path).into_owned();
            if let Some(parent) = Path::new(&expanded).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        AdvisorError::Config(format!(
                            "cannot create database directory '{}': {e}",
                            parent.display()
                        ))
                    })?;
                }
            }
            SqliteConnectOptions::new()
                .filename(&expanded)
                .create_if_missing(true)
        };

        // Single connection: the polling loop is single-threaded and an
        // in-memory store must not be split across connections.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                name                 TEXT PRIMARY KEY,
                kind                 TEXT NOT NULL,
                trigger_spec         TEXT NOT NULL,
                last_run             TEXT,
                last_status          TEXT,
                consecutive_failures INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS run_records (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                job_name      TEXT NOT NULL,
                started_at    TEXT NOT NULL,
                finished_at   TEXT NOT NULL,
                outcome       TEXT NOT NULL,
                error_message TEXT,
                notified      INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Liveness probe for the health endpoint.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Register a configured job, preserving any persisted run state.
    pub async fn register_job(&self, job: &ScheduledJob) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (name, kind, trigger_spec, consecutive_failures)
            VALUES (?, ?, ?, 0)
            ON CONFLICT(name) DO UPDATE SET
                kind = excluded.kind,
                trigger_spec = excluded.trigger_spec
            "#,
        )
        .bind(&job.name)
        .bind(job.kind.as_str())
        .bind(job.trigger.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_job(&self, name: &str) -> Result<Option<ScheduledJob>> {
        let row = sqlx::query(
            "SELECT name, kind, trigger_spec, last_run, last_status, consecutive_failures \
             FROM jobs WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };

        let kind: String = row.try_get("kind")?;
        let trigger: String = row.try_get("trigger_spec")?;
        let last_status: Option<String> = row.try_get("last_status")?;
        let consecutive_failures: i64 = row.try_get("consecutive_failures")?;

        Ok(Some(ScheduledJob {
            name: row.try_get("name")?,
            kind: kind.parse()?,
            trigger: trigger.parse()?,
            last_run: row.try_get("last_run")?,
            last_status: last_status.as_deref().map(str::parse).transpose()?,
            consecutive_failures: consecutive_failures as u32,
        }))
    }

    pub async fn list_jobs(&self) -> Result<Vec<ScheduledJob>> {
        let rows = sqlx::query("SELECT name FROM jobs ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        let mut jobs = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("name")?;
            if let Some(job) = self.get_job(&name).await? {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }

    /// Advance `last_run` to the slot anchor and clear the failure streak.
    pub async fn record_success(&self, name: &str, anchor: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE jobs SET last_run = ?, last_status = 'success', consecutive_failures = 0 \
             WHERE name = ?",
        )
        .bind(anchor)
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Bump the failure streak without touching `last_run`, so the slot is
    /// retried at the next poll. Returns the new streak length.
    pub async fn record_failure(&self, name: &str) -> Result<u32> {
        let row = sqlx::query(
            "UPDATE jobs SET last_status = 'failure', \
             consecutive_failures = consecutive_failures + 1 \
             WHERE name = ? RETURNING consecutive_failures",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        let streak: i64 = row.try_get("consecutive_failures")?;
        Ok(streak as u32)
    }

    /// Append an immutable audit entry for one run attempt.
    pub async fn append_run_record(&self, record: &RunRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO run_records \
             (job_name, started_at, finished_at, outcome, error_message, notified) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.job_name)
        .bind(record.started_at)
        .bind(record.finished_at)
        .bind(record.outcome.as_str())
        .bind(&record.error_message)
        .bind(record.notified)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent run records, newest first, optionally for a single job.
    pub async fn recent_runs(&self, job_name: Option<&str>, limit: i64) -> Result<Vec<RunRecord>> {
        let rows = match job_name {
            Some(name) => {
                sqlx::query(
                    "SELECT job_name, started_at, finished_at, outcome, error_message, notified \
                     FROM run_records WHERE job_name = ? \
                     ORDER BY id DESC LIMIT ?",
                )
                .bind(name)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT job_name, started_at, finished_at, outcome, error_message, notified \
                     FROM run_records ORDER BY id DESC LIMIT ?",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let outcome: String = row.try_get("outcome")?;
            records.push(RunRecord {
                job_name: row.try_get("job_name")?,
                started_at: row.try_get("started_at")?,
                finished_at: row.try_get("finished_at")?,
                outcome: outcome.parse::<JobOutcome>()?,
                error_message: row.try_get("error_message")?,
                notified: row.try_get("notified")?,
            });
        }
        Ok(records)
    }

    /// Run counts for one calendar day (UTC).
    pub async fn daily_stats(&self, day: NaiveDate) -> Result<DailyStats> {
        let start = day
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid")
            .and_utc();
        let end = start + chrono::Duration::days(1);

        let row = sqlx::query(
            "SELECT COUNT(*) AS runs, \
             COALESCE(SUM(outcome = 'success'), 0) AS succeeded, \
             COALESCE(SUM(outcome = 'failure'), 0) AS failed \
             FROM run_records WHERE started_at >= ? AND started_at < ?",
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(DailyStats {
            runs: row.try_get("runs")?,
            succeeded: row.try_get("succeeded")?,
            failed: row.try_get("failed")?,
        })
    }
}
