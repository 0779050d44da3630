//! Unit tests for the polling loop

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::config::{
        Config, DatabaseConfig, HealthConfig, JobConfig, RunMode, SchedulerConfig,
    };
    use crate::jobs::{JobKind, JobOutcome};
    use crate::notify::Notifier;
    use crate::storage::Database;
    use crate::testing::{FailingAction, RecordingTransport, StaticAction};
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::Arc;

    fn at(day: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, h, mi, 0).unwrap()
    }

    fn test_config(jobs: Vec<JobConfig>) -> Config {
        Config {
            mode: RunMode::Production,
            scheduler: SchedulerConfig {
                poll_interval_secs: 60,
                job_timeout_secs: 30,
                grace_window_mins: 60,
                escalation_threshold: 3,
            },
            database: DatabaseConfig {
                path: ":memory:".to_string(),
            },
            telegram: None,
            health: HealthConfig::default(),
            jobs,
        }
    }

    fn daily_jobs() -> Vec<JobConfig> {
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
        ]
    }

    async fn build(
        config: &Config,
    ) -> (Arc<Database>, Arc<RecordingTransport>, Scheduler) {
        let db = Arc::new(Database::connect(":memory:").await.unwrap());
        let transport = Arc::new(RecordingTransport::new());
        let notifier =
            Notifier::with_transport(transport.clone(), "12345", RunMode::Production);
        let scheduler = Scheduler::from_config(config, db.clone(), notifier).unwrap();
        scheduler.sync_jobs().await.unwrap();
        (db, transport, scheduler)
    }

    #[tokio::test]
    async fn test_end_to_end_tips_slot() {
        let config = test_config(daily_jobs());
        let (db, transport, scheduler) = build(&config).await;

        // 11:59 - nothing is due yet.
        assert!(scheduler.poll_once(at(10, 11, 59)).await.is_empty());
        assert_eq!(transport.sent_count(), 0);

        // 12:01 - exactly one run record for tips, exactly one notification.
        let records = scheduler.poll_once(at(10, 12, 1)).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].job_name, "tips");
        assert_eq!(records[0].outcome, JobOutcome::Success);
        assert_eq!(transport.sent_count(), 1);
        assert!(transport.texts()[0].contains("BETTING TIPS"));

        let audit = db.recent_runs(None, 10).await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].job_name, "tips");

        // Results stays idle until its own slot.
        let results = db.get_job("results").await.unwrap().unwrap();
        assert!(results.last_run.is_none());
        assert!(results.last_status.is_none());

        // Re-polling within the slot does not fire again.
        assert!(scheduler.poll_once(at(10, 12, 2)).await.is_empty());
        assert_eq!(transport.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_restart_mid_slot_does_not_refire() {
        let config = test_config(daily_jobs());
        let (db, transport, scheduler) = build(&config).await;

        assert_eq!(scheduler.poll_once(at(10, 12, 1)).await.len(), 1);

        // Fresh scheduler over the same store simulates a process restart.
        let notifier =
            Notifier::with_transport(transport.clone(), "12345", RunMode::Production);
        let restarted = Scheduler::from_config(&config, db.clone(), notifier).unwrap();
        restarted.sync_jobs().await.unwrap();

        assert!(restarted.poll_once(at(10, 12, 5)).await.is_empty());
        assert_eq!(db.recent_runs(Some("tips"), 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_job_does_not_block_others() {
        let mut jobs = daily_jobs();
        // Both jobs share the noon slot so one cycle evaluates both.
        jobs[1].trigger = "daily@12:00".to_string();
        let config = test_config(jobs);
        let (db, _, scheduler) = build(&config).await;
        let scheduler = scheduler.with_action_resolver(|kind| match kind {
            JobKind::Tips => Box::new(FailingAction),
            _ => Box::new(StaticAction("ok")),
        });

        let records = scheduler.poll_once(at(10, 12, 1)).await;
        assert_eq!(records.len(), 2);

        let tips = records.iter().find(|r| r.job_name == "tips").unwrap();
        let results = records.iter().find(|r| r.job_name == "results").unwrap();
        assert_eq!(tips.outcome, JobOutcome::Failure);
        assert_eq!(results.outcome, JobOutcome::Success);

        // The failed job stays due within its slot; the succeeded one does not.
        let retry = scheduler.poll_once(at(10, 12, 30)).await;
        assert_eq!(retry.len(), 1);
        assert_eq!(retry[0].job_name, "tips");

        assert_eq!(db.get_job("tips").await.unwrap().unwrap().consecutive_failures, 2);
    }

    #[tokio::test]
    async fn test_missed_slot_is_skipped() {
        // Down across the whole noon slot: per the skip-and-wait policy the
        // job waits for tomorrow instead of catching up.
        let config = test_config(daily_jobs());
        let (_, transport, scheduler) = build(&config).await;

        assert!(scheduler.poll_once(at(10, 14, 0)).await.is_empty());
        assert_eq!(transport.sent_count(), 0);

        let records = scheduler.poll_once(at(11, 12, 0)).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].job_name, "tips");
    }

    #[tokio::test]
    async fn test_interval_job_fires_repeatedly() {
        let config = test_config(vec![JobConfig {
            name: "heartbeat".to_string(),
            kind: JobKind::Heartbeat,
            trigger: "every:6h".to_string(),
        }]);
        let (_, transport, scheduler) = build(&config).await;

        assert_eq!(scheduler.poll_once(at(10, 0, 0)).await.len(), 1);
        assert!(scheduler.poll_once(at(10, 3, 0)).await.is_empty());
        assert_eq!(scheduler.poll_once(at(10, 6, 0)).await.len(), 1);
        assert_eq!(transport.sent_count(), 2);
    }
}
