//! Unit tests for the scheduling state store

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::jobs::{JobKind, JobOutcome, RunRecord, ScheduledJob};
    use chrono::{DateTime, TimeZone, Utc};

    fn tips_job() -> ScheduledJob {
        ScheduledJob::new("tips", JobKind::Tips, "daily@12:00".parse().unwrap())
    }

    fn at(h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, h, mi, 0).unwrap()
    }

    fn record(job: &str, started: DateTime<Utc>, outcome: JobOutcome) -> RunRecord {
        RunRecord {
            job_name: job.to_string(),
            started_at: started,
            finished_at: started + chrono::Duration::seconds(2),
            outcome,
            error_message: None,
            notified: true,
        }
    }

    #[tokio::test]
    async fn test_register_and_get_job() {
        let db = Database::connect(":memory:").await.unwrap();
        db.register_job(&tips_job()).await.unwrap();

        let job = db.get_job("tips").await.unwrap().unwrap();
        assert_eq!(job.name, "tips");
        assert_eq!(job.kind, JobKind::Tips);
        assert_eq!(job.trigger.to_string(), "daily@12:00");
        assert!(job.last_run.is_none());
        assert!(job.last_status.is_none());
        assert_eq!(job.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_unknown_job_is_none() {
        let db = Database::connect(":memory:").await.unwrap();
        assert!(db.get_job("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_success_advances_last_run() {
        let db = Database::connect(":memory:").await.unwrap();
        db.register_job(&tips_job()).await.unwrap();

        let anchor = at(12, 0);
        db.record_success("tips", anchor).await.unwrap();

        let job = db.get_job("tips").await.unwrap().unwrap();
        assert_eq!(job.last_run, Some(anchor));
        assert_eq!(job.last_status, Some(JobOutcome::Success));
        assert_eq!(job.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_record_failure_keeps_last_run() {
        let db = Database::connect(":memory:").await.unwrap();
        db.register_job(&tips_job()).await.unwrap();
        db.record_success("tips", at(12, 0)).await.unwrap();

        let streak = db.record_failure("tips").await.unwrap();
        assert_eq!(streak, 1);
        let streak = db.record_failure("tips").await.unwrap();
        assert_eq!(streak, 2);

        let job = db.get_job("tips").await.unwrap().unwrap();
        assert_eq!(job.last_run, Some(at(12, 0)));
        assert_eq!(job.last_status, Some(JobOutcome::Failure));
        assert_eq!(job.consecutive_failures, 2);
    }

    #[tokio::test]
    async fn test_success_resets_failure_streak() {
        let db = Database::connect(":memory:").await.unwrap();
        db.register_job(&tips_job()).await.unwrap();
        db.record_failure("tips").await.unwrap();
        db.record_failure("tips").await.unwrap();

        db.record_success("tips", at(12, 0)).await.unwrap();

        let job = db.get_job("tips").await.unwrap().unwrap();
        assert_eq!(job.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_reregister_preserves_run_state() {
        // A restart re-registers every configured job; persisted state
        // must survive.
        let db = Database::connect(":memory:").await.unwrap();
        db.register_job(&tips_job()).await.unwrap();
        db.record_success("tips", at(12, 0)).await.unwrap();

        db.register_job(&tips_job()).await.unwrap();

        let job = db.get_job("tips").await.unwrap().unwrap();
        assert_eq!(job.last_run, Some(at(12, 0)));
    }

    #[tokio::test]
    async fn test_run_records_append_and_order() {
        let db = Database::connect(":memory:").await.unwrap();
        db.append_run_record(&record("tips", at(12, 0), JobOutcome::Success))
            .await
            .unwrap();
        db.append_run_record(&record("results", at(22, 0), JobOutcome::Failure))
            .await
            .unwrap();

        let all = db.recent_runs(None, 10).await.unwrap();
        assert_eq!(all.len(), 2);
        // Newest first.
        assert_eq!(all[0].job_name, "results");
        assert_eq!(all[1].job_name, "tips");

        let tips_only = db.recent_runs(Some("tips"), 10).await.unwrap();
        assert_eq!(tips_only.len(), 1);
        assert_eq!(tips_only[0].outcome, JobOutcome::Success);
        assert!(tips_only[0].notified);
    }

    #[tokio::test]
    async fn test_daily_stats() {
        let db = Database::connect(":memory:").await.unwrap();
        db.append_run_record(&record("tips", at(12, 0), JobOutcome::Success))
            .await
            .unwrap();
        db.append_run_record(&record("tips", at(12, 5), JobOutcome::Failure))
            .await
            .unwrap();
        // Previous day, must not count.
        db.append_run_record(&record(
            "tips",
            at(12, 0) - chrono::Duration::days(1),
            JobOutcome::Success,
        ))
        .await
        .unwrap();

        let stats = db.daily_stats(at(12, 0).date_naive()).await.unwrap();
        assert_eq!(stats.runs, 2);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn test_state_survives_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("advisor.db");
        let path = path.to_str().unwrap();

        {
            let db = Database::connect(path).await.unwrap();
            db.register_job(&tips_job()).await.unwrap();
            db.record_success("tips", at(12, 0)).await.unwrap();
            db.append_run_record(&record("tips", at(12, 0), JobOutcome::Success))
                .await
                .unwrap();
        }

        let db = Database::connect(path).await.unwrap();
        let job = db.get_job("tips").await.unwrap().unwrap();
        assert_eq!(job.last_run, Some(at(12, 0)));
        assert_eq!(db.recent_runs(None, 10).await.unwrap().len(), 1);
    }
}
