//! Unit tests for trigger evaluation

#[cfg(test)]
mod tests {
    use super::super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn grace() -> Duration {
        Duration::minutes(60)
    }

    #[test]
    fn test_parse_daily() {
        let spec: TriggerSpec = "daily@12:00".parse().unwrap();
        assert_eq!(spec, TriggerSpec::Daily { hour: 12, minute: 0 });

        let spec: TriggerSpec = "daily@22:30".parse().unwrap();
        assert_eq!(spec, TriggerSpec::Daily { hour: 22, minute: 30 });
    }

    #[test]
    fn test_parse_interval() {
        let spec: TriggerSpec = "every:6h".parse().unwrap();
        assert_eq!(
            spec,
            TriggerSpec::Every {
                interval: Duration::hours(6)
            }
        );

        let spec: TriggerSpec = "every:90s".parse().unwrap();
        assert_eq!(
            spec,
            TriggerSpec::Every {
                interval: Duration::seconds(90)
            }
        );
    }

    #[test]
    fn test_parse_rejects_malformed_specs() {
        for bad in [
            "daily@25:00",
            "daily@12:61",
            "daily@noon",
            "daily12:00",
            "every:0h",
            "every:-5m",
            "every:6d",
            "every:6µ",
            "every:99999999999999999h",
            "every:",
            "hourly",
            "",
        ] {
            assert!(
                bad.parse::<TriggerSpec>().is_err(),
                "'{bad}' should be rejected"
            );
        }
    }

    #[test]
    fn test_display_round_trip() {
        for spec in ["daily@12:00", "daily@09:05", "every:6h", "every:15m", "every:90s"] {
            let parsed: TriggerSpec = spec.parse().unwrap();
            assert_eq!(parsed.to_string(), spec);
        }
    }

    #[test]
    fn test_daily_not_due_before_slot() {
        let spec: TriggerSpec = "daily@12:00".parse().unwrap();
        let now = at(2025, 3, 10, 11, 59);
        assert!(!spec.is_due(now, None, grace()));
    }

    #[test]
    fn test_daily_due_inside_window() {
        let spec: TriggerSpec = "daily@12:00".parse().unwrap();
        let now = at(2025, 3, 10, 12, 1);
        assert!(spec.is_due(now, None, grace()));
    }

    #[test]
    fn test_daily_idempotent_within_minute() {
        let spec: TriggerSpec = "daily@12:00".parse().unwrap();
        let now = at(2025, 3, 10, 12, 5);
        let first = spec.is_due(now, None, grace());
        let second = spec.is_due(now, None, grace());
        assert_eq!(first, second);
        assert!(first);
    }

    #[test]
    fn test_daily_missed_slot_is_skipped() {
        // Process was down across the slot and the grace window; per the
        // skip-and-wait policy the slot is forfeited.
        let spec: TriggerSpec = "daily@12:00".parse().unwrap();
        let now = at(2025, 3, 10, 14, 30);
        assert!(!spec.is_due(now, None, grace()));
    }

    #[test]
    fn test_daily_no_refire_after_restart() {
        // last_run was persisted at the slot anchor before the restart.
        let spec: TriggerSpec = "daily@12:00".parse().unwrap();
        let last_run = Some(at(2025, 3, 10, 12, 0));
        let now = at(2025, 3, 10, 12, 30);
        assert!(!spec.is_due(now, last_run, grace()));
    }

    #[test]
    fn test_daily_fires_again_next_day() {
        let spec: TriggerSpec = "daily@12:00".parse().unwrap();
        let last_run = Some(at(2025, 3, 10, 12, 0));
        let now = at(2025, 3, 11, 12, 0);
        assert!(spec.is_due(now, last_run, grace()));
    }

    #[test]
    fn test_daily_retry_within_slot_after_failure() {
        // A failed run does not advance last_run, so the slot stays due.
        let spec: TriggerSpec = "daily@12:00".parse().unwrap();
        let last_run = Some(at(2025, 3, 9, 12, 0));
        let now = at(2025, 3, 10, 12, 10);
        assert!(spec.is_due(now, last_run, grace()));
    }

    #[test]
    fn test_run_anchor_is_slot_start() {
        let spec: TriggerSpec = "daily@12:00".parse().unwrap();
        let now = at(2025, 3, 10, 12, 17);
        assert_eq!(spec.run_anchor(now), at(2025, 3, 10, 12, 0));
    }

    #[test]
    fn test_interval_due_when_never_run() {
        let spec: TriggerSpec = "every:6h".parse().unwrap();
        let now = at(2025, 3, 10, 0, 5);
        assert!(spec.is_due(now, None, grace()));
    }

    #[test]
    fn test_interval_respects_elapsed_time() {
        let spec: TriggerSpec = "every:6h".parse().unwrap();
        let last_run = Some(at(2025, 3, 10, 6, 0));

        assert!(!spec.is_due(at(2025, 3, 10, 11, 59), last_run, grace()));
        assert!(spec.is_due(at(2025, 3, 10, 12, 0), last_run, grace()));
    }

    #[test]
    fn test_interval_anchor_is_now() {
        let spec: TriggerSpec = "every:6h".parse().unwrap();
        let now = at(2025, 3, 10, 6, 3);
        assert_eq!(spec.run_anchor(now), now);
    }
}
