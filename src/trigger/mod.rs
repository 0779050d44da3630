//! Trigger evaluation for scheduled jobs
//!
//! A trigger spec describes when a job is due: a fixed time of day
//! (`daily@12:00`) or a fixed interval (`every:6h`). Evaluation is a pure
//! function of the supplied clock and the job's persisted `last_run`, so
//! repeated polling within the same minute gives the same answer and a
//! process restart cannot double-fire a slot.

#[cfg(test)]
mod tests;

use crate::error::AdvisorError;
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::str::FromStr;

/// When a scheduled job should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSpec {
    /// Fire once per day at the given UTC time.
    Daily { hour: u32, minute: u32 },
    /// Fire whenever at least `interval` has elapsed since the last run.
    Every { interval: Duration },
}

impl TriggerSpec {
    /// Start of the most recent daily slot at or before `now`.
    ///
    /// Interval triggers have no fixed slots and return `None`.
    pub fn current_slot(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TriggerSpec::Daily { hour, minute } => {
                let today = now
                    .date_naive()
                    .and_hms_opt(*hour, *minute, 0)
                    .expect("hour/minute validated at parse time")
                    .and_utc();
                if now >= today {
                    Some(today)
                } else {
                    Some(today - Duration::days(1))
                }
            }
            TriggerSpec::Every { .. } => None,
        }
    }

    /// The timestamp to persist as `last_run` for a run starting at `now`.
    ///
    /// Daily jobs anchor to the slot start so a retry later in the grace
    /// window still counts against the same slot.
    pub fn run_anchor(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.current_slot(now).unwrap_or(now)
    }

    /// Whether the job should run at `now`, given its persisted `last_run`.
    ///
    /// Missed-fire policy is skip-and-wait: a daily slot more than
    /// `grace` in the past is forfeited rather than caught up.
    pub fn is_due(
        &self,
        now: DateTime<Utc>,
        last_run: Option<DateTime<Utc>>,
        grace: Duration,
    ) -> bool {
        match self {
            TriggerSpec::Daily { .. } => {
                let slot = self
                    .current_slot(now)
                    .expect("daily triggers always have a slot");
                now - slot < grace && last_run.is_none_or(|lr| lr < slot)
            }
            TriggerSpec::Every { interval } => {
                last_run.is_none_or(|lr| now - lr >= *interval)
            }
        }
    }
}

impl fmt::Display for TriggerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerSpec::Daily { hour, minute } => write!(f, "daily@{hour:02}:{minute:02}"),
            TriggerSpec::Every { interval } => {
                let secs = interval.num_seconds();
                if secs % 3600 == 0 {
                    write!(f, "every:{}h", secs / 3600)
                } else if secs % 60 == 0 {
                    write!(f, "every:{}m", secs / 60)
                } else {
                    write!(f, "every:{secs}s")
                }
            }
        }
    }
}

impl FromStr for TriggerSpec {
    type Err = AdvisorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| AdvisorError::InvalidTrigger {
            spec: s.to_string(),
            reason: reason.to_string(),
        };

        if let Some(time) = s.strip_prefix("daily@") {
            let (h, m) = time.split_once(':').ok_or_else(|| invalid("expected HH:MM"))?;
            let hour: u32 = h.parse().map_err(|_| invalid("hour is not a number"))?;
            let minute: u32 = m.parse().map_err(|_| invalid("minute is not a number"))?;
            if hour > 23 {
                return Err(invalid("hour must be 0-23"));
            }
            if minute > 59 {
                return Err(invalid("minute must be 0-59"));
            }
            return Ok(TriggerSpec::Daily { hour, minute });
        }

        if let Some(rest) = s.strip_prefix("every:") {
            // Split on a char boundary, the unit may be any last character.
            let Some((unit_idx, unit)) = rest.char_indices().last() else {
                return Err(invalid("expected a count and a unit, e.g. 6h"));
            };
            let count: i64 = rest[..unit_idx]
                .parse()
                .map_err(|_| invalid("count is not a number"))?;
            if count <= 0 {
                return Err(invalid("count must be positive"));
            }
            let interval = match unit {
                'h' => Duration::try_hours(count),
                'm' => Duration::try_minutes(count),
                's' => Duration::try_seconds(count),
                _ => return Err(invalid("unit must be h, m or s")),
            }
            .ok_or_else(|| invalid("interval is too large"))?;
            return Ok(TriggerSpec::Every { interval });
        }

        Err(invalid("expected 'daily@HH:MM' or 'every:<N><h|m|s>'"))
    }
}
