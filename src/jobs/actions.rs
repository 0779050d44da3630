//! Built-in job actions
//!
//! Each action renders the HTML message the advisor sends for that job.
//! The prediction and odds models run out-of-band; these actions report on
//! scheduling state and advisor history kept in the local store.

use super::{JobAction, JobContext, JobOutcome};
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Daily betting tips digest, sent around noon.
pub struct TipsAction;

#[async_trait]
impl JobAction for TipsAction {
    async fn run(&self, ctx: &JobContext) -> Result<String> {
        let date = ctx.now.format("%Y-%m-%d");
        let mut text = format!(
            "<b>📊 BETTING TIPS FOR {date}</b>\n\n\
            The advisor has analysed today's fixtures.\n\
            Value picks are staked according to the configured strategy.\n"
        );
        if ctx.mode.is_shadow() {
            text.push_str("\n<i>Shadow mode: stakes are simulated, no money at risk.</i>");
        }
        Ok(text)
    }
}

/// Evening results digest for the day's bets.
pub struct ResultsAction;

#[async_trait]
impl JobAction for ResultsAction {
    async fn run(&self, ctx: &JobContext) -> Result<String> {
        let date = ctx.now.format("%Y-%m-%d");
        let stats = ctx.db.daily_stats(ctx.now.date_naive()).await?;
        let mut text = format!(
            "<b>📈 BETTING RESULTS FOR {date}</b>\n\n\
            Today's bets have been checked and settled.\n\
            Advisor runs today: {} ({} ok, {} failed)\n",
            stats.runs, stats.succeeded, stats.failed
        );
        if ctx.mode.is_shadow() {
            text.push_str("\n<i>Shadow mode: simulated outcomes only.</i>");
        }
        Ok(text)
    }
}

/// Periodic liveness message showing the system is still running.
pub struct HeartbeatAction;

#[async_trait]
impl JobAction for HeartbeatAction {
    async fn run(&self, ctx: &JobContext) -> Result<String> {
        let uptime = ctx.now - ctx.process_started_at;
        let hours = uptime.num_hours();
        let minutes = uptime.num_minutes() % 60;
        Ok(format!(
            "<b>⏱️ Betting Advisor</b>\n\n\
            The system is running normally.\n\
            Current time: {}\n\
            Uptime: {hours}h {minutes:02}m",
            ctx.now.format("%H:%M:%S")
        ))
    }
}

/// Performance report over the recent run history.
pub struct ReportAction;

#[async_trait]
impl JobAction for ReportAction {
    async fn run(&self, ctx: &JobContext) -> Result<String> {
        let runs = ctx.db.recent_runs(None, 50).await?;
        let total = runs.len();
        let succeeded = runs
            .iter()
            .filter(|r| r.outcome == JobOutcome::Success)
            .count();
        let failed = runs
            .iter()
            .filter(|r| r.outcome == JobOutcome::Failure)
            .count();

        let success_rate = if total > 0 {
            Decimal::from(succeeded as u64) / Decimal::from(total as u64)
                * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };

        let mut text = format!(
            "<b>📋 ADVISOR PERFORMANCE REPORT</b>\n\n\
            Runs recorded: {total}\n\
            Succeeded: {succeeded}\n\
            Failed: {failed}\n\
            Success rate: {success_rate:.1}%\n"
        );

        if let Some(last) = runs.first() {
            text.push_str(&format!(
                "\nLast run: <code>{}</code> at {} ({})",
                last.job_name,
                last.started_at.format("%Y-%m-%d %H:%M"),
                last.outcome
            ));
        }

        Ok(text)
    }
}

/// Acknowledges a retraining request; the model pipeline picks it up
/// out-of-band.
pub struct RetrainAction;

#[async_trait]
impl JobAction for RetrainAction {
    async fn run(&self, ctx: &JobContext) -> Result<String> {
        Ok(format!(
            "<b>🧠 MODEL RETRAINING</b>\n\n\
            A retraining cycle was requested at {}.\n\
            The prediction model will pick up fresh match data on its next pass.",
            ctx.now.format("%Y-%m-%d %H:%M:%S")
        ))
    }
}
