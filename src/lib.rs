//! AI Football Betting Advisor scheduling loop
//!
//! Coordinates the advisor's daily cadence: tips at noon, results in the
//! evening, periodic heartbeats, all delivered over Telegram.
//!
//! ## Architecture
//!
//! ```text
//! Clock/Trigger → Scheduler (poll loop) → Job Runner → Notifier (Telegram)
//!                        ↑                    ↓
//!                  State Store (SQLite: jobs + run records)
//! ```

pub mod config;
pub mod error;
pub mod jobs;
pub mod monitor;
pub mod notify;
pub mod runner;
pub mod scheduler;
pub mod storage;
pub mod testing;
pub mod trigger;
