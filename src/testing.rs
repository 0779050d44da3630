//! Test doubles for exercising the scheduler without the network

use crate::error::{AdvisorError, Result};
use crate::jobs::{JobAction, JobContext};
use crate::notify::Transport;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Transport that records every delivered text.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<String>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().expect("transport lock poisoned").clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("transport lock poisoned").len()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn deliver(&self, _chat_id: &str, text: &str) -> Result<()> {
        self.sent
            .lock()
            .expect("transport lock poisoned")
            .push(text.to_string());
        Ok(())
    }
}

/// Transport that fails transiently a fixed number of times, then delivers.
pub struct FlakyTransport {
    remaining_failures: AtomicU32,
    attempts: AtomicU32,
}

impl FlakyTransport {
    pub fn new(failures: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(failures),
            attempts: AtomicU32::new(0),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FlakyTransport {
    async fn deliver(&self, _chat_id: &str, _text: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.remaining_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.remaining_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(AdvisorError::Telegram {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        Ok(())
    }
}

/// Transport that always fails permanently (bad credentials).
pub struct BrokenTransport;

#[async_trait]
impl Transport for BrokenTransport {
    async fn deliver(&self, _chat_id: &str, _text: &str) -> Result<()> {
        Err(AdvisorError::Telegram {
            status: 401,
            body: "Unauthorized".to_string(),
        })
    }
}

/// Job action that always fails.
pub struct FailingAction;

#[async_trait]
impl JobAction for FailingAction {
    async fn run(&self, _ctx: &JobContext) -> Result<String> {
        Err(AdvisorError::JobFailed {
            job: "test".to_string(),
            message: "injected failure".to_string(),
        })
    }
}

/// Job action that returns a fixed message.
pub struct StaticAction(pub &'static str);

#[async_trait]
impl JobAction for StaticAction {
    async fn run(&self, _ctx: &JobContext) -> Result<String> {
        Ok(self.0.to_string())
    }
}

/// Job action that sleeps past any reasonable timeout.
pub struct HangingAction;

#[async_trait]
impl JobAction for HangingAction {
    async fn run(&self, _ctx: &JobContext) -> Result<String> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok("unreachable".to_string())
    }
}
