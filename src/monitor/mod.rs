//! Health check endpoint
//!
//! Small HTTP server used by container orchestration to verify the process
//! is alive and the scheduling loop is still polling.

use crate::storage::Database;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;

const SERVICE_NAME: &str = "betting-advisor";

/// Shared liveness state updated by the scheduling loop.
pub struct HealthState {
    started_at: DateTime<Utc>,
    last_poll: RwLock<Option<DateTime<Utc>>>,
    db: Arc<Database>,
}

impl HealthState {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            started_at: Utc::now(),
            last_poll: RwLock::new(None),
            db,
        }
    }

    pub async fn mark_poll(&self, at: DateTime<Utc>) {
        *self.last_poll.write().await = Some(at);
    }
}

pub fn router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/detailed", get(health_detailed))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
        "service": SERVICE_NAME,
    }))
}

async fn health_detailed(State(state): State<Arc<HealthState>>) -> (StatusCode, Json<Value>) {
    let db_ok = state.db.ping().await.is_ok();
    let last_poll = *state.last_poll.read().await;
    let uptime_secs = (Utc::now() - state.started_at).num_seconds();

    let status = if db_ok { "ok" } else { "degraded" };
    let code = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    (
        code,
        Json(json!({
            "status": status,
            "timestamp": Utc::now().to_rfc3339(),
            "service": SERVICE_NAME,
            "uptime_secs": uptime_secs,
            "components": {
                "database": if db_ok { "ok" } else { "error" },
                "scheduler_last_poll": last_poll.map(|t| t.to_rfc3339()),
            },
        })),
    )
}

/// Serve the health router until the process exits.
pub async fn serve(state: Arc<HealthState>, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Health check server listening on {addr}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
