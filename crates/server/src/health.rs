use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use staffbridge_core::verification::VerificationStore;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    store: Arc<VerificationStore>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerificationHealth {
    pub active_sessions: usize,
    pub max_attempts: u32,
    pub expiry_secs: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub verification: VerificationHealth,
    pub checked_at: String,
}

pub fn router(store: Arc<VerificationStore>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { store })
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    store: Arc<VerificationStore>,
) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(store)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let policy = state.store.policy();
    let payload = HealthResponse {
        status: "ready",
        service: HealthCheck {
            status: "ready",
            detail: "staffbridge-server runtime initialized".to_string(),
        },
        verification: VerificationHealth {
            active_sessions: state.store.active_sessions(),
            max_attempts: policy.max_attempts,
            expiry_secs: policy.expiry_window.num_seconds(),
        },
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}
