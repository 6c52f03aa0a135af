//! Health endpoint and keep-alive ping for hosting platforms that stop
//! idle processes.

use std::time::Duration;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::time::Instant;

const KEEP_ALIVE_PERIOD: Duration = Duration::from_secs(14 * 60);

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    status: &'static str,
    uptime_seconds: u64,
    timestamp: String,
}

#[derive(Clone, Copy)]
struct AppState {
    started: Instant,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "Watcher is running",
        uptime_seconds: state.started.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub async fn serve(port: u16) {
    let state = AppState {
        started: Instant::now(),
    };
    let app = Router::new().route("/", get(health_handler)).with_state(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            log::error!("Cannot bind health server to {addr}: {e}");
            return;
        }
    };

    log::info!("Health server listening on {addr}");

    if let Err(e) = axum::serve(listener, app).await {
        log::error!("Health server failed: {e}");
    }
}

/// Fetches the configured external URL periodically so the hosting
/// platform sees inbound traffic and keeps the process alive.
pub async fn keep_alive(url: String) {
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            log::error!("Cannot build keep-alive client: {e}");
            return;
        }
    };

    let mut ticks = tokio::time::interval_at(
        Instant::now() + KEEP_ALIVE_PERIOD,
        KEEP_ALIVE_PERIOD,
    );
    ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticks.tick().await;
        match client.get(&url).send().await {
            Ok(response) => log::info!("Keep-alive ping: {}", response.status()),
            Err(e) => log::warn!("Keep-alive ping failed: {e}"),
        }
    }
}
