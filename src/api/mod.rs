//! REST API server for meetbots.
//!
//! Provides HTTP endpoints for:
//! - Declaring and adjusting the bots of a meeting
//! - Fleet and per-meeting status
//! - Service and version info

pub mod error;
pub mod routes;

use crate::config::Config;
use crate::fleet::MeetingStore;
use anyhow::Result;
use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use routes::FleetState;

pub struct ApiServer {
    host: String,
    port: u16,
    state: FleetState,
}

impl ApiServer {
    pub fn new(store: MeetingStore, config: &Config) -> Self {
        Self {
            host: config.server.host.clone(),
            port: config.server.port,
            state: FleetState { store },
        }
    }

    pub fn router(state: FleetState) -> Router {
        Router::new()
            .route("/", get(service_info))
            .route("/version", get(version))
            .with_state(state.clone())
            .merge(routes::bots::router(state.clone()))
            .merge(routes::status::router(state))
    }

    /// Serves until `shutdown` is cancelled.
    pub async fn start(self, shutdown: CancellationToken) -> Result<()> {
        let app = Self::router(self.state);
        let address = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&address).await?;

        info!("API server listening on http://{}", address);
        info!("Endpoints:");
        info!("  GET  /                         - Service info");
        info!("  GET  /version                  - Get version info");
        info!("  POST /add-bots                 - Declare bots for a meeting");
        info!("  POST /adjust-bots              - Change bot counts of a meeting");
        info!("  GET  /meeting-status           - Counts for every meeting");
        info!("  GET  /meeting-status/:meeting  - Participants of one meeting");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        Ok(())
    }
}

async fn service_info(State(state): State<FleetState>) -> Json<Value> {
    Json(json!({
        "service": "meetbots",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "launches": state.store.launch_stats(),
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "meetbots"
    }))
}
