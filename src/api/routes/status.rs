//! Fleet status endpoints.
//!
//! - Counts for every meeting (GET /meeting-status)
//! - Full view of one meeting (GET /meeting-status/:meeting_id)

use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};
use std::collections::BTreeMap;

use super::FleetState;
use crate::api::error::{ApiError, ApiResult};
use crate::fleet::{MeetingDetail, MeetingStatus};

pub fn router(state: FleetState) -> Router {
    Router::new()
        .route("/meeting-status", get(meeting_status))
        .route("/meeting-status/:meeting_id", get(meeting_detail))
        .with_state(state)
}

async fn meeting_status(State(state): State<FleetState>) -> Json<BTreeMap<String, MeetingStatus>> {
    Json(state.store.status().await)
}

async fn meeting_detail(
    Path(meeting_id): Path<String>,
    State(state): State<FleetState>,
) -> ApiResult<Json<MeetingDetail>> {
    state
        .store
        .meeting(&meeting_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Unknown meeting {meeting_id}")))
}
