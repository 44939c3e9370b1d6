//! Desired-state endpoints.
//!
//! - Declaring a meeting's bots (POST /add-bots)
//! - Changing the counts of a known meeting (POST /adjust-bots)

use axum::{extract::State, response::Json, routing::post, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::FleetState;
use crate::api::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddBotsRequest {
    #[serde(default)]
    pub meeting_id: String,
    pub desired_video_bots: Option<usize>,
    #[serde(alias = "desiredNoneVideoBots")]
    pub desired_non_video_bots: Option<usize>,
    #[serde(default)]
    pub enable_audio_for_first_bot: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustBotsRequest {
    #[serde(default)]
    pub meeting_id: String,
    pub desired_video_bots: Option<usize>,
    #[serde(alias = "desiredNoneVideoBots")]
    pub desired_non_video_bots: Option<usize>,
}

pub fn router(state: FleetState) -> Router {
    Router::new()
        .route("/add-bots", post(add_bots))
        .route("/adjust-bots", post(adjust_bots))
        .with_state(state)
}

/// Declares the desired bots for a meeting, creating it if needed.
///
/// Returns as soon as launches are queued; poll `/meeting-status` to watch
/// the meeting converge.
async fn add_bots(
    State(state): State<FleetState>,
    Json(req): Json<AddBotsRequest>,
) -> ApiResult<Json<Value>> {
    let (Some(video), Some(non_video)) = (req.desired_video_bots, req.desired_non_video_bots)
    else {
        return Err(ApiError::bad_request("Invalid parameters"));
    };
    if req.meeting_id.trim().is_empty() {
        return Err(ApiError::bad_request("Invalid parameters"));
    }

    info!(
        "add-bots for {}: video={}, non_video={}, audio={}",
        req.meeting_id, video, non_video, req.enable_audio_for_first_bot
    );

    state
        .store
        .declare(&req.meeting_id, video, non_video, req.enable_audio_for_first_bot)
        .await?;

    Ok(Json(json!({ "message": "Bots added successfully" })))
}

/// Updates the supplied counts of a known meeting. Unknown meetings are
/// ignored.
async fn adjust_bots(
    State(state): State<FleetState>,
    Json(req): Json<AdjustBotsRequest>,
) -> ApiResult<Json<Value>> {
    if req.meeting_id.trim().is_empty() {
        return Err(ApiError::bad_request("Invalid parameters"));
    }

    info!(
        "adjust-bots for {}: video={:?}, non_video={:?}",
        req.meeting_id, req.desired_video_bots, req.desired_non_video_bots
    );

    let known = state
        .store
        .adjust(
            &req.meeting_id,
            req.desired_video_bots,
            req.desired_non_video_bots,
        )
        .await?;

    Ok(Json(json!({
        "message": "Bots adjusted successfully",
        "known": known,
    })))
}
