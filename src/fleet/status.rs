//! Read-only views of the fleet, shaped for the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::registry::ParticipantId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingStatus {
    pub active_bots: usize,
    pub active_video_bots: usize,
    pub active_non_video_bots: usize,
    pub desired_video_bots: usize,
    pub desired_non_video_bots: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    pub id: ParticipantId,
    pub ordinal: u64,
    pub camera_enabled: bool,
    pub mic_enabled: bool,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingDetail {
    pub meeting_id: String,
    #[serde(flatten)]
    pub status: MeetingStatus,
    pub audio_policy: bool,
    pub pending_video_launches: usize,
    pub pending_non_video_launches: usize,
    pub participants: Vec<ParticipantView>,
}
