//! Desired-vs-actual delta computation.
//!
//! [`plan`] is pure: it looks at a snapshot of one meeting and returns which
//! participants to remove and which launches to start. In-flight launches
//! count as present so repeated calls never over-provision.
//!
//! Removal picks the most recently joined members of a group first. Members
//! are otherwise interchangeable, so callers must not rely on the order.

use super::audio::{resolve_mic, MicGrant};
use super::registry::{DesiredState, ParticipantId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupMember {
    pub id: ParticipantId,
    pub mic_enabled: bool,
}

/// Point-in-time view of a meeting. Members are ordered oldest first.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub desired: DesiredState,
    pub video: Vec<GroupMember>,
    pub non_video: Vec<GroupMember>,
    pub pending_video: usize,
    pub pending_non_video: usize,
    pub pending_mic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchSpec {
    pub camera_enabled: bool,
    pub mic_enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub removals: Vec<ParticipantId>,
    pub launches: Vec<LaunchSpec>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.removals.is_empty() && self.launches.is_empty()
    }
}

/// Returns (members to remove, launches to add) for one camera group.
fn group_delta(
    members: &[GroupMember],
    pending: usize,
    desired: usize,
) -> (Vec<ParticipantId>, usize) {
    let present = members.len() + pending;
    if present > desired {
        // In-flight launches cannot be recalled; only joined members go.
        let excess = (present - desired).min(members.len());
        let removals = members.iter().rev().take(excess).map(|m| m.id).collect();
        (removals, 0)
    } else {
        (Vec::new(), desired - present)
    }
}

pub fn plan(snapshot: &Snapshot) -> Plan {
    let (mut removals, video_adds) = group_delta(
        &snapshot.video,
        snapshot.pending_video,
        snapshot.desired.video,
    );
    let (non_video_removals, non_video_adds) = group_delta(
        &snapshot.non_video,
        snapshot.pending_non_video,
        snapshot.desired.non_video,
    );
    removals.extend(non_video_removals);

    let mic_occupied = snapshot.pending_mic
        || snapshot
            .video
            .iter()
            .chain(&snapshot.non_video)
            .any(|m| m.mic_enabled && !removals.contains(&m.id));

    let grant = resolve_mic(
        snapshot.desired.audio_policy,
        mic_occupied,
        video_adds,
        non_video_adds,
    );

    let launches = (0..video_adds)
        .map(|i| LaunchSpec {
            camera_enabled: true,
            mic_enabled: grant == MicGrant::Video && i == 0,
        })
        .chain((0..non_video_adds).map(|i| LaunchSpec {
            camera_enabled: false,
            mic_enabled: grant == MicGrant::NonVideo && i == 0,
        }))
        .collect();

    Plan { removals, launches }
}
