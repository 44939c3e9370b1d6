//! Per-meeting bookkeeping of joined participants and in-flight launches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::reconciler::{GroupMember, Snapshot};
use super::status::{MeetingDetail, MeetingStatus, ParticipantView};
use crate::driver::{JoinRequest, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(Uuid);

impl ParticipantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Operator-declared target for a meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DesiredState {
    pub video: usize,
    pub non_video: usize,
    /// Grant the mic to the first eligible new launch.
    pub audio_policy: bool,
}

impl DesiredState {
    pub fn for_group(&self, camera_enabled: bool) -> usize {
        if camera_enabled {
            self.video
        } else {
            self.non_video
        }
    }
}

/// One joined bot. Owns its session; [`Participant::release`] is the only
/// way the session gets closed once registered.
pub struct Participant {
    pub id: ParticipantId,
    pub ordinal: u64,
    pub camera_enabled: bool,
    pub mic_enabled: bool,
    pub joined_at: DateTime<Utc>,
    session: Arc<dyn Session>,
    lifetime: CancellationToken,
}

impl Participant {
    pub fn new(request: &JoinRequest, session: Arc<dyn Session>, lifetime: CancellationToken) -> Self {
        Self {
            id: ParticipantId::new(),
            ordinal: request.ordinal,
            camera_enabled: request.camera_enabled,
            mic_enabled: request.mic_enabled,
            joined_at: Utc::now(),
            session,
            lifetime,
        }
    }

    /// Cancelled when the participant is removed.
    pub fn lifetime(&self) -> &CancellationToken {
        &self.lifetime
    }

    /// Stops the participant's background work and closes its session.
    pub async fn release(self) {
        self.lifetime.cancel();
        self.session.close().await;
    }

    fn view(&self) -> ParticipantView {
        ParticipantView {
            id: self.id,
            ordinal: self.ordinal,
            camera_enabled: self.camera_enabled,
            mic_enabled: self.mic_enabled,
            joined_at: self.joined_at,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct PendingLaunches {
    video: usize,
    non_video: usize,
    mic: bool,
}

pub struct MeetingEntry {
    pub desired: DesiredState,
    participants: Vec<Participant>,
    pending: PendingLaunches,
    last_ordinal: u64,
}

impl MeetingEntry {
    pub fn new(desired: DesiredState) -> Self {
        Self {
            desired,
            participants: Vec::new(),
            pending: PendingLaunches::default(),
            last_ordinal: 0,
        }
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn active(&self, camera_enabled: bool) -> usize {
        self.participants
            .iter()
            .filter(|p| p.camera_enabled == camera_enabled)
            .count()
    }

    pub fn pending(&self, camera_enabled: bool) -> usize {
        if camera_enabled {
            self.pending.video
        } else {
            self.pending.non_video
        }
    }

    pub fn pending_total(&self) -> usize {
        self.pending.video + self.pending.non_video
    }

    /// Books an in-flight launch and hands out its join request.
    pub fn reserve_launch(
        &mut self,
        meeting_id: &str,
        camera_enabled: bool,
        mic_enabled: bool,
    ) -> JoinRequest {
        if camera_enabled {
            self.pending.video += 1;
        } else {
            self.pending.non_video += 1;
        }
        if mic_enabled {
            self.pending.mic = true;
        }
        self.last_ordinal += 1;

        JoinRequest {
            meeting_id: meeting_id.to_string(),
            camera_enabled,
            mic_enabled,
            ordinal: self.last_ordinal,
        }
    }

    /// Clears the booking made by [`MeetingEntry::reserve_launch`].
    pub fn settle_launch(&mut self, request: &JoinRequest) {
        let slot = if request.camera_enabled {
            &mut self.pending.video
        } else {
            &mut self.pending.non_video
        };
        *slot = slot.saturating_sub(1);
        if request.mic_enabled {
            self.pending.mic = false;
        }
    }

    /// Whether a freshly joined participant in this camera group is still
    /// wanted. Only joined members count; a launch still in flight may fail.
    pub fn has_room(&self, camera_enabled: bool) -> bool {
        self.active(camera_enabled) < self.desired.for_group(camera_enabled)
    }

    pub fn insert(&mut self, participant: Participant) {
        self.participants.push(participant);
    }

    pub fn take(&mut self, id: ParticipantId) -> Option<Participant> {
        let index = self.participants.iter().position(|p| p.id == id)?;
        Some(self.participants.remove(index))
    }

    /// No participants and nothing in flight.
    pub fn is_vacant(&self) -> bool {
        self.participants.is_empty() && self.pending_total() == 0
    }

    pub fn into_participants(self) -> Vec<Participant> {
        self.participants
    }

    pub fn snapshot(&self) -> Snapshot {
        let members = |camera_enabled: bool| -> Vec<GroupMember> {
            self.participants
                .iter()
                .filter(|p| p.camera_enabled == camera_enabled)
                .map(|p| GroupMember {
                    id: p.id,
                    mic_enabled: p.mic_enabled,
                })
                .collect()
        };

        Snapshot {
            desired: self.desired,
            video: members(true),
            non_video: members(false),
            pending_video: self.pending.video,
            pending_non_video: self.pending.non_video,
            pending_mic: self.pending.mic,
        }
    }

    pub fn status(&self) -> MeetingStatus {
        let active_video_bots = self.active(true);
        MeetingStatus {
            active_bots: self.participants.len(),
            active_video_bots,
            active_non_video_bots: self.participants.len() - active_video_bots,
            desired_video_bots: self.desired.video,
            desired_non_video_bots: self.desired.non_video,
        }
    }

    pub fn detail(&self, meeting_id: &str) -> MeetingDetail {
        MeetingDetail {
            meeting_id: meeting_id.to_string(),
            status: self.status(),
            audio_policy: self.desired.audio_policy,
            pending_video_launches: self.pending.video,
            pending_non_video_launches: self.pending.non_video,
            participants: self.participants.iter().map(Participant::view).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::testing::FakeSession;

    fn desired(video: usize, non_video: usize) -> DesiredState {
        DesiredState {
            video,
            non_video,
            audio_policy: true,
        }
    }

    fn joined(entry: &mut MeetingEntry, camera: bool, mic: bool) -> ParticipantId {
        let request = entry.reserve_launch("m1", camera, mic);
        entry.settle_launch(&request);
        let participant = Participant::new(
            &request,
            Arc::new(FakeSession::default()),
            CancellationToken::new(),
        );
        let id = participant.id;
        entry.insert(participant);
        id
    }

    #[test]
    fn test_reserve_and_settle_track_pending() {
        let mut entry = MeetingEntry::new(desired(2, 1));
        let video = entry.reserve_launch("m1", true, true);
        let plain = entry.reserve_launch("m1", false, false);

        assert_eq!(entry.pending(true), 1);
        assert_eq!(entry.pending(false), 1);
        assert!(entry.snapshot().pending_mic);
        assert!(!entry.is_vacant());

        entry.settle_launch(&video);
        entry.settle_launch(&plain);
        assert_eq!(entry.pending_total(), 0);
        assert!(!entry.snapshot().pending_mic);
        assert!(entry.is_vacant());
    }

    #[test]
    fn test_ordinals_are_never_reused() {
        let mut entry = MeetingEntry::new(desired(3, 0));
        let first = joined(&mut entry, true, false);
        let second_ordinal = entry.reserve_launch("m1", true, false).ordinal;

        entry.take(first);
        let third_ordinal = entry.reserve_launch("m1", true, false).ordinal;

        assert_eq!(second_ordinal, 2);
        assert_eq!(third_ordinal, 3);
    }

    #[test]
    fn test_take_is_idempotent() {
        let mut entry = MeetingEntry::new(desired(1, 0));
        let id = joined(&mut entry, true, false);

        assert!(entry.take(id).is_some());
        assert!(entry.take(id).is_none());
        assert!(entry.is_vacant());
    }

    #[test]
    fn test_has_room_ignores_in_flight() {
        let mut entry = MeetingEntry::new(desired(2, 0));
        joined(&mut entry, true, false);
        entry.reserve_launch("m1", true, false);
        assert!(entry.has_room(true));
        assert!(!entry.has_room(false));

        joined(&mut entry, true, false);
        assert!(!entry.has_room(true));
    }

    #[test]
    fn test_status_splits_groups() {
        let mut entry = MeetingEntry::new(desired(2, 1));
        joined(&mut entry, true, true);
        joined(&mut entry, true, false);
        joined(&mut entry, false, false);

        let status = entry.status();
        assert_eq!(status.active_bots, 3);
        assert_eq!(status.active_video_bots, 2);
        assert_eq!(status.active_non_video_bots, 1);
        assert_eq!(status.desired_video_bots, 2);
        assert_eq!(status.desired_non_video_bots, 1);

        let detail = entry.detail("m1");
        assert_eq!(detail.participants.len(), 3);
        assert_eq!(detail.participants.iter().filter(|p| p.mic_enabled).count(), 1);
    }

    #[tokio::test]
    async fn test_release_closes_session_and_cancels_lifetime() {
        let session = Arc::new(FakeSession::default());
        let lifetime = CancellationToken::new();
        let request = JoinRequest {
            meeting_id: "m1".into(),
            camera_enabled: false,
            mic_enabled: false,
            ordinal: 1,
        };
        let participant = Participant::new(&request, session.clone(), lifetime.clone());

        participant.release().await;
        assert!(lifetime.is_cancelled());
        assert_eq!(
            session.close_calls.load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }
}
