//! Meeting store: owns every meeting's desired state and joined bots, and
//! drives reconciliation.
//!
//! All bookkeeping happens under one lock so each reconciliation works on a
//! consistent snapshot and books its launches before the next one looks.
//! Session I/O (joins, closes) always happens outside the lock.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::launcher::{LaunchQueue, LaunchQueueStats};
use super::reconciler;
use super::registry::{DesiredState, MeetingEntry, Participant, ParticipantId};
use super::status::{MeetingDetail, MeetingStatus};
use crate::chat::ChatSimulator;
use crate::driver::{JoinRequest, JoinedSession, SessionDriver};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FleetError {
    #[error("the bot fleet is shutting down")]
    ShuttingDown,
}

/// Work decided under the lock and carried out after it is released.
#[derive(Default)]
struct Reconciliation {
    removed: Vec<Participant>,
    launches: Vec<JoinRequest>,
}

struct StoreInner {
    meetings: Mutex<HashMap<String, MeetingEntry>>,
    launcher: LaunchQueue,
    driver: Arc<dyn SessionDriver>,
    chat: Option<ChatSimulator>,
    shutdown: CancellationToken,
}

#[derive(Clone)]
pub struct MeetingStore {
    inner: Arc<StoreInner>,
}

impl MeetingStore {
    pub fn new(
        driver: Arc<dyn SessionDriver>,
        launcher: LaunchQueue,
        chat: Option<ChatSimulator>,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                meetings: Mutex::new(HashMap::new()),
                launcher,
                driver,
                chat,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Creates or updates a meeting's desired counts and reconciles it.
    ///
    /// The audio policy is fixed by the first declaration of a meeting.
    pub async fn declare(
        &self,
        meeting_id: &str,
        desired_video: usize,
        desired_non_video: usize,
        audio_policy: bool,
    ) -> Result<(), FleetError> {
        let work = {
            let mut meetings = self.inner.meetings.lock().await;
            // Checked under the lock so nothing is booked after shutdown drains.
            self.ensure_running()?;
            let entry = meetings.entry(meeting_id.to_string()).or_insert_with(|| {
                info!("Tracking new meeting {}", meeting_id);
                MeetingEntry::new(DesiredState {
                    video: 0,
                    non_video: 0,
                    audio_policy,
                })
            });
            entry.desired.video = desired_video;
            entry.desired.non_video = desired_non_video;

            Self::reconcile_locked(&mut meetings, meeting_id)
        };

        self.apply(work).await;
        Ok(())
    }

    /// Updates only the supplied counts and reconciles. Returns `false` for
    /// an unknown meeting, which is left untouched.
    pub async fn adjust(
        &self,
        meeting_id: &str,
        desired_video: Option<usize>,
        desired_non_video: Option<usize>,
    ) -> Result<bool, FleetError> {
        let work = {
            let mut meetings = self.inner.meetings.lock().await;
            self.ensure_running()?;
            let Some(entry) = meetings.get_mut(meeting_id) else {
                debug!("Ignoring adjustment for unknown meeting {}", meeting_id);
                return Ok(false);
            };
            if let Some(video) = desired_video {
                entry.desired.video = video;
            }
            if let Some(non_video) = desired_non_video {
                entry.desired.non_video = non_video;
            }

            Self::reconcile_locked(&mut meetings, meeting_id)
        };

        self.apply(work).await;
        Ok(true)
    }

    /// Current counts for every known meeting.
    pub async fn status(&self) -> BTreeMap<String, MeetingStatus> {
        let meetings = self.inner.meetings.lock().await;
        meetings
            .iter()
            .map(|(id, entry)| (id.clone(), entry.status()))
            .collect()
    }

    pub async fn meeting(&self, meeting_id: &str) -> Option<MeetingDetail> {
        let meetings = self.inner.meetings.lock().await;
        meetings.get(meeting_id).map(|entry| entry.detail(meeting_id))
    }

    /// Launches booked but not yet finished, across all meetings.
    pub async fn pending_launches(&self) -> usize {
        let meetings = self.inner.meetings.lock().await;
        meetings.values().map(MeetingEntry::pending_total).sum()
    }

    pub fn launch_stats(&self) -> LaunchQueueStats {
        self.inner.launcher.stats()
    }

    /// Removes a participant and closes its session. Removing an id that is
    /// already gone is a no-op. Returns whether anything was removed.
    pub async fn remove(&self, meeting_id: &str, participant_id: ParticipantId) -> bool {
        let participant = {
            let mut meetings = self.inner.meetings.lock().await;
            let Some(entry) = meetings.get_mut(meeting_id) else {
                return false;
            };
            let taken = entry.take(participant_id);
            Self::forget_if_vacant(&mut meetings, meeting_id);
            taken
        };

        match participant {
            Some(participant) => {
                info!(
                    "Removing {}/bot{} ({})",
                    meeting_id, participant.ordinal, participant.id
                );
                participant.release().await;
                true
            }
            None => false,
        }
    }

    /// Stops accepting work and releases every joined bot.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.launcher.close();

        let participants: Vec<Participant> = {
            let mut meetings = self.inner.meetings.lock().await;
            meetings
                .drain()
                .flat_map(|(_, entry)| entry.into_participants())
                .collect()
        };

        info!("Releasing {} bots", participants.len());
        for participant in participants {
            participant.release().await;
        }
    }

    fn ensure_running(&self) -> Result<(), FleetError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(FleetError::ShuttingDown);
        }
        Ok(())
    }

    fn forget_if_vacant(meetings: &mut HashMap<String, MeetingEntry>, meeting_id: &str) {
        if meetings.get(meeting_id).is_some_and(MeetingEntry::is_vacant) {
            meetings.remove(meeting_id);
            info!("Meeting {} has no bots left", meeting_id);
        }
    }

    fn reconcile_locked(
        meetings: &mut HashMap<String, MeetingEntry>,
        meeting_id: &str,
    ) -> Reconciliation {
        let Some(entry) = meetings.get_mut(meeting_id) else {
            return Reconciliation::default();
        };

        let plan = reconciler::plan(&entry.snapshot());
        if !plan.is_empty() {
            info!(
                "Reconciling {}: removing {}, launching {}",
                meeting_id,
                plan.removals.len(),
                plan.launches.len()
            );
        }

        let removed = plan
            .removals
            .iter()
            .filter_map(|id| entry.take(*id))
            .collect();
        let launches = plan
            .launches
            .iter()
            .map(|spec| entry.reserve_launch(meeting_id, spec.camera_enabled, spec.mic_enabled))
            .collect();

        Self::forget_if_vacant(meetings, meeting_id);

        Reconciliation { removed, launches }
    }

    async fn apply(&self, work: Reconciliation) {
        for participant in work.removed {
            debug!("Releasing bot{} ({})", participant.ordinal, participant.id);
            participant.release().await;
        }

        for request in work.launches {
            let store = self.clone();
            self.inner.launcher.submit(async move { store.launch(request).await });
        }
    }

    async fn launch(self, request: JoinRequest) {
        debug!(
            "Joining {}/bot{} (camera: {}, mic: {})",
            request.meeting_id, request.ordinal, request.camera_enabled, request.mic_enabled
        );

        match self.inner.driver.join(&request).await {
            Ok(joined) => self.attach(request, joined).await,
            Err(e) => {
                warn!(
                    "Launch of {}/bot{} failed: {}",
                    request.meeting_id, request.ordinal, e
                );
                let mut meetings = self.inner.meetings.lock().await;
                if let Some(entry) = meetings.get_mut(&request.meeting_id) {
                    entry.settle_launch(&request);
                }
                Self::forget_if_vacant(&mut meetings, &request.meeting_id);
            }
        }
    }

    /// Registers a freshly joined session, or closes it if nobody wants it
    /// any more.
    async fn attach(&self, request: JoinRequest, joined: JoinedSession) {
        let label = format!("{}/bot{}", request.meeting_id, request.ordinal);

        let registered = {
            let mut meetings = self.inner.meetings.lock().await;
            match meetings.get_mut(&request.meeting_id) {
                None => None,
                Some(entry) => {
                    entry.settle_launch(&request);
                    if entry.has_room(request.camera_enabled) {
                        let participant = Participant::new(
                            &request,
                            joined.session.clone(),
                            self.inner.shutdown.child_token(),
                        );
                        let registered = (participant.id, participant.lifetime().clone());
                        entry.insert(participant);
                        Some(registered)
                    } else {
                        Self::forget_if_vacant(&mut meetings, &request.meeting_id);
                        None
                    }
                }
            }
        };

        let Some((id, lifetime)) = registered else {
            info!("{} joined but is no longer wanted; closing it", label);
            joined.session.close().await;
            return;
        };

        info!(
            "{} joined (camera: {}, mic: {})",
            label, request.camera_enabled, request.mic_enabled
        );

        if let Some(chat) = &self.inner.chat {
            chat.spawn(label, joined.session.clone(), lifetime.clone());
        }
        self.watch_disconnect(request.meeting_id, id, joined.disconnected, lifetime);
    }

    /// Routes a driver-side disconnect into the normal removal path.
    fn watch_disconnect(
        &self,
        meeting_id: String,
        id: ParticipantId,
        disconnected: CancellationToken,
        lifetime: CancellationToken,
    ) {
        let store = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = lifetime.cancelled() => {}
                _ = disconnected.cancelled() => {
                    info!("Bot {} in meeting {} disconnected", id, meeting_id);
                    store.remove(&meeting_id, id).await;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChatConfig;
    use crate::driver::testing::FakeDriver;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn store_with(driver: Arc<FakeDriver>) -> MeetingStore {
        MeetingStore::new(driver, LaunchQueue::new(4), None)
    }

    fn chatty_store(driver: Arc<FakeDriver>) -> MeetingStore {
        let chat = ChatSimulator::new(&ChatConfig {
            enabled: true,
            interval_ms: 1000,
            min_send_gap_ms: 0,
            max_message_len: 20,
        });
        MeetingStore::new(driver, LaunchQueue::new(4), Some(chat))
    }

    fn sent_by(driver: &FakeDriver, index: usize) -> usize {
        let sessions = driver.sessions.lock().unwrap();
        let sent = sessions[index].0.sent.lock().unwrap().len();
        sent
    }

    async fn settle(store: &MeetingStore) {
        for _ in 0..200 {
            if store.pending_launches().await == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("launches did not settle");
    }

    #[tokio::test]
    async fn test_declare_then_status() {
        let driver = Arc::new(FakeDriver::default());
        let store = store_with(driver.clone());

        store.declare("m1", 2, 1, true).await.unwrap();
        settle(&store).await;

        let status = store.status().await;
        assert_eq!(
            status["m1"],
            MeetingStatus {
                active_bots: 3,
                active_video_bots: 2,
                active_non_video_bots: 1,
                desired_video_bots: 2,
                desired_non_video_bots: 1,
            }
        );
        assert_eq!(driver.join_count(), 3);
    }

    #[tokio::test]
    async fn test_adjust_unknown_meeting_is_noop() {
        let driver = Arc::new(FakeDriver::default());
        let store = store_with(driver.clone());

        assert!(!store.adjust("nope", Some(3), None).await.unwrap());
        assert!(store.status().await.is_empty());
        assert_eq!(driver.join_count(), 0);
    }

    #[tokio::test]
    async fn test_zero_declaration_is_forgotten() {
        let store = store_with(Arc::new(FakeDriver::default()));
        store.declare("m1", 0, 0, false).await.unwrap();
        assert!(store.status().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_launches_leave_no_meeting() {
        let driver = Arc::new(FakeDriver::default());
        driver.fail_all.store(true, Ordering::SeqCst);
        let store = store_with(driver.clone());

        store.declare("m1", 2, 0, false).await.unwrap();
        settle(&store).await;

        assert_eq!(driver.join_count(), 2);
        assert!(store.status().await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_twice_closes_once() {
        let driver = Arc::new(FakeDriver::default());
        let store = store_with(driver.clone());
        store.declare("m1", 2, 0, false).await.unwrap();
        settle(&store).await;

        let detail = store.meeting("m1").await.unwrap();
        let id = detail.participants[0].id;

        assert!(store.remove("m1", id).await);
        assert!(!store.remove("m1", id).await);

        let closes: usize = driver
            .sessions
            .lock()
            .unwrap()
            .iter()
            .map(|(s, _)| s.close_calls.load(Ordering::SeqCst))
            .sum();
        assert_eq!(closes, 1);
    }

    #[tokio::test]
    async fn test_shutdown_releases_everything_and_rejects_work() {
        let driver = Arc::new(FakeDriver::default());
        let store = store_with(driver.clone());
        store.declare("m1", 1, 1, false).await.unwrap();
        settle(&store).await;

        store.shutdown().await;

        assert!(store.status().await.is_empty());
        assert!(driver
            .sessions
            .lock()
            .unwrap()
            .iter()
            .all(|(s, _)| s.closed.load(Ordering::SeqCst)));
        assert_eq!(
            store.declare("m1", 1, 0, false).await,
            Err(FleetError::ShuttingDown)
        );
    }

    #[tokio::test]
    async fn test_declare_racing_shutdown_books_nothing() {
        let driver = Arc::new(FakeDriver::default());
        let store = store_with(driver.clone());

        // Hold the lock so the declaration is parked behind it while the
        // store shuts down.
        let guard = store.inner.meetings.lock().await;
        let declared = tokio::spawn({
            let store = store.clone();
            async move { store.declare("m1", 2, 0, false).await }
        });
        tokio::task::yield_now().await;
        store.inner.shutdown.cancel();
        store.inner.launcher.close();
        drop(guard);

        assert_eq!(declared.await.unwrap(), Err(FleetError::ShuttingDown));
        assert!(store.status().await.is_empty());
        assert_eq!(store.pending_launches().await, 0);
        assert_eq!(driver.join_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chat_stops_when_participant_removed() {
        let driver = Arc::new(FakeDriver::default());
        let store = chatty_store(driver.clone());
        store.declare("m1", 1, 0, false).await.unwrap();
        settle(&store).await;

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        let before = sent_by(&driver, 0);
        assert!(before > 0);

        let id = store.meeting("m1").await.unwrap().participants[0].id;
        assert!(store.remove("m1", id).await);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(sent_by(&driver, 0), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chat_stops_when_participant_disconnects() {
        let driver = Arc::new(FakeDriver::default());
        let store = chatty_store(driver.clone());
        store.declare("m1", 1, 0, false).await.unwrap();
        settle(&store).await;

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert!(sent_by(&driver, 0) > 0);

        let disconnected = driver.sessions.lock().unwrap()[0].1.clone();
        disconnected.cancel();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(store.status().await.is_empty());

        let before = sent_by(&driver, 0);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(sent_by(&driver, 0), before);
    }
}
