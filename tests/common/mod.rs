//! Shared fake driver for fleet integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use meetbots::driver::{
    ChatSendError, JoinError, JoinRequest, JoinedSession, Session, SessionDriver,
};
use meetbots::fleet::{LaunchQueue, MeetingStore};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
pub struct FakeSession {
    pub closed: AtomicBool,
    pub close_calls: AtomicUsize,
}

#[async_trait]
impl Session for FakeSession {
    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    async fn send_chat(&self, _text: &str) -> Result<(), ChatSendError> {
        Ok(())
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub struct Joined {
    pub request: JoinRequest,
    pub session: Arc<FakeSession>,
    pub disconnect: CancellationToken,
}

#[derive(Default)]
pub struct FakeDriver {
    pub latency: Duration,
    /// Extra latency per ordinal, so later bots of a meeting join later.
    pub latency_step: Duration,
    /// Number of upcoming joins that fail.
    pub fail_next: AtomicUsize,
    /// Ordinals whose join always fails.
    pub fail_ordinals: Mutex<Vec<u64>>,
    pub attempts: AtomicUsize,
    pub active: AtomicUsize,
    pub peak: AtomicUsize,
    pub joined: Mutex<Vec<Joined>>,
}

impl FakeDriver {
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Bot `n` of a meeting joins after `n * step`; the listed ordinals fail.
    pub fn staggered(step: Duration, fail_ordinals: &[u64]) -> Self {
        Self {
            latency_step: step,
            fail_ordinals: Mutex::new(fail_ordinals.to_vec()),
            ..Self::default()
        }
    }

    pub fn successful_joins(&self) -> usize {
        self.joined.lock().unwrap().len()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn total_closes(&self) -> usize {
        self.joined
            .lock()
            .unwrap()
            .iter()
            .map(|j| j.session.close_calls.load(Ordering::SeqCst))
            .sum()
    }

    /// Simulates the browser going away for the `index`-th successful join.
    pub fn disconnect(&self, index: usize) {
        self.joined.lock().unwrap()[index].disconnect.cancel();
    }
}

#[async_trait]
impl SessionDriver for FakeDriver {
    async fn join(&self, request: &JoinRequest) -> Result<JoinedSession, JoinError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let latency = self.latency + self.latency_step * request.ordinal as u32;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        let should_fail = self.fail_ordinals.lock().unwrap().contains(&request.ordinal)
            || self
                .fail_next
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
        if should_fail {
            return Err(JoinError::Transient("navigation timeout".to_string()));
        }

        let session = Arc::new(FakeSession::default());
        let disconnect = CancellationToken::new();
        self.joined.lock().unwrap().push(Joined {
            request: request.clone(),
            session: session.clone(),
            disconnect: disconnect.clone(),
        });

        Ok(JoinedSession {
            session,
            disconnected: disconnect,
        })
    }
}

pub fn store(driver: &Arc<FakeDriver>, concurrency: usize) -> MeetingStore {
    MeetingStore::new(driver.clone(), LaunchQueue::new(concurrency), None)
}

/// Waits until no launches are in flight.
pub async fn settle(store: &MeetingStore) {
    for _ in 0..1000 {
        if store.pending_launches().await == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("launches did not settle");
}

/// Waits until `check` holds or gives up.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..1000 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition never held");
}

pub async fn mic_holders(store: &MeetingStore, meeting_id: &str) -> usize {
    store
        .meeting(meeting_id)
        .await
        .map(|d| d.participants.iter().filter(|p| p.mic_enabled).count())
        .unwrap_or(0)
}
