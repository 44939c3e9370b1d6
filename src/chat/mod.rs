//! Low-rate chat activity for joined participants.
//!
//! Every participant gets a periodic task that posts a random line. A single
//! [`RateLimiter`] shared by the whole fleet keeps the aggregate send rate
//! bounded no matter how many participants are chatting.

pub mod sentence;

pub use sentence::random_sentence;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ChatConfig;
use crate::driver::Session;

/// Enforces a minimum gap between any two sends.
pub struct RateLimiter {
    min_gap: Duration,
    last_send: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_gap: Duration) -> Self {
        Self {
            min_gap,
            last_send: Mutex::new(None),
        }
    }

    /// Claims the next send slot if the gap has elapsed.
    pub async fn try_acquire(&self) -> bool {
        let mut last = self.last_send.lock().await;
        let now = Instant::now();
        match *last {
            Some(at) if now.duration_since(at) < self.min_gap => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

#[derive(Clone)]
pub struct ChatSimulator {
    limiter: Arc<RateLimiter>,
    interval: Duration,
    max_message_len: usize,
}

impl ChatSimulator {
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::new(config.min_send_gap())),
            interval: config.interval(),
            max_message_len: config.max_message_len,
        }
    }

    /// Starts the chat loop for one participant. The loop ends when `lifetime`
    /// is cancelled or the session reports it is no longer connected.
    pub fn spawn(
        &self,
        label: String,
        session: Arc<dyn Session>,
        lifetime: CancellationToken,
    ) -> JoinHandle<()> {
        let chat = self.clone();
        tokio::spawn(async move { chat.run(label, session, lifetime).await })
    }

    async fn run(&self, label: String, session: Arc<dyn Session>, lifetime: CancellationToken) {
        loop {
            tokio::select! {
                _ = lifetime.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }

            if !session.is_connected() {
                debug!("Chat loop for {} ended: session disconnected", label);
                break;
            }

            if !self.limiter.try_acquire().await {
                continue;
            }

            let text = random_sentence(self.max_message_len);
            if let Err(e) = session.send_chat(&text).await {
                warn!("Chat send from {} failed: {}", label, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::testing::FakeSession;
    use std::sync::atomic::Ordering;

    fn config(interval_ms: u64, gap_ms: u64) -> ChatConfig {
        ChatConfig {
            enabled: true,
            interval_ms,
            min_send_gap_ms: gap_ms,
            max_message_len: 30,
        }
    }

    async fn advance(ms: u64) {
        for _ in 0..ms / 100 {
            tokio::time::advance(Duration::from_millis(100)).await;
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_enforces_gap() {
        let limiter = RateLimiter::new(Duration::from_millis(1000));
        assert!(limiter.try_acquire().await);
        assert!(!limiter.try_acquire().await);

        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(!limiter.try_acquire().await);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(limiter.try_acquire().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sends_every_interval() {
        let chat = ChatSimulator::new(&config(5000, 1000));
        let session = Arc::new(FakeSession::default());
        let lifetime = CancellationToken::new();
        let handle = chat.spawn("bot1".into(), session.clone(), lifetime.clone());

        advance(16_000).await;
        assert_eq!(session.sent.lock().unwrap().len(), 3);

        lifetime.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_limiter_is_shared_across_participants() {
        let chat = ChatSimulator::new(&config(5000, 1000));
        let first = Arc::new(FakeSession::default());
        let second = Arc::new(FakeSession::default());
        let lifetime = CancellationToken::new();
        chat.spawn("bot1".into(), first.clone(), lifetime.clone());
        chat.spawn("bot2".into(), second.clone(), lifetime.clone());

        // Both tick at the same instant; only one may send.
        advance(5_500).await;
        let total = first.sent.lock().unwrap().len() + second.sent.lock().unwrap().len();
        assert_eq!(total, 1);

        lifetime.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failure_keeps_loop_running() {
        let chat = ChatSimulator::new(&config(1000, 0));
        let session = Arc::new(FakeSession::default());
        session.fail_chat.store(true, Ordering::SeqCst);
        let lifetime = CancellationToken::new();
        let handle = chat.spawn("bot1".into(), session.clone(), lifetime.clone());

        advance(2_500).await;
        assert!(!handle.is_finished());

        session.fail_chat.store(false, Ordering::SeqCst);
        advance(1_000).await;
        assert_eq!(session.sent.lock().unwrap().len(), 1);

        lifetime.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_ends_when_session_disconnects() {
        let chat = ChatSimulator::new(&config(1000, 0));
        let session = Arc::new(FakeSession::default());
        let handle = chat.spawn("bot1".into(), session.clone(), CancellationToken::new());

        session.closed.store(true, Ordering::SeqCst);
        advance(1_500).await;
        handle.await.unwrap();
        assert!(session.sent.lock().unwrap().is_empty());
    }
}
