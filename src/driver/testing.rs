//! In-memory driver for unit tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use super::{ChatSendError, JoinError, JoinRequest, JoinedSession, Session, SessionDriver};

#[derive(Default)]
pub(crate) struct FakeSession {
    pub closed: AtomicBool,
    pub close_calls: AtomicUsize,
    pub fail_chat: AtomicBool,
    pub sent: Mutex<Vec<String>>,
}

#[async_trait]
impl Session for FakeSession {
    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    async fn send_chat(&self, text: &str) -> Result<(), ChatSendError> {
        if self.fail_chat.load(Ordering::SeqCst) {
            return Err(ChatSendError("chat panel not open".to_string()));
        }
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub(crate) struct FakeDriver {
    pub fail_all: AtomicBool,
    pub requests: Mutex<Vec<JoinRequest>>,
    pub sessions: Mutex<Vec<(Arc<FakeSession>, CancellationToken)>>,
}

impl FakeDriver {
    pub fn join_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl SessionDriver for FakeDriver {
    async fn join(&self, request: &JoinRequest) -> Result<JoinedSession, JoinError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(JoinError::Transient("navigation timeout".to_string()));
        }

        let session = Arc::new(FakeSession::default());
        let disconnected = CancellationToken::new();
        self.sessions
            .lock()
            .unwrap()
            .push((session.clone(), disconnected.clone()));

        Ok(JoinedSession {
            session,
            disconnected,
        })
    }
}
