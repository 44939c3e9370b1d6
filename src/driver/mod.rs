//! Session driver abstraction.
//!
//! A driver performs the browser-level join for one participant and hands
//! back a live [`Session`] together with a token that is cancelled when the
//! underlying browser session goes away.

pub mod chromedriver;
pub mod retry;
pub mod webdriver;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use chromedriver::ChromeDriverProcess;
pub use retry::with_retries;
pub use webdriver::WebDriverSessionDriver;

/// Everything a driver needs to join one participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub meeting_id: String,
    pub camera_enabled: bool,
    pub mic_enabled: bool,
    /// Ordinal within the meeting, used as the display-name suffix.
    pub ordinal: u64,
}

#[derive(Debug, Error)]
pub enum JoinError {
    /// Navigation or page-load failure. Safe to retry.
    #[error("transient join failure: {0}")]
    Transient(String),
    /// A UI step after navigation failed. Never retried.
    #[error("join step '{step}' failed: {message}")]
    PostJoinStep { step: &'static str, message: String },
    #[error("join failed: {0}")]
    Fatal(String),
}

impl JoinError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, JoinError::Transient(_))
    }
}

#[derive(Debug, Error)]
#[error("chat send failed: {0}")]
pub struct ChatSendError(pub String);

/// A joined, live participant session.
#[async_trait]
pub trait Session: Send + Sync {
    fn is_connected(&self) -> bool;

    async fn send_chat(&self, text: &str) -> Result<(), ChatSendError>;

    /// Releases the underlying browser session. Must tolerate repeat calls.
    async fn close(&self);
}

pub struct JoinedSession {
    pub session: Arc<dyn Session>,
    /// Cancelled by the driver when the session is lost.
    pub disconnected: CancellationToken,
}

#[async_trait]
pub trait SessionDriver: Send + Sync {
    /// Joins the meeting. On error the driver has already released anything
    /// it created.
    async fn join(&self, request: &JoinRequest) -> Result<JoinedSession, JoinError>;
}
