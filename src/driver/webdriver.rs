//! W3C WebDriver implementation of [`SessionDriver`].
//!
//! Talks JSON over HTTP to a chromedriver (or any compatible endpoint) and
//! walks the conference join screens with fake media devices.

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::retry::with_retries;
use super::{ChatSendError, JoinError, JoinRequest, JoinedSession, Session, SessionDriver};
use crate::config::DriverConfig;
use crate::global;

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
const ENTER_KEY: &str = "\u{E007}";
const READY_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum WebDriverError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{error}: {message}")]
    Command { error: String, message: String },
    #[error("unexpected response: {0}")]
    Protocol(String),
}

impl WebDriverError {
    /// Errors worth another navigation attempt.
    fn is_transient(&self) -> bool {
        match self {
            WebDriverError::Http(e) => e.is_timeout() || e.is_connect(),
            WebDriverError::Command { error, message } => {
                error == "timeout" || message.contains("net::ERR_")
            }
            WebDriverError::Protocol(_) => false,
        }
    }

    /// Errors meaning the browser session is gone for good. Timeouts and
    /// other hiccups on a busy endpoint do not count.
    fn is_session_lost(&self) -> bool {
        match self {
            WebDriverError::Http(e) => e.is_connect(),
            WebDriverError::Command { error, .. } => {
                matches!(error.as_str(), "invalid session id" | "no such window")
            }
            WebDriverError::Protocol(_) => false,
        }
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    value: T,
}

#[derive(Deserialize)]
struct CommandFailure {
    error: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct NewSession {
    #[serde(rename = "sessionId")]
    session_id: String,
}

/// Thin JSON client for a WebDriver endpoint.
pub struct WebDriverClient {
    http: reqwest::Client,
    base_url: String,
}

impl WebDriverClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, WebDriverError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn command<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, WebDriverError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let failure = serde_json::from_slice::<Envelope<CommandFailure>>(&bytes)
                .map_err(|_| WebDriverError::Protocol(format!("HTTP {status}")))?
                .value;
            return Err(WebDriverError::Command {
                error: failure.error,
                message: failure.message,
            });
        }

        serde_json::from_slice::<Envelope<T>>(&bytes)
            .map(|envelope| envelope.value)
            .map_err(|e| WebDriverError::Protocol(e.to_string()))
    }
}

/// Returns the WebDriver locator strategy for a selector string.
fn locator(selector: &str) -> Value {
    let using = if selector.starts_with('/') || selector.starts_with('(') {
        "xpath"
    } else {
        "css selector"
    };
    json!({ "using": using, "value": selector })
}

/// One browser session on the WebDriver endpoint.
struct BrowserSession {
    client: Arc<WebDriverClient>,
    id: String,
}

impl BrowserSession {
    async fn create(client: Arc<WebDriverClient>, capabilities: Value) -> Result<Self, WebDriverError> {
        let created: NewSession = client
            .command(Method::POST, "/session", Some(json!({ "capabilities": capabilities })))
            .await?;
        debug!("Created browser session {}", created.session_id);
        Ok(Self {
            client,
            id: created.session_id,
        })
    }

    fn path(&self, suffix: &str) -> String {
        format!("/session/{}{}", self.id, suffix)
    }

    async fn set_timeouts(&self, step: Duration) -> Result<(), WebDriverError> {
        let millis = step.as_millis() as u64;
        self.client
            .command::<Value>(
                Method::POST,
                &self.path("/timeouts"),
                Some(json!({ "implicit": millis, "pageLoad": millis })),
            )
            .await
            .map(|_| ())
    }

    async fn navigate(&self, url: &str) -> Result<(), WebDriverError> {
        self.client
            .command::<Value>(Method::POST, &self.path("/url"), Some(json!({ "url": url })))
            .await
            .map(|_| ())
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value, WebDriverError> {
        self.client
            .command(
                Method::POST,
                &self.path("/execute/sync"),
                Some(json!({ "script": script, "args": args })),
            )
            .await
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<(), WebDriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            let state = self.execute("return document.readyState", Vec::new()).await?;
            if state.as_str() == Some("complete") {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(WebDriverError::Command {
                    error: "timeout".to_string(),
                    message: format!("page not ready after {}ms", timeout.as_millis()),
                });
            }
            sleep(READY_POLL).await;
        }
    }

    async fn find(&self, selector: &str) -> Result<String, WebDriverError> {
        let element: Value = self
            .client
            .command(Method::POST, &self.path("/element"), Some(locator(selector)))
            .await?;
        element
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| WebDriverError::Protocol(format!("no element reference for {selector}")))
    }

    async fn type_into(&self, selector: &str, text: &str) -> Result<(), WebDriverError> {
        let element = self.find(selector).await?;
        self.client
            .command::<Value>(
                Method::POST,
                &self.path(&format!("/element/{element}/value")),
                Some(json!({ "text": text })),
            )
            .await
            .map(|_| ())
    }

    async fn click(&self, selector: &str) -> Result<(), WebDriverError> {
        let element = self.find(selector).await?;
        self.client
            .command::<Value>(
                Method::POST,
                &self.path(&format!("/element/{element}/click")),
                Some(json!({})),
            )
            .await
            .map(|_| ())
    }

    /// Clicks through script so hidden checkbox inputs still toggle.
    async fn script_click(&self, selector: &str) -> Result<(), WebDriverError> {
        let element = self.find(selector).await?;
        let mut reference = serde_json::Map::new();
        reference.insert(ELEMENT_KEY.to_string(), Value::String(element));
        self.execute("arguments[0].click();", vec![Value::Object(reference)])
            .await
            .map(|_| ())
    }

    async fn window_handle(&self) -> Result<String, WebDriverError> {
        self.client
            .command(Method::GET, &self.path("/window"), None)
            .await
    }

    async fn delete(&self) {
        if let Err(e) = self
            .client
            .command::<Value>(Method::DELETE, &self.path(""), None)
            .await
        {
            warn!("Failed to delete browser session {}: {}", self.id, e);
        }
    }
}

fn navigation_error(err: WebDriverError) -> JoinError {
    if err.is_transient() {
        JoinError::Transient(err.to_string())
    } else {
        JoinError::Fatal(err.to_string())
    }
}

async fn step<T>(
    name: &'static str,
    action: impl Future<Output = Result<T, WebDriverError>>,
) -> Result<T, JoinError> {
    action.await.map_err(|e| JoinError::PostJoinStep {
        step: name,
        message: e.to_string(),
    })
}

/// A participant's browser session, live until closed or lost.
pub struct WebDriverSession {
    browser: Arc<BrowserSession>,
    chat_input: String,
    disconnected: CancellationToken,
    stop_polling: CancellationToken,
    closed: AtomicBool,
}

impl WebDriverSession {
    /// Polls the browser until it stops answering, then signals disconnect.
    fn spawn_disconnect_poller(&self, interval: Duration) {
        let browser = self.browser.clone();
        let disconnected = self.disconnected.clone();
        let stop = self.stop_polling.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.cancelled() => return,
                    _ = sleep(interval) => {}
                }
                match browser.window_handle().await {
                    Ok(_) => {}
                    Err(e) if e.is_session_lost() => {
                        info!("Browser session {} lost: {}", browser.id, e);
                        disconnected.cancel();
                        return;
                    }
                    Err(e) => {
                        debug!("Liveness check for {} failed, will retry: {}", browser.id, e);
                    }
                }
            }
        });
    }
}

#[async_trait]
impl Session for WebDriverSession {
    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && !self.disconnected.is_cancelled()
    }

    async fn send_chat(&self, text: &str) -> Result<(), ChatSendError> {
        if !self.is_connected() {
            return Err(ChatSendError("session is not connected".to_string()));
        }
        self.browser
            .type_into(&self.chat_input, &format!("{text}{ENTER_KEY}"))
            .await
            .map_err(|e| ChatSendError(e.to_string()))
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop_polling.cancel();
        self.browser.delete().await;
    }
}

pub struct WebDriverSessionDriver {
    client: Arc<WebDriverClient>,
    config: DriverConfig,
    assets_dir: PathBuf,
    join_retries: u32,
}

impl WebDriverSessionDriver {
    pub fn new(
        webdriver_url: &str,
        config: &DriverConfig,
        join_retries: u32,
    ) -> anyhow::Result<Self> {
        // Leave headroom over the implicit wait so element lookups time out
        // on the browser side first.
        let http_timeout = config.step_timeout() + Duration::from_secs(10);
        let client = WebDriverClient::new(webdriver_url, http_timeout)?;
        let assets_dir = global::assets_dir(config.assets_dir.as_deref())?;
        info!(
            "WebDriver endpoint {} (assets: {:?}, headless: {})",
            webdriver_url,
            assets_dir,
            config.headless()
        );

        Ok(Self {
            client: Arc::new(client),
            config: config.clone(),
            assets_dir,
            join_retries,
        })
    }

    pub fn browser_args(&self) -> Vec<String> {
        let video = self.assets_dir.join(global::FAKE_VIDEO_FILE);
        let audio = self.assets_dir.join(global::FAKE_AUDIO_FILE);

        let mut args = vec![
            "--use-fake-ui-for-media-stream".to_string(),
            "--use-fake-device-for-media-stream".to_string(),
            format!("--use-file-for-fake-video-capture={}", video.display()),
            format!("--use-file-for-fake-audio-capture={}", audio.display()),
            "--no-sandbox".to_string(),
            "--disable-setuid-sandbox".to_string(),
            "--disable-web-security".to_string(),
            "--allow-file-access-from-files".to_string(),
            "--disable-features=IsolateOrigins,site-per-process".to_string(),
            "--ignore-certificate-errors".to_string(),
            "--ignore-ssl-errors".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--no-first-run".to_string(),
            format!("--user-agent={}", self.config.user_agent),
        ];
        if self.config.headless() {
            args.push("--headless=new".to_string());
        }
        args
    }

    fn capabilities(&self) -> Value {
        json!({
            "alwaysMatch": {
                "browserName": "chrome",
                "goog:chromeOptions": {
                    "args": self.browser_args(),
                    "excludeSwitches": ["enable-automation"],
                }
            }
        })
    }

    fn meeting_url(&self, meeting_id: &str) -> String {
        format!("{}{}", self.config.meeting_base_url, meeting_id)
    }

    async fn run_join_flow(
        &self,
        browser: &BrowserSession,
        request: &JoinRequest,
    ) -> Result<(), JoinError> {
        let timeout = self.config.step_timeout();
        let selectors = &self.config.selectors;

        step("timeouts", browser.set_timeouts(timeout)).await?;

        let url = self.meeting_url(&request.meeting_id);
        let url = url.as_str();
        with_retries(self.join_retries, "navigation", move || async move {
            browser.navigate(url).await.map_err(navigation_error)?;
            browser.wait_ready(timeout).await.map_err(navigation_error)
        })
        .await?;

        step(
            "name",
            browser.type_into(&selectors.name_input, &self.config.display_name),
        )
        .await?;
        step(
            "name suffix",
            browser.type_into(&selectors.name_input, &request.ordinal.to_string()),
        )
        .await?;
        step("join now", browser.click(&selectors.join_now_button)).await?;
        step("device setup", browser.wait_ready(timeout)).await?;

        if !request.mic_enabled {
            step(
                "join muted",
                browser.script_click(&selectors.join_muted_checkbox),
            )
            .await?;
        }

        step(
            "voice focus",
            browser.script_click(&selectors.voice_focus_checkbox),
        )
        .await?;

        let join_button = if request.camera_enabled {
            &selectors.join_with_video_button
        } else {
            &selectors.join_without_video_button
        };
        step("join", browser.click(join_button)).await?;

        Ok(())
    }
}

#[async_trait]
impl SessionDriver for WebDriverSessionDriver {
    async fn join(&self, request: &JoinRequest) -> Result<JoinedSession, JoinError> {
        let browser = BrowserSession::create(self.client.clone(), self.capabilities())
            .await
            .map_err(|e| JoinError::Fatal(format!("could not start browser: {e}")))?;

        if let Err(err) = self.run_join_flow(&browser, request).await {
            browser.delete().await;
            return Err(err);
        }

        let disconnected = CancellationToken::new();
        let session = WebDriverSession {
            browser: Arc::new(browser),
            chat_input: self.config.selectors.chat_input.clone(),
            disconnected: disconnected.clone(),
            stop_polling: CancellationToken::new(),
            closed: AtomicBool::new(false),
        };
        session.spawn_disconnect_poller(self.config.disconnect_poll());

        Ok(JoinedSession {
            session: Arc::new(session),
            disconnected,
        })
    }
}
