//! Local chromedriver supervision for when no WebDriver endpoint is configured.

use anyhow::{bail, Context, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{info, warn};

const STARTUP_ATTEMPTS: u32 = 20;
const STARTUP_POLL: Duration = Duration::from_millis(250);

/// A chromedriver child process. Killed when dropped.
pub struct ChromeDriverProcess {
    child: Child,
    url: String,
}

impl ChromeDriverProcess {
    /// Locates `chromedriver` on `PATH`, starts it on `port` and waits until
    /// its status endpoint reports ready.
    pub async fn spawn(port: u16) -> Result<Self> {
        let binary = which::which("chromedriver")
            .context("chromedriver not found in PATH; install it or set driver.webdriver_url")?;

        info!("Starting {:?} on port {}", binary, port);

        let child = Command::new(&binary)
            .arg(format!("--port={port}"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn {:?}", binary))?;

        let process = Self {
            child,
            url: format!("http://127.0.0.1:{port}"),
        };
        process.wait_until_ready().await?;
        Ok(process)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn wait_until_ready(&self) -> Result<()> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;
        let status_url = format!("{}/status", self.url);

        for _ in 0..STARTUP_ATTEMPTS {
            if let Ok(response) = client.get(&status_url).send().await {
                if response.status().is_success() {
                    info!("chromedriver ready at {}", self.url);
                    return Ok(());
                }
            }
            tokio::time::sleep(STARTUP_POLL).await;
        }

        bail!(
            "chromedriver did not become ready at {} after {} attempts",
            self.url,
            STARTUP_ATTEMPTS
        )
    }

    pub async fn stop(mut self) {
        if let Err(e) = self.child.kill().await {
            warn!("Failed to stop chromedriver: {}", e);
        } else {
            info!("chromedriver stopped");
        }
    }
}
