use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub launch: LaunchConfig,
    pub chat: ChatConfig,
    pub driver: DriverConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// Maximum number of join attempts running at once.
    pub concurrency: usize,
    /// Extra navigation attempts after a transient failure.
    pub join_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub enabled: bool,
    pub interval_ms: u64,
    /// Minimum gap between any two messages across the whole fleet.
    pub min_send_gap_ms: u64,
    pub max_message_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Existing WebDriver endpoint. When unset a local chromedriver is spawned.
    pub webdriver_url: Option<String>,
    pub chromedriver_port: u16,
    pub meeting_base_url: String,
    pub assets_dir: Option<String>,
    pub headless: Option<bool>,
    pub user_agent: String,
    pub display_name: String,
    pub step_timeout_ms: u64,
    pub disconnect_poll_ms: u64,
    pub selectors: SelectorConfig,
}

/// Locators for the join flow. Values starting with `/` or `(` are XPath,
/// everything else is a CSS selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub name_input: String,
    pub join_now_button: String,
    pub join_muted_checkbox: String,
    pub voice_focus_checkbox: String,
    pub join_with_video_button: String,
    pub join_without_video_button: String,
    pub chat_input: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3838,
        }
    }
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            join_retries: 1,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 5000,
            min_send_gap_ms: 1000,
            max_message_len: 40,
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            webdriver_url: None,
            chromedriver_port: 9515,
            meeting_base_url: "https://app.chime.aws/meetings/".to_string(),
            assets_dir: None,
            headless: None,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36".to_string(),
            display_name: "bot".to_string(),
            step_timeout_ms: 20_000,
            disconnect_poll_ms: 2_000,
            selectors: SelectorConfig::default(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            name_input: r#"input[id="name"]"#.to_string(),
            join_now_button:
                "//button[contains(@class, 'Button--enabled') and contains(., 'Join meeting now')]"
                    .to_string(),
            join_muted_checkbox: r#"div[data-test-id="DeviceSetupJoinMutedCheckbox"] input"#
                .to_string(),
            voice_focus_checkbox: r#"div[data-test-id="DeviceSetupVoiceFocusCheckbox"] input"#
                .to_string(),
            join_with_video_button: r#"button[data-test-id="DevicePreviewJoinWithVideo"]"#
                .to_string(),
            join_without_video_button: r#"button[data-test-id="DevicePreviewJoinBtn"]"#
                .to_string(),
            chat_input: r#"div[data-test-id="ChatInput"] textarea"#.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl ChatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn min_send_gap(&self) -> Duration {
        Duration::from_millis(self.min_send_gap_ms)
    }
}

impl DriverConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub fn disconnect_poll(&self) -> Duration {
        Duration::from_millis(self.disconnect_poll_ms)
    }

    pub fn headless(&self) -> bool {
        self.headless.unwrap_or_else(global::default_headless)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&global::config_file()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    pub fn path() -> Result<PathBuf> {
        global::config_file()
    }
}
