use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

const APP_DIR: &str = "meetbots";

/// Overrides the directory holding the fake capture files.
pub const ASSETS_ENV: &str = "CUSTOM_ASSETS_FOLDER";
/// Overrides the config file location.
pub const CONFIG_ENV: &str = "MEETBOTS_CONFIG";

pub const FAKE_VIDEO_FILE: &str = "test_video.y4m";
pub const FAKE_AUDIO_FILE: &str = "test_audio.wav";

pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .context("Unable to determine config directory")
}

pub fn config_file() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }
    Ok(config_dir()?.join("config.toml"))
}

pub fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = dirs::data_dir() {
        return Ok(dir.join(APP_DIR));
    }
    if let Some(home) = dirs::home_dir() {
        return Ok(home.join(".local").join("share").join(APP_DIR));
    }
    Err(anyhow!("Unable to determine data directory"))
}

/// Resolves the media-fake asset directory.
///
/// Precedence: `CUSTOM_ASSETS_FOLDER`, then the configured directory, then
/// `<data_dir>/assets`.
pub fn assets_dir(configured: Option<&str>) -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(ASSETS_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    if let Some(dir) = configured.filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    Ok(data_dir()?.join("assets"))
}

/// Browsers run headless everywhere except desktop platforms where a
/// visible window is useful for watching the bots.
pub fn default_headless() -> bool {
    headless_for(std::env::consts::OS)
}

fn headless_for(os: &str) -> bool {
    !matches!(os, "macos" | "windows")
}
