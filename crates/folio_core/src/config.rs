//! Application configuration loaded from `assets/config/folio.json`.
//!
//! Every field has a default, so a partial file (or none at all) works.
//! Quality and visibility tunables are hot-reloaded by the app; the rest is
//! read once at startup.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::memory::DEFAULT_MEMORY_INTERVAL_SECS;
use crate::quality::QualitySettings;
use crate::resolver::DEFAULT_CROSSFADE_US;
use crate::section::SectionKey;
use crate::visibility::ObserverOptions;

pub const DEFAULT_CONFIG_PATH: &str = "assets/config/folio.json";

/// Longest crossfade a config may ask for.
pub const MAX_CROSSFADE_MS: u64 = 10_000;

const MEMORY_INTERVAL_RANGE: (f64, f64) = (0.5, 3600.0);

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Folio".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Crossfade length at normal speed.
    pub crossfade_ms: u64,
    /// Seconds without scrolling before the character stops walking.
    pub scroll_idle_secs: f64,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            crossfade_ms: DEFAULT_CROSSFADE_US / 1000,
            scroll_idle_secs: 1.0,
        }
    }
}

impl AnimationConfig {
    pub fn crossfade_us(&self) -> u64 {
        self.crossfade_ms.saturating_mul(1000)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub quality: QualitySettings,
    pub visibility: ObserverOptions,
    pub animation: AnimationConfig,
    pub character_path: PathBuf,
    pub initial_section: SectionKey,
    /// Seconds between memory readings shown in the debug overlay.
    pub memory_interval_secs: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            quality: QualitySettings::default(),
            visibility: ObserverOptions::default(),
            animation: AnimationConfig::default(),
            character_path: PathBuf::from("assets/characters/avatar.json"),
            initial_section: SectionKey::Hero,
            memory_interval_secs: DEFAULT_MEMORY_INTERVAL_SECS,
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(format!(
                "window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            ));
        }
        if self.animation.crossfade_ms == 0 || self.animation.crossfade_ms > MAX_CROSSFADE_MS {
            return Err(format!(
                "animation.crossfade_ms must be in 1..={MAX_CROSSFADE_MS}, got {}",
                self.animation.crossfade_ms
            ));
        }
        if !(self.animation.scroll_idle_secs.is_finite() && self.animation.scroll_idle_secs > 0.0) {
            return Err(format!(
                "animation.scroll_idle_secs must be positive, got {}",
                self.animation.scroll_idle_secs
            ));
        }
        let (min_interval, max_interval) = MEMORY_INTERVAL_RANGE;
        if !(min_interval..=max_interval).contains(&self.memory_interval_secs) {
            return Err(format!(
                "memory_interval_secs must be in {min_interval}..={max_interval}, got {}",
                self.memory_interval_secs
            ));
        }
        self.quality.validate()?;
        self.visibility.validate()?;
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<AppConfig, String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;
    let config: AppConfig = serde_json::from_str(&raw)
        .map_err(|e| format!("Failed to parse config JSON {}: {e}", path.display()))?;
    config
        .validate()
        .map_err(|e| format!("Invalid config {}: {e}", path.display()))?;
    Ok(config)
}

/// Load `path`, or fall back to defaults when the file does not exist.
/// A file that exists but fails to parse or validate is still an error.
pub fn load_config_or_default(path: &Path) -> Result<AppConfig, String> {
    if !path.exists() {
        log::warn!("Config file {} not found, using defaults", path.display());
        return Ok(AppConfig::default());
    }
    load_config(path)
}
