use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;

use crate::overlay::{PillSize, ScreenSize, DEFAULT_VERTICAL_RATIO};
use crate::tracking::DWELL_THRESHOLD_MS;

/// Overrides the platform data directory.
pub const DATA_DIR_ENV: &str = "BEAWARE_DATA_DIR";
/// `1`/`true` lowers the default log filter to debug.
pub const DEBUG_ENV: &str = "BEAWARE_DEBUG";

const DB_FILE: &str = "beaware.sqlite3";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingConfig {
    pub poll_interval: Duration,
    pub tick_interval: Duration,
    /// How far back the sampler may look for the last foreground app.
    pub lookback: Duration,
    pub min_session_ms: u64,
    /// How often the settings file is re-read for edits made by other
    /// `beaware` invocations.
    pub settings_refresh: Duration,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            tick_interval: Duration::from_secs(1),
            lookback: Duration::from_secs(10 * 60),
            min_session_ms: DWELL_THRESHOLD_MS,
            settings_refresh: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayConfig {
    pub snap_duration: Duration,
    pub frame_interval: Duration,
    pub default_vertical_ratio: f32,
    /// Surface reported by the headless log display.
    pub screen: ScreenSize,
    pub pill: PillSize,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            snap_duration: Duration::from_millis(250),
            frame_interval: Duration::from_millis(16),
            default_vertical_ratio: DEFAULT_VERTICAL_RATIO,
            screen: ScreenSize {
                width: 1920,
                height: 1080,
            },
            pill: PillSize {
                width: 180,
                height: 48,
            },
        }
    }
}

/// Where the session database and the settings file live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub data_dir: PathBuf,
}

impl AppPaths {
    pub fn resolve() -> Result<Self> {
        let data_dir = match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => ProjectDirs::from("com", "beaware", "BeAware")
                .ok_or_else(|| anyhow!("could not determine a data directory"))?
                .data_dir()
                .to_path_buf(),
        };
        Self::at(data_dir)
    }

    pub fn at(data_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;
        Ok(Self { data_dir })
    }

    pub fn database(&self) -> PathBuf {
        self.data_dir.join(DB_FILE)
    }

    pub fn settings(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE)
    }
}

pub fn debug_enabled() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
