use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub recorder: RecorderConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

/// Timing policy for the session controller and recovery loop.
///
/// All thresholds are tunable policy rather than load-bearing constants.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Recovery poll interval while the app is in the foreground (ms).
    pub poll_interval_foreground_ms: u64,

    /// Recovery poll interval while backgrounded (ms). Tighter, because the
    /// risk of silent termination is highest there.
    pub poll_interval_background_ms: u64,

    /// Wall-clock vs engine divergence below which the engine's report is
    /// taken as authoritative (ms).
    pub divergence_tolerance_ms: u64,

    /// Divergence beyond which a failed restart escalates to a forced
    /// partial save (ms).
    pub escalation_threshold_ms: u64,

    /// How many times to attempt engine creation before giving up.
    pub engine_create_attempts: u32,

    /// Fixed backoff between engine creation attempts (ms). A capture device
    /// may be transiently held by another process.
    pub engine_create_backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory recordings are relocated into after a session ends.
    pub recordings_path: String,

    /// JSON file backing the meeting store.
    pub meetings_path: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "botmr-recorder".to_string(),
            http: HttpConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 7355,
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            poll_interval_foreground_ms: 2000,
            poll_interval_background_ms: 1000,
            divergence_tolerance_ms: 3000,
            escalation_threshold_ms: 5000,
            engine_create_attempts: 3,
            engine_create_backoff_ms: 500,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            recordings_path: "recordings".to_string(),
            meetings_path: "meetings.json".to_string(),
        }
    }
}

impl RecorderConfig {
    pub fn poll_interval(&self, backgrounded: bool) -> Duration {
        if backgrounded {
            Duration::from_millis(self.poll_interval_background_ms)
        } else {
            Duration::from_millis(self.poll_interval_foreground_ms)
        }
    }

    pub fn engine_create_backoff(&self) -> Duration {
        Duration::from_millis(self.engine_create_backoff_ms)
    }
}

impl Config {
    /// Load configuration from a file, falling back to defaults for any
    /// missing section. The file itself is optional.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
