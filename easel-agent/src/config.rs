//! Configuration for the painting agent.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use easel_core::{AgentOptions, Tunables};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Canvas endpoints.
    pub server: ServerConfig,
    /// Files the agent reads and writes.
    pub storage: StorageConfig,
    /// Starting values of the live-tunable knobs.
    pub tuning: TuningConfig,
    /// Engine timing.
    pub engine: EngineConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Canvas endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// WebSocket endpoint of the canvas.
    pub ws_url: String,
    /// HTTP API base; the board and token endpoints hang off it.
    pub api_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Newline-delimited `["<token>", uid]` records.
    pub tokens_file: PathBuf,
    /// Directory of target images.
    pub images_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    /// Credentials in rotation. 0 = whole pool.
    pub active_count: usize,
    /// Euclidean RGB distance still counted as correct.
    pub threshold: f64,
    /// Paints between pacing pauses.
    pub pacing_divisor: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Send pump flushes per second.
    pub flush_hz: u32,
    /// Seconds per rate report.
    pub report_interval_secs: u64,
    /// Correction rounds per logged cycle.
    pub correction_rounds: u32,
    /// Buffered bytes above which a warning is logged.
    pub buffer_high_water: usize,
    /// Pause taken at each pacing point, in milliseconds.
    pub pacing_pause_ms: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://api.paintboard.ayakacraft.com:32767/api/paintboard/ws".into(),
            api_base: "https://api.paintboard.ayakacraft.com:32767/api".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            tokens_file: PathBuf::from("./tokens.txt"),
            images_dir: PathBuf::from("./uploads/"),
        }
    }
}

impl Default for TuningConfig {
    fn default() -> Self {
        let tunables = Tunables::default();
        Self {
            active_count: tunables.active_count,
            threshold: tunables.threshold,
            pacing_divisor: tunables.pacing_divisor,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            flush_hz: easel_core::pump::DEFAULT_FLUSH_HZ,
            report_interval_secs: easel_core::governor::DEFAULT_REPORT_INTERVAL.as_secs(),
            correction_rounds: easel_core::repair::DEFAULT_CORRECTION_ROUNDS,
            buffer_high_water: easel_core::agent::DEFAULT_BUFFER_HIGH_WATER,
            pacing_pause_ms: easel_core::pacer::DEFAULT_PACING_PAUSE.as_millis() as u64,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl AgentConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Token issuance endpoint.
    pub fn token_url(&self) -> String {
        format!("{}/auth/gettoken", self.server.api_base.trim_end_matches('/'))
    }

    /// Convert into the core's options, clamping out-of-range values.
    pub fn to_options(&self) -> AgentOptions {
        let flush_hz = self.engine.flush_hz.clamp(1, 1000);
        AgentOptions {
            tokens_file: self.storage.tokens_file.clone(),
            images_dir: self.storage.images_dir.clone(),
            tunables: Tunables {
                active_count: self.tuning.active_count,
                threshold: if self.tuning.threshold.is_finite() {
                    self.tuning.threshold.max(0.0)
                } else {
                    Tunables::default().threshold
                },
                pacing_divisor: self.tuning.pacing_divisor.max(1),
            },
            flush_interval: Duration::from_secs(1) / flush_hz,
            report_interval: Duration::from_secs(self.engine.report_interval_secs.max(1)),
            correction_rounds: self.engine.correction_rounds.max(1),
            buffer_high_water: self.engine.buffer_high_water,
            pacing_pause: Duration::from_millis(self.engine.pacing_pause_ms),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let cfg = AgentConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("ws_url"));
        assert!(text.contains("pacing_divisor"));
        assert!(text.contains("[engine]"));
    }

    #[test]
    fn roundtrip_config() {
        let cfg = AgentConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: AgentConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.engine.flush_hz, 50);
        assert_eq!(parsed.tuning.threshold, 5.0);
        assert_eq!(parsed.storage.tokens_file, PathBuf::from("./tokens.txt"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let parsed: AgentConfig = toml::from_str("[tuning]\nactive_count = 8\n").unwrap();
        assert_eq!(parsed.tuning.active_count, 8);
        assert_eq!(parsed.tuning.pacing_divisor, 100);
        assert_eq!(parsed.engine.correction_rounds, 20);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AgentConfig::load(&dir.path().join("absent.toml"));
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn token_endpoint_hangs_off_api_base() {
        let mut cfg = AgentConfig::default();
        cfg.server.api_base = "http://localhost:8080/api/".into();
        assert_eq!(cfg.token_url(), "http://localhost:8080/api/auth/gettoken");
    }

    #[test]
    fn to_options_clamps() {
        let mut cfg = AgentConfig::default();
        cfg.engine.flush_hz = 0;
        cfg.tuning.pacing_divisor = 0;
        cfg.tuning.threshold = -3.0;
        let opts = cfg.to_options();
        assert_eq!(opts.flush_interval, Duration::from_secs(1));
        assert_eq!(opts.tunables.pacing_divisor, 1);
        assert_eq!(opts.tunables.threshold, 0.0);

        cfg.engine.flush_hz = 5000;
        assert_eq!(cfg.to_options().flush_interval, Duration::from_millis(1));
    }
}
