//! Application configuration.
//!
//! Every numeric threshold of the fall-decision engine is configurable here;
//! the defaults are the tuned baseline. Kinematic thresholds are expressed in
//! frame-height fractions per frame so they do not depend on resolution.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{FallwatchError, FallwatchResult};

/// Environment variable overriding the Telegram bot token.
pub const ENV_TELEGRAM_TOKEN: &str = "FALLWATCH_TELEGRAM_TOKEN";

/// Environment variable overriding the Telegram chat id.
pub const ENV_TELEGRAM_CHAT_ID: &str = "FALLWATCH_TELEGRAM_CHAT_ID";

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Fall-decision thresholds.
    pub detection: DetectionConfig,

    /// Evidence capture settings.
    pub evidence: EvidenceConfig,

    /// Notification delivery settings.
    pub notify: NotifyConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Which scoring strategy feeds the hysteresis state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringStrategy {
    /// Height/width ratio of the body bounding box.
    #[default]
    Ratio,
    /// Tilt of the shoulder-to-hip axis away from vertical.
    TorsoAngle,
}

/// Thresholds for scoring and temporal debouncing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Bounding-box height/width ratio below which the body counts as horizontal.
    pub normal_posture_ratio: f64,

    /// Downward hip velocity (frame heights per frame) above which the
    /// subject counts as dropping.
    pub velocity_threshold: f64,

    /// Downward hip acceleration (frame heights per frame^2).
    pub acceleration_threshold: f64,

    /// Hip below `low_position_fraction * H` counts as low.
    pub low_position_fraction: f64,

    /// Criteria that must agree for a frame to count as a potential fall.
    pub min_votes: u8,

    /// Debounced positive frames needed to enter the fallen state.
    pub fall_frames_threshold: u32,

    /// Consecutive non-falling frames needed to re-arm the trigger.
    pub recovery_frames_threshold: u32,

    /// Torso tilt from vertical (degrees) for the torso-angle strategy.
    pub torso_angle_threshold_deg: f64,

    /// EMA strength applied to keypoint velocities, in `[0.0, 1.0)`.
    /// `0.0` keeps raw one-frame finite differences.
    pub velocity_smoothing: f64,

    /// Scoring strategy.
    pub strategy: ScoringStrategy,
}

/// Evidence strip settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceConfig {
    /// Raw frames retained for evidence.
    pub buffer_capacity: usize,

    /// Buffered frames placed before the current frame in the strip.
    pub strip_frames: usize,

    /// Tiles per row in the composite.
    pub grid_columns: usize,

    /// JPEG quality (1-100).
    pub jpeg_quality: u8,

    /// TrueType font used for tile labels. Without one, tiles are
    /// labelled with index pips instead of text.
    pub font_path: Option<PathBuf>,

    /// Directory where composed evidence is also written.
    pub save_dir: Option<PathBuf>,
}

/// Notification delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Telegram credentials. Without them alerts are only logged.
    pub telegram: Option<TelegramConfig>,

    /// Maximum alert deliveries in flight at once.
    pub max_in_flight: usize,

    /// Alerts queued for delivery before new ones are dropped.
    pub queue_capacity: usize,

    /// Per-request timeout.
    pub request_timeout_secs: u64,
}

/// Telegram bot credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "fallwatch=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            normal_posture_ratio: 0.4,
            velocity_threshold: 0.04,
            acceleration_threshold: 0.01,
            low_position_fraction: 0.6,
            min_votes: 3,
            fall_frames_threshold: 3,
            recovery_frames_threshold: 10,
            torso_angle_threshold_deg: 60.0,
            velocity_smoothing: 0.0,
            strategy: ScoringStrategy::Ratio,
        }
    }
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 15,
            strip_frames: 5,
            grid_columns: 3,
            jpeg_quality: 90,
            font_path: None,
            save_dir: None,
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            telegram: None,
            max_in_flight: 4,
            queue_capacity: 16,
            request_timeout_secs: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl DetectionConfig {
    /// Reject values the engine cannot operate with.
    pub fn validate(&self) -> FallwatchResult<()> {
        if !(1..=4).contains(&self.min_votes) {
            return Err(FallwatchError::config(format!(
                "min_votes must be within 1..=4, got {}",
                self.min_votes
            )));
        }
        if self.fall_frames_threshold == 0 {
            return Err(FallwatchError::config("fall_frames_threshold must be >= 1"));
        }
        if self.recovery_frames_threshold == 0 {
            return Err(FallwatchError::config(
                "recovery_frames_threshold must be >= 1",
            ));
        }
        if !(0.0..1.0).contains(&self.velocity_smoothing) {
            return Err(FallwatchError::config(format!(
                "velocity_smoothing must be within [0.0, 1.0), got {}",
                self.velocity_smoothing
            )));
        }
        if !(0.0..=1.0).contains(&self.low_position_fraction) {
            return Err(FallwatchError::config(format!(
                "low_position_fraction must be within [0.0, 1.0], got {}",
                self.low_position_fraction
            )));
        }
        Ok(())
    }
}

impl EvidenceConfig {
    pub fn validate(&self) -> FallwatchResult<()> {
        if self.buffer_capacity == 0 {
            return Err(FallwatchError::config("buffer_capacity must be >= 1"));
        }
        if self.grid_columns == 0 {
            return Err(FallwatchError::config("grid_columns must be >= 1"));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(FallwatchError::config(format!(
                "jpeg_quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit path. Unlike [`AppConfig::load`], errors
    /// are returned instead of falling back to defaults.
    pub fn load_from(path: &Path) -> FallwatchResult<Self> {
        if !path.exists() {
            return Err(FallwatchError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    /// Fill Telegram credentials from the environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var(ENV_TELEGRAM_TOKEN).ok(),
            std::env::var(ENV_TELEGRAM_CHAT_ID).ok(),
        );
    }

    fn apply_overrides(&mut self, token: Option<String>, chat_id: Option<String>) {
        if let Some(telegram) = self.notify.telegram.as_mut() {
            if let Some(token) = token {
                telegram.bot_token = token;
            }
            if let Some(chat_id) = chat_id {
                telegram.chat_id = chat_id;
            }
            return;
        }

        // A partial pair cannot address a chat, so it is ignored.
        if let (Some(bot_token), Some(chat_id)) = (token, chat_id) {
            self.notify.telegram = Some(TelegramConfig {
                bot_token,
                chat_id,
                api_base: default_telegram_api_base(),
            });
        }
    }

    /// Validate all sections.
    pub fn validate(&self) -> FallwatchResult<()> {
        self.detection.validate()?;
        self.evidence.validate()?;
        if self.notify.max_in_flight == 0 || self.notify.queue_capacity == 0 {
            return Err(FallwatchError::config(
                "notify.max_in_flight and notify.queue_capacity must be >= 1",
            ));
        }
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("fallwatch").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_defaults() {
        let config = DetectionConfig::default();
        assert_eq!(config.normal_posture_ratio, 0.4);
        assert_eq!(config.velocity_threshold, 0.04);
        assert_eq!(config.acceleration_threshold, 0.01);
        assert_eq!(config.low_position_fraction, 0.6);
        assert_eq!(config.min_votes, 3);
        assert_eq!(config.fall_frames_threshold, 3);
        assert_eq!(config.recovery_frames_threshold, 10);
        assert_eq!(EvidenceConfig::default().buffer_capacity, 15);
        assert_eq!(EvidenceConfig::default().strip_frames, 5);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "detection": { "fall_frames_threshold": 5, "strategy": "torso_angle" } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.detection.fall_frames_threshold, 5);
        assert_eq!(config.detection.strategy, ScoringStrategy::TorsoAngle);
        assert_eq!(config.detection.recovery_frames_threshold, 10);
        assert_eq!(config.evidence.buffer_capacity, 15);
        assert!(config.notify.telegram.is_none());
    }

    #[test]
    fn test_validate_rejects_bad_votes() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());

        config.detection.min_votes = 5;
        assert!(config.validate().is_err());

        config.detection.min_votes = 3;
        config.evidence.buffer_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides_create_telegram_section() {
        let mut config = AppConfig::default();
        config.apply_overrides(Some("token".to_string()), None);
        assert!(config.notify.telegram.is_none());

        config.apply_overrides(Some("token".to_string()), Some("42".to_string()));
        let telegram = config.notify.telegram.as_ref().unwrap();
        assert_eq!(telegram.bot_token, "token");
        assert_eq!(telegram.chat_id, "42");
        assert_eq!(telegram.api_base, "https://api.telegram.org");

        config.apply_overrides(Some("rotated".to_string()), None);
        assert_eq!(config.notify.telegram.unwrap().bot_token, "rotated");
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = AppConfig::load_from(Path::new("/nonexistent/fallwatch.json")).unwrap_err();
        assert!(matches!(err, FallwatchError::FileNotFound { .. }));
    }
}
