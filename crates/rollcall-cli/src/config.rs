use std::path::Path;
use std::str::FromStr;

use anyhow::{ensure, Context, Result};
use rollcall_core::{FaceRecognitionSettings, LivenessSettings};
use serde::Deserialize;

/// Slowest accepted capture cadence.
const MAX_FRAME_INTERVAL_MS: u64 = 60_000;

/// Host configuration: optional TOML file, then `ROLLCALL_*` environment overrides.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub liveness: LivenessSettings,
    pub recognition: FaceRecognitionSettings,
    /// Capture cadence used when replaying recorded frames.
    pub frame_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            liveness: LivenessSettings::default(),
            recognition: FaceRecognitionSettings::default(),
            frame_interval_ms: 300,
        }
    }
}

impl Config {
    /// Load `path` (if given), apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Override fields from `lookup` (normally the process environment).
    /// Unparseable values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let l = &mut self.liveness;
        l.ear_threshold = parse_or(&lookup, "ROLLCALL_EAR_THRESHOLD", l.ear_threshold);
        l.consecutive_frames =
            parse_or(&lookup, "ROLLCALL_CONSECUTIVE_FRAMES", l.consecutive_frames);
        l.challenge_timeout_secs = parse_or(
            &lookup,
            "ROLLCALL_CHALLENGE_TIMEOUT_SECS",
            l.challenge_timeout_secs,
        );
        l.max_failed_attempts =
            parse_or(&lookup, "ROLLCALL_MAX_FAILED_ATTEMPTS", l.max_failed_attempts);
        l.required_blinks = parse_or(&lookup, "ROLLCALL_REQUIRED_BLINKS", l.required_blinks);
        l.challenge_count = parse_or(&lookup, "ROLLCALL_CHALLENGE_COUNT", l.challenge_count);

        let r = &mut self.recognition;
        r.recognition_threshold = parse_or(
            &lookup,
            "ROLLCALL_RECOGNITION_THRESHOLD",
            r.recognition_threshold,
        );
        r.detection_threshold =
            parse_or(&lookup, "ROLLCALL_DETECTION_THRESHOLD", r.detection_threshold);

        self.frame_interval_ms =
            parse_or(&lookup, "ROLLCALL_FRAME_INTERVAL_MS", self.frame_interval_ms);
    }

    pub fn validate(&self) -> Result<()> {
        self.liveness.validate().context("invalid [liveness] settings")?;
        self.recognition
            .validate()
            .context("invalid [recognition] settings")?;
        ensure!(
            (1..=MAX_FRAME_INTERVAL_MS).contains(&self.frame_interval_ms),
            "frame_interval_ms must be in 1..={MAX_FRAME_INTERVAL_MS}, got {}",
            self.frame_interval_ms
        );
        Ok(())
    }

    /// Capture cadence, clamped to the validated range.
    pub fn frame_interval(&self) -> chrono::Duration {
        let ms = self.frame_interval_ms.clamp(1, MAX_FRAME_INTERVAL_MS);
        chrono::Duration::milliseconds(i64::try_from(ms).unwrap_or(1))
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
