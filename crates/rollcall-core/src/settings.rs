//! Liveness and recognition configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SettingsError {
    #[error("{field} must be a finite number in {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
    #[error("{field} must be at least 1")]
    Zero { field: &'static str },
}

/// Upper bound for `challenge_timeout_secs` (one day).
pub const MAX_CHALLENGE_TIMEOUT_SECS: f32 = 86_400.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessSettings {
    /// Average EAR below this reads as a closed eye.
    pub ear_threshold: f32,
    /// Closed frames required before a reopening counts as a blink.
    pub consecutive_frames: u32,
    /// Seconds allowed for the whole challenge batch of one attempt.
    pub challenge_timeout_secs: f32,
    /// Timed-out attempts before the session fails for good.
    pub max_failed_attempts: u32,
    /// Blinks (cumulative over the attempt) that satisfy a blink challenge.
    pub required_blinks: u32,
    /// Challenges generated per attempt.
    pub challenge_count: usize,
}

impl Default for LivenessSettings {
    fn default() -> Self {
        Self {
            ear_threshold: 0.25,
            consecutive_frames: 1,
            challenge_timeout_secs: 10.0,
            max_failed_attempts: 3,
            required_blinks: 2,
            challenge_count: 3,
        }
    }
}

/// Partial update for [`LivenessSettings`]. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessSettingsPatch {
    pub ear_threshold: Option<f32>,
    pub consecutive_frames: Option<u32>,
    pub challenge_timeout_secs: Option<f32>,
    pub max_failed_attempts: Option<u32>,
    pub required_blinks: Option<u32>,
    pub challenge_count: Option<usize>,
}

impl LivenessSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        in_range("ear_threshold", self.ear_threshold, 0.0, 1.0)?;
        in_range(
            "challenge_timeout_secs",
            self.challenge_timeout_secs,
            f32::MIN_POSITIVE,
            MAX_CHALLENGE_TIMEOUT_SECS,
        )?;
        non_zero("consecutive_frames", self.consecutive_frames)?;
        non_zero("max_failed_attempts", self.max_failed_attempts)?;
        if self.challenge_count == 0 {
            return Err(SettingsError::Zero {
                field: "challenge_count",
            });
        }
        Ok(())
    }

    /// Return a copy with `patch` applied.
    pub fn merged(&self, patch: &LivenessSettingsPatch) -> Self {
        Self {
            ear_threshold: patch.ear_threshold.unwrap_or(self.ear_threshold),
            consecutive_frames: patch.consecutive_frames.unwrap_or(self.consecutive_frames),
            challenge_timeout_secs: patch
                .challenge_timeout_secs
                .unwrap_or(self.challenge_timeout_secs),
            max_failed_attempts: patch.max_failed_attempts.unwrap_or(self.max_failed_attempts),
            required_blinks: patch.required_blinks.unwrap_or(self.required_blinks),
            challenge_count: patch.challenge_count.unwrap_or(self.challenge_count),
        }
    }

    /// Attempt timeout. Only meaningful for validated settings.
    pub fn challenge_timeout(&self) -> chrono::Duration {
        chrono::Duration::microseconds((f64::from(self.challenge_timeout_secs) * 1e6).round() as i64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceRecognitionSettings {
    /// Maximum descriptor distance accepted as a match.
    pub recognition_threshold: f32,
    /// Minimum detector score for a face to be used at all.
    pub detection_threshold: f32,
}

impl Default for FaceRecognitionSettings {
    fn default() -> Self {
        Self {
            recognition_threshold: 0.6,
            detection_threshold: 0.5,
        }
    }
}

impl FaceRecognitionSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        in_range("recognition_threshold", self.recognition_threshold, 0.0, f32::MAX)?;
        in_range("detection_threshold", self.detection_threshold, 0.0, 1.0)?;
        Ok(())
    }

    pub fn accepts_detection(&self, score: f32) -> bool {
        score >= self.detection_threshold
    }
}

fn in_range(field: &'static str, value: f32, min: f32, max: f32) -> Result<(), SettingsError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(SettingsError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

fn non_zero(field: &'static str, value: u32) -> Result<(), SettingsError> {
    if value == 0 {
        Err(SettingsError::Zero { field })
    } else {
        Ok(())
    }
}
