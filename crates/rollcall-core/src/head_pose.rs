//! Left/right head-turn classification from nose and eye-corner landmarks.
//!
//! The ratio `d(left outer eye, nose) / (d(left outer eye, nose) + d(right outer eye, nose))`
//! is 0.5 for a frontal face and moves towards 0 or 1 as the head turns.
//! Each frame is classified on its own; there is no smoothing.

use serde::Serialize;

use crate::challenge::ChallengeAction;
use crate::geometry::{pick, Point, LEFT_EYE_OUTER, NOSE_TIP, RIGHT_EYE_OUTER};

pub const DEFAULT_LEFT_THRESHOLD: f32 = 0.35;
pub const DEFAULT_RIGHT_THRESHOLD: f32 = 0.65;

/// Head pose of a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeadPose {
    /// `TurnLeft`, `TurnRight`, or `None` for a centred or ambiguous pose.
    pub action: Option<ChallengeAction>,
    /// Nose position ratio in `[0, 1]`.
    pub rating: f32,
}

impl HeadPose {
    const NEUTRAL: HeadPose = HeadPose {
        action: None,
        rating: 0.5,
    };
}

/// Classifies left/right head turns from the nose position between the
/// outer eye corners.
#[derive(Debug, Clone, Copy)]
pub struct HeadPoseEstimator {
    left_threshold: f32,
    right_threshold: f32,
}

impl Default for HeadPoseEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_LEFT_THRESHOLD, DEFAULT_RIGHT_THRESHOLD)
    }
}

impl HeadPoseEstimator {
    /// Ratios below `left_threshold` read as a left turn, above
    /// `right_threshold` as a right turn.
    pub fn new(left_threshold: f32, right_threshold: f32) -> Self {
        Self {
            left_threshold,
            right_threshold,
        }
    }

    /// Pose of one 68-point frame. Missing or coincident landmarks give a
    /// neutral pose.
    pub fn detect(&self, landmarks: &[Point]) -> HeadPose {
        let Some([nose, left_eye, right_eye]) =
            pick(landmarks, [NOSE_TIP, LEFT_EYE_OUTER, RIGHT_EYE_OUTER])
        else {
            return HeadPose::NEUTRAL;
        };

        let left = left_eye.distance(&nose);
        let right = right_eye.distance(&nose);
        let total = left + right;
        if total.is_nan() || total <= 0.0 {
            return HeadPose::NEUTRAL;
        }

        let ratio = (left / total).clamp(0.0, 1.0);
        let action = if ratio < self.left_threshold {
            Some(ChallengeAction::TurnLeft)
        } else if ratio > self.right_threshold {
            Some(ChallengeAction::TurnRight)
        } else {
            None
        };

        tracing::trace!(ratio, ?action, "head pose");

        HeadPose {
            action,
            rating: ratio,
        }
    }
}
