//! Blink detection by temporal debouncing of the EAR signal.
//!
//! A blink is counted when the eye reopens after staying below the EAR
//! threshold for at least `consecutive_frames` frames. Counting on reopen
//! means a long closure registers once, and a single noisy low frame never
//! registers at all (when `consecutive_frames > 1`).

use serde::Serialize;

use crate::ear::average_ear;
use crate::geometry::Point;

/// Result of feeding one frame to the [`BlinkDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BlinkReading {
    /// EAR is below the threshold on this frame.
    pub is_blinking: bool,
    /// A blink was completed on this frame.
    pub blink_detected: bool,
    pub ear: f32,
    pub total_blinks: u32,
}

/// Per-session blink counter.
#[derive(Debug, Clone)]
pub struct BlinkDetector {
    ear_threshold: f32,
    consecutive_frames: u32,
    frame_counter: u32,
    blink_counter: u32,
    was_blinking: bool,
}

impl BlinkDetector {
    /// A blink is counted when the EAR rises back to `ear_threshold` or above
    /// after at least `consecutive_frames` frames strictly below it.
    pub fn new(ear_threshold: f32, consecutive_frames: u32) -> Self {
        Self {
            ear_threshold,
            consecutive_frames,
            frame_counter: 0,
            blink_counter: 0,
            was_blinking: false,
        }
    }

    /// Feed one landmark set.
    pub fn detect(&mut self, landmarks: &[Point]) -> BlinkReading {
        self.detect_ear(average_ear(landmarks))
    }

    /// Feed a precomputed average EAR value.
    pub fn detect_ear(&mut self, ear: f32) -> BlinkReading {
        let currently_blinking = ear < self.ear_threshold;
        let mut blink_detected = false;

        if currently_blinking {
            self.frame_counter = self.frame_counter.saturating_add(1);
        } else {
            if self.was_blinking && self.frame_counter >= self.consecutive_frames {
                self.blink_counter += 1;
                blink_detected = true;
                tracing::debug!(
                    closed_frames = self.frame_counter,
                    total = self.blink_counter,
                    "blink registered"
                );
            }
            self.frame_counter = 0;
        }

        self.was_blinking = currently_blinking;

        BlinkReading {
            is_blinking: currently_blinking,
            blink_detected,
            ear,
            total_blinks: self.blink_counter,
        }
    }

    /// Clear the counter and any partially closed eye.
    pub fn reset(&mut self) {
        self.frame_counter = 0;
        self.blink_counter = 0;
        self.was_blinking = false;
    }

    /// Blinks counted since construction or the last reset.
    pub fn blink_count(&self) -> u32 {
        self.blink_counter
    }
}
