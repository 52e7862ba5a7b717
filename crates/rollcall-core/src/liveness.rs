//! Active liveness verification via challenge-response.
//!
//! A session issues a short randomized batch of challenges (blink, turn left,
//! turn right) and checks each incoming landmark frame against the current
//! one. All challenges must be satisfied before a single overall deadline
//! expires; every expired deadline counts as a failed attempt.
//!
//! The session is frame-driven and single-owner. It never spawns work: the
//! deadline is checked by [`LivenessSession::poll_timeout`], which the capture
//! loop calls each tick and which [`LivenessSession::process_frame`] calls
//! before looking at a frame. At most one deadline exists per session, and it
//! is cleared on stop, reset and successful verification, so a stale attempt
//! can never fail a newer one.
//!
//! # Threat Coverage
//!
//! - **Blocks:** Printed photographs and static images (no blinks, no pose change
//!   on demand), pose-only photo sets (every batch contains a blink challenge).
//! - **Does not block:** Interactive video puppeting or a live accomplice.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::blink::BlinkDetector;
use crate::challenge::{ChallengeAction, ChallengeSource, LivenessChallenge, RandomChallenges};
use crate::clock::{Clock, SystemClock};
use crate::geometry::Point;
use crate::head_pose::HeadPoseEstimator;
use crate::settings::{LivenessSettings, LivenessSettingsPatch, SettingsError};

/// Coarse lifecycle position of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LivenessPhase {
    /// Not started, stopped, or timed out with attempts remaining.
    Idle,
    Active,
    /// Terminal success.
    Verified,
    /// Terminal failure; only a reset leaves this phase.
    Failed,
}

/// Snapshot of a verification attempt, suitable for rendering progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LivenessState {
    pub is_active: bool,
    pub challenges: Vec<LivenessChallenge>,
    pub current_challenge_index: usize,
    pub is_verified: bool,
    pub failed_attempts: u32,
    pub blink_count: u32,
    pub last_ear: f32,
    pub is_blinking: bool,
}

impl Default for LivenessState {
    fn default() -> Self {
        Self {
            is_active: false,
            challenges: Vec::new(),
            current_challenge_index: 0,
            is_verified: false,
            failed_attempts: 0,
            blink_count: 0,
            last_ear: 0.0,
            is_blinking: false,
        }
    }
}

impl LivenessState {
    /// The challenge awaiting completion, if an attempt is running.
    pub fn current_challenge(&self) -> Option<&LivenessChallenge> {
        if !self.is_active {
            return None;
        }
        self.challenges.get(self.current_challenge_index)
    }
}

pub struct LivenessSession {
    /// Settings applied at the next `start_verification`.
    settings: LivenessSettings,
    /// Settings frozen for the running attempt.
    attempt: LivenessSettings,
    state: LivenessState,
    blink: BlinkDetector,
    head_pose: HeadPoseEstimator,
    source: Box<dyn ChallengeSource>,
    clock: Arc<dyn Clock>,
    deadline: Option<DateTime<Utc>>,
}

impl LivenessSession {
    /// Session using OS-seeded random challenges and the wall clock.
    pub fn new(settings: LivenessSettings) -> Result<Self, SettingsError> {
        Self::with_sources(
            settings,
            Box::new(RandomChallenges::from_entropy()),
            Arc::new(SystemClock),
        )
    }

    /// Session with injected challenge generation and time.
    ///
    /// Fails if `settings` does not validate.
    pub fn with_sources(
        settings: LivenessSettings,
        source: Box<dyn ChallengeSource>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SettingsError> {
        settings.validate()?;
        let blink = BlinkDetector::new(settings.ear_threshold, settings.consecutive_frames);
        Ok(Self {
            attempt: settings.clone(),
            settings,
            state: LivenessState::default(),
            blink,
            head_pose: HeadPoseEstimator::default(),
            source,
            clock,
            deadline: None,
        })
    }

    pub fn state(&self) -> &LivenessState {
        &self.state
    }

    pub fn settings(&self) -> &LivenessSettings {
        &self.settings
    }

    pub fn current_challenge(&self) -> Option<&LivenessChallenge> {
        self.state.current_challenge()
    }

    pub fn phase(&self) -> LivenessPhase {
        if self.state.is_verified {
            LivenessPhase::Verified
        } else if self.state.failed_attempts >= self.attempt.max_failed_attempts {
            LivenessPhase::Failed
        } else if self.state.is_active {
            LivenessPhase::Active
        } else {
            LivenessPhase::Idle
        }
    }

    /// Begin a new attempt with a fresh challenge batch and blink counter.
    ///
    /// Failed attempts carry over. Does nothing once the session is verified
    /// or has exhausted its attempts; call [`reset_verification`] first.
    ///
    /// [`reset_verification`]: LivenessSession::reset_verification
    pub fn start_verification(&mut self) {
        match self.phase() {
            LivenessPhase::Verified | LivenessPhase::Failed => {
                tracing::warn!(phase = ?self.phase(), "start ignored: session is terminal");
                return;
            }
            LivenessPhase::Idle | LivenessPhase::Active => {}
        }

        let now = self.clock.now();
        self.attempt = self.settings.clone();
        let challenges = self.source.challenges(self.attempt.challenge_count, now);
        if challenges.is_empty() {
            tracing::warn!("start ignored: challenge source produced no challenges");
            return;
        }

        let Some(deadline) = now.checked_add_signed(self.attempt.challenge_timeout()) else {
            tracing::warn!(%now, "start ignored: deadline out of range");
            return;
        };

        self.blink = BlinkDetector::new(self.attempt.ear_threshold, self.attempt.consecutive_frames);
        self.deadline = Some(deadline);

        tracing::info!(
            challenges = ?challenges.iter().map(|c| c.action).collect::<Vec<_>>(),
            timeout_secs = self.attempt.challenge_timeout_secs,
            failed_attempts = self.state.failed_attempts,
            "liveness verification started"
        );

        self.state = LivenessState {
            is_active: true,
            challenges,
            current_challenge_index: 0,
            is_verified: false,
            failed_attempts: self.state.failed_attempts,
            blink_count: 0,
            last_ear: 0.0,
            is_blinking: false,
        };
    }

    /// Feed one landmark frame.
    ///
    /// Blink statistics are updated on every frame; only the current challenge
    /// is evaluated. Malformed landmarks simply fail to satisfy it.
    pub fn process_frame(&mut self, landmarks: &[Point]) -> &LivenessState {
        self.poll_timeout();

        let idx = self.state.current_challenge_index;
        let Some(action) = self.state.current_challenge().map(|c| c.action) else {
            return &self.state;
        };

        let reading = self.blink.detect(landmarks);
        self.state.blink_count = reading.total_blinks;
        self.state.last_ear = reading.ear;
        self.state.is_blinking = reading.is_blinking;

        let completed = match action {
            ChallengeAction::Blink => reading.total_blinks >= self.attempt.required_blinks,
            ChallengeAction::TurnLeft | ChallengeAction::TurnRight => {
                self.head_pose.detect(landmarks).action == Some(action)
            }
            ChallengeAction::Smile | ChallengeAction::Nod => false,
        };

        if completed {
            self.complete_current(idx);
        }

        &self.state
    }

    fn complete_current(&mut self, idx: usize) {
        let now = self.clock.now();
        let total = self.state.challenges.len();
        if let Some(challenge) = self.state.challenges.get_mut(idx) {
            challenge.complete(now);
            tracing::info!(
                action = ?challenge.action,
                index = idx,
                total,
                "liveness challenge completed"
            );
        }

        self.state.current_challenge_index = idx + 1;
        if self.state.current_challenge_index >= total {
            self.deadline = None;
            self.state.is_verified = true;
            self.state.is_active = false;
            tracing::info!(blinks = self.state.blink_count, "liveness verified");
        }
    }

    /// Fire the attempt deadline if it has passed. Returns `true` if it fired.
    ///
    /// A fired deadline counts one failed attempt and leaves the session
    /// inactive; restarting is up to the caller.
    pub fn poll_timeout(&mut self) -> bool {
        let Some(deadline) = self.deadline else {
            return false;
        };
        if !self.state.is_active || self.clock.now() < deadline {
            return false;
        }

        self.deadline = None;
        self.state.failed_attempts += 1;
        self.state.is_active = false;

        if self.state.failed_attempts >= self.attempt.max_failed_attempts {
            tracing::warn!(
                failed_attempts = self.state.failed_attempts,
                "liveness failed: attempts exhausted"
            );
        } else {
            tracing::warn!(
                failed_attempts = self.state.failed_attempts,
                max = self.attempt.max_failed_attempts,
                completed = self.state.current_challenge_index,
                "liveness attempt timed out"
            );
        }
        true
    }

    /// Pause the attempt. Counters in the snapshot are kept.
    pub fn stop_verification(&mut self) {
        self.deadline = None;
        self.blink.reset();
        self.state.is_active = false;
        tracing::debug!("liveness verification stopped");
    }

    /// Return to the initial idle state, clearing failed attempts.
    pub fn reset_verification(&mut self) {
        self.deadline = None;
        self.blink.reset();
        self.state = LivenessState::default();
        tracing::debug!("liveness verification reset");
    }

    /// Merge `patch` into the settings used by the next attempt.
    ///
    /// The running attempt is unaffected. Invalid results are rejected and
    /// leave the settings unchanged.
    pub fn update_settings(&mut self, patch: &LivenessSettingsPatch) -> Result<(), SettingsError> {
        let merged = self.settings.merged(patch);
        merged.validate()?;
        tracing::debug!(?patch, "liveness settings updated");
        self.settings = merged;
        Ok(())
    }
}
