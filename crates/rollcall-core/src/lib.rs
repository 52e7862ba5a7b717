//! rollcall-core: liveness verification and face matching for attendance check-in.
//!
//! Consumes 68-point facial landmarks and 128-dimension face descriptors
//! produced by an external model. Decides whether a live person is in front
//! of the camera (blink and head-turn challenges) and which enrolled person
//! they are. No I/O and no global state.

pub mod blink;
pub mod challenge;
pub mod clock;
pub mod ear;
pub mod geometry;
pub mod head_pose;
pub mod liveness;
pub mod matcher;
pub mod settings;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use blink::{BlinkDetector, BlinkReading};
pub use challenge::{
    random_challenges, ChallengeAction, ChallengeSource, FixedChallenges, LivenessChallenge,
    RandomChallenges,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use ear::{average_ear, calculate_ear, EAR_FALLBACK};
pub use geometry::{distance, Point};
pub use head_pose::{HeadPose, HeadPoseEstimator};
pub use liveness::{LivenessPhase, LivenessSession, LivenessState};
pub use matcher::{recognize_face, EuclideanMatcher, FaceMatch, KnownPerson, Matcher};
pub use settings::{
    FaceRecognitionSettings, LivenessSettings, LivenessSettingsPatch, SettingsError,
    MAX_CHALLENGE_TIMEOUT_SECS,
};
