//! Capture loop driven by recorded landmark frames.
//!
//! The face model is never called from here: a [`FrameSource`] hands over
//! whatever it extracted per frame. Recorded JSONL streams stand in for a
//! live camera, and a [`ManualClock`] advances by the capture cadence per
//! frame so timeouts replay deterministically.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use rollcall_core::{
    recognize_face, FaceMatch, FaceRecognitionSettings, KnownPerson, LivenessPhase,
    LivenessSession, LivenessState, ManualClock, Point,
};
use serde::{Deserialize, Serialize};

/// What the face model extracted from one video frame.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FrameObservation {
    /// 68 landmark points, absent when no face was found.
    pub landmarks: Option<Vec<Point>>,
    pub descriptor: Option<Vec<f32>>,
    pub detection_score: Option<f32>,
}

pub trait FrameSource {
    /// Next frame, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<FrameObservation>>;
}

/// One JSON [`FrameObservation`] per line; blank lines are skipped.
pub struct JsonlReplay<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
}

impl JsonlReplay<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open frame stream {}", path.display()))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> JsonlReplay<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl<R: BufRead> FrameSource for JsonlReplay<R> {
    fn next_frame(&mut self) -> Result<Option<FrameObservation>> {
        for line in self.lines.by_ref() {
            self.line_no += 1;
            let line = line.with_context(|| format!("read error at line {}", self.line_no))?;
            if line.trim().is_empty() {
                continue;
            }
            let frame = serde_json::from_str(&line)
                .with_context(|| format!("invalid frame at line {}", self.line_no))?;
            return Ok(Some(frame));
        }
        Ok(None)
    }
}

#[derive(Debug, Clone)]
pub struct ReplayOptions {
    pub interval: chrono::Duration,
    /// Restart timed-out attempts until the session verifies or fails for good.
    pub retry: bool,
}

#[derive(Debug, Serialize)]
pub struct ReplayReport {
    pub frames: usize,
    /// Frames without a usable face.
    pub skipped_frames: usize,
    pub attempts: u32,
    pub phase: LivenessPhase,
    pub state: LivenessState,
    /// Gallery match for the last descriptor seen, once liveness is verified.
    pub recognized: Option<FaceMatch>,
}

/// Drive `session` with frames from `source` until it verifies, fails, or
/// the stream ends.
pub fn run_capture_loop(
    source: &mut dyn FrameSource,
    session: &mut LivenessSession,
    clock: &ManualClock,
    recognition: &FaceRecognitionSettings,
    gallery: &[KnownPerson],
    opts: &ReplayOptions,
) -> Result<ReplayReport> {
    let mut frames = 0;
    let mut skipped_frames = 0;
    let mut attempts = 1;
    let mut last_descriptor: Option<Vec<f32>> = None;

    session.start_verification();

    while let Some(frame) = source.next_frame()? {
        frames += 1;
        clock.advance(opts.interval);

        let usable = frame
            .detection_score
            .map_or(true, |score| recognition.accepts_detection(score));

        match (usable, frame.landmarks.as_deref()) {
            (true, Some(landmarks)) => {
                session.process_frame(landmarks);
            }
            _ => {
                skipped_frames += 1;
                session.poll_timeout();
            }
        }
        if usable {
            if let Some(descriptor) = frame.descriptor {
                last_descriptor = Some(descriptor);
            }
        }

        match session.phase() {
            LivenessPhase::Active => {}
            LivenessPhase::Verified | LivenessPhase::Failed => break,
            LivenessPhase::Idle if opts.retry => {
                attempts += 1;
                tracing::info!(attempt = attempts, "retrying liveness verification");
                session.start_verification();
            }
            LivenessPhase::Idle => break,
        }
    }

    let phase = session.phase();
    let recognized = match (phase, last_descriptor) {
        (LivenessPhase::Verified, Some(descriptor)) => {
            recognize_face(&descriptor, gallery, recognition)
        }
        _ => None,
    };

    tracing::info!(frames, skipped_frames, attempts, ?phase, "replay finished");

    Ok(ReplayReport {
        frames,
        skipped_frames,
        attempts,
        phase,
        state: session.state().clone(),
        recognized,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::testing::face;
    use rollcall_core::{ChallengeAction, FixedChallenges, LivenessSettings};
    use std::io::Cursor;
    use std::sync::Arc;

    fn line(ear: f32, ratio: f32, descriptor: Option<Vec<f32>>) -> String {
        serde_json::json!({
            "landmarks": face(ear, ratio),
            "descriptor": descriptor,
            "detection_score": 0.9,
        })
        .to_string()
    }

    fn session(
        actions: Vec<ChallengeAction>,
        settings: LivenessSettings,
    ) -> (LivenessSession, ManualClock) {
        let clock = ManualClock::default();
        let session = LivenessSession::with_sources(
            settings,
            Box::new(FixedChallenges::new(actions)),
            Arc::new(clock.clone()),
        )
        .unwrap();
        (session, clock)
    }

    fn opts(retry: bool) -> ReplayOptions {
        ReplayOptions {
            interval: chrono::Duration::milliseconds(300),
            retry,
        }
    }

    #[test]
    fn test_jsonl_skips_blank_lines() {
        let input = format!("{}\n\n{{}}\n", line(0.3, 0.5, None));
        let mut src = JsonlReplay::new(Cursor::new(input));
        assert!(src.next_frame().unwrap().unwrap().landmarks.is_some());
        let empty = src.next_frame().unwrap().unwrap();
        assert_eq!(empty, FrameObservation::default());
        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_jsonl_reports_bad_line() {
        let mut src = JsonlReplay::new(Cursor::new("{}\nnot json\n"));
        src.next_frame().unwrap();
        let err = src.next_frame().unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_replay_verifies_and_recognizes() {
        let probe = vec![0.2_f32; 128];
        let input = [
            line(0.3, 0.5, None),
            line(0.1, 0.5, None),
            line(0.3, 0.5, None),
            line(0.1, 0.5, None),
            line(0.3, 0.5, None),
            line(0.3, 0.2, Some(probe.clone())),
            line(0.3, 0.5, None),
        ]
        .join("\n");
        let gallery = vec![KnownPerson {
            id: "s-1".into(),
            name: "Ada".into(),
            descriptor: probe,
        }];

        let (mut s, clock) = session(
            vec![ChallengeAction::Blink, ChallengeAction::TurnLeft],
            LivenessSettings::default(),
        );
        let report = run_capture_loop(
            &mut JsonlReplay::new(Cursor::new(input)),
            &mut s,
            &clock,
            &FaceRecognitionSettings::default(),
            &gallery,
            &opts(false),
        )
        .unwrap();

        assert_eq!(report.phase, LivenessPhase::Verified);
        assert_eq!(report.frames, 6);
        assert_eq!(report.attempts, 1);
        let m = report.recognized.unwrap();
        assert_eq!(m.person_id, "s-1");
        assert_eq!(m.confidence, 1.0);
    }

    #[test]
    fn test_weak_detections_skipped() {
        let weak = serde_json::json!({
            "landmarks": face(0.3, 0.2),
            "detection_score": 0.1,
        })
        .to_string();
        let (mut s, clock) = session(vec![ChallengeAction::TurnLeft], LivenessSettings::default());
        let report = run_capture_loop(
            &mut JsonlReplay::new(Cursor::new(weak)),
            &mut s,
            &clock,
            &FaceRecognitionSettings::default(),
            &[],
            &opts(false),
        )
        .unwrap();
        assert_eq!(report.skipped_frames, 1);
        assert_eq!(report.phase, LivenessPhase::Active);
    }

    #[test]
    fn test_retry_until_attempts_exhausted() {
        let settings = LivenessSettings {
            challenge_timeout_secs: 1.0,
            max_failed_attempts: 2,
            ..Default::default()
        };
        // A static face never blinks: 300 ms frames time out every ~4 frames.
        let input = vec![line(0.3, 0.5, None); 20].join("\n");
        let (mut s, clock) = session(vec![ChallengeAction::Blink], settings);
        let report = run_capture_loop(
            &mut JsonlReplay::new(Cursor::new(input)),
            &mut s,
            &clock,
            &FaceRecognitionSettings::default(),
            &[],
            &opts(true),
        )
        .unwrap();
        assert_eq!(report.phase, LivenessPhase::Failed);
        assert_eq!(report.attempts, 2);
        assert_eq!(report.state.failed_attempts, 2);
        assert!(report.frames < 20);
        assert!(report.recognized.is_none());
    }

    #[test]
    fn test_no_retry_stops_after_first_timeout() {
        let settings = LivenessSettings {
            challenge_timeout_secs: 1.0,
            ..Default::default()
        };
        let input = vec![line(0.3, 0.5, None); 20].join("\n");
        let (mut s, clock) = session(vec![ChallengeAction::Blink], settings);
        let report = run_capture_loop(
            &mut JsonlReplay::new(Cursor::new(input)),
            &mut s,
            &clock,
            &FaceRecognitionSettings::default(),
            &[],
            &opts(false),
        )
        .unwrap();
        assert_eq!(report.phase, LivenessPhase::Idle);
        assert_eq!(report.state.failed_attempts, 1);
        assert_eq!(report.frames, 4);
    }
}
