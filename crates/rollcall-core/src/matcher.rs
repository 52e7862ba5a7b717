//! Nearest-neighbour face matching against a small gallery.

use serde::{Deserialize, Serialize};

use crate::geometry::euclidean_distance;
use crate::settings::FaceRecognitionSettings;

/// A known identity and its enrolled descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownPerson {
    pub id: String,
    pub name: String,
    pub descriptor: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceMatch {
    pub person_id: String,
    pub person_name: String,
    pub distance: f32,
    /// `max(0, 1 - distance)`. Monotonic in distance, not a probability.
    pub confidence: f32,
}

pub trait Matcher {
    /// Best gallery match for `probe`, or `None` if nothing is close enough.
    fn recognize(&self, probe: &[f32], gallery: &[KnownPerson]) -> Option<FaceMatch>;
}

/// Linear-scan matcher accepting the nearest descriptor within a distance threshold.
#[derive(Debug, Clone, Copy)]
pub struct EuclideanMatcher {
    threshold: f32,
}

impl EuclideanMatcher {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn from_settings(settings: &FaceRecognitionSettings) -> Self {
        Self::new(settings.recognition_threshold)
    }
}

impl Matcher for EuclideanMatcher {
    fn recognize(&self, probe: &[f32], gallery: &[KnownPerson]) -> Option<FaceMatch> {
        let mut best: Option<(&KnownPerson, f32)> = None;

        for person in gallery {
            let Some(distance) = euclidean_distance(probe, &person.descriptor) else {
                tracing::warn!(
                    person_id = %person.id,
                    expected = probe.len(),
                    got = person.descriptor.len(),
                    "skipping gallery entry with mismatched descriptor length"
                );
                continue;
            };
            if distance.is_nan() {
                tracing::warn!(person_id = %person.id, "skipping gallery entry with NaN distance");
                continue;
            }
            // Strict comparison keeps the first of equally distant candidates.
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((person, distance));
            }
        }

        let (person, distance) = best?;
        if self.threshold.is_nan() || distance > self.threshold {
            tracing::debug!(
                nearest = %person.id,
                distance,
                threshold = self.threshold,
                "no gallery match within threshold"
            );
            return None;
        }

        tracing::debug!(person_id = %person.id, distance, "face recognized");
        Some(FaceMatch {
            person_id: person.id.clone(),
            person_name: person.name.clone(),
            distance,
            confidence: (1.0 - distance).max(0.0),
        })
    }
}

/// Match `probe` against `gallery` using the configured recognition threshold.
pub fn recognize_face(
    probe: &[f32],
    gallery: &[KnownPerson],
    settings: &FaceRecognitionSettings,
) -> Option<FaceMatch> {
    if gallery.is_empty() {
        return None;
    }
    EuclideanMatcher::from_settings(settings).recognize(probe, gallery)
}
