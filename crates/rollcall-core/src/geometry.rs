//! 2D landmark geometry and descriptor distance.
//!
//! Landmark indices follow the 68-point facial landmark scheme (iBUG 300-W
//! ordering) produced by the external landmark model.

use serde::{Deserialize, Serialize};

/// Number of landmarks per detected face.
pub const LANDMARK_COUNT: usize = 68;
/// Length of a face descriptor produced by the embedding model.
pub const DESCRIPTOR_DIM: usize = 128;

/// Left eye contour: outer corner, two upper lid points, inner corner, two lower lid points.
pub const LEFT_EYE: [usize; 6] = [36, 37, 38, 39, 40, 41];
/// Right eye contour, same ordering as [`LEFT_EYE`].
pub const RIGHT_EYE: [usize; 6] = [42, 43, 44, 45, 46, 47];
pub const NOSE_TIP: usize = 30;
pub const LEFT_EYE_OUTER: usize = 36;
pub const RIGHT_EYE_OUTER: usize = 45;

/// A 2D pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Euclidean distance between two points. NaN coordinates propagate.
pub fn distance(p1: &Point, p2: &Point) -> f32 {
    p1.distance(p2)
}

/// Euclidean distance between two descriptors.
///
/// Returns `None` when the vectors have different lengths.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }
    let sum: f32 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
    Some(sum.sqrt())
}

/// Collect the points at `indices`, or `None` if any index is out of range.
pub(crate) fn pick<const N: usize>(landmarks: &[Point], indices: [usize; N]) -> Option<[Point; N]> {
    let mut out = [Point::default(); N];
    for (slot, &idx) in out.iter_mut().zip(indices.iter()) {
        *slot = *landmarks.get(idx)?;
    }
    Some(out)
}
