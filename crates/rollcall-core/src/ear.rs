//! Eye Aspect Ratio (EAR) from 6-point eye contours.
//!
//! `EAR = (|p2-p6| + |p3-p5|) / (2 * |p1-p4|)`, with points ordered
//! `[outer corner, upper lid 1, upper lid 2, inner corner, lower lid 1, lower lid 2]`.
//! An open eye sits around 0.3; a closed eye drops towards 0.

use crate::geometry::{Point, LEFT_EYE, RIGHT_EYE};

/// Value returned for degenerate input. Reads as "eyes open".
pub const EAR_FALLBACK: f32 = 0.3;

/// Horizontal eye widths below this are treated as degenerate.
const MIN_HORIZONTAL: f32 = 1e-6;

/// EAR of a single eye.
///
/// Returns [`EAR_FALLBACK`] if `eye` does not hold exactly 6 points or the
/// corners coincide. Landmark noise is expected, so neither case is an error.
pub fn calculate_ear(eye: &[Point]) -> f32 {
    let [p1, p2, p3, p4, p5, p6] = match eye {
        [a, b, c, d, e, f] => [a, b, c, d, e, f],
        _ => {
            tracing::warn!(points = eye.len(), "EAR: expected 6 eye points, using fallback");
            return EAR_FALLBACK;
        }
    };

    let horizontal = p1.distance(p4);
    if horizontal < MIN_HORIZONTAL {
        tracing::warn!("EAR: degenerate eye contour, using fallback");
        return EAR_FALLBACK;
    }

    (p2.distance(p6) + p3.distance(p5)) / (2.0 * horizontal)
}

/// Mean EAR of both eyes of a 68-point landmark set.
pub fn average_ear(landmarks: &[Point]) -> f32 {
    let left = eye_points(landmarks, LEFT_EYE);
    let right = eye_points(landmarks, RIGHT_EYE);
    (calculate_ear(&left) + calculate_ear(&right)) / 2.0
}

// Short landmark sets yield fewer than 6 points, which calculate_ear rejects.
fn eye_points(landmarks: &[Point], indices: [usize; 6]) -> Vec<Point> {
    indices
        .iter()
        .filter_map(|&i| landmarks.get(i).copied())
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::geometry::LANDMARK_COUNT;
    use crate::testing::eye;

    /// Full landmark set with both eyes at the given openness (EAR = h / w).
    pub(crate) fn face_with_ear(ear: f32) -> Vec<Point> {
        let mut lm = vec![Point::new(100.0, 100.0); LANDMARK_COUNT];
        let w = 30.0;
        let left = eye(70.0, 80.0, w, ear * w);
        let right = eye(130.0, 80.0, w, ear * w);
        lm[36..42].copy_from_slice(&left);
        lm[42..48].copy_from_slice(&right);
        lm
    }

    #[test]
    fn test_symmetric_eye_matches_formula() {
        // vertical pairs are both 6 apart, corners 20 apart -> 12 / 40
        let pts = eye(50.0, 50.0, 20.0, 6.0);
        assert!((calculate_ear(&pts) - 0.3).abs() < 1e-6);

        let closed = eye(50.0, 50.0, 20.0, 1.0);
        assert!((calculate_ear(&closed) - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_zero_width_returns_fallback() {
        let p = Point::new(10.0, 10.0);
        let pts = [
            p,
            Point::new(10.0, 5.0),
            Point::new(10.0, 5.0),
            p,
            Point::new(10.0, 15.0),
            Point::new(10.0, 15.0),
        ];
        assert_eq!(calculate_ear(&pts), EAR_FALLBACK);
    }

    #[test]
    fn test_wrong_point_count_returns_fallback() {
        let pts = eye(50.0, 50.0, 20.0, 2.0);
        assert_eq!(calculate_ear(&pts[..5]), EAR_FALLBACK);

        let mut seven = pts.to_vec();
        seven.push(Point::new(0.0, 0.0));
        assert_eq!(calculate_ear(&seven), EAR_FALLBACK);
        assert_eq!(calculate_ear(&[]), EAR_FALLBACK);
    }

    #[test]
    fn test_average_of_both_eyes() {
        let mut lm = face_with_ear(0.3);
        lm[42..48].copy_from_slice(&eye(130.0, 80.0, 30.0, 3.0));
        // (0.3 + 0.1) / 2
        assert!((average_ear(&lm) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_average_truncated_landmarks() {
        // Only the left eye is present: right eye falls back to 0.3.
        let lm = face_with_ear(0.1);
        let avg = average_ear(&lm[..44]);
        assert!((avg - 0.2).abs() < 1e-6);
        assert_eq!(average_ear(&[]), EAR_FALLBACK);
    }
}
