//! Synthetic landmark fixtures for tests of code that consumes 68-point faces.

use crate::geometry::{Point, LANDMARK_COUNT, LEFT_EYE, NOSE_TIP, RIGHT_EYE};

/// Eye contour of width `w` whose two lid pairs are `h` apart (EAR = h / w).
pub fn eye(cx: f32, cy: f32, w: f32, h: f32) -> [Point; 6] {
    let half_w = w / 2.0;
    let half_h = h / 2.0;
    [
        Point::new(cx - half_w, cy),
        Point::new(cx - w / 6.0, cy - half_h),
        Point::new(cx + w / 6.0, cy - half_h),
        Point::new(cx + half_w, cy),
        Point::new(cx + w / 6.0, cy + half_h),
        Point::new(cx - w / 6.0, cy + half_h),
    ]
}

/// Full landmark set with both eyes at openness `ear` and the nose placed
/// so the head-pose ratio equals `ratio`. Outer eye corners sit at
/// (100, 100) and (200, 100).
pub fn face(ear: f32, ratio: f32) -> Vec<Point> {
    let mut lm = vec![Point::new(150.0, 150.0); LANDMARK_COUNT];
    let w = 30.0;
    for (indices, cx) in [(LEFT_EYE, 115.0), (RIGHT_EYE, 185.0)] {
        for (&i, p) in indices.iter().zip(eye(cx, 100.0, w, ear * w)) {
            lm[i] = p;
        }
    }
    lm[NOSE_TIP] = Point::new(100.0 + 100.0 * ratio, 100.0);
    lm
}
