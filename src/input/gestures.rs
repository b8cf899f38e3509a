use crate::core::config::GestureConfig;
use crate::core::geo::{Angle, Point};
use crate::input::events::PointerId;
use crate::input::pointers::{InteractionPoints, PointMap};
use crate::prelude::Instant;
use serde::{Deserialize, Serialize};

/// Per-frame transform implied by the tracked pointers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GestureDelta {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
    /// Radians, normalized to `[-PI, PI]`
    pub rotate: f64,
    pub about: Point,
}

impl GestureDelta {
    pub fn translation(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn is_zoom(&self) -> bool {
        self.zoom != 1.0
    }
}

/// Derives deltas and tap/long-press classifications from pointer state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureRecognizer {
    config: GestureConfig,
}

impl Default for GestureRecognizer {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}

impl GestureRecognizer {
    pub fn new(config: GestureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// Transform between the previous and current samples.
    ///
    /// Only pointers present in both maps take part. With more than two, the
    /// pair furthest apart is used so an incidental extra contact is ignored.
    pub fn delta(&self, points: &InteractionPoints) -> Option<GestureDelta> {
        let tracked: Vec<PointerId> = points
            .current
            .keys()
            .filter(|id| points.previous.contains(id))
            .copied()
            .collect();

        match tracked.len() {
            0 => None,
            1 => {
                let id = tracked[0];
                let current = points.current.get(&id)?;
                let previous = points.previous.get(&id)?;
                let d = current.subtract(&previous);
                Some(GestureDelta {
                    x: d.x,
                    y: d.y,
                    zoom: 1.0,
                    rotate: 0.0,
                    about: current,
                })
            }
            _ => {
                let (a, b) = if tracked.len() == 2 {
                    (tracked[0], tracked[1])
                } else {
                    tracked
                        .iter()
                        .filter_map(|id| points.current.get(id).map(|p| (*id, p)))
                        .collect::<PointMap>()
                        .farthest_keys()?
                };
                let (c1, c2) = (points.current.get(&a)?, points.current.get(&b)?);
                let (p1, p2) = (points.previous.get(&a)?, points.previous.get(&b)?);

                let cm = c1.mean(&c2);
                let pm = p1.mean(&p2);
                let d = cm.subtract(&pm);

                let d1 = p1.distance_to(&p2);
                let d2 = c1.distance_to(&c2);
                let zoom = if d1 != 0.0 && d2 != 0.0 { d2 / d1 } else { 1.0 };

                let rotate = Angle::diff(c2.angle_to(&c1), p2.angle_to(&p1));
                Some(GestureDelta {
                    x: d.x,
                    y: d.y,
                    zoom,
                    rotate,
                    about: cm,
                })
            }
        }
    }

    fn within_tap_distance(&self, points: &InteractionPoints, id: &PointerId) -> bool {
        match (points.start.get(id), points.ended.get(id)) {
            (Some(start), Some(ended)) => start.distance_to(&ended) < self.config.tap_distance,
            _ => false,
        }
    }

    fn took_long(&self, points: &InteractionPoints, id: &PointerId) -> Option<bool> {
        let elapsed = points.elapsed_ms(id, Instant::now())?;
        Some(elapsed >= self.config.long_press_ms)
    }

    pub fn is_tap(&self, points: &InteractionPoints, id: &PointerId) -> bool {
        self.within_tap_distance(points, id) && self.took_long(points, id) == Some(false)
    }

    pub fn is_long_press(&self, points: &InteractionPoints, id: &PointerId) -> bool {
        self.within_tap_distance(points, id) && self.took_long(points, id) == Some(true)
    }

    pub fn is_any_tap(&self, points: &InteractionPoints) -> bool {
        points.ended.keys().any(|id| self.is_tap(points, id))
    }

    pub fn is_any_long_press(&self, points: &InteractionPoints) -> bool {
        points.ended.keys().any(|id| self.is_long_press(points, id))
    }

    pub fn is_stylus(&self, id: &PointerId) -> bool {
        id.is_stylus()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::Duration;
    use approx::assert_relative_eq;

    fn two_finger(p: [(f64, f64); 2], c: [(f64, f64); 2]) -> InteractionPoints {
        let mut points = InteractionPoints::default();
        points.update(PointerId::Touch(1), Point::new(p[0].0, p[0].1));
        points.update(PointerId::Touch(2), Point::new(p[1].0, p[1].1));
        points.update(PointerId::Touch(1), Point::new(c[0].0, c[0].1));
        points.update(PointerId::Touch(2), Point::new(c[1].0, c[1].1));
        points
    }

    fn released(distance: f64, duration_ms: u64) -> (InteractionPoints, PointerId) {
        let mut points = InteractionPoints::default();
        let id = PointerId::Touch(9);
        let t0 = Instant::now();
        points.update_at(id, Point::new(0.0, 0.0), t0);
        points.stop_at(
            id,
            Point::new(distance, 0.0),
            t0 + Duration::from_millis(duration_ms),
        );
        (points, id)
    }

    #[test]
    fn test_no_pointers_no_delta() {
        assert!(InteractionPoints::default().delta().is_none());
    }

    #[test]
    fn test_single_pointer_delta() {
        let mut points = InteractionPoints::default();
        points.update(PointerId::Mouse, Point::new(10.0, 10.0));
        points.update(PointerId::Mouse, Point::new(15.0, 7.0));
        let delta = points.delta().unwrap();
        assert_eq!(delta.translation(), Point::new(5.0, -3.0));
        assert_eq!(delta.zoom, 1.0);
        assert_eq!(delta.rotate, 0.0);
        assert_eq!(delta.about, Point::new(15.0, 7.0));
    }

    #[test]
    fn test_pinch_zoom_is_distance_ratio() {
        let points = two_finger([(0.0, 0.0), (10.0, 0.0)], [(-5.0, 0.0), (15.0, 0.0)]);
        let delta = points.delta().unwrap();
        assert_relative_eq!(delta.zoom, 2.0);
        assert_relative_eq!(delta.x, 0.0);
        assert_eq!(delta.about, Point::new(5.0, 0.0));
    }

    #[test]
    fn test_zero_previous_distance_zoom_is_one() {
        let points = two_finger([(5.0, 5.0), (5.0, 5.0)], [(0.0, 0.0), (10.0, 0.0)]);
        assert_eq!(points.delta().unwrap().zoom, 1.0);
    }

    #[test]
    fn test_two_finger_rotation() {
        let points = two_finger([(0.0, 0.0), (10.0, 0.0)], [(0.0, 0.0), (0.0, 10.0)]);
        let delta = points.delta().unwrap();
        assert_relative_eq!(delta.rotate, std::f64::consts::FRAC_PI_2, epsilon = 1e-9);
        assert_relative_eq!(delta.zoom, 1.0);
    }

    #[test]
    fn test_third_contact_ignored() {
        let mut points = InteractionPoints::default();
        points.update(PointerId::Touch(1), Point::new(0.0, 0.0));
        points.update(PointerId::Touch(2), Point::new(100.0, 0.0));
        points.update(PointerId::Touch(3), Point::new(50.0, 1.0));
        points.update(PointerId::Touch(1), Point::new(-50.0, 0.0));
        points.update(PointerId::Touch(2), Point::new(150.0, 0.0));
        let delta = points.delta().unwrap();
        assert_relative_eq!(delta.zoom, 2.0);
    }

    #[test]
    fn test_tap_and_long_press() {
        let (points, id) = released(3.0, 100);
        assert!(points.is_tap(&id));
        assert!(!points.is_long_press(&id));
        assert!(points.is_any_tap());

        let (points, id) = released(3.0, 800);
        assert!(!points.is_tap(&id));
        assert!(points.is_long_press(&id));
        assert!(points.is_any_long_press());
    }

    #[test]
    fn test_tap_distance_boundary_is_neither() {
        for duration in [0, 100, 499, 500, 2000] {
            let (points, id) = released(TAP_BOUNDARY, duration);
            assert!(!points.is_tap(&id));
            assert!(!points.is_long_press(&id));
        }
    }

    const TAP_BOUNDARY: f64 = crate::constants::TAP_DISTANCE;

    #[test]
    fn test_tap_long_press_mutually_exclusive() {
        for distance in [0.0, 2.5, 9.99, 10.0, 25.0] {
            for duration in [0, 250, 499, 500, 501, 3000] {
                let (points, id) = released(distance, duration);
                assert!(!(points.is_tap(&id) && points.is_long_press(&id)));
            }
        }
    }

    #[test]
    fn test_stylus_key() {
        let recognizer = GestureRecognizer::default();
        assert!(recognizer.is_stylus(&PointerId::Stylus));
        assert!(!recognizer.is_stylus(&PointerId::Touch(0)));
    }
}
