//! Momentum continuation of released drags
//!
//! Velocity is sampled while a gesture runs. On release the recent samples
//! are averaged into a start velocity which then decays by a damping factor
//! every frame. A target that leaves its container (less than the visibility
//! margin still overlapping) is nudged back toward the container center and
//! bounces off the offending edge with a steeper collision damping.

use crate::constants::MAX_RECENTER_STEPS;
use crate::core::config::ThrowConfig;
use crate::core::geo::{Point, Polygon, Rect};
use crate::prelude::Instant;
use std::collections::VecDeque;

/// The object moved by a throw
pub trait ThrowTarget {
    /// Outline of the target in container coordinates
    fn polygon(&self) -> Polygon;

    /// Outline of the container, `None` if the target is not on stage
    fn container_polygon(&self) -> Option<Polygon>;

    fn container_bounds(&self) -> Rect;

    fn move_by(&mut self, delta: Point);

    fn center(&self) -> Point {
        self.polygon().center
    }

    fn container_center(&self) -> Point {
        self.container_bounds().center()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct VelocitySample {
    dt: f64,
    dx: f64,
    dy: f64,
}

/// Outcome of one animation frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThrowStep {
    /// No throw in progress
    Idle,
    /// The target moved and the throw continues
    Moved { delta: Point, velocity: Point },
    /// Last movement of a throw that has come to rest inside its container
    Finished { delta: Point },
}

#[derive(Debug, Clone)]
pub struct ThrowPhysics {
    config: ThrowConfig,
    samples: VecDeque<VelocitySample>,
    last_frame: Option<Instant>,
    velocity: Option<Point>,
}

impl Default for ThrowPhysics {
    fn default() -> Self {
        Self::new(ThrowConfig::default())
    }
}

impl ThrowPhysics {
    pub fn new(config: ThrowConfig) -> Self {
        Self {
            config,
            samples: VecDeque::with_capacity(config.buffer + 1),
            last_frame: None,
            velocity: None,
        }
    }

    pub fn config(&self) -> &ThrowConfig {
        &self.config
    }

    /// Current velocity in pixels per millisecond while a throw runs
    pub fn velocity(&self) -> Option<Point> {
        self.velocity
    }

    pub fn is_animating(&self) -> bool {
        self.velocity.is_some()
    }

    /// Begin sampling at `now`.
    pub fn observe(&mut self, now: Instant) {
        self.last_frame = Some(now);
    }

    /// Record the movement of one gesture frame.
    pub fn add_velocity(&mut self, delta: Point, now: Instant) {
        let last = self.last_frame.unwrap_or(now);
        let dt = now.saturating_duration_since(last).as_secs_f64() * 1000.0;
        self.last_frame = Some(now);
        self.samples.push_back(VelocitySample {
            dt,
            dx: delta.x,
            dy: delta.y,
        });
        while self.samples.len() > self.config.buffer {
            self.samples.pop_front();
        }
    }

    /// Average velocity over the last `window_ms` of samples.
    ///
    /// A zero sample is appended first so a pointer that rested before
    /// release yields a slower throw. Samples without elapsed time are skipped.
    pub fn mean_velocity(&mut self, now: Instant) -> Point {
        self.add_velocity(Point::default(), now);
        let mut sum = Point::default();
        let mut count = 0usize;
        let mut t = 0.0;
        for sample in self.samples.iter().rev() {
            if sample.dt <= 0.0 {
                continue;
            }
            t += sample.dt;
            sum = sum.add(&Point::new(sample.dx / sample.dt, sample.dy / sample.dt));
            count += 1;
            if t > self.config.window_ms {
                break;
            }
        }
        if count == 0 {
            return sum;
        }
        sum.multiply(1.0 / count as f64)
    }

    /// Turn the sampled velocity into a throw. Returns whether animation frames are needed.
    pub fn start_throw<T: ThrowTarget>(&mut self, target: &mut T, now: Instant) -> bool {
        let mut velocity = self.mean_velocity(now);
        if !self.config.movable_x {
            velocity.x = 0.0;
        }
        if !self.config.movable_y {
            velocity.y = 0.0;
        }
        let velocity = self.next_velocity(target, velocity);
        log::debug!("throw started with velocity {:?}", velocity);
        self.velocity = Some(velocity);
        self.last_frame = Some(now);
        true
    }

    /// Advance the throw by `dt_ms` milliseconds.
    pub fn step<T: ThrowTarget>(&mut self, target: &mut T, dt_ms: f64) -> ThrowStep {
        let Some(velocity) = self.velocity else {
            return ThrowStep::Idle;
        };
        let delta = velocity.multiply(dt_ms);
        if delta != Point::default() {
            target.move_by(delta);
        }

        let mut next = self.next_velocity(target, velocity);
        let (prev_len, next_len) = (velocity.length(), next.length());
        if next_len > prev_len {
            log::debug!("prevented throw acceleration by {}", next_len / prev_len);
            next = next.multiply(prev_len / next_len);
        }
        self.velocity = Some(next);

        if dt_ms == 0.0 || next.length() > self.config.epsilon || self.is_outside(target) {
            return ThrowStep::Moved {
                delta,
                velocity: next,
            };
        }
        self.velocity = None;
        ThrowStep::Finished { delta }
    }

    /// Stop any running throw and forget the samples.
    pub fn kill(&mut self) {
        self.velocity = None;
        self.samples.clear();
    }

    /// Whether less than the visibility margin of the target overlaps its container.
    pub fn is_outside<T: ThrowTarget>(&self, target: &T) -> bool {
        let Some(stage) = target.container_polygon() else {
            return false;
        };
        match stage.intersects_with(&target.polygon()) {
            None => true,
            Some(hit) => hit.overlap < self.config.visibility,
        }
    }

    /// Nudge an outside target toward the container center until it is
    /// visible again. Returns whether it had to be moved.
    fn bounce<T: ThrowTarget>(&self, target: &mut T) -> bool {
        if !self.is_outside(target) {
            return false;
        }
        let cv = target.container_center().subtract(&target.center()).normalize();
        if cv == Point::default() {
            return true;
        }
        for _ in 0..MAX_RECENTER_STEPS {
            target.move_by(cv);
            if !self.is_outside(target) {
                return true;
            }
        }
        log::warn!("throw target still outside after {} recenter steps", MAX_RECENTER_STEPS);
        true
    }

    fn next_velocity<T: ThrowTarget>(&self, target: &mut T, velocity: Point) -> Point {
        if target.container_polygon().is_none() || !self.bounce(target) {
            return velocity.multiply(self.config.damping);
        }
        let stage = target.container_bounds();
        let center = target.center();
        let mut dx = if self.config.movable_x { velocity.x } else { 0.0 };
        let mut dy = if self.config.movable_y { velocity.y } else { 0.0 };
        let mut factor = self.config.damping;
        if center.x < stage.x || center.x > stage.x + stage.width {
            dx = -dx;
            factor = self.config.collision_damping;
        }
        if center.y < stage.y || center.y > stage.y + stage.height {
            dy = -dy;
            factor = self.config.collision_damping;
        }
        Point::new(dx, dy).multiply(factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::THROW_DAMPING;
    use crate::prelude::Duration;
    use approx::assert_relative_eq;

    struct Card {
        rect: Rect,
        stage: Rect,
    }

    impl Card {
        fn at(x: f64, y: f64) -> Self {
            Self {
                rect: Rect::new(x, y, 100.0, 100.0),
                stage: Rect::new(0.0, 0.0, 1000.0, 1000.0),
            }
        }
    }

    impl ThrowTarget for Card {
        fn polygon(&self) -> Polygon {
            self.rect.to_polygon()
        }

        fn container_polygon(&self) -> Option<Polygon> {
            Some(self.stage.to_polygon())
        }

        fn container_bounds(&self) -> Rect {
            self.stage
        }

        fn move_by(&mut self, delta: Point) {
            self.rect.x += delta.x;
            self.rect.y += delta.y;
        }
    }

    fn thrown(physics: &mut ThrowPhysics, card: &mut Card, dx: f64, dy: f64) {
        let t0 = Instant::now();
        physics.observe(t0);
        physics.add_velocity(Point::new(dx, dy), t0 + Duration::from_millis(10));
        physics.add_velocity(Point::new(dx, dy), t0 + Duration::from_millis(20));
        physics.start_throw(card, t0 + Duration::from_millis(20));
    }

    #[test]
    fn test_mean_velocity_over_window() {
        let mut physics = ThrowPhysics::default();
        let t0 = Instant::now();
        physics.observe(t0);
        physics.add_velocity(Point::new(10.0, 0.0), t0 + Duration::from_millis(10));
        physics.add_velocity(Point::new(10.0, 0.0), t0 + Duration::from_millis(20));
        let v = physics.mean_velocity(t0 + Duration::from_millis(20));
        assert_relative_eq!(v.x, 1.0);
        assert_relative_eq!(v.y, 0.0);
    }

    #[test]
    fn test_resting_before_release_slows_throw() {
        let mut physics = ThrowPhysics::default();
        let t0 = Instant::now();
        physics.observe(t0);
        physics.add_velocity(Point::new(10.0, 0.0), t0 + Duration::from_millis(10));
        let v = physics.mean_velocity(t0 + Duration::from_millis(20));
        assert_relative_eq!(v.x, 0.5);
    }

    #[test]
    fn test_ring_buffer_bounded() {
        let mut physics = ThrowPhysics::default();
        let t0 = Instant::now();
        physics.observe(t0);
        for i in 1..20 {
            physics.add_velocity(Point::new(1.0, 0.0), t0 + Duration::from_millis(i));
        }
        assert_eq!(physics.samples.len(), physics.config.buffer);
    }

    #[test]
    fn test_velocity_decays_by_damping_inside_bounds() {
        let mut physics = ThrowPhysics::default();
        let mut card = Card::at(450.0, 450.0);
        thrown(&mut physics, &mut card, 1.0, 0.5);

        for _ in 0..5 {
            let before = physics.velocity().unwrap();
            physics.step(&mut card, 1.0);
            let after = physics.velocity().unwrap();
            assert_relative_eq!(after.x, before.x * THROW_DAMPING, epsilon = 1e-12);
            assert_relative_eq!(after.y, before.y * THROW_DAMPING, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_bounce_reverses_axis_and_keeps_visible() {
        let mut physics = ThrowPhysics::default();
        let mut card = Card::at(880.0, 450.0);
        thrown(&mut physics, &mut card, 20.0, 0.0);

        let mut reversed = false;
        for _ in 0..200 {
            if let ThrowStep::Finished { .. } = physics.step(&mut card, 16.0) {
                break;
            }
            if physics.velocity().map_or(false, |v| v.x < 0.0) {
                reversed = true;
            }
        }
        assert!(reversed);
        assert!(!physics.is_outside(&card));
    }

    #[test]
    fn test_throw_terminates_inside() {
        let mut physics = ThrowPhysics::default();
        let mut card = Card::at(400.0, 400.0);
        thrown(&mut physics, &mut card, 5.0, 5.0);
        let mut finished = false;
        for _ in 0..1000 {
            if let ThrowStep::Finished { .. } = physics.step(&mut card, 16.0) {
                finished = true;
                break;
            }
        }
        assert!(finished);
        assert!(!physics.is_animating());
        assert_eq!(physics.step(&mut card, 16.0), ThrowStep::Idle);
    }

    #[test]
    fn test_never_accelerates() {
        let mut physics = ThrowPhysics::default();
        let mut card = Card::at(950.0, 950.0);
        thrown(&mut physics, &mut card, 30.0, 30.0);
        let mut last = physics.velocity().unwrap().length();
        for _ in 0..50 {
            physics.step(&mut card, 16.0);
            match physics.velocity() {
                Some(v) => {
                    assert!(v.length() <= last + 1e-9);
                    last = v.length();
                }
                None => break,
            }
        }
    }

    #[test]
    fn test_locked_axis() {
        let config = ThrowConfig {
            movable_y: false,
            ..ThrowConfig::default()
        };
        let mut physics = ThrowPhysics::new(config);
        let mut card = Card::at(450.0, 450.0);
        thrown(&mut physics, &mut card, 3.0, 3.0);
        assert_eq!(physics.velocity().unwrap().y, 0.0);
    }

    #[test]
    fn test_kill_stops_throw() {
        let mut physics = ThrowPhysics::default();
        let mut card = Card::at(450.0, 450.0);
        thrown(&mut physics, &mut card, 3.0, 0.0);
        physics.kill();
        assert!(!physics.is_animating());
        assert_eq!(physics.step(&mut card, 16.0), ThrowStep::Idle);
    }
}
