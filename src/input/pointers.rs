//! Per-pointer sample tracking
//!
//! [`InteractionPoints`] keeps four point maps per gesture: `current`,
//! `previous`, `start` and `ended`. A pointer enters `start` and `previous`
//! on first contact, moves to `ended` on release and is erased everywhere
//! once its target has been notified.

use crate::core::config::GestureConfig;
use crate::core::geo::Point;
use crate::input::events::PointerId;
use crate::input::gestures::{GestureDelta, GestureRecognizer};
use crate::prelude::{HashMap, Instant};

/// Points keyed by the contact that produced them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointMap {
    points: HashMap<PointerId, Point>,
}

impl PointMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: PointerId, point: Point) -> Option<Point> {
        self.points.insert(id, point)
    }

    pub fn get(&self, id: &PointerId) -> Option<Point> {
        self.points.get(id).copied()
    }

    pub fn remove(&mut self, id: &PointerId) -> Option<Point> {
        self.points.remove(id)
    }

    pub fn contains(&self, id: &PointerId) -> bool {
        self.points.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &PointerId> {
        self.points.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PointerId, &Point)> {
        self.points.iter()
    }

    /// Keys of the two points furthest apart, or `None` with fewer than two points.
    pub fn farthest_keys(&self) -> Option<(PointerId, PointerId)> {
        let entries: Vec<(PointerId, Point)> = self.points.iter().map(|(k, p)| (*k, *p)).collect();
        let mut best: Option<(PointerId, PointerId, f64)> = None;
        for (i, (ka, pa)) in entries.iter().enumerate() {
            for (kb, pb) in entries.iter().skip(i + 1) {
                let distance = pa.distance_to(pb);
                if best.map_or(true, |(_, _, d)| distance > d) {
                    best = Some((*ka, *kb, distance));
                }
            }
        }
        best.map(|(a, b, _)| (a, b))
    }

    pub fn farthests(&self) -> Option<(Point, Point)> {
        let (a, b) = self.farthest_keys()?;
        Some((self.get(&a)?, self.get(&b)?))
    }

    pub fn mean(&self) -> Option<Point> {
        if self.points.is_empty() {
            return None;
        }
        let n = self.points.len() as f64;
        let sum = self
            .points
            .values()
            .fold(Point::default(), |acc, p| acc.add(p));
        Some(sum.multiply(1.0 / n))
    }
}

impl FromIterator<(PointerId, Point)> for PointMap {
    fn from_iter<I: IntoIterator<Item = (PointerId, Point)>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

/// Interaction state of one gesture target
#[derive(Debug, Clone)]
pub struct InteractionPoints {
    pub current: PointMap,
    pub previous: PointMap,
    pub start: PointMap,
    pub ended: PointMap,
    started_at: HashMap<PointerId, Instant>,
    ended_at: HashMap<PointerId, Instant>,
    recognizer: GestureRecognizer,
}

impl Default for InteractionPoints {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}

impl InteractionPoints {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            current: PointMap::new(),
            previous: PointMap::new(),
            start: PointMap::new(),
            ended: PointMap::new(),
            started_at: HashMap::default(),
            ended_at: HashMap::default(),
            recognizer: GestureRecognizer::new(config),
        }
    }

    pub fn recognizer(&self) -> &GestureRecognizer {
        &self.recognizer
    }

    /// Record a sample. Returns true iff `id` is new.
    pub fn update(&mut self, id: PointerId, point: Point) -> bool {
        self.update_at(id, point, Instant::now())
    }

    pub fn update_at(&mut self, id: PointerId, point: Point, now: Instant) -> bool {
        self.current.insert(id, point);
        if self.start.contains(&id) {
            return false;
        }
        self.start.insert(id, point);
        self.previous.insert(id, point);
        self.started_at.insert(id, now);
        true
    }

    pub fn update_previous(&mut self) {
        for (id, point) in self.current.iter() {
            self.previous.insert(*id, *point);
        }
    }

    pub fn stop(&mut self, id: PointerId, point: Point) {
        self.stop_at(id, point, Instant::now());
    }

    /// Move a tracked pointer to `ended`. Unknown ids are ignored.
    pub fn stop_at(&mut self, id: PointerId, point: Point, now: Instant) {
        if self.current.remove(&id).is_some() {
            self.previous.remove(&id);
            self.ended.insert(id, point);
            self.ended_at.insert(id, now);
        }
    }

    pub fn finish(&mut self, id: PointerId) {
        self.current.remove(&id);
        self.previous.remove(&id);
        self.start.remove(&id);
        self.ended.remove(&id);
        self.started_at.remove(&id);
        self.ended_at.remove(&id);
    }

    pub fn is_finished(&self) -> bool {
        self.current.is_empty()
    }

    pub fn is_no_longer_two_finger(&self) -> bool {
        self.previous.len() > 1 && self.current.len() < 2
    }

    pub fn moved(&self, id: &PointerId) -> Option<Point> {
        Some(self.current.get(id)?.subtract(&self.previous.get(id)?))
    }

    /// Movement of the mean of all current points
    pub fn mean_move(&self) -> Option<Point> {
        Some(self.current.mean()?.subtract(&self.previous.mean()?))
    }

    pub fn started_at(&self, id: &PointerId) -> Option<Instant> {
        self.started_at.get(id).copied()
    }

    pub fn ended_at(&self, id: &PointerId) -> Option<Instant> {
        self.ended_at.get(id).copied()
    }

    /// Milliseconds between first contact and release, or until `now` while
    /// the pointer is still down.
    pub fn elapsed_ms(&self, id: &PointerId, now: Instant) -> Option<f64> {
        let started = self.started_at(id)?;
        let until = self.ended_at(id).unwrap_or(now);
        Some(until.saturating_duration_since(started).as_secs_f64() * 1000.0)
    }

    pub(crate) fn set_started_at(&mut self, id: PointerId, at: Instant) {
        self.started_at.insert(id, at);
    }

    pub(crate) fn set_ended_at(&mut self, id: PointerId, at: Instant) {
        self.ended_at.insert(id, at);
    }

    pub fn delta(&self) -> Option<GestureDelta> {
        self.recognizer.delta(self)
    }

    pub fn is_tap(&self, id: &PointerId) -> bool {
        self.recognizer.is_tap(self, id)
    }

    pub fn is_long_press(&self, id: &PointerId) -> bool {
        self.recognizer.is_long_press(self, id)
    }

    pub fn is_any_tap(&self) -> bool {
        self.recognizer.is_any_tap(self)
    }

    pub fn is_any_long_press(&self) -> bool {
        self.recognizer.is_any_long_press(self)
    }
}
