//! Routing of platform events into interaction state
//!
//! [`InteractionDelegate`] drives a single target. [`InteractionMapper`]
//! shares one input surface between many logical targets: every pointer is
//! assigned to a target on first contact and each target sees only its own
//! pointers, mapped into its local coordinate space.

use crate::core::config::GestureConfig;
use crate::core::geo::Point;
use crate::input::events::{EventHandled, PlatformEvent, PointerId, PointerKind, PointerPhase, RawEvent};
use crate::input::pointers::{InteractionPoints, PointMap};
use crate::prelude::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// An object driven by a single [`InteractionDelegate`]
pub trait InteractionTarget {
    /// Whether the target takes ownership of a starting contact or wheel event
    fn capture(&mut self, _event: &PlatformEvent) -> bool {
        true
    }

    fn on_start(&mut self, event: &PlatformEvent, interaction: &InteractionPoints);
    fn on_move(&mut self, event: &PlatformEvent, interaction: &InteractionPoints);
    fn on_end(&mut self, event: &PlatformEvent, interaction: &InteractionPoints);

    fn on_mouse_wheel(&mut self, _event: &PlatformEvent) -> EventHandled {
        EventHandled::NotHandled
    }
}

/// A scene that owns many interactive objects on one surface
pub trait InteractionMapperTarget {
    /// Handle of a logical target inside the scene
    type Target: Copy + Eq + Hash + Debug;

    fn capture(&mut self, _event: &PlatformEvent) -> bool {
        true
    }

    /// Decide which object owns a new contact. `local` is the mapped point,
    /// `global` the page position.
    fn find_target(
        &mut self,
        event: &PlatformEvent,
        local: Point,
        global: Point,
    ) -> Option<Self::Target>;

    /// Page to local coordinates
    fn map_position_to_point(&self, point: Point) -> Point {
        point
    }

    fn on_start(&mut self, target: Self::Target, event: &PlatformEvent, interaction: &InteractionPoints);
    fn on_move(&mut self, target: Self::Target, event: &PlatformEvent, interaction: &InteractionPoints);
    fn on_end(&mut self, target: Self::Target, event: &PlatformEvent, interaction: &InteractionPoints);

    /// Wheel events for `target`, or for the scene itself when no object was found
    fn on_mouse_wheel(
        &mut self,
        _target: Option<Self::Target>,
        _event: &PlatformEvent,
    ) -> EventHandled {
        EventHandled::NotHandled
    }
}

/// Normalize a platform event into the points it carries.
///
/// Mice only count while a button is pressed, except on release. Moves of
/// touch events include every touch still on the element.
pub fn extract_points(event: &RawEvent) -> PointMap {
    let mut result = PointMap::new();
    match event {
        RawEvent::Mouse {
            phase,
            position,
            buttons,
        } => {
            if *buttons != 0 || phase.is_end() {
                result.insert(PointerId::Mouse, *position);
            }
        }
        RawEvent::Pointer {
            pointer_id,
            position,
            ..
        } => {
            result.insert(PointerId::Pointer(*pointer_id), *position);
        }
        RawEvent::Touch {
            phase,
            changed,
            targets,
        } => {
            let all_targets = if *phase == PointerPhase::Move {
                targets.as_slice()
            } else {
                &[]
            };
            for touch in changed.iter().chain(all_targets.iter()) {
                result.insert(touch.pointer_id(), touch.position);
            }
        }
        RawEvent::Wheel { .. } => {}
    }
    result
}

/// Moves are only followed for touch contacts and pressed buttons.
fn accepts_move(event: &RawEvent) -> bool {
    match event {
        RawEvent::Mouse { buttons, .. } => *buttons != 0,
        RawEvent::Pointer {
            pointer_type,
            buttons,
            ..
        } => *pointer_type == PointerKind::Touch || *buttons != 0,
        RawEvent::Touch { .. } => true,
        RawEvent::Wheel { .. } => false,
    }
}

/// Common preflight: claimed and malformed events are dropped.
fn admissible(event: &PlatformEvent) -> bool {
    if event.claimed {
        log::debug!("ignoring event already claimed by another dispatcher");
        return false;
    }
    if let Err(reason) = event.raw.validate() {
        log::warn!("ignoring malformed {:?}: {}", event.raw, reason);
        return false;
    }
    true
}

/// Routes events to one [`InteractionTarget`]
pub struct InteractionDelegate<T: InteractionTarget> {
    target: T,
    interaction: InteractionPoints,
}

impl<T: InteractionTarget> InteractionDelegate<T> {
    pub fn new(target: T, config: GestureConfig) -> Self {
        Self {
            target,
            interaction: InteractionPoints::new(config),
        }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    pub fn interaction(&self) -> &InteractionPoints {
        &self.interaction
    }

    pub fn handle_event(&mut self, event: &mut PlatformEvent) -> EventHandled {
        if !admissible(event) {
            return EventHandled::NotHandled;
        }
        match event.raw.phase() {
            None => self.on_mouse_wheel(event),
            Some(PointerPhase::Start) => self.on_start(event),
            Some(PointerPhase::Move) => self.on_move(event),
            Some(_) => self.on_end(event),
        }
    }

    fn on_mouse_wheel(&mut self, event: &mut PlatformEvent) -> EventHandled {
        if !self.target.capture(event) {
            return EventHandled::NotHandled;
        }
        event.claim();
        self.target.on_mouse_wheel(event)
    }

    fn on_start(&mut self, event: &mut PlatformEvent) -> EventHandled {
        if !self.target.capture(event) {
            return EventHandled::NotHandled;
        }
        event.claim();
        let extracted = extract_points(&event.raw);
        for (id, point) in extracted.iter() {
            self.interaction.update_at(*id, *point, event.timestamp);
        }
        self.target.on_start(event, &self.interaction);
        EventHandled::Handled
    }

    fn on_move(&mut self, event: &mut PlatformEvent) -> EventHandled {
        if !accepts_move(&event.raw) {
            return EventHandled::NotHandled;
        }
        let extracted = extract_points(&event.raw);
        if !extracted.keys().any(|id| self.interaction.start.contains(id)) {
            return EventHandled::NotHandled;
        }
        event.claim();
        for (id, point) in extracted.iter() {
            self.interaction.update_at(*id, *point, event.timestamp);
        }
        self.target.on_move(event, &self.interaction);
        self.interaction.update_previous();
        EventHandled::Handled
    }

    fn on_end(&mut self, event: &mut PlatformEvent) -> EventHandled {
        let extracted = extract_points(&event.raw);
        if !extracted.keys().any(|id| self.interaction.current.contains(id)) {
            return EventHandled::NotHandled;
        }
        event.claim();
        for (id, point) in extracted.iter() {
            self.interaction.stop_at(*id, *point, event.timestamp);
        }
        self.target.on_end(event, &self.interaction);
        for id in extracted.keys() {
            self.interaction.finish(*id);
        }
        EventHandled::Handled
    }
}

#[derive(Debug, Clone, Copy)]
enum Aspect {
    Current,
    Previous,
    Start,
    Ended,
}

/// Routes events on a shared surface to the targets of an [`InteractionMapperTarget`]
pub struct InteractionMapper<M: InteractionMapperTarget> {
    scene: M,
    interaction: InteractionPoints,
    targets: HashMap<PointerId, M::Target>,
    windows: HashMap<M::Target, InteractionPoints>,
    config: GestureConfig,
}

impl<M: InteractionMapperTarget> InteractionMapper<M> {
    pub fn new(scene: M, config: GestureConfig) -> Self {
        Self {
            scene,
            interaction: InteractionPoints::new(config),
            targets: HashMap::default(),
            windows: HashMap::default(),
            config,
        }
    }

    pub fn scene(&self) -> &M {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut M {
        &mut self.scene
    }

    pub fn interaction(&self) -> &InteractionPoints {
        &self.interaction
    }

    /// Target currently owning `id`
    pub fn target_of(&self, id: &PointerId) -> Option<M::Target> {
        self.targets.get(id).copied()
    }

    /// Private view of `target`, present while any pointer refers to it
    pub fn window(&self, target: &M::Target) -> Option<&InteractionPoints> {
        self.windows.get(target)
    }

    pub fn handle_event(&mut self, event: &mut PlatformEvent) -> EventHandled {
        if !admissible(event) {
            return EventHandled::NotHandled;
        }
        match event.raw.phase() {
            None => self.on_mouse_wheel(event),
            Some(PointerPhase::Start) => self.on_start(event),
            Some(PointerPhase::Move) => self.on_move(event),
            Some(_) => self.on_end(event),
        }
    }

    fn on_mouse_wheel(&mut self, event: &mut PlatformEvent) -> EventHandled {
        if !self.scene.capture(event) {
            return EventHandled::NotHandled;
        }
        event.claim();
        let Some(global) = event.raw.position() else {
            return EventHandled::NotHandled;
        };
        let local = self.scene.map_position_to_point(global);
        if let Some(found) = self.scene.find_target(event, local, global) {
            if self.scene.on_mouse_wheel(Some(found), event) == EventHandled::Handled {
                return EventHandled::Handled;
            }
        }
        self.scene.on_mouse_wheel(None, event)
    }

    fn on_start(&mut self, event: &mut PlatformEvent) -> EventHandled {
        if !self.scene.capture(event) {
            return EventHandled::NotHandled;
        }
        event.claim();
        let extracted = extract_points(&event.raw);
        for (id, point) in extracted.iter() {
            if self.interaction.update_at(*id, *point, event.timestamp) {
                self.assign_target(event, *id, *point);
            }
        }
        let mapped = self.map_interaction(&extracted, &[Aspect::Current, Aspect::Start]);
        for target in mapped {
            if let Some(window) = self.windows.get(&target) {
                self.scene.on_start(target, event, window);
            }
        }
        EventHandled::Handled
    }

    fn on_move(&mut self, event: &mut PlatformEvent) -> EventHandled {
        if !accepts_move(&event.raw) {
            return EventHandled::NotHandled;
        }
        let extracted = extract_points(&event.raw);
        if !extracted.keys().any(|id| self.interaction.start.contains(id)) {
            return EventHandled::NotHandled;
        }
        event.claim();
        for (id, point) in extracted.iter() {
            if self.interaction.update_at(*id, *point, event.timestamp) {
                self.assign_target(event, *id, *point);
            }
        }
        let mapped = self.map_interaction(&extracted, &[Aspect::Current, Aspect::Previous]);
        for target in mapped {
            if let Some(window) = self.windows.get_mut(&target) {
                self.scene.on_move(target, event, window);
                window.update_previous();
            }
        }
        self.interaction.update_previous();
        EventHandled::Handled
    }

    fn on_end(&mut self, event: &mut PlatformEvent) -> EventHandled {
        let extracted = extract_points(&event.raw);
        if !extracted.keys().any(|id| self.interaction.current.contains(id)) {
            return EventHandled::NotHandled;
        }
        event.claim();
        for (id, point) in extracted.iter() {
            self.interaction.stop_at(*id, *point, event.timestamp);
            let local = self.scene.map_position_to_point(*point);
            for window in self.windows.values_mut() {
                window.stop_at(*id, local, event.timestamp);
            }
        }
        let mapped = self.map_interaction(&extracted, &[Aspect::Ended]);
        for target in mapped {
            if let Some(window) = self.windows.get(&target) {
                self.scene.on_end(target, event, window);
            }
        }
        for id in extracted.keys() {
            self.finish(*id);
        }
        EventHandled::Handled
    }

    fn assign_target(&mut self, event: &PlatformEvent, id: PointerId, global: Point) {
        let local = self.scene.map_position_to_point(global);
        match self.scene.find_target(event, local, global) {
            Some(target) => {
                log::debug!("pointer {} assigned to {:?}", id, target);
                self.targets.insert(id, target);
                let config = self.config;
                self.windows
                    .entry(target)
                    .or_insert_with(|| InteractionPoints::new(config));
            }
            None => log::debug!("no target under pointer {}", id),
        }
    }

    fn finish(&mut self, id: PointerId) {
        self.interaction.finish(id);
        let Some(target) = self.targets.remove(&id) else {
            return;
        };
        if self.targets.values().any(|t| *t == target) {
            if let Some(window) = self.windows.get_mut(&target) {
                window.finish(id);
            }
        } else {
            self.windows.remove(&target);
        }
    }

    /// Copy the requested aspects of the central state into the windows of
    /// the targets owning the extracted pointers. Returns those targets in
    /// first-seen order.
    fn map_interaction(&mut self, extracted: &PointMap, aspects: &[Aspect]) -> Vec<M::Target> {
        let mut result: Vec<M::Target> = Vec::new();
        for id in extracted.keys() {
            let Some(target) = self.targets.get(id).copied() else {
                continue;
            };
            let Some(window) = self.windows.get_mut(&target) else {
                continue;
            };
            for aspect in aspects {
                let (source, sink) = match aspect {
                    Aspect::Current => (&self.interaction.current, &mut window.current),
                    Aspect::Previous => (&self.interaction.previous, &mut window.previous),
                    Aspect::Start => (&self.interaction.start, &mut window.start),
                    Aspect::Ended => (&self.interaction.ended, &mut window.ended),
                };
                if let Some(point) = source.get(id) {
                    sink.insert(*id, self.scene.map_position_to_point(point));
                }
                match aspect {
                    Aspect::Start => {
                        if let Some(at) = self.interaction.started_at(id) {
                            window.set_started_at(*id, at);
                        }
                    }
                    Aspect::Ended => {
                        if let Some(at) = self.interaction.ended_at(id) {
                            window.set_ended_at(*id, at);
                        }
                    }
                    _ => {}
                }
            }
            if !result.contains(&target) {
                result.push(target);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::events::TouchPoint;

    #[derive(Default)]
    struct Recorder {
        starts: usize,
        moves: Vec<Option<crate::input::gestures::GestureDelta>>,
        ends: usize,
        taps: usize,
        refuse: bool,
    }

    impl InteractionTarget for Recorder {
        fn capture(&mut self, _event: &PlatformEvent) -> bool {
            !self.refuse
        }

        fn on_start(&mut self, _event: &PlatformEvent, _interaction: &InteractionPoints) {
            self.starts += 1;
        }

        fn on_move(&mut self, _event: &PlatformEvent, interaction: &InteractionPoints) {
            self.moves.push(interaction.delta());
        }

        fn on_end(&mut self, _event: &PlatformEvent, interaction: &InteractionPoints) {
            self.ends += 1;
            if interaction.is_any_tap() {
                self.taps += 1;
            }
        }
    }

    fn mouse(phase: PointerPhase, x: f64, buttons: u16) -> PlatformEvent {
        PlatformEvent::new(RawEvent::Mouse {
            phase,
            position: Point::new(x, 0.0),
            buttons,
        })
    }

    fn touch(phase: PointerPhase, id: i64, x: f64) -> PlatformEvent {
        PlatformEvent::new(RawEvent::Touch {
            phase,
            changed: vec![TouchPoint::new(id, Point::new(x, 0.0))],
            targets: vec![],
        })
    }

    #[test]
    fn test_extract_points_per_family() {
        let up = RawEvent::Mouse {
            phase: PointerPhase::Move,
            position: Point::default(),
            buttons: 0,
        };
        assert!(extract_points(&up).is_empty());

        let stylus = RawEvent::Touch {
            phase: PointerPhase::Start,
            changed: vec![TouchPoint::stylus(4, Point::new(1.0, 1.0))],
            targets: vec![],
        };
        assert!(extract_points(&stylus).contains(&PointerId::Stylus));

        let pointer = RawEvent::Pointer {
            phase: PointerPhase::Start,
            pointer_id: 3,
            pointer_type: PointerKind::Pen,
            position: Point::default(),
            buttons: 1,
        };
        assert!(extract_points(&pointer).contains(&PointerId::Pointer(3)));

        let wheel = RawEvent::Wheel {
            position: Point::default(),
            delta: 1.0,
        };
        assert!(extract_points(&wheel).is_empty());
    }

    #[test]
    fn test_delegate_start_move_end() {
        let mut delegate = InteractionDelegate::new(Recorder::default(), GestureConfig::default());

        let mut start = mouse(PointerPhase::Start, 0.0, 1);
        assert_eq!(delegate.handle_event(&mut start), EventHandled::Handled);
        assert!(start.claimed && start.default_prevented);

        let mut hover = mouse(PointerPhase::Move, 50.0, 0);
        assert_eq!(delegate.handle_event(&mut hover), EventHandled::NotHandled);

        delegate.handle_event(&mut mouse(PointerPhase::Move, 20.0, 1));
        delegate.handle_event(&mut mouse(PointerPhase::End, 20.0, 0));

        let recorder = delegate.target();
        assert_eq!(recorder.starts, 1);
        assert_eq!(recorder.moves.len(), 1);
        assert_eq!(recorder.moves[0].unwrap().x, 20.0);
        assert_eq!(recorder.ends, 1);
        assert_eq!(recorder.taps, 0);
        assert!(delegate.interaction().start.is_empty());
    }

    #[test]
    fn test_delegate_reports_tap() {
        let mut delegate = InteractionDelegate::new(Recorder::default(), GestureConfig::default());
        delegate.handle_event(&mut touch(PointerPhase::Start, 1, 0.0));
        delegate.handle_event(&mut touch(PointerPhase::End, 1, 2.0));
        assert_eq!(delegate.target().taps, 1);
    }

    #[test]
    fn test_claimed_event_not_routed_twice() {
        let mut first = InteractionDelegate::new(Recorder::default(), GestureConfig::default());
        let mut second = InteractionDelegate::new(Recorder::default(), GestureConfig::default());
        let mut event = touch(PointerPhase::Start, 1, 0.0);
        first.handle_event(&mut event);
        assert_eq!(second.handle_event(&mut event), EventHandled::NotHandled);
        assert_eq!(second.target().starts, 0);
    }

    #[test]
    fn test_refused_capture_leaves_event_unclaimed() {
        let recorder = Recorder {
            refuse: true,
            ..Default::default()
        };
        let mut delegate = InteractionDelegate::new(recorder, GestureConfig::default());
        let mut event = touch(PointerPhase::Start, 1, 0.0);
        assert_eq!(delegate.handle_event(&mut event), EventHandled::NotHandled);
        assert!(!event.claimed);
    }

    #[test]
    fn test_malformed_event_ignored() {
        let mut delegate = InteractionDelegate::new(Recorder::default(), GestureConfig::default());
        let mut event = PlatformEvent::new(RawEvent::Touch {
            phase: PointerPhase::Start,
            changed: vec![],
            targets: vec![],
        });
        assert_eq!(delegate.handle_event(&mut event), EventHandled::NotHandled);
        assert_eq!(delegate.target().starts, 0);
    }

    /// Two cards side by side, split at x = 100
    #[derive(Default)]
    struct Cards {
        started: Vec<(u8, usize)>,
        moved: Vec<(u8, usize)>,
        ended: Vec<u8>,
        wheel: Vec<Option<u8>>,
    }

    impl InteractionMapperTarget for Cards {
        type Target = u8;

        fn find_target(&mut self, _event: &PlatformEvent, local: Point, _global: Point) -> Option<u8> {
            if local.x < 0.0 {
                None
            } else if local.x < 100.0 {
                Some(0)
            } else {
                Some(1)
            }
        }

        fn map_position_to_point(&self, point: Point) -> Point {
            Point::new(point.x - 10.0, point.y)
        }

        fn on_start(&mut self, target: u8, _event: &PlatformEvent, interaction: &InteractionPoints) {
            self.started.push((target, interaction.current.len()));
        }

        fn on_move(&mut self, target: u8, _event: &PlatformEvent, interaction: &InteractionPoints) {
            self.moved.push((target, interaction.current.len()));
        }

        fn on_end(&mut self, target: u8, _event: &PlatformEvent, _interaction: &InteractionPoints) {
            self.ended.push(target);
        }

        fn on_mouse_wheel(&mut self, target: Option<u8>, _event: &PlatformEvent) -> EventHandled {
            self.wheel.push(target);
            if target == Some(1) {
                EventHandled::Handled
            } else {
                EventHandled::NotHandled
            }
        }
    }

    #[test]
    fn test_mapper_windows_per_target() {
        let mut mapper = InteractionMapper::new(Cards::default(), GestureConfig::default());
        mapper.handle_event(&mut touch(PointerPhase::Start, 1, 20.0));
        mapper.handle_event(&mut touch(PointerPhase::Start, 2, 150.0));
        mapper.handle_event(&mut touch(PointerPhase::Start, 3, 40.0));

        assert_eq!(mapper.target_of(&PointerId::Touch(1)), Some(0));
        assert_eq!(mapper.target_of(&PointerId::Touch(2)), Some(1));
        let left = mapper.window(&0).unwrap();
        assert_eq!(left.current.len(), 2);
        assert_eq!(left.current.get(&PointerId::Touch(1)), Some(Point::new(10.0, 0.0)));
        assert_eq!(mapper.window(&1).unwrap().current.len(), 1);

        mapper.handle_event(&mut touch(PointerPhase::Move, 2, 160.0));
        assert_eq!(mapper.scene().moved, vec![(1, 1)]);

        mapper.handle_event(&mut touch(PointerPhase::End, 1, 20.0));
        assert_eq!(mapper.scene().ended, vec![0]);
        // card 0 is still referenced by touch 3
        assert!(mapper.window(&0).is_some());

        mapper.handle_event(&mut touch(PointerPhase::End, 3, 40.0));
        assert!(mapper.window(&0).is_none());
        assert!(mapper.window(&1).is_some());
    }

    #[test]
    fn test_mapper_wheel_falls_back_to_scene() {
        let mut mapper = InteractionMapper::new(Cards::default(), GestureConfig::default());
        let wheel = |x: f64| {
            PlatformEvent::new(RawEvent::Wheel {
                position: Point::new(x, 0.0),
                delta: 1.0,
            })
        };
        assert_eq!(mapper.handle_event(&mut wheel(150.0)), EventHandled::Handled);
        mapper.handle_event(&mut wheel(50.0));
        assert_eq!(mapper.scene().wheel, vec![Some(1), Some(0), None]);
    }
}
