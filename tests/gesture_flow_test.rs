use deepzoom::prelude::*;
use std::sync::Mutex;

/// Gesture flows from raw platform events through the dispatcher into
/// targets, as a touch table would produce them
#[cfg(test)]
mod gesture_flow_tests {
    use super::*;
    use approx::assert_relative_eq;

    fn touch(phase: PointerPhase, changed: Vec<TouchPoint>, targets: Vec<TouchPoint>, at: Instant) -> PlatformEvent {
        PlatformEvent::at(
            RawEvent::Touch {
                phase,
                changed,
                targets,
            },
            at,
        )
    }

    fn viewer() -> Viewer {
        Viewer::new(
            PyramidDescriptor::new(8192, 4096, 256, "jpg"),
            Point::new(1024.0, 768.0),
            &ViewerProfile::Balanced,
            Arc::new(MemoryTileSource::new()),
        )
        .unwrap()
    }

    /// A two finger spread doubles the zoom and anchors tile loading
    #[tokio::test]
    async fn test_pinch_zoom_through_delegate() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut viewer = viewer();
        let sink = events.clone();
        viewer.on_transform(move |e| sink.lock().unwrap().push(*e));
        let zoom_before = viewer.controller().transform().zoom;
        let mut delegate = viewer.into_delegate();

        let t0 = Instant::now();
        let a = TouchPoint::new(1, Point::new(400.0, 300.0));
        let b = TouchPoint::new(2, Point::new(500.0, 300.0));
        let mut start = touch(PointerPhase::Start, vec![a.clone(), b.clone()], vec![a.clone(), b.clone()], t0);
        assert_eq!(delegate.handle_event(&mut start), EventHandled::Handled);
        assert!(start.claimed && start.default_prevented);

        let b_moved = TouchPoint::new(2, Point::new(600.0, 300.0));
        let mut spread = touch(
            PointerPhase::Move,
            vec![b_moved.clone()],
            vec![a.clone(), b_moved.clone()],
            t0 + Duration::from_millis(16),
        );
        assert_eq!(delegate.handle_event(&mut spread), EventHandled::Handled);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_relative_eq!(events[0].scale, 2.0);
        assert!(events[0].fast);
        let controller = delegate.target().controller();
        assert_relative_eq!(controller.transform().zoom, zoom_before * 2.0);
        assert_eq!(controller.anchor(), Some(events[0].about));
    }

    /// The same physical contact is never routed twice
    #[tokio::test]
    async fn test_claimed_event_not_rerouted() {
        let mut first = viewer().into_delegate();
        let mut second = viewer().into_delegate();
        let p = TouchPoint::new(9, Point::new(10.0, 10.0));
        let mut event = touch(PointerPhase::Start, vec![p.clone()], vec![p], Instant::now());
        assert_eq!(first.handle_event(&mut event), EventHandled::Handled);
        assert_eq!(second.handle_event(&mut event), EventHandled::NotHandled);
        assert!(second.interaction().current.is_empty());
    }

    /// Two cards on one table, each with its own finger
    #[derive(Default)]
    struct Table {
        starts: Vec<(u8, usize)>,
        moves: Vec<(u8, Point)>,
        ends: Vec<u8>,
    }

    impl InteractionMapperTarget for Table {
        type Target = u8;

        fn find_target(&mut self, _event: &PlatformEvent, local: Point, _global: Point) -> Option<u8> {
            if local.x < 500.0 {
                Some(0)
            } else if local.x < 1000.0 {
                Some(1)
            } else {
                None
            }
        }

        fn on_start(&mut self, target: u8, _event: &PlatformEvent, interaction: &InteractionPoints) {
            self.starts.push((target, interaction.current.len()));
        }

        fn on_move(&mut self, target: u8, _event: &PlatformEvent, interaction: &InteractionPoints) {
            if let Some(delta) = interaction.delta() {
                self.moves.push((target, delta.translation()));
            }
        }

        fn on_end(&mut self, target: u8, _event: &PlatformEvent, _interaction: &InteractionPoints) {
            self.ends.push(target);
        }
    }

    #[test]
    fn test_mapper_windows_per_target() {
        let mut mapper = InteractionMapper::new(Table::default(), GestureConfig::default());
        let t0 = Instant::now();
        let left = TouchPoint::new(1, Point::new(100.0, 100.0));
        let right = TouchPoint::new(2, Point::new(700.0, 100.0));
        mapper.handle_event(&mut touch(
            PointerPhase::Start,
            vec![left.clone(), right.clone()],
            vec![left.clone(), right.clone()],
            t0,
        ));
        assert_eq!(mapper.target_of(&PointerId::Touch(1)), Some(0));
        assert_eq!(mapper.target_of(&PointerId::Touch(2)), Some(1));
        assert_eq!(mapper.window(&0).unwrap().current.len(), 1);
        assert_eq!(mapper.window(&1).unwrap().current.len(), 1);

        let right_moved = TouchPoint::new(2, Point::new(730.0, 110.0));
        mapper.handle_event(&mut touch(
            PointerPhase::Move,
            vec![right_moved.clone()],
            vec![left.clone(), right_moved.clone()],
            t0 + Duration::from_millis(16),
        ));
        let moves = &mapper.scene().moves;
        // The untouched card sees a zero move, the dragged one only its own finger
        let right_move = moves.iter().find(|(t, _)| *t == 1).unwrap().1;
        assert_eq!(right_move, Point::new(30.0, 10.0));
        assert!(moves
            .iter()
            .filter(|(t, _)| *t == 0)
            .all(|(_, d)| *d == Point::default()));

        mapper.handle_event(&mut touch(
            PointerPhase::End,
            vec![right_moved.clone()],
            vec![left.clone()],
            t0 + Duration::from_millis(32),
        ));
        assert_eq!(mapper.scene().ends, vec![1]);
        assert!(mapper.window(&1).is_none());
        assert!(mapper.window(&0).is_some());
    }

    /// Tap and long press never both hold; travel equal to the threshold is neither
    #[test]
    fn test_tap_long_press_exclusive() {
        let config = GestureConfig::default();
        let t0 = Instant::now();
        for distance in [0.0, 5.0, config.tap_distance - 0.01, config.tap_distance, 25.0] {
            for duration in [0u64, 100, 499, 500, 501, 2000] {
                let mut points = InteractionPoints::new(config);
                let id = PointerId::Touch(1);
                points.update_at(id, Point::new(0.0, 0.0), t0);
                points.stop_at(id, Point::new(distance, 0.0), t0 + Duration::from_millis(duration));
                let tap = points.is_tap(&id);
                let long = points.is_long_press(&id);
                assert!(!(tap && long), "d={} t={}", distance, duration);
                if distance >= config.tap_distance {
                    assert!(!tap && !long);
                } else {
                    assert_eq!(tap, (duration as f64) < config.long_press_ms);
                    assert_eq!(long, (duration as f64) >= config.long_press_ms);
                }
            }
        }
    }

    /// Stylus contacts share one pointer id
    #[test]
    fn test_stylus_touch_is_stylus() {
        let recognizer = GestureRecognizer::default();
        let pen = TouchPoint::stylus(44, Point::new(1.0, 1.0));
        assert!(recognizer.is_stylus(&pen.pointer_id()));
        assert!(!recognizer.is_stylus(&PointerId::Touch(44)));
    }
}
