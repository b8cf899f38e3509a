//! Gesture driven deep-zoom viewer
//!
//! Glues the interaction pipeline to the viewport: gesture deltas become
//! transform events, released drags continue as throws, and every emitted
//! transform is applied to the [`ViewportController`] before listeners see it.

use crate::animation::throw::{ThrowPhysics, ThrowStep, ThrowTarget};
use crate::constants::WHEEL_ZOOM_FACTOR;
use crate::core::config::{ViewerOptions, ViewerProfile};
use crate::core::geo::{Point, Polygon, Rect};
use crate::core::viewport::{ViewportController, WorldTransform};
use crate::input::events::{EventHandled, PlatformEvent, RawEvent, TransformEvent};
use crate::input::handler::{InteractionDelegate, InteractionTarget};
use crate::input::pointers::InteractionPoints;
use crate::prelude::Arc;
use crate::tiles::pyramid::PyramidDescriptor;
use crate::tiles::source::TileSource;
use crate::Result;

type TransformListener = Box<dyn FnMut(&TransformEvent) + Send>;
type PointListener = Box<dyn FnMut(Point) + Send>;

/// The image as seen by the throw animation
struct ThrowSurface {
    transform: WorldTransform,
    image: Rect,
    viewport: Rect,
    moved: Point,
}

impl ThrowSurface {
    fn new(controller: &ViewportController) -> Self {
        let geometry = controller.geometry();
        let (w, h) = geometry.get_dimensions(geometry.max_level());
        let size = controller.size();
        Self {
            transform: *controller.transform(),
            image: Rect::new(0.0, 0.0, w as f64, h as f64),
            viewport: Rect::new(0.0, 0.0, size.x, size.y),
            moved: Point::default(),
        }
    }
}

impl ThrowTarget for ThrowSurface {
    fn polygon(&self) -> Polygon {
        let mut polygon = Polygon::new(self.transform.to_screen(&self.image.center()));
        for corner in self.image.corners() {
            polygon.add_absolute_point(self.transform.to_screen(&corner));
        }
        polygon
    }

    fn container_polygon(&self) -> Option<Polygon> {
        Some(self.viewport.to_polygon())
    }

    fn container_bounds(&self) -> Rect {
        self.viewport
    }

    fn move_by(&mut self, delta: Point) {
        self.transform.scroll = self.transform.scroll.add(&delta);
        self.moved = self.moved.add(&delta);
    }
}

pub struct Viewer {
    controller: ViewportController,
    throw: ThrowPhysics,
    options: ViewerOptions,
    listeners: Vec<TransformListener>,
    tap_listeners: Vec<PointListener>,
    long_press_listeners: Vec<PointListener>,
}

impl Viewer {
    pub fn new(
        descriptor: PyramidDescriptor,
        size: Point,
        profile: &ViewerProfile,
        source: Arc<dyn TileSource>,
    ) -> Result<Self> {
        let options = profile.resolve();
        let controller =
            ViewportController::with_source(descriptor, size, options.tiles.clone(), source)?;
        Ok(Self::with_controller(controller, options))
    }

    pub fn with_controller(controller: ViewportController, options: ViewerOptions) -> Self {
        Self {
            controller,
            throw: ThrowPhysics::new(options.throw),
            options,
            listeners: Vec::new(),
            tap_listeners: Vec::new(),
            long_press_listeners: Vec::new(),
        }
    }

    /// Wrap the viewer so it receives platform events directly.
    pub fn into_delegate(self) -> InteractionDelegate<Viewer> {
        let gesture = self.options.gesture;
        InteractionDelegate::new(self, gesture)
    }

    pub fn options(&self) -> &ViewerOptions {
        &self.options
    }

    pub fn controller(&self) -> &ViewportController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut ViewportController {
        &mut self.controller
    }

    pub fn is_throwing(&self) -> bool {
        self.throw.is_animating()
    }

    /// Called with every transform applied to the viewport
    pub fn on_transform<F>(&mut self, listener: F)
    where
        F: FnMut(&TransformEvent) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Called with the pyramid position of every tap
    pub fn on_tap<F>(&mut self, listener: F)
    where
        F: FnMut(Point) + Send + 'static,
    {
        self.tap_listeners.push(Box::new(listener));
    }

    pub fn on_long_press<F>(&mut self, listener: F)
    where
        F: FnMut(Point) + Send + 'static,
    {
        self.long_press_listeners.push(Box::new(listener));
    }

    /// Load the tiles for the initial view.
    pub fn start(&mut self) -> Result<()> {
        self.controller.update()
    }

    /// Apply `event` to the viewport and notify listeners.
    pub fn emit(&mut self, event: TransformEvent) -> Result<()> {
        self.controller.apply_transform(&event)?;
        for listener in self.listeners.iter_mut() {
            listener(&event);
        }
        Ok(())
    }

    fn emit_logged(&mut self, event: TransformEvent) {
        if let Err(err) = self.emit(event) {
            log::warn!("transform not applied: {}", err);
        }
    }

    /// Advance a running throw and the tile pipeline by `dt_ms`.
    /// Returns the number of tiles that became resident.
    pub fn tick(&mut self, dt_ms: f64) -> Result<usize> {
        if self.throw.is_animating() {
            let mut surface = ThrowSurface::new(&self.controller);
            match self.throw.step(&mut surface, dt_ms) {
                ThrowStep::Moved { .. } => {
                    self.emit(TransformEvent::translation(surface.moved, true))?;
                }
                ThrowStep::Finished { .. } => {
                    self.emit(TransformEvent::translation(surface.moved, false))?;
                }
                ThrowStep::Idle => {}
            }
        }
        Ok(self.controller.tick(dt_ms))
    }

    fn notify_points(&mut self, interaction: &InteractionPoints) {
        let transform = *self.controller.transform();
        for (id, point) in interaction.ended.iter() {
            let at = transform.to_pyramid(point);
            if interaction.is_tap(id) {
                log::debug!("tap by {} at {:?}", id, at);
                for listener in self.tap_listeners.iter_mut() {
                    listener(at);
                }
            } else if interaction.is_long_press(id) {
                log::debug!("long press by {} at {:?}", id, at);
                for listener in self.long_press_listeners.iter_mut() {
                    listener(at);
                }
            }
        }
    }
}

impl InteractionTarget for Viewer {
    fn on_start(&mut self, event: &PlatformEvent, _interaction: &InteractionPoints) {
        self.throw.kill();
        self.throw.observe(event.timestamp);
    }

    fn on_move(&mut self, event: &PlatformEvent, interaction: &InteractionPoints) {
        let Some(delta) = interaction.delta() else {
            return;
        };
        self.throw.add_velocity(delta.translation(), event.timestamp);
        if delta.is_zoom() {
            self.controller.set_anchor(Some(delta.about));
        }
        self.emit_logged(TransformEvent::from_delta(&delta, true));
    }

    fn on_end(&mut self, event: &PlatformEvent, interaction: &InteractionPoints) {
        self.notify_points(interaction);
        if !interaction.is_finished() {
            return;
        }
        let mut surface = ThrowSurface::new(&self.controller);
        self.throw.start_throw(&mut surface, event.timestamp);
        if surface.moved != Point::default() {
            self.emit_logged(TransformEvent::translation(surface.moved, true));
        }
    }

    fn on_mouse_wheel(&mut self, event: &PlatformEvent) -> EventHandled {
        let RawEvent::Wheel { position, delta } = event.raw else {
            return EventHandled::NotHandled;
        };
        if delta == 0.0 {
            return EventHandled::NotHandled;
        }
        let scale = if delta < 0.0 {
            WHEEL_ZOOM_FACTOR
        } else {
            1.0 / WHEEL_ZOOM_FACTOR
        };
        self.throw.kill();
        self.controller.set_anchor(Some(position));
        self.emit_logged(TransformEvent::zoom(scale, position));
        EventHandled::Handled
    }
}
