use crate::core::geo::Point;
use crate::input::gestures::GestureDelta;
use crate::prelude::Instant;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key of one active contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum PointerId {
    /// The synthetic key used for a pressed mouse
    Mouse,
    Pointer(i32),
    Touch(i64),
    /// Touches reported with a stylus touch type share one key
    Stylus,
}

impl PointerId {
    pub fn is_stylus(&self) -> bool {
        matches!(self, PointerId::Stylus)
    }
}

impl fmt::Display for PointerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointerId::Mouse => write!(f, "mouse"),
            PointerId::Pointer(id) => write!(f, "pointer:{}", id),
            PointerId::Touch(id) => write!(f, "touch:{}", id),
            PointerId::Stylus => write!(f, "stylus"),
        }
    }
}

/// Device reported by a pointer event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerKind {
    Mouse,
    Pen,
    Touch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerPhase {
    Start,
    Move,
    End,
    Cancel,
    /// The pointer left the input surface
    Leave,
}

impl PointerPhase {
    pub fn is_end(&self) -> bool {
        matches!(self, PointerPhase::End | PointerPhase::Cancel | PointerPhase::Leave)
    }
}

/// Individual touch point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchPoint {
    pub identifier: i64,
    pub position: Point,
    #[serde(default)]
    pub stylus: bool,
}

impl TouchPoint {
    pub fn new(identifier: i64, position: Point) -> Self {
        Self {
            identifier,
            position,
            stylus: false,
        }
    }

    pub fn stylus(identifier: i64, position: Point) -> Self {
        Self {
            identifier,
            position,
            stylus: true,
        }
    }

    pub fn pointer_id(&self) -> PointerId {
        if self.stylus {
            PointerId::Stylus
        } else {
            PointerId::Touch(self.identifier)
        }
    }
}

/// Platform input families, matched exhaustively by the dispatcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RawEvent {
    Mouse {
        phase: PointerPhase,
        position: Point,
        /// Bit mask of pressed buttons
        buttons: u16,
    },
    Pointer {
        phase: PointerPhase,
        pointer_id: i32,
        pointer_type: PointerKind,
        position: Point,
        buttons: u16,
    },
    Touch {
        phase: PointerPhase,
        /// Touches that changed with this event
        changed: Vec<TouchPoint>,
        /// All touches still on the target element
        #[serde(default)]
        targets: Vec<TouchPoint>,
    },
    Wheel {
        position: Point,
        /// Positive values scroll away from the user
        delta: f64,
    },
}

impl RawEvent {
    pub fn phase(&self) -> Option<PointerPhase> {
        match self {
            RawEvent::Mouse { phase, .. }
            | RawEvent::Pointer { phase, .. }
            | RawEvent::Touch { phase, .. } => Some(*phase),
            RawEvent::Wheel { .. } => None,
        }
    }

    /// Position of the event, or of its first changed touch
    pub fn position(&self) -> Option<Point> {
        match self {
            RawEvent::Mouse { position, .. }
            | RawEvent::Pointer { position, .. }
            | RawEvent::Wheel { position, .. } => Some(*position),
            RawEvent::Touch { changed, .. } => changed.first().map(|t| t.position),
        }
    }

    /// Rejects shapes the dispatcher cannot route.
    pub fn validate(&self) -> std::result::Result<(), &'static str> {
        match self {
            RawEvent::Mouse { position, .. } | RawEvent::Pointer { position, .. } => {
                if !position.is_finite() {
                    return Err("non-finite position");
                }
            }
            RawEvent::Touch { changed, targets, .. } => {
                if changed.is_empty() {
                    return Err("touch event without changed touches");
                }
                if changed
                    .iter()
                    .chain(targets.iter())
                    .any(|t| !t.position.is_finite())
                {
                    return Err("non-finite touch position");
                }
            }
            RawEvent::Wheel { position, delta } => {
                if !position.is_finite() || !delta.is_finite() {
                    return Err("non-finite wheel event");
                }
            }
        }
        Ok(())
    }
}

/// A raw event together with the routing flags of the platform
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformEvent {
    pub raw: RawEvent,
    pub timestamp: Instant,
    pub default_prevented: bool,
    /// Set once a dispatcher has taken the event
    pub claimed: bool,
}

impl PlatformEvent {
    pub fn new(raw: RawEvent) -> Self {
        Self::at(raw, Instant::now())
    }

    pub fn at(raw: RawEvent, timestamp: Instant) -> Self {
        Self {
            raw,
            timestamp,
            default_prevented: false,
            claimed: false,
        }
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    /// Prevent default handling and mark the event as routed.
    pub fn claim(&mut self) {
        self.default_prevented = true;
        self.claimed = true;
    }
}

/// Whether an event was handled
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventHandled {
    Handled,
    NotHandled,
}

/// Transform produced for the rendering collaborator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformEvent {
    pub translate: Point,
    pub scale: f64,
    pub rotate: f64,
    pub about: Point,
    /// Cheap intermediate update during a gesture or throw
    pub fast: bool,
}

impl TransformEvent {
    pub fn from_delta(delta: &GestureDelta, fast: bool) -> Self {
        Self {
            translate: Point::new(delta.x, delta.y),
            scale: delta.zoom,
            rotate: delta.rotate,
            about: delta.about,
            fast,
        }
    }

    pub fn translation(translate: Point, fast: bool) -> Self {
        Self {
            translate,
            scale: 1.0,
            rotate: 0.0,
            about: Point::default(),
            fast,
        }
    }

    pub fn zoom(scale: f64, about: Point) -> Self {
        Self {
            translate: Point::default(),
            scale,
            rotate: 0.0,
            about,
            fast: false,
        }
    }
}
