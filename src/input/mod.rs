pub mod events;
pub mod gestures;
pub mod handler;
pub mod pointers;

// Re-export the essential types
pub use events::{
    EventHandled, PlatformEvent, PointerId, PointerKind, PointerPhase, RawEvent, TouchPoint,
    TransformEvent,
};
pub use gestures::{GestureDelta, GestureRecognizer};
pub use handler::{InteractionDelegate, InteractionMapper, InteractionMapperTarget, InteractionTarget};
pub use pointers::{InteractionPoints, PointMap};
