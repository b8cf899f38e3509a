pub mod easing;
pub mod throw;

// Re-export commonly used types and functions for convenience
pub use easing::EasingFunction;
pub use throw::{ThrowPhysics, ThrowStep, ThrowTarget};
