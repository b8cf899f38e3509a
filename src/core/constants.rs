//! Core constants for gesture recognition, throwing and tile loading.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

/// Maximum pointer travel (px) between start and release for a tap.
pub const TAP_DISTANCE: f64 = 10.0;

/// Contacts held at least this long (ms) are long presses rather than taps.
pub const LONG_PRESS_MS: f64 = 500.0;

/// Per-frame velocity damping of a free throw.
pub const THROW_DAMPING: f64 = 0.95;

/// Damping applied on the frame a throw hits the container edge.
pub const COLLISION_DAMPING: f64 = 0.5;

/// Minimum on-screen overlap (px) a thrown object must keep with its container.
pub const THROW_VISIBILITY: f64 = 44.0;

/// Number of recent gesture samples used to estimate release velocity.
pub const VELOCITY_BUFFER: usize = 5;

/// Time window (ms) averaged by the release velocity estimate.
pub const VELOCITY_WINDOW_MS: f64 = 30.0;

/// Velocity (px/ms) below which a throw is considered at rest.
pub const THROW_EPSILON: f64 = 0.01;

/// Upper bound of recentering nudges applied in a single boundary response.
pub const MAX_RECENTER_STEPS: usize = 10_000;

/// Concurrent tile requests per batch.
pub const TILE_BATCH_SIZE: usize = 8;

/// Default tile edge length in pixels.
pub const TILE_SIZE: u32 = 256;

/// Duration (ms) of the tile fade-in.
pub const TILE_FADE_MS: f64 = 250.0;

/// Zoom factor applied per wheel notch.
pub const WHEEL_ZOOM_FACTOR: f64 = 1.1;

/// Default URL template for Deep Zoom style pyramids.
pub const DEFAULT_URL_TEMPLATE: &str = "{path}/{level}/{column}_{row}.{format}";
