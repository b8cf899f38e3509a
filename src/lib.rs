//! # deepzoom
//!
//! The gesture-driven tile-pyramid core of an interactive exhibition viewer.
//!
//! Raw pointer, touch and wheel input is turned into pan/zoom/rotate deltas and
//! tap/long-press classifications, released drags continue as damped "throws"
//! that bounce off the container edges, and a level-of-detail quad-tree decides
//! which tiles of a gigapixel image pyramid to fetch, keep or drop as the view
//! changes. Rendering is left to the caller: the core only decides which tiles
//! should exist and where transforms move them.

pub mod animation;
pub mod core;
pub mod input;
pub mod layers;
pub mod prelude;
pub mod runtime;
pub mod tiles;
pub use crate::core::constants;

// Re-export public API
pub use core::{
    config::{ViewerOptions, ViewerProfile},
    geo::{Point, Polygon},
    viewer::Viewer,
    viewport::{ViewportController, WorldTransform},
};

pub use input::{
    events::{PlatformEvent, PointerId, RawEvent, TransformEvent},
    gestures::{GestureDelta, GestureRecognizer},
    handler::{InteractionDelegate, InteractionMapper},
    pointers::InteractionPoints,
};

pub use animation::throw::ThrowPhysics;

pub use layers::tile_level::{TileLevelLayer, TileRecord};

pub use tiles::{
    loader::TileFetcher,
    pyramid::{PyramidDescriptor, PyramidGeometry},
    quadtree::TileCache,
    TileKey,
};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, ZoomError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum ZoomError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid pyramid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Failed to fetch tile {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("Worker error: {0}")]
    Worker(String),
}

/// Error type alias for convenience
pub type Error = ZoomError;

/// Install `env_logger` as the `log` backend. Safe to call more than once.
#[cfg(feature = "debug")]
pub fn init_logging() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}
