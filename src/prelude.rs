//! Prelude module for common deepzoom types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use deepzoom::prelude::*;`

pub use crate::core::{
    config::{GestureConfig, ThrowConfig, TileLoadingConfig, ViewerOptions, ViewerProfile},
    geo::{Angle, Point, Polygon, Rect},
    viewer::Viewer,
    viewport::{ChangedTiles, ViewportController, WorldTransform},
};

pub use crate::input::{
    events::{
        EventHandled, PlatformEvent, PointerId, PointerKind, PointerPhase, RawEvent,
        TouchPoint, TransformEvent,
    },
    gestures::{GestureDelta, GestureRecognizer},
    handler::{InteractionDelegate, InteractionMapper, InteractionMapperTarget, InteractionTarget},
    pointers::{InteractionPoints, PointMap},
};

pub use crate::animation::throw::{ThrowPhysics, ThrowStep, ThrowTarget};

pub use crate::layers::tile_level::{TileLevelLayer, TileRecord};

pub use crate::tiles::{
    loader::{BatchedLoader, FetchOutcome, TileFetcher, TileTransport},
    pyramid::{PyramidClip, PyramidDescriptor, PyramidGeometry, PyramidTopology},
    quadtree::{TileCache, TileQuadNode},
    source::{HttpTileSource, MemoryTileSource, TileSource},
    worker::{WorkerLoader, WorkerRequest, WorkerResponse},
    TileKey, TileRequest, TileTexture,
};

pub use crate::runtime::{spawn, AsyncHandle};

pub use crate::{Error as ZoomError, Result};

pub use std::{collections::VecDeque, sync::Arc, time::Duration};

pub use instant::Instant;

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet, FxHasher};

pub use futures::Future;
pub use std::pin::Pin;
