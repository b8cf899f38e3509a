//! Configuration system for gesture, throw and tile loading behavior
//!
//! Options are grouped per subsystem and resolved from a [`ViewerProfile`]
//! preset, or loaded from JSON for exhibition deployments.

use crate::animation::easing::EasingFunction;
use crate::constants::*;
use crate::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ViewerProfile {
    #[default]
    Balanced,
    LowBandwidth,
    HighQuality,
    Custom(ViewerOptions),
}

impl ViewerProfile {
    pub fn resolve(&self) -> ViewerOptions {
        match self {
            Self::Balanced => ViewerOptions {
                gesture: GestureConfig::default(),
                throw: ThrowConfig::default(),
                tiles: TileLoadingConfig::default(),
            },
            Self::LowBandwidth => ViewerOptions {
                gesture: GestureConfig::default(),
                throw: ThrowConfig {
                    damping: 0.9,
                    ..ThrowConfig::default()
                },
                tiles: TileLoadingConfig {
                    batch_size: 2,
                    resolution: 0.75,
                    fetch_mode: FetchMode::InProcess,
                    ..TileLoadingConfig::default()
                },
            },
            Self::HighQuality => ViewerOptions {
                gesture: GestureConfig::default(),
                throw: ThrowConfig {
                    damping: 0.97,
                    ..ThrowConfig::default()
                },
                tiles: TileLoadingConfig {
                    batch_size: 16,
                    resolution: 2.0,
                    fetch_mode: FetchMode::Worker,
                    ..TileLoadingConfig::default()
                },
            },
            Self::Custom(options) => options.clone(),
        }
    }
}

/// All tunables of a viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewerOptions {
    pub gesture: GestureConfig,
    pub throw: ThrowConfig,
    pub tiles: TileLoadingConfig,
}

impl ViewerOptions {
    /// Parse options from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Thresholds for tap and long-press classification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GestureConfig {
    /// Maximum travel between start and release, in pixels
    pub tap_distance: f64,
    /// Minimum contact duration of a long press, in milliseconds
    pub long_press_ms: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            tap_distance: TAP_DISTANCE,
            long_press_ms: LONG_PRESS_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ThrowConfig {
    pub damping: f64,
    pub collision_damping: f64,
    /// Minimum overlap with the container, in pixels
    pub visibility: f64,
    pub buffer: usize,
    pub window_ms: f64,
    pub epsilon: f64,
    pub movable_x: bool,
    pub movable_y: bool,
}

impl Default for ThrowConfig {
    fn default() -> Self {
        Self {
            damping: THROW_DAMPING,
            collision_damping: COLLISION_DAMPING,
            visibility: THROW_VISIBILITY,
            buffer: VELOCITY_BUFFER,
            window_ms: VELOCITY_WINDOW_MS,
            epsilon: THROW_EPSILON,
            movable_x: true,
            movable_y: true,
        }
    }
}

/// How tile bytes are fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchMode {
    /// Batches issued from the main context
    InProcess,
    /// A background worker fetches and decodes
    Worker,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TileLoadingConfig {
    pub batch_size: usize,
    pub fetch_mode: FetchMode,
    /// Lowest level kept in the quad-tree; `None` means the pyramid's base level
    pub minimum_level: Option<u32>,
    /// Device pixel ratio used when choosing a level for a scale
    pub resolution: f64,
    pub fade_ms: f64,
    pub fade_easing: EasingFunction,
    /// Keep the base level resident as the always-available fallback
    pub keep_base_layer: bool,
    /// Compressed texture formats the platform can upload directly
    pub platform_formats: Vec<String>,
}

impl Default for TileLoadingConfig {
    fn default() -> Self {
        Self {
            batch_size: TILE_BATCH_SIZE,
            fetch_mode: FetchMode::InProcess,
            minimum_level: None,
            resolution: 1.0,
            fade_ms: TILE_FADE_MS,
            fade_easing: EasingFunction::default(),
            keep_base_layer: true,
            platform_formats: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_resolve() {
        let balanced = ViewerProfile::Balanced.resolve();
        assert_eq!(balanced.tiles.batch_size, TILE_BATCH_SIZE);
        assert_eq!(balanced.gesture.tap_distance, TAP_DISTANCE);

        let hq = ViewerProfile::HighQuality.resolve();
        assert_eq!(hq.tiles.fetch_mode, FetchMode::Worker);
        assert!(hq.tiles.batch_size > balanced.tiles.batch_size);
    }

    #[test]
    fn test_options_from_partial_json() {
        let options = ViewerOptions::from_json(
            r#"{"gesture": {"tapDistance": 20}, "tiles": {"fetchMode": "worker", "batchSize": 4}}"#,
        )
        .unwrap();
        assert_eq!(options.gesture.tap_distance, 20.0);
        assert_eq!(options.gesture.long_press_ms, LONG_PRESS_MS);
        assert_eq!(options.tiles.fetch_mode, FetchMode::Worker);
        assert_eq!(options.tiles.batch_size, 4);
        assert_eq!(options.throw, ThrowConfig::default());
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(ViewerOptions::from_json("{not json").is_err());
    }
}
