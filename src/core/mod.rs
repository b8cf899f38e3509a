pub mod config;
pub mod constants;
pub mod geo;
pub mod viewer;
pub mod viewport;

pub use config::{FetchMode, GestureConfig, ThrowConfig, TileLoadingConfig, ViewerOptions, ViewerProfile};
pub use geo::{Angle, Point, Polygon, Rect};
pub use viewer::Viewer;
pub use viewport::{ChangedTiles, ViewportController, WorldTransform};
