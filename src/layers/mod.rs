pub mod tile_level;

pub use tile_level::{TileLevelLayer, TileRecord};
