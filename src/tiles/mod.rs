pub mod loader;
pub mod pyramid;
pub mod quadtree;
pub mod source;
pub mod worker;

use serde::{Deserialize, Serialize};
use std::fmt;

// Re-exports for convenience
pub use loader::{BatchedLoader, FetchOutcome, TileFetcher, TileTransport};
pub use pyramid::{PyramidClip, PyramidDescriptor, PyramidGeometry, PyramidTopology};
pub use quadtree::{TileCache, TileQuadNode};
pub use source::{HttpTileSource, MemoryTileSource, TileSource};
pub use worker::{WorkerLoader, WorkerRequest, WorkerResponse};

/// File extensions of GPU texture containers that can be uploaded without decoding
const COMPRESSED_FORMATS: &[&str] = &["ktx", "ktx2", "dds", "pvr", "basis", "astc"];

/// Address of one tile in the pyramid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKey {
    pub level: u32,
    pub col: u32,
    pub row: u32,
}

impl TileKey {
    pub fn new(level: u32, col: u32, row: u32) -> Self {
        Self { level, col, row }
    }

    /// The tile one level down covering this one
    pub fn parent(&self) -> Option<TileKey> {
        if self.level == 0 {
            return None;
        }
        Some(TileKey::new(self.level - 1, self.col / 2, self.row / 2))
    }

    /// Slot of this tile among its parent's four children
    pub fn quadrant(&self) -> usize {
        (self.col % 2 + 2 * (self.row % 2)) as usize
    }

    pub fn children(&self) -> [TileKey; 4] {
        let (c, r, l) = (self.col * 2, self.row * 2, self.level + 1);
        [
            TileKey::new(l, c, r),
            TileKey::new(l, c + 1, r),
            TileKey::new(l, c, r + 1),
            TileKey::new(l, c + 1, r + 1),
        ]
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}_{}", self.level, self.col, self.row)
    }
}

/// A tile waiting to be fetched
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileRequest {
    pub key: TileKey,
    pub url: String,
}

impl TileRequest {
    pub fn new(key: TileKey, url: impl Into<String>) -> Self {
        Self {
            key,
            url: url.into(),
        }
    }
}

/// Loaded tile bytes handed to the rendering collaborator
#[derive(Debug, Clone, PartialEq)]
pub struct TileTexture {
    pub key: TileKey,
    pub url: String,
    pub bytes: Vec<u8>,
    /// Set when `bytes` hold a compressed GPU texture instead of an image file
    pub compressed: Option<String>,
}

/// Compressed texture container named by the url's extension, if any.
pub fn compressed_format(url: &str) -> Option<String> {
    let path = url.split(|c: char| c == '?' || c == '#').next().unwrap_or(url);
    let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
    COMPRESSED_FORMATS
        .iter()
        .find(|f| **f == ext)
        .map(|f| f.to_string())
}
