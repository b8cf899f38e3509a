//! Pure math over a tile pyramid descriptor
//!
//! Level `max_level` holds the image at full resolution, every level below
//! halves it. A clipped pyramid is a crop of a larger virtual pyramid; its
//! tiles are addressed on the server by virtual level, column and row.

use crate::constants::DEFAULT_URL_TEMPLATE;
use crate::core::geo::{Point, Rect};
use crate::{Result, ZoomError};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// How far the pyramid is halved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PyramidTopology {
    /// Down to a single pixel, as Deep Zoom images do
    #[default]
    SinglePixel,
    /// Only until the image fits one tile
    TileBoundary,
}

/// Crop of a larger virtual pyramid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PyramidClip {
    pub min_level: u32,
    /// Virtual level of this pyramid's top level
    pub max_level: u32,
    /// Virtual column of the first tile at the top level
    pub start_col: u32,
    pub start_row: u32,
}

fn default_template() -> String {
    DEFAULT_URL_TEMPLATE.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PyramidDescriptor {
    pub width: u64,
    pub height: u64,
    pub tile_size: u32,
    #[serde(default)]
    pub overlap: u32,
    pub format: String,
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_template")]
    pub url_tile_template: String,
    #[serde(default)]
    pub clip: Option<PyramidClip>,
    /// Compressed texture formats the server can deliver instead of `format`
    #[serde(default)]
    pub compression: Vec<String>,
    #[serde(default)]
    pub topology: PyramidTopology,
}

impl PyramidDescriptor {
    pub fn new(width: u64, height: u64, tile_size: u32, format: &str) -> Self {
        Self {
            width,
            height,
            tile_size,
            overlap: 0,
            format: format.to_string(),
            path: String::new(),
            url_tile_template: default_template(),
            clip: None,
            compression: Vec::new(),
            topology: PyramidTopology::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let descriptor: Self = serde_json::from_str(json)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ZoomError::InvalidDescriptor(format!(
                "empty image {}x{}",
                self.width, self.height
            )));
        }
        if self.tile_size == 0 {
            return Err(ZoomError::InvalidDescriptor("tile size is zero".into()));
        }
        if self.url_tile_template.is_empty() {
            return Err(ZoomError::InvalidDescriptor("empty url template".into()));
        }
        if let Some(clip) = &self.clip {
            if clip.min_level > clip.max_level {
                return Err(ZoomError::InvalidDescriptor(format!(
                    "clip levels {}..{} are reversed",
                    clip.min_level, clip.max_level
                )));
            }
        }
        Ok(())
    }
}

/// Integer and fractional tile offset of a clipped pyramid at one level
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct ClipOffset {
    col: u32,
    row: u32,
    rest_col: f64,
    rest_row: f64,
}

#[derive(Debug, Clone)]
pub struct PyramidGeometry {
    descriptor: PyramidDescriptor,
    num_levels: u32,
    /// Indexed by level, empty without a clip
    offsets: Vec<ClipOffset>,
    platform_formats: Vec<String>,
}

impl PyramidGeometry {
    pub fn new(descriptor: PyramidDescriptor) -> Result<Self> {
        descriptor.validate()?;
        let boundary = match descriptor.topology {
            PyramidTopology::SinglePixel => 1,
            PyramidTopology::TileBoundary => descriptor.tile_size as u64,
        };
        let mut size = descriptor.width.max(descriptor.height);
        let mut num_levels = 1;
        while size > boundary {
            size = size.div_ceil(2);
            num_levels += 1;
        }

        let offsets = match descriptor.clip {
            Some(clip) => Self::clip_offsets(clip, num_levels),
            None => Vec::new(),
        };
        log::debug!(
            "pyramid {}x{} tile {} has {} levels",
            descriptor.width,
            descriptor.height,
            descriptor.tile_size,
            num_levels
        );
        Ok(Self {
            descriptor,
            num_levels,
            offsets,
            platform_formats: Vec::new(),
        })
    }

    /// Formats the platform can upload as compressed textures
    pub fn with_platform_formats(mut self, formats: Vec<String>) -> Self {
        self.platform_formats = formats;
        self
    }

    /// Offsets halve from the top level down, keeping the fractional remainder.
    fn clip_offsets(clip: PyramidClip, num_levels: u32) -> Vec<ClipOffset> {
        let mut offsets = vec![ClipOffset::default(); num_levels as usize];
        let (mut col, mut row) = (clip.start_col as f64, clip.start_row as f64);
        for level in (0..num_levels as usize).rev() {
            let offset = ClipOffset {
                col: col.floor() as u32,
                row: row.floor() as u32,
                rest_col: col - col.floor(),
                rest_row: row - row.floor(),
            };
            offsets[level] = offset;
            col /= 2.0;
            row /= 2.0;
        }
        offsets
    }

    fn offset(&self, level: u32) -> ClipOffset {
        self.offsets
            .get(level as usize)
            .copied()
            .unwrap_or_default()
    }

    pub fn descriptor(&self) -> &PyramidDescriptor {
        &self.descriptor
    }

    pub fn tile_size(&self) -> u32 {
        self.descriptor.tile_size
    }

    pub fn num_levels(&self) -> u32 {
        self.num_levels
    }

    pub fn max_level(&self) -> u32 {
        self.num_levels - 1
    }

    /// Size of a level relative to full resolution
    ///
    /// `2^(level - max_level)` for both topologies: the top level is always
    /// the full resolution image, whichever level the pyramid stops at below.
    pub fn get_scale(&self, level: u32) -> f64 {
        2f64.powi(level as i32 - self.max_level() as i32)
    }

    pub fn get_dimensions(&self, level: u32) -> (u64, u64) {
        let scale = self.get_scale(level);
        (
            (self.descriptor.width as f64 * scale).ceil() as u64,
            (self.descriptor.height as f64 * scale).ceil() as u64,
        )
    }

    pub fn get_num_tiles(&self, level: u32) -> (u32, u32) {
        let (w, h) = self.get_dimensions(level);
        let ts = self.descriptor.tile_size as u64;
        let offset = self.offset(level);
        let mut cols = w.div_ceil(ts) as u32;
        let mut rows = h.div_ceil(ts) as u32;
        if offset.rest_col != 0.0 {
            cols += 1;
        }
        if offset.rest_row != 0.0 {
            rows += 1;
        }
        (cols, rows)
    }

    /// Most detailed level at which the whole image fits a single tile
    pub fn base_level(&self) -> u32 {
        let ts = self.descriptor.tile_size as u64;
        (0..self.num_levels)
            .rev()
            .find(|level| {
                let (w, h) = self.get_dimensions(*level);
                w <= ts && h <= ts
            })
            .unwrap_or(0)
    }

    /// Lowest level the server can deliver
    pub fn min_loadable_level(&self) -> u32 {
        match self.descriptor.clip {
            Some(clip) => {
                let shift = clip.max_level as i64 - self.max_level() as i64;
                (clip.min_level as i64 - shift).clamp(0, self.max_level() as i64) as u32
            }
            None => 0,
        }
    }

    pub fn max_loadable_level(&self) -> u32 {
        self.max_level()
    }

    /// Server side level, column and row of a tile
    pub fn virtual_tile(&self, level: u32, col: u32, row: u32) -> (u32, u32, u32) {
        match self.descriptor.clip {
            Some(clip) => {
                let offset = self.offset(level);
                let shift = clip.max_level as i64 - self.max_level() as i64;
                (
                    (level as i64 + shift).max(0) as u32,
                    col + offset.col,
                    row + offset.row,
                )
            }
            None => (level, col, row),
        }
    }

    /// Format requested from the server: an advertised compressed format the
    /// platform supports, else the descriptor's image format.
    pub fn tile_format(&self) -> &str {
        self.descriptor
            .compression
            .iter()
            .find(|f| self.platform_formats.iter().any(|p| p == *f))
            .map(String::as_str)
            .unwrap_or(&self.descriptor.format)
    }

    pub fn url_for_tile(&self, level: u32, col: u32, row: u32) -> String {
        let (level, col, row) = self.virtual_tile(level, col, row);
        self.descriptor
            .url_tile_template
            .replace("{path}", &self.descriptor.path)
            .replace("{level}", &level.to_string())
            .replace("{column}", &col.to_string())
            .replace("{row}", &row.to_string())
            .replace("{format}", self.tile_format())
    }

    /// Tile area without overlap, in pixels of `level`
    fn level_rect(&self, level: u32, col: u32, row: u32) -> Rect {
        let ts = self.descriptor.tile_size as f64;
        let offset = self.offset(level);
        let x = (col as f64 - offset.rest_col) * ts;
        let y = (row as f64 - offset.rest_row) * ts;
        Rect::new(x, y, ts, ts)
    }

    /// Area covered by a tile in full resolution pixels, overlap included
    /// and clamped to the image.
    pub fn tile_rect(&self, level: u32, col: u32, row: u32) -> Rect {
        let scale = self.get_scale(level);
        let (w, h) = self.get_dimensions(level);
        let overlap = self.descriptor.overlap as f64;
        let r = self.level_rect(level, col, row);
        let x0 = (r.x - overlap).max(0.0);
        let y0 = (r.y - overlap).max(0.0);
        let x1 = (r.x + r.width + overlap).min(w as f64);
        let y1 = (r.y + r.height + overlap).min(h as f64);
        Rect::new(
            x0 / scale,
            y0 / scale,
            (x1 - x0).max(0.0) / scale,
            (y1 - y0).max(0.0) / scale,
        )
    }

    /// Center of the tile's own area in full resolution pixels
    pub fn tile_center(&self, level: u32, col: u32, row: u32) -> Point {
        let c = self.level_rect(level, col, row).center();
        c.multiply(1.0 / self.get_scale(level))
    }

    /// Columns and rows of `level` that may intersect `rect` (full resolution pixels)
    pub fn tile_range(&self, level: u32, rect: &Rect) -> (Range<u32>, Range<u32>) {
        let scale = self.get_scale(level);
        let ts = self.descriptor.tile_size as f64;
        let offset = self.offset(level);
        let (cols, rows) = self.get_num_tiles(level);
        let clamp = |v: f64, n: u32| v.max(0.0).min(n as f64) as u32;
        let c0 = clamp((rect.x * scale / ts + offset.rest_col).floor(), cols);
        let c1 = clamp(((rect.x + rect.width) * scale / ts + offset.rest_col).floor() + 1.0, cols);
        let r0 = clamp((rect.y * scale / ts + offset.rest_row).floor(), rows);
        let r1 = clamp(((rect.y + rect.height) * scale / ts + offset.rest_row).floor() + 1.0, rows);
        (c0..c1, r0..r1)
    }
}
