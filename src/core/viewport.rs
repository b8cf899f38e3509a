use crate::core::config::TileLoadingConfig;
use crate::core::geo::{Point, Polygon, Rect};
use crate::input::events::TransformEvent;
use crate::layers::tile_level::TileLevelLayer;
use crate::prelude::{Arc, HashMap, HashSet};
use crate::tiles::loader::{FetchOutcome, TileFetcher};
use crate::tiles::pyramid::{PyramidDescriptor, PyramidGeometry};
use crate::tiles::quadtree::TileCache;
use crate::tiles::source::TileSource;
use crate::tiles::{TileKey, TileRequest, TileTexture};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placement of the full resolution image on screen
///
/// `screen = scroll + R(rotation) * (p * zoom)` for a point `p` in pyramid
/// (full resolution pixel) space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldTransform {
    pub scroll: Point,
    pub zoom: f64,
    pub rotation: f64,
}

impl Default for WorldTransform {
    fn default() -> Self {
        Self {
            scroll: Point::default(),
            zoom: 1.0,
            rotation: 0.0,
        }
    }
}

impl WorldTransform {
    pub fn new(scroll: Point, zoom: f64, rotation: f64) -> Self {
        Self {
            scroll,
            zoom,
            rotation,
        }
    }

    /// Center an image of `image` pixels inside a viewport of `viewport` pixels.
    pub fn fit(viewport: Point, image: Point) -> Self {
        if image.x <= 0.0 || image.y <= 0.0 {
            return Self::default();
        }
        let zoom = (viewport.x / image.x).min(viewport.y / image.y);
        let scroll = Point::new(
            (viewport.x - image.x * zoom) / 2.0,
            (viewport.y - image.y * zoom) / 2.0,
        );
        Self::new(scroll, zoom, 0.0)
    }

    pub fn to_screen(&self, p: &Point) -> Point {
        self.scroll.add(&p.multiply(self.zoom).rotate(self.rotation))
    }

    pub fn to_pyramid(&self, screen: &Point) -> Point {
        screen
            .subtract(&self.scroll)
            .rotate(-self.rotation)
            .multiply(1.0 / self.zoom)
    }

    /// Scale and rotate about `event.about`, then translate.
    pub fn apply(&mut self, event: &TransformEvent) {
        let scale = if event.scale.is_finite() && event.scale > 0.0 {
            event.scale
        } else {
            1.0
        };
        let offset = self.scroll.subtract(&event.about);
        self.scroll = event
            .about
            .add(&offset.multiply(scale).rotate(event.rotate))
            .add(&event.translate);
        self.zoom *= scale;
        self.rotation += event.rotate;
    }
}

/// Difference between two needed-sets of one level
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedTiles {
    pub added: Vec<TileKey>,
    pub removed: Vec<TileKey>,
}

impl ChangedTiles {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Level-of-detail controller
///
/// Decides, for the current transform, which pyramid level to show and
/// which of its tiles must be resident, and keeps the quad-tree, the
/// fetcher and the per-level layers in step with that decision.
pub struct ViewportController {
    geometry: Arc<PyramidGeometry>,
    config: TileLoadingConfig,
    transform: WorldTransform,
    size: Point,
    cache: TileCache,
    fetcher: TileFetcher,
    layers: BTreeMap<u32, TileLevelLayer>,
    previous: HashMap<u32, HashSet<TileKey>>,
    current_level: Option<u32>,
    anchor: Option<Point>,
}

impl ViewportController {
    pub fn new(
        descriptor: PyramidDescriptor,
        size: Point,
        config: TileLoadingConfig,
        fetcher: TileFetcher,
    ) -> Result<Self> {
        let geometry = Arc::new(
            PyramidGeometry::new(descriptor)?.with_platform_formats(config.platform_formats.clone()),
        );
        let minimum_level = config
            .minimum_level
            .unwrap_or_else(|| geometry.base_level())
            .clamp(geometry.min_loadable_level(), geometry.max_loadable_level());
        let (w, h) = geometry.get_dimensions(geometry.max_level());
        let transform = WorldTransform::fit(size, Point::new(w as f64, h as f64));
        log::info!(
            "viewport {}x{} over {} levels, minimum level {}",
            size.x,
            size.y,
            geometry.num_levels(),
            minimum_level
        );
        Ok(Self {
            cache: TileCache::new(geometry.clone(), minimum_level),
            geometry,
            config,
            transform,
            size,
            fetcher,
            layers: BTreeMap::new(),
            previous: HashMap::default(),
            current_level: None,
            anchor: None,
        })
    }

    /// Build the fetcher from the loading config and `source`.
    pub fn with_source(
        descriptor: PyramidDescriptor,
        size: Point,
        config: TileLoadingConfig,
        source: Arc<dyn TileSource>,
    ) -> Result<Self> {
        let fetcher = TileFetcher::from_config(source, &config)?;
        Self::new(descriptor, size, config, fetcher)
    }

    pub fn geometry(&self) -> &PyramidGeometry {
        &self.geometry
    }

    pub fn transform(&self) -> &WorldTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: WorldTransform) {
        self.transform = transform;
    }

    pub fn size(&self) -> Point {
        self.size
    }

    pub fn set_size(&mut self, size: Point) {
        self.size = size;
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    pub fn fetcher(&self) -> &TileFetcher {
        &self.fetcher
    }

    pub fn layer(&self, level: u32) -> Option<&TileLevelLayer> {
        self.layers.get(&level)
    }

    /// Layers from coarsest to finest, the drawing order
    pub fn layers(&self) -> impl Iterator<Item = &TileLevelLayer> {
        self.layers.values()
    }

    pub fn current_level(&self) -> Option<u32> {
        self.current_level
    }

    pub fn minimum_level(&self) -> u32 {
        self.cache.minimum_level()
    }

    /// Screen point tiles are prioritized around
    pub fn set_anchor(&mut self, anchor: Option<Point>) {
        self.anchor = anchor;
    }

    pub fn anchor(&self) -> Option<Point> {
        self.anchor
    }

    /// Display scale of the base level image
    pub fn current_scale(&self) -> f64 {
        self.transform.zoom / self.geometry.get_scale(self.geometry.base_level())
    }

    /// Level to show at `scale`, never decreasing as the scale grows.
    pub fn level_for_scale(&self, scale: f64) -> u32 {
        let base = self.geometry.base_level();
        let scaled = scale * self.config.resolution;
        let step = if scaled.is_finite() && scaled > 0.0 {
            scaled.log2().round().max(0.0) as u32
        } else {
            0
        };
        (base + step).clamp(self.minimum_level(), self.geometry.max_loadable_level())
    }

    /// Viewport grown by one tile of `level` on every side, in screen pixels
    fn expanded_viewport(&self, level: u32) -> Rect {
        let margin =
            self.geometry.tile_size() as f64 / self.geometry.get_scale(level) * self.transform.zoom;
        Rect::new(0.0, 0.0, self.size.x, self.size.y).expand(margin)
    }

    /// Tiles of `level` whose centers fall inside the expanded viewport.
    pub fn needed_tiles(&self, level: u32) -> Vec<TileKey> {
        let screen = self.expanded_viewport(level);
        let mut polygon = Polygon::new(Point::default());
        for corner in screen.corners() {
            polygon.add_absolute_point(self.transform.to_pyramid(&corner));
        }
        let (cols, rows) = self.geometry.tile_range(level, &polygon.bounding_rect());

        let mut needed = Vec::new();
        for row in rows {
            for col in cols.clone() {
                let center = self.geometry.tile_center(level, col, row);
                if screen.contains(&self.transform.to_screen(&center)) {
                    needed.push(TileKey::new(level, col, row));
                }
            }
        }
        needed
    }

    /// Diff the needed-set of `level` against the last call for that level.
    pub fn changed_tiles(&mut self, level: u32) -> ChangedTiles {
        let needed: HashSet<TileKey> = self.needed_tiles(level).into_iter().collect();
        let previous = self.previous.entry(level).or_default();
        let mut added: Vec<TileKey> = needed.difference(previous).copied().collect();
        let mut removed: Vec<TileKey> = previous.difference(&needed).copied().collect();
        added.sort();
        removed.sort();
        *previous = needed;
        ChangedTiles { added, removed }
    }

    /// Bring the quad-tree and the fetcher in line with the needed tiles of `level`.
    pub fn populate_tiles(&mut self, level: u32) -> Result<ChangedTiles> {
        let mut changes = self.changed_tiles(level);

        for key in &changes.removed {
            let pruned = self.cache.remove_node(key.level, key.col, key.row);
            self.drop_tiles(&pruned);
        }
        self.prune_stale_requests();

        if let Some(anchor) = self.anchor {
            let distance = |key: &TileKey| {
                let center = self.geometry.tile_center(key.level, key.col, key.row);
                self.transform.to_screen(&center).distance_to(&anchor)
            };
            changes
                .added
                .sort_by(|a, b| distance(b).total_cmp(&distance(a)));
        }

        let mut ancestors = Vec::new();
        for key in &changes.added {
            let url = self.geometry.url_for_tile(key.level, key.col, key.row);
            let created = self.cache.add_node(key.level, key.col, key.row, &url);
            ancestors.extend(created.into_iter().filter(|k| k != key));
            self.cache.push_fetch_queue(TileRequest::new(*key, url));
        }
        // Coarsest ancestors come off the queue first
        ancestors.sort_by(|a, b| b.level.cmp(&a.level));
        for key in ancestors {
            let url = self.geometry.url_for_tile(key.level, key.col, key.row);
            self.cache.push_fetch_queue(TileRequest::new(key, url));
        }

        let mut scheduled = 0;
        while let Some(request) = self.cache.pop_fetch() {
            let key = request.key;
            if self.layers.get(&key.level).is_some_and(|l| l.contains(&key)) {
                continue;
            }
            if self.fetcher.schedule(&request.url, key.level, key.col, key.row) {
                scheduled += 1;
            }
        }
        let dispatched = self.fetcher.load_all()?;
        log::debug!(
            "level {}: +{} -{} tiles, {} scheduled, {} dispatched",
            level,
            changes.added.len(),
            changes.removed.len(),
            scheduled,
            dispatched
        );
        Ok(changes)
    }

    /// Withdraw fetches, queued or backlogged, whose tile left the quad-tree.
    fn prune_stale_requests(&mut self) {
        let cache = &self.cache;
        let withdrawn = self.fetcher.retain(|key| cache.contains(key));
        if withdrawn > 0 {
            log::debug!("withdrew {} stale tile requests", withdrawn);
        }
    }

    fn drop_tiles(&mut self, keys: &[TileKey]) {
        for key in keys {
            if let Some(layer) = self.layers.get_mut(&key.level) {
                if let Some(record) = layer.remove(key) {
                    self.fetcher.release(&record.texture.url);
                }
            }
        }
    }

    /// Release every tile of a layer that is not kept and drop the layer.
    fn teardown_level(&mut self, level: u32) {
        if self.layers.get(&level).is_some_and(|l| l.keep) {
            return;
        }
        self.release_requests(level);
        if let Some(mut layer) = self.layers.remove(&level) {
            for record in layer.destroy() {
                self.fetcher.release(&record.texture.url);
            }
            log::debug!("tore down level {}", level);
        }
    }

    /// Un-request the needed-set of `level`; nodes still holding children stay.
    fn release_requests(&mut self, level: u32) {
        let Some(previous) = self.previous.remove(&level) else {
            return;
        };
        for key in previous {
            let pruned = self.cache.remove_node(key.level, key.col, key.row);
            self.drop_tiles(&pruned);
        }
    }

    /// Switch to `level`: populate it first, then tear down everything finer
    /// and release the requests of coarser levels. Shared ancestors keep a
    /// requested descendant the whole time, so their textures stay resident.
    pub fn update_level(&mut self, level: u32) -> Result<()> {
        if self.current_level != Some(level) {
            log::debug!("level {:?} -> {}", self.current_level, level);
        }
        self.current_level = Some(level);
        self.populate_tiles(level)?;

        let mut finer: Vec<u32> = self
            .layers
            .keys()
            .copied()
            .chain(self.previous.keys().copied())
            .filter(|l| *l > level)
            .collect();
        finer.sort_unstable();
        finer.dedup();
        // Finest first, so every teardown prunes toward a populated level
        for l in finer.into_iter().rev() {
            self.teardown_level(l);
        }

        let coarser: Vec<u32> = self
            .previous
            .keys()
            .copied()
            .filter(|l| *l < level && !self.is_base(*l))
            .collect();
        for l in coarser {
            self.release_requests(l);
        }
        self.prune_stale_requests();
        Ok(())
    }

    fn is_base(&self, level: u32) -> bool {
        self.config.keep_base_layer && level == self.minimum_level()
    }

    /// Recompute the level and needed tiles for the current transform.
    pub fn update(&mut self) -> Result<()> {
        let level = self.level_for_scale(self.current_scale());
        let minimum = self.minimum_level();
        if self.config.keep_base_layer && level != minimum {
            self.populate_tiles(minimum)?;
        }
        if self.current_level == Some(level) {
            self.populate_tiles(level)?;
            Ok(())
        } else {
            self.update_level(level)
        }
    }

    /// Apply a transform; `fast` ones only refresh the current level.
    pub fn apply_transform(&mut self, event: &TransformEvent) -> Result<()> {
        self.transform.apply(event);
        match (event.fast, self.current_level) {
            (true, Some(level)) => self.populate_tiles(level).map(|_| ()),
            _ => self.update(),
        }
    }

    /// Drop resident tiles of `level` that are no longer in the quad-tree.
    pub fn sweep_out_of_bounds(&mut self, level: u32) -> usize {
        let cache = &self.cache;
        let Some(layer) = self.layers.get_mut(&level) else {
            return 0;
        };
        let dropped = layer.retain(|key| cache.contains(key));
        for record in &dropped {
            self.fetcher.release(&record.texture.url);
        }
        dropped.len()
    }

    /// Accept a loaded texture unless its tile has been released meanwhile.
    pub fn on_tile_loaded(&mut self, texture: TileTexture) -> bool {
        let key = texture.key;
        if !self.cache.contains(&key) {
            log::debug!("discarding superseded tile {}", key);
            self.fetcher.release(&texture.url);
            return false;
        }
        let keep = self.is_base(key.level);
        self.layers
            .entry(key.level)
            .or_insert_with(|| TileLevelLayer::new(key.level, keep))
            .insert(texture);
        true
    }

    /// Deliver finished fetches and advance fades. Returns the number of
    /// tiles that became resident.
    pub fn tick(&mut self, dt_ms: f64) -> usize {
        let mut outcomes = Vec::new();
        self.fetcher.poll(|outcome| outcomes.push(outcome));

        let mut accepted = 0;
        for outcome in outcomes {
            match outcome {
                FetchOutcome::Loaded(texture) => {
                    if self.on_tile_loaded(texture) {
                        accepted += 1;
                    }
                }
                FetchOutcome::Failed { key, url, reason } => {
                    log::warn!("tile {} ({}) failed: {}", key, url, reason);
                }
                FetchOutcome::Cancelled { key, .. } => {
                    log::debug!("tile {} cancelled", key);
                }
            }
        }

        let fade_ms = self.config.fade_ms;
        for layer in self.layers.values_mut() {
            layer.advance_fade(dt_ms, fade_ms);
        }
        accepted
    }

    /// Eased opacity of a resident tile
    pub fn tile_alpha(&self, key: &TileKey) -> Option<f64> {
        self.layers
            .get(&key.level)?
            .alpha(key, self.config.fade_easing)
    }

    /// Abort outstanding fetches and release every tile.
    pub fn destroy(&mut self) {
        self.fetcher.destroy();
        self.cache.clear();
        self.layers.clear();
        self.previous.clear();
        self.current_level = None;
    }
}
