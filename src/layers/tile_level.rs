use crate::animation::easing::EasingFunction;
use crate::prelude::HashMap;
use crate::tiles::{TileKey, TileTexture};

/// A loaded tile and its fade-in state
#[derive(Debug, Clone)]
pub struct TileRecord {
    pub key: TileKey,
    pub texture: TileTexture,
    /// Linear fade progress, 0.0 to 1.0
    pub progress: f64,
}

impl TileRecord {
    pub fn new(texture: TileTexture) -> Self {
        Self {
            key: texture.key,
            texture,
            progress: 0.0,
        }
    }

    pub fn is_faded_in(&self) -> bool {
        self.progress >= 1.0
    }
}

/// Resident tiles of one pyramid level
#[derive(Debug, Clone)]
pub struct TileLevelLayer {
    pub level: u32,
    /// Never torn down on level changes
    pub keep: bool,
    records: HashMap<TileKey, TileRecord>,
}

impl TileLevelLayer {
    pub fn new(level: u32, keep: bool) -> Self {
        Self {
            level,
            keep,
            records: HashMap::default(),
        }
    }

    /// Add a loaded tile, replacing an older texture for the same key.
    pub fn insert(&mut self, texture: TileTexture) -> Option<TileRecord> {
        debug_assert_eq!(texture.key.level, self.level);
        self.records.insert(texture.key, TileRecord::new(texture))
    }

    pub fn remove(&mut self, key: &TileKey) -> Option<TileRecord> {
        self.records.remove(key)
    }

    pub fn get(&self, key: &TileKey) -> Option<&TileRecord> {
        self.records.get(key)
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.records.contains_key(key)
    }

    /// Advance every fade by `dt_ms`. Returns true while any tile is still fading.
    pub fn advance_fade(&mut self, dt_ms: f64, fade_ms: f64) -> bool {
        let step = if fade_ms <= 0.0 { 1.0 } else { dt_ms / fade_ms };
        let mut fading = false;
        for record in self.records.values_mut() {
            record.progress = (record.progress + step).min(1.0);
            fading |= !record.is_faded_in();
        }
        fading
    }

    /// Eased opacity of a resident tile
    pub fn alpha(&self, key: &TileKey, easing: EasingFunction) -> Option<f64> {
        self.records.get(key).map(|r| easing.apply(r.progress))
    }

    /// Keep only tiles for which `keep` returns true, handing back the rest.
    pub fn retain<F>(&mut self, mut keep: F) -> Vec<TileRecord>
    where
        F: FnMut(&TileKey) -> bool,
    {
        let dropped: Vec<TileKey> = self
            .records
            .keys()
            .filter(|k| !keep(k))
            .copied()
            .collect();
        dropped
            .iter()
            .filter_map(|k| self.records.remove(k))
            .collect()
    }

    /// Remove every tile, handing them back to the caller.
    pub fn destroy(&mut self) -> Vec<TileRecord> {
        self.records.drain().map(|(_, record)| record).collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = &TileKey> {
        self.records.keys()
    }

    pub fn records(&self) -> impl Iterator<Item = &TileRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
