//! Quad-tree of resident tiles
//!
//! Nodes live in a map keyed by `TileKey`; parent and child links are keys,
//! not owning pointers. Every node above `minimum_level` has an unbroken
//! chain of ancestors down to it, so a coarser tile is always resident
//! beneath one that is still loading.

use super::pyramid::PyramidGeometry;
use super::{TileKey, TileRequest};
use crate::prelude::{Arc, HashMap};

#[derive(Debug, Clone, PartialEq)]
pub struct TileQuadNode {
    pub key: TileKey,
    pub url: String,
    /// Asked for by the viewport, as opposed to kept alive as an ancestor
    pub requested: bool,
    pub parent: Option<TileKey>,
    pub children: [Option<TileKey>; 4],
}

impl TileQuadNode {
    fn new(key: TileKey, url: String, requested: bool) -> Self {
        Self {
            key,
            url,
            requested,
            parent: None,
            children: [None; 4],
        }
    }

    pub fn child_count(&self) -> usize {
        self.children.iter().flatten().count()
    }

    pub fn is_leaf(&self) -> bool {
        self.child_count() == 0
    }
}

pub struct TileCache {
    geometry: Arc<PyramidGeometry>,
    minimum_level: u32,
    nodes: HashMap<TileKey, TileQuadNode>,
    /// Last in, first out
    fetch_queue: Vec<TileRequest>,
}

impl TileCache {
    pub fn new(geometry: Arc<PyramidGeometry>, minimum_level: u32) -> Self {
        Self {
            geometry,
            minimum_level,
            nodes: HashMap::default(),
            fetch_queue: Vec::new(),
        }
    }

    pub fn minimum_level(&self) -> u32 {
        self.minimum_level
    }

    /// Insert a requested tile, creating missing ancestors down to
    /// `minimum_level`. Returns the keys that were created, the tile first.
    pub fn add_node(&mut self, level: u32, col: u32, row: u32, url: &str) -> Vec<TileKey> {
        let key = TileKey::new(level, col, row);
        if let Some(node) = self.nodes.get_mut(&key) {
            node.requested = true;
            return Vec::new();
        }

        let mut created = vec![key];
        self.nodes
            .insert(key, TileQuadNode::new(key, url.to_string(), true));

        let mut child = key;
        while child.level > self.minimum_level {
            let Some(parent) = child.parent() else { break };
            let existed = self.nodes.contains_key(&parent);
            if !existed {
                let url = self.geometry.url_for_tile(parent.level, parent.col, parent.row);
                self.nodes.insert(parent, TileQuadNode::new(parent, url, false));
                created.push(parent);
            }
            if let Some(node) = self.nodes.get_mut(&child) {
                node.parent = Some(parent);
            }
            if let Some(node) = self.nodes.get_mut(&parent) {
                node.children[child.quadrant()] = Some(child);
            }
            if existed {
                break;
            }
            child = parent;
        }
        created
    }

    /// Release a tile. It is unlinked once childless, then its ancestors are
    /// pruned while they are childless and unrequested. Roots stay.
    /// Returns the removed keys, the tile first.
    pub fn remove_node(&mut self, level: u32, col: u32, row: u32) -> Vec<TileKey> {
        let key = TileKey::new(level, col, row);
        match self.nodes.get_mut(&key) {
            Some(node) => node.requested = false,
            None => return Vec::new(),
        }

        let mut removed = Vec::new();
        let mut current = key;
        while let Some(node) = self.nodes.get(&current) {
            if node.requested || !node.is_leaf() || current.level <= self.minimum_level {
                break;
            }
            let parent = node.parent;
            self.nodes.remove(&current);
            removed.push(current);
            match parent {
                Some(parent) => {
                    if let Some(node) = self.nodes.get_mut(&parent) {
                        node.children[current.quadrant()] = None;
                    }
                    current = parent;
                }
                None => break,
            }
        }
        removed
    }

    /// Drop every node, roots included.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.fetch_queue.clear();
    }

    /// Every node above the minimum level links to its parent and back.
    pub fn check_invariant(&self) -> bool {
        self.nodes.values().all(|node| {
            let children_resident = node
                .children
                .iter()
                .flatten()
                .all(|child| self.nodes.get(child).and_then(|c| c.parent) == Some(node.key));
            if node.key.level <= self.minimum_level {
                return children_resident;
            }
            let linked = node.parent.is_some() && node.parent == node.key.parent();
            let back_linked = node
                .parent
                .and_then(|p| self.nodes.get(&p))
                .is_some_and(|p| p.children[node.key.quadrant()] == Some(node.key));
            children_resident && linked && back_linked
        })
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn get(&self, key: &TileKey) -> Option<&TileQuadNode> {
        self.nodes.get(key)
    }

    pub fn keys_at_level(&self, level: u32) -> impl Iterator<Item = TileKey> + '_ {
        self.nodes.keys().filter(move |k| k.level == level).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn push_fetch_queue(&mut self, request: TileRequest) {
        self.fetch_queue.push(request);
    }

    pub fn pop_fetch(&mut self) -> Option<TileRequest> {
        self.fetch_queue.pop()
    }

    pub fn clear_fetch_queue(&mut self) {
        self.fetch_queue.clear();
    }

    pub fn fetch_queue_len(&self) -> usize {
        self.fetch_queue.len()
    }
}
