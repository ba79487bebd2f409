//! This module defines the [`ChunkNodeCache`], the chunked index of walkable cells searched by A*.
use bevy::{
    log::{info, warn},
    math::{IVec3, UVec3},
};
use ndarray::{Array2, Array3};

use crate::{
    block::{Block, BlockSource},
    settings::ChunkSettings,
};

/// Horizontal coordinate of a chunk in the world's chunk grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkCoord {
    pub x: u32,
    pub z: u32,
}

impl ChunkCoord {
    pub fn new(x: u32, z: u32) -> Self {
        ChunkCoord { x, z }
    }

    /// World position of the chunk's lowest corner.
    pub fn origin(&self, chunk_size: u32) -> UVec3 {
        UVec3::new(self.x * chunk_size, 0, self.z * chunk_size)
    }
}

/// The node placeholders of a single chunk, `chunk_size × max_y × chunk_size`.
#[derive(Debug, Clone)]
pub(crate) struct ChunkNodeGrid {
    coord: ChunkCoord,
    nodes: Array3<Option<Block>>,
}

impl ChunkNodeGrid {
    fn empty(coord: ChunkCoord, settings: &ChunkSettings) -> Self {
        let size = settings.chunk_size as usize;
        ChunkNodeGrid {
            coord,
            nodes: Array3::from_elem((size, settings.max_y as usize, size), None),
        }
    }

    /// Resolves every cell of the chunk through `source`, keeping only walkable blocks.
    fn populate<S: BlockSource + ?Sized>(&mut self, settings: &ChunkSettings, source: &S) {
        let origin = self.coord.origin(settings.chunk_size).as_ivec3();

        for ((x, y, z), slot) in self.nodes.indexed_iter_mut() {
            let pos = origin + IVec3::new(x as i32, y as i32, z as i32);
            *slot = source
                .resolve_block(pos)
                .filter(|block| block.walkable)
                .map(|_| Block::walkable(pos.as_uvec3()));
        }
    }

    fn node(&self, local: UVec3) -> Option<Block> {
        self.nodes
            .get((local.x as usize, local.y as usize, local.z as usize))
            .copied()
            .flatten()
    }

    fn walkable_count(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }
}

/// Read-only index of every walkable cell in the world, one node grid per chunk.
///
/// A node at local `(x, y, z)` of chunk `(cx, cz)` stands for the world block at
/// `(cx * chunk_size + x, y, cz * chunk_size + z)`. Searches only borrow the cache,
/// so any number of them can run against it at once.
///
/// # Example
/// ```
/// use bevy::math::{IVec3, UVec3};
/// use voxel_pathfind::prelude::*;
///
/// let settings = PathfindSettingsBuilder::new(4, 2, 1).build();
/// let map = BlockMap::new(settings.chunk.dimensions(), true);
/// let cache = ChunkNodeCache::build(settings.chunk, &map);
///
/// assert_eq!(cache.get_node(IVec3::new(5, 0, 2)).unwrap().pos, UVec3::new(5, 0, 2));
/// assert!(cache.get_node(IVec3::new(8, 0, 0)).is_none());
/// ```
#[derive(Debug, Clone)]
pub struct ChunkNodeCache {
    settings: ChunkSettings,
    chunks: Array2<ChunkNodeGrid>,
}

impl ChunkNodeCache {
    /// Creates a cache where no cell is walkable yet.
    pub fn new(settings: ChunkSettings) -> Self {
        let width = settings.world_chunk_width as usize;
        let chunks = Array2::from_shape_fn((width, width), |(x, z)| {
            ChunkNodeGrid::empty(ChunkCoord::new(x as u32, z as u32), &settings)
        });

        ChunkNodeCache { settings, chunks }
    }

    /// Creates a cache and populates every chunk from `source`.
    pub fn build<S: BlockSource + ?Sized>(settings: ChunkSettings, source: &S) -> Self {
        let mut cache = ChunkNodeCache::new(settings);

        cache.populate_all(source);
        info!(
            "Built node cache for {} chunks ({} walkable)",
            cache.chunks.len(),
            cache.walkable_count()
        );

        cache
    }

    fn populate_all<S: BlockSource + ?Sized>(&mut self, source: &S) {
        let settings = self.settings;

        crate::timed!("Populated chunks", {
            #[cfg(feature = "parallel")]
            self.chunks
                .par_map_inplace(|chunk| chunk.populate(&settings, source));

            #[cfg(not(feature = "parallel"))]
            self.chunks
                .map_inplace(|chunk| chunk.populate(&settings, source));
        })
    }

    /// Repopulates one chunk after the world changed.
    /// Returns false if the coordinate is outside the world.
    pub fn rebuild_chunk<S: BlockSource + ?Sized>(&mut self, coord: ChunkCoord, source: &S) -> bool {
        let settings = self.settings;

        match self.chunks.get_mut((coord.x as usize, coord.z as usize)) {
            Some(chunk) => {
                chunk.populate(&settings, source);
                true
            }
            None => {
                warn!("Attempted to rebuild out-of-bounds chunk {:?}", coord);
                false
            }
        }
    }

    pub fn settings(&self) -> ChunkSettings {
        self.settings
    }

    /// Dimensions of the world covered by the cache.
    pub fn dimensions(&self) -> UVec3 {
        self.settings.dimensions()
    }

    /// Returns the chunk containing the world position, or `None` if `x` or `z` are outside the world.
    pub fn chunk_coord(&self, pos: IVec3) -> Option<ChunkCoord> {
        let size = self.settings.chunk_size as i32;
        let width = self.settings.world_chunk_width as i32;

        let chunk_x = pos.x.div_euclid(size);
        let chunk_z = pos.z.div_euclid(size);

        if chunk_x < 0 || chunk_z < 0 || chunk_x >= width || chunk_z >= width {
            return None;
        }

        Some(ChunkCoord::new(chunk_x as u32, chunk_z as u32))
    }

    /// Looks up the node at a world position.
    ///
    /// Returns `None` when the position is outside the world or the block there is not walkable.
    pub fn get_node(&self, pos: IVec3) -> Option<Block> {
        if !self.contains(pos) {
            return None;
        }

        let coord = self.chunk_coord(pos)?;
        let origin = coord.origin(self.settings.chunk_size);
        let local = UVec3::new(
            pos.x as u32 - origin.x,
            pos.y as u32,
            pos.z as u32 - origin.z,
        );

        self.chunks[[coord.x as usize, coord.z as usize]].node(local)
    }

    /// Returns true if the position lies inside the world, walkable or not.
    pub fn contains(&self, pos: IVec3) -> bool {
        pos.y >= 0 && pos.y < self.settings.max_y as i32 && self.chunk_coord(pos).is_some()
    }

    pub fn is_walkable(&self, pos: UVec3) -> bool {
        self.get_node(pos.as_ivec3()).is_some()
    }

    /// Number of walkable cells across all chunks.
    pub fn walkable_count(&self) -> usize {
        self.chunks.iter().map(ChunkNodeGrid::walkable_count).sum()
    }
}
