//! Read-only block data supplied by the world.
use std::hash::{Hash, Hasher};

use bevy::math::{IVec3, UVec3};
use ndarray::Array3;

/// One cell of the world grid.
///
/// Two blocks are the same block if they share a position.
#[derive(Debug, Clone, Copy)]
pub struct Block {
    /// World position of the block. `y` is the vertical axis.
    pub pos: UVec3,
    /// Whether units can stand in this block.
    pub walkable: bool,
}

impl Block {
    pub fn new(pos: UVec3, walkable: bool) -> Self {
        Block { pos, walkable }
    }

    pub fn walkable(pos: UVec3) -> Self {
        Block::new(pos, true)
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.pos == other.pos
    }
}

impl Eq for Block {}

impl Hash for Block {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pos.hash(state);
    }
}

/// The world side of the boundary: anything that can tell which block sits at a position.
///
/// Returns `None` for positions outside the world. Implementations are read from
/// several threads while the node cache is built in parallel.
pub trait BlockSource: Sync {
    fn resolve_block(&self, pos: IVec3) -> Option<Block>;
}

/// A dense in-memory [`BlockSource`] holding one walkable flag per cell.
///
/// # Example
/// ```
/// use bevy::math::{IVec3, UVec3};
/// use voxel_pathfind::prelude::*;
///
/// let mut map = BlockMap::new(UVec3::new(8, 2, 8), true);
/// map.set_walkable(UVec3::new(3, 0, 3), false);
///
/// assert!(!map.resolve_block(IVec3::new(3, 0, 3)).unwrap().walkable);
/// assert!(map.resolve_block(IVec3::new(8, 0, 0)).is_none());
/// ```
#[derive(Debug, Clone)]
pub struct BlockMap {
    dimensions: UVec3,
    walkable: Array3<bool>,
}

impl BlockMap {
    /// Creates a map of the given dimensions with every cell set to `walkable`.
    pub fn new(dimensions: UVec3, walkable: bool) -> Self {
        BlockMap {
            dimensions,
            walkable: Array3::from_elem(
                (
                    dimensions.x as usize,
                    dimensions.y as usize,
                    dimensions.z as usize,
                ),
                walkable,
            ),
        }
    }

    pub fn dimensions(&self) -> UVec3 {
        self.dimensions
    }

    pub fn in_bounds(&self, pos: IVec3) -> bool {
        pos.x >= 0
            && pos.y >= 0
            && pos.z >= 0
            && (pos.x as u32) < self.dimensions.x
            && (pos.y as u32) < self.dimensions.y
            && (pos.z as u32) < self.dimensions.z
    }

    pub fn is_walkable(&self, pos: UVec3) -> bool {
        self.walkable
            .get((pos.x as usize, pos.y as usize, pos.z as usize))
            .copied()
            .unwrap_or(false)
    }

    /// Sets the walkable flag at a position.
    /// Panics if the position is out of bounds.
    pub fn set_walkable(&mut self, pos: UVec3, walkable: bool) {
        if !self.in_bounds(pos.as_ivec3()) {
            panic!("Attempted to set walkable flag at out-of-bounds position {pos}");
        }

        self.walkable[[pos.x as usize, pos.y as usize, pos.z as usize]] = walkable;
    }

    /// Sets every cell of a horizontal layer.
    pub fn fill_layer(&mut self, y: u32, walkable: bool) {
        if y >= self.dimensions.y {
            panic!("Layer {y} is outside the map height {}", self.dimensions.y);
        }

        self.walkable
            .index_axis_mut(ndarray::Axis(1), y as usize)
            .fill(walkable);
    }
}

impl BlockSource for BlockMap {
    fn resolve_block(&self, pos: IVec3) -> Option<Block> {
        if !self.in_bounds(pos) {
            return None;
        }

        let pos = pos.as_uvec3();
        Some(Block::new(pos, self.is_walkable(pos)))
    }
}
