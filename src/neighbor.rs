//! Neighbor expansion over the [`ChunkNodeCache`].
use bevy::math::IVec3;
use smallvec::SmallVec;

use crate::{block::Block, chunk::ChunkNodeCache};

/// The 8 horizontal offsets, `x` major then `z`.
pub(crate) const HORIZONTAL_OFFSETS: [IVec3; 8] = [
    IVec3::new(-1, 0, -1),
    IVec3::new(-1, 0, 0),
    IVec3::new(-1, 0, 1),
    IVec3::new(0, 0, -1),
    IVec3::new(0, 0, 1),
    IVec3::new(1, 0, -1),
    IVec3::new(1, 0, 0),
    IVec3::new(1, 0, 1),
];

/// All 26 offsets of the surrounding cube, `x` major then `y` then `z`.
pub(crate) const ORDINAL_3D_OFFSETS: [IVec3; 26] = [
    IVec3::new(-1, -1, -1),
    IVec3::new(-1, -1, 0),
    IVec3::new(-1, -1, 1),
    IVec3::new(-1, 0, -1),
    IVec3::new(-1, 0, 0),
    IVec3::new(-1, 0, 1),
    IVec3::new(-1, 1, -1),
    IVec3::new(-1, 1, 0),
    IVec3::new(-1, 1, 1),
    IVec3::new(0, -1, -1),
    IVec3::new(0, -1, 0),
    IVec3::new(0, -1, 1),
    IVec3::new(0, 0, -1),
    IVec3::new(0, 0, 1),
    IVec3::new(0, 1, -1),
    IVec3::new(0, 1, 0),
    IVec3::new(0, 1, 1),
    IVec3::new(1, -1, -1),
    IVec3::new(1, -1, 0),
    IVec3::new(1, -1, 1),
    IVec3::new(1, 0, -1),
    IVec3::new(1, 0, 0),
    IVec3::new(1, 0, 1),
    IVec3::new(1, 1, -1),
    IVec3::new(1, 1, 0),
    IVec3::new(1, 1, 1),
];

pub(crate) type Neighbors = SmallVec<[Block; 26]>;

/// Collects the walkable neighbors of `origin` into `target`.
pub(crate) fn neighbors(
    cache: &ChunkNodeCache,
    origin: IVec3,
    allow_vertical: bool,
    target: &mut Neighbors,
) {
    let offsets: &[IVec3] = if allow_vertical {
        &ORDINAL_3D_OFFSETS
    } else {
        &HORIZONTAL_OFFSETS
    };

    for &offset in offsets {
        if let Some(block) = neighbor(cache, origin, offset, allow_vertical) {
            target.push(block);
        }
    }
}

#[inline(always)]
fn neighbor(
    cache: &ChunkNodeCache,
    origin: IVec3,
    offset: IVec3,
    allow_vertical: bool,
) -> Option<Block> {
    let pos = origin + offset;

    // Diagonals may not clip through a corner: both straight cells beside the
    // move, on the neighbor's level, have to be walkable.
    if offset.x != 0 && offset.z != 0 {
        let side_x = origin + IVec3::new(offset.x, offset.y, 0);
        let side_z = origin + IVec3::new(0, offset.y, offset.z);

        if cache.get_node(side_x).is_none() || cache.get_node(side_z).is_none() {
            return None;
        }

        return cache.get_node(pos);
    }

    let direct = cache.get_node(pos);
    if direct.is_some() || allow_vertical {
        return direct;
    }

    // Step up or down a single level when walking straight.
    cache
        .get_node(pos + IVec3::Y)
        .or_else(|| cache.get_node(pos - IVec3::Y))
}
