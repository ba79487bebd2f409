//! Search bookkeeping for a single A* invocation and the distance metric it uses.
use bevy::math::UVec3;

use crate::block::Block;

/// Cost of a straight step along one axis.
pub const STRAIGHT_COST: u32 = 10;
/// Cost of a horizontal diagonal step, roughly `STRAIGHT_COST * √2`.
pub const DIAGONAL_COST: u32 = 14;

/// Octile distance over the horizontal `x`/`z` plane plus a straight cost per vertical level.
///
/// Used both as the step cost between neighbors and as the A* heuristic.
/// ```
/// use bevy::math::UVec3;
/// use voxel_pathfind::prelude::*;
///
/// assert_eq!(octile_distance(UVec3::new(0, 0, 0), UVec3::new(9, 0, 9)), 126);
/// assert_eq!(octile_distance(UVec3::new(0, 0, 0), UVec3::new(3, 2, 1)), 14 + 20 + 20);
/// ```
#[inline(always)]
pub fn octile_distance(a: UVec3, b: UVec3) -> u32 {
    let dx = a.x.abs_diff(b.x);
    let dy = a.y.abs_diff(b.y);
    let dz = a.z.abs_diff(b.z);

    let (short, long) = if dx > dz { (dz, dx) } else { (dx, dz) };

    DIAGONAL_COST * short + STRAIGHT_COST * (long - short) + STRAIGHT_COST * dy
}

/// A visited cell during one search. Never stored in the node cache.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PathNode {
    pub(crate) block: Block,
    pub(crate) g_cost: u32,
    pub(crate) h_cost: u32,
    /// Index of the parent node in the search's node table.
    pub(crate) parent: Option<usize>,
    pub(crate) closed: bool,
}

impl PathNode {
    pub(crate) fn new(block: Block, g_cost: u32, h_cost: u32, parent: Option<usize>) -> Self {
        PathNode {
            block,
            g_cost,
            h_cost,
            parent,
            closed: false,
        }
    }

    #[inline(always)]
    pub(crate) fn f_cost(&self) -> u32 {
        self.g_cost + self.h_cost
    }
}
