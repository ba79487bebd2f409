//! Chunked 3D voxel pathfinding.
//!
//! A [`chunk::ChunkNodeCache`] mirrors the walkable cells of a world split into square chunks.
//! [`astar::find_path`] searches it directly, and [`scheduler::PathfindScheduler`] runs those
//! searches on a bounded pool of background workers, handing results back to whoever polls it.
use std::cmp::Ordering;
use std::hash::BuildHasherDefault;

use indexmap::IndexMap;
use rustc_hash::FxHasher;

pub mod astar;
pub mod block;
pub mod chunk;
pub mod error;
mod macros;
mod neighbor;
pub mod node;
pub mod path;
pub mod plugin;
pub mod scheduler;
pub mod settings;

pub mod prelude {
    pub use crate::astar::{find_path, is_valid_step};
    pub use crate::block::{Block, BlockMap, BlockSource};
    pub use crate::chunk::{ChunkCoord, ChunkNodeCache};
    pub use crate::error::PathfindError;
    pub use crate::node::octile_distance;
    pub use crate::path::Path;
    pub use crate::plugin::{PathfindPlugin, PathingSet};
    pub use crate::scheduler::{PathCallback, PathfindScheduler, RequestHandle, RequestState};
    pub use crate::settings::{
        ChunkSettings, PathfindSettings, PathfindSettingsBuilder, SchedulerSettings,
        SearchSettings,
    };
}

type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;

/// Open set entry. The heap pops the lowest `f_cost`, then the lowest `h_cost`,
/// then whichever entry was pushed first.
pub(crate) struct SmallestCostHolder {
    pub(crate) f_cost: u32,
    pub(crate) h_cost: u32,
    pub(crate) sequence: u64,
    pub(crate) index: usize,
}

impl PartialEq for SmallestCostHolder {
    fn eq(&self, other: &Self) -> bool {
        self.f_cost == other.f_cost
            && self.h_cost == other.h_cost
            && self.sequence == other.sequence
    }
}

impl Eq for SmallestCostHolder {}

impl PartialOrd for SmallestCostHolder {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SmallestCostHolder {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f_cost
            .cmp(&self.f_cost)
            .then_with(|| other.h_cost.cmp(&self.h_cost))
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}
