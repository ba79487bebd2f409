//! A* search over a [`ChunkNodeCache`].
use bevy::{log, math::UVec3};
use indexmap::map::Entry::{Occupied, Vacant};
use std::collections::BinaryHeap;

use crate::{
    block::Block,
    chunk::ChunkNodeCache,
    neighbor::{neighbors, Neighbors},
    node::{octile_distance, PathNode},
    path::Path,
    settings::SearchSettings,
    FxIndexMap, SmallestCostHolder,
};

/// A* search from `start` to `target`.
///
/// All cost and parent bookkeeping lives in a table owned by this call, so the cache is only
/// ever read and concurrent searches against it are safe.
///
/// Among open nodes with equal `f` cost the one with the lower `h` cost is expanded first,
/// and after that the one discovered first.
///
/// # Arguments
/// * `cache` - The walkable cells to search.
/// * `start` - The starting block.
/// * `target` - The block to reach.
/// * `settings` - Per-search options, see [`SearchSettings`].
///
/// # Returns
/// * [`Path`] - The blocks from `start` to `target` inclusive, or an empty path if `target`
///   can't be reached.
pub fn find_path(
    cache: &ChunkNodeCache,
    start: Block,
    target: Block,
    settings: &SearchSettings,
) -> Path {
    if !cache.is_walkable(target.pos) {
        log::debug!("Target {} is not walkable", target.pos);
        return Path::empty();
    }

    let dims = cache.dimensions();
    let mut to_visit = BinaryHeap::with_capacity((dims.x + dims.z) as usize);
    let mut visited: FxIndexMap<UVec3, PathNode> = FxIndexMap::default();
    let mut sequence = 0u64;

    let h_cost = octile_distance(start.pos, target.pos);
    visited.insert(start.pos, PathNode::new(start, 0, h_cost, None));
    to_visit.push(SmallestCostHolder {
        f_cost: h_cost,
        h_cost,
        sequence,
        index: 0,
    });

    let mut buffer = Neighbors::new();

    while let Some(SmallestCostHolder { index, .. }) = to_visit.pop() {
        let current = {
            let Some((_, node)) = visited.get_index_mut(index) else {
                continue;
            };

            // Already expanded through a cheaper entry.
            if node.closed {
                continue;
            }

            node.closed = true;
            *node
        };

        if current.block.pos == target.pos {
            let path = retrace(&visited, index);
            debug_assert!(path
                .blocks()
                .windows(2)
                .all(|step| is_valid_step(step[0].pos, step[1].pos, settings.allow_vertical)));
            return path;
        }

        buffer.clear();
        neighbors(
            cache,
            current.block.pos.as_ivec3(),
            settings.allow_vertical,
            &mut buffer,
        );

        for &neighbor in buffer.iter() {
            let new_cost = current.g_cost + octile_distance(current.block.pos, neighbor.pos);

            let n = match visited.entry(neighbor.pos) {
                Vacant(e) => {
                    let n = e.index();
                    let h_cost = octile_distance(neighbor.pos, target.pos);
                    e.insert(PathNode::new(neighbor, new_cost, h_cost, Some(index)));
                    n
                }
                Occupied(mut e) => {
                    let node = e.get_mut();
                    if node.closed || node.g_cost <= new_cost {
                        continue;
                    }

                    node.g_cost = new_cost;
                    node.parent = Some(index);
                    e.index()
                }
            };

            sequence += 1;
            let node = &visited[n];
            to_visit.push(SmallestCostHolder {
                f_cost: node.f_cost(),
                h_cost: node.h_cost,
                sequence,
                index: n,
            });
        }
    }

    Path::empty()
}

/// Follows parent links back from `goal` and returns the path in walking order.
fn retrace(visited: &FxIndexMap<UVec3, PathNode>, goal: usize) -> Path {
    let mut steps = vec![];
    let mut current = Some(goal);

    while let Some(index) = current {
        let node = &visited[index];
        steps.push(node.block);
        current = node.parent;
    }

    steps.reverse();
    Path::new(steps, visited[goal].g_cost)
}

/// Returns true if a path may move directly from `from` to `to`.
///
/// With vertical movement any of the 26 surrounding cells is a valid step. Without it, steps
/// stay on the horizontal plane, except straight steps which may climb or drop one level.
pub fn is_valid_step(from: UVec3, to: UVec3, allow_vertical: bool) -> bool {
    let dx = from.x.abs_diff(to.x);
    let dy = from.y.abs_diff(to.y);
    let dz = from.z.abs_diff(to.z);

    if from == to || dx > 1 || dy > 1 || dz > 1 {
        return false;
    }

    allow_vertical || dy == 0 || dx + dz == 1
}
