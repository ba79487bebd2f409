//! Bevy integration: polls the [`PathfindScheduler`] once per frame.
use std::sync::Arc;

use bevy::{log, prelude::*};

use crate::{chunk::ChunkNodeCache, scheduler::PathfindScheduler, settings::PathfindSettings};

/// Inserts a [`PathfindScheduler`] resource and ticks it every `Update`.
///
/// Callbacks run inside [`PathingSet`], on the main schedule's thread.
pub struct PathfindPlugin {
    cache: Arc<ChunkNodeCache>,
    settings: PathfindSettings,
}

impl PathfindPlugin {
    pub fn new(cache: Arc<ChunkNodeCache>, settings: PathfindSettings) -> Self {
        PathfindPlugin { cache, settings }
    }
}

impl Plugin for PathfindPlugin {
    fn build(&self, app: &mut App) {
        let scheduler = PathfindScheduler::new(Arc::clone(&self.cache), &self.settings)
            .unwrap_or_else(|err| panic!("Failed to create pathfind scheduler: {err}"));

        app.insert_resource(scheduler)
            .add_systems(Update, run_scheduler.in_set(PathingSet));
    }
}

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathingSet;

fn run_scheduler(mut scheduler: ResMut<PathfindScheduler>) {
    let delivered = scheduler.run_scheduler_tick();

    if delivered > 0 {
        log::trace!(
            "Delivered {} paths, {} running, {} queued",
            delivered,
            scheduler.active_len(),
            scheduler.pending_len()
        );
    }
}
