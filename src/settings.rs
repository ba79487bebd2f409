//! Configuration for the node cache, the search and the scheduler.
use bevy::math::UVec3;

use crate::error::PathfindError;

/// How the world is divided into chunks.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChunkSettings {
    /// Width and length of each square chunk, in blocks.
    pub chunk_size: u32,
    /// Number of chunks along each horizontal axis of the world.
    pub world_chunk_width: u32,
    /// Height of the world. Valid `y` values are `0..max_y`.
    pub max_y: u32,
}

impl ChunkSettings {
    /// Width of the world along `x` and `z`, in blocks.
    pub fn world_width(&self) -> u32 {
        self.world_chunk_width * self.chunk_size
    }

    /// Dimensions of the whole world as `(width, max_y, width)`.
    pub fn dimensions(&self) -> UVec3 {
        UVec3::new(self.world_width(), self.max_y, self.world_width())
    }
}

impl Default for ChunkSettings {
    fn default() -> Self {
        ChunkSettings {
            chunk_size: 16,
            world_chunk_width: 4,
            max_y: 16,
        }
    }
}

/// Per-search options.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SearchSettings {
    /// If true, all 26 surrounding cells are considered neighbors.
    /// Otherwise only the 8 horizontal cells, with a one block step up or down
    /// allowed for straight moves.
    pub allow_vertical: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        SearchSettings {
            allow_vertical: true,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Maximum number of searches running at the same time.
    pub max_workers: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        SchedulerSettings { max_workers: 4 }
    }
}

/// All settings for the crate. Use [`PathfindSettingsBuilder`] to create one.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PathfindSettings {
    pub chunk: ChunkSettings,
    pub search: SearchSettings,
    pub scheduler: SchedulerSettings,
}

/// Builder for [`PathfindSettings`].
///
/// Example usage:
/// ```
/// use voxel_pathfind::prelude::*;
///
/// let settings = PathfindSettingsBuilder::new(16, 4, 32)
///     .allow_vertical(false)
///     .max_workers(2)
///     .build();
///
/// assert_eq!(settings.chunk.world_width(), 64);
/// assert_eq!(settings.scheduler.max_workers, 2);
/// ```
#[derive(Clone, Debug, Default)]
pub struct PathfindSettingsBuilder {
    settings: PathfindSettings,
}

impl PathfindSettingsBuilder {
    /// Starts a builder for a world of `world_chunk_width × world_chunk_width` chunks
    /// of `chunk_size` blocks, `max_y` blocks high.
    pub fn new(chunk_size: u32, world_chunk_width: u32, max_y: u32) -> Self {
        PathfindSettingsBuilder {
            settings: PathfindSettings {
                chunk: ChunkSettings {
                    chunk_size,
                    world_chunk_width,
                    max_y,
                },
                ..Default::default()
            },
        }
    }

    /// Toggles movement between vertical layers.
    pub fn allow_vertical(mut self, allow_vertical: bool) -> Self {
        self.settings.search.allow_vertical = allow_vertical;
        self
    }

    /// Maximum number of concurrent searches.
    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.settings.scheduler.max_workers = max_workers;
        self
    }

    /// Validates and returns the settings.
    pub fn try_build(self) -> Result<PathfindSettings, PathfindError> {
        let PathfindSettings {
            chunk, scheduler, ..
        } = self.settings;

        if chunk.chunk_size < 1 {
            return Err(PathfindError::InvalidSettings(
                "chunk size must be at least 1",
            ));
        }

        if chunk.world_chunk_width < 1 {
            return Err(PathfindError::InvalidSettings(
                "world chunk width must be at least 1",
            ));
        }

        if chunk.max_y < 1 {
            return Err(PathfindError::InvalidSettings(
                "max y must be at least 1",
            ));
        }

        if scheduler.max_workers < 1 {
            return Err(PathfindError::InvalidSettings(
                "max workers must be at least 1",
            ));
        }

        Ok(self.settings)
    }

    /// Builds the settings, panicking if they are invalid.
    pub fn build(self) -> PathfindSettings {
        match self.try_build() {
            Ok(settings) => settings,
            Err(err) => panic!("{err}"),
        }
    }
}
