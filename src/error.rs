//! Error type for the fallible entry points of the crate.
//!
//! Search failures are not errors: an unreachable target produces an empty
//! [`crate::path::Path`] delivered through the normal callback.
use bevy::math::UVec3;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathfindError {
    /// A request endpoint lies outside the world covered by the cache.
    #[error("block at {pos} is outside the world")]
    UnresolvedBlock { pos: UVec3 },
    /// Settings failed validation in [`crate::settings::PathfindSettingsBuilder::try_build`].
    #[error("invalid pathfinding settings: {0}")]
    InvalidSettings(&'static str),
    /// The background worker pool could not be started.
    #[error("failed to start pathfinding workers: {0}")]
    WorkerPool(String),
}
