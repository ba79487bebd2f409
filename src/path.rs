//! This module defines the [`Path`] returned by a search.
use bevy::math::UVec3;

use crate::block::Block;

/// The ordered blocks of a route from start to target, both included.
///
/// An empty path means no route was found.
#[derive(Debug, Clone, Default)]
pub struct Path {
    steps: Vec<Block>,
    cost: u32,
}

impl Path {
    /// Create a new path from the ordered blocks and the total movement cost.
    pub fn new(steps: Vec<Block>, cost: u32) -> Self {
        Path { steps, cost }
    }

    /// The result of a failed search.
    pub fn empty() -> Self {
        Path::default()
    }

    /// Returns the blocks of the path in walking order.
    ///
    /// # Example
    ///
    /// ```rust
    /// use bevy::math::UVec3;
    /// use voxel_pathfind::prelude::*;
    ///
    /// let a = Block::walkable(UVec3::new(0, 0, 0));
    /// let b = Block::walkable(UVec3::new(1, 0, 1));
    /// let path = Path::new(vec![a, b], 14);
    /// assert_eq!(path.blocks(), &[a, b]);
    /// ```
    pub fn blocks(&self) -> &[Block] {
        &self.steps
    }

    /// Iterates the positions of the path.
    pub fn positions(&self) -> impl Iterator<Item = UVec3> + '_ {
        self.steps.iter().map(|block| block.pos)
    }

    /// Returns the movement cost of the path
    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn first(&self) -> Option<Block> {
        self.steps.first().copied()
    }

    pub fn last(&self) -> Option<Block> {
        self.steps.last().copied()
    }

    /// Returns true if the path contains the given position
    pub fn is_position_in_path(&self, pos: UVec3) -> bool {
        self.steps.iter().any(|block| block.pos == pos)
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.steps == other.steps
    }
}

impl Eq for Path {}

impl IntoIterator for Path {
    type Item = Block;
    type IntoIter = std::vec::IntoIter<Block>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_path() {
        let path = Path::empty();

        assert!(path.is_empty());
        assert_eq!(path.len(), 0);
        assert_eq!(path.cost(), 0);
        assert!(path.first().is_none());
    }

    #[test]
    fn test_path_accessors() {
        let steps = vec![
            Block::walkable(UVec3::new(0, 0, 0)),
            Block::walkable(UVec3::new(1, 0, 0)),
            Block::walkable(UVec3::new(2, 1, 0)),
        ];
        let path = Path::new(steps.clone(), 30);

        assert_eq!(path.len(), 3);
        assert_eq!(path.first().unwrap().pos, UVec3::new(0, 0, 0));
        assert_eq!(path.last().unwrap().pos, UVec3::new(2, 1, 0));
        assert!(path.is_position_in_path(UVec3::new(1, 0, 0)));
        assert!(!path.is_position_in_path(UVec3::new(1, 1, 0)));
        assert_eq!(
            path.positions().collect::<Vec<_>>(),
            vec![
                UVec3::new(0, 0, 0),
                UVec3::new(1, 0, 0),
                UVec3::new(2, 1, 0)
            ]
        );
        assert_eq!(path.into_iter().collect::<Vec<_>>(), steps);
    }
}
