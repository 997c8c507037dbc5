//! Visiting every materialized entity below a root.

use std::collections::VecDeque;

use crate::entity::{EntityId, EntityTree};
use crate::error::Error;

impl EntityTree {
    /// Apply `op` to `start` and every entity below it that is already in
    /// memory. Nothing is explored.
    ///
    /// Each step takes the next pending entity, queues its current children,
    /// then runs `op` on it, so an entity is always processed before any of
    /// its children. Stops at the first error.
    pub fn walk<F>(&mut self, start: EntityId, mut op: F) -> Result<(), Error>
    where
        F: FnMut(&mut EntityTree, EntityId) -> Result<(), Error>,
    {
        self.get(start)?;

        let mut pending = VecDeque::from([start]);
        while let Some(current) = pending.pop_back() {
            for &child in self.get(current)?.children() {
                pending.push_front(child);
            }
            op(self, current)?;
        }

        Ok(())
    }
}
