//! Fixed-size grid spatial index, rebuilt once per tick, used only by the
//! Engine for O(local) neighbour queries during physics and trait queries.

use crate::entity::EntityId;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// Default cell size in world units (spec.md §3: "50×50 world units").
pub const DEFAULT_CELL_SIZE: f32 = 50.0;

/// A grid cell coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CellCoord(pub i32, pub i32);

/// Maps each occupied cell to the set of entity ids within it.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size: f32,
    cells: BTreeMap<CellCoord, BTreeSet<EntityId>>,
}

impl SpatialIndex {
    /// An empty index with the given cell size.
    pub fn new(cell_size: f32) -> Self {
        SpatialIndex {
            cell_size: cell_size.max(1.0),
            cells: BTreeMap::new(),
        }
    }

    /// The cell a world position falls into.
    pub fn cell_of(&self, x: f32, y: f32) -> CellCoord {
        CellCoord((x / self.cell_size).floor() as i32, (y / self.cell_size).floor() as i32)
    }

    /// Rebuild the index from scratch for the given `(id, x, y)` triples.
    /// Called once per tick; the Engine discards the previous index.
    pub fn rebuild<'a>(&mut self, entities: impl Iterator<Item = (EntityId, f32, f32)>) {
        self.cells.clear();
        for (id, x, y) in entities {
            let cell = self.cell_of(x, y);
            self.cells.entry(cell).or_default().insert(id);
        }
    }

    /// Entity ids in `cell` and its eight neighbours, deterministically
    /// ordered by `(cell, entity id)` via the underlying `BTreeMap`/`BTreeSet`.
    pub fn neighbours_of(&self, x: f32, y: f32) -> Vec<EntityId> {
        let center = self.cell_of(x, y);
        let mut out = Vec::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                let cell = CellCoord(center.0 + dx, center.1 + dy);
                if let Some(ids) = self.cells.get(&cell) {
                    out.extend(ids.iter().copied());
                }
            }
        }
        out
    }

    /// Number of occupied cells, useful for telemetry/debugging.
    pub fn occupied_cell_count(&self) -> usize {
        self.cells.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_cell_entities_are_neighbours() {
        let mut idx = SpatialIndex::new(DEFAULT_CELL_SIZE);
        idx.rebuild(vec![(EntityId(1), 1.0, 1.0), (EntityId(2), 2.0, 2.0)].into_iter());
        let neighbours = idx.neighbours_of(1.0, 1.0);
        assert!(neighbours.contains(&EntityId(1)));
        assert!(neighbours.contains(&EntityId(2)));
    }

    #[test]
    fn far_apart_entities_are_not_neighbours() {
        let mut idx = SpatialIndex::new(DEFAULT_CELL_SIZE);
        idx.rebuild(vec![(EntityId(1), 0.0, 0.0), (EntityId(2), 500.0, 500.0)].into_iter());
        let neighbours = idx.neighbours_of(0.0, 0.0);
        assert!(neighbours.contains(&EntityId(1)));
        assert!(!neighbours.contains(&EntityId(2)));
    }

    #[test]
    fn rebuild_clears_previous_tick_state() {
        let mut idx = SpatialIndex::new(DEFAULT_CELL_SIZE);
        idx.rebuild(vec![(EntityId(1), 0.0, 0.0)].into_iter());
        idx.rebuild(vec![(EntityId(2), 500.0, 500.0)].into_iter());
        assert!(!idx.neighbours_of(0.0, 0.0).contains(&EntityId(1)));
    }
}
