//! Navigation substrate: walkable positions partitioned into floors, with
//! per-floor entrance positions toward adjacent floors.
//!
//! The partition is normally supplied by the host's nav-graph builder; the
//! flood-fill constructors here exist so demos and tests can stand up a map
//! from a plain cell set or ASCII levels.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use contracts::{BlockPos, FloorId};

/// Horizontal step directions. Vertical movement is a horizontal step
/// combined with z±1 (a stair), never a pure climb.
const HORIZONTAL_STEPS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Read-only spatial partition consumed by the job board and pathfinder.
///
/// A floor is a maximal set of walkable positions mutually reachable by
/// same-level steps; stairs connect floors. An entrance is a floor member
/// from which a single step reaches a different floor.
#[derive(Debug, Clone, Default)]
pub struct NavMap {
    floor_by_position: BTreeMap<BlockPos, FloorId>,
    entrances_by_floor: BTreeMap<FloorId, Vec<BlockPos>>,
}

impl NavMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the partition from a set of walkable cells: flood-fill floors
    /// over same-z adjacency, then derive entrances from stair steps.
    pub fn from_walkable(cells: &BTreeSet<BlockPos>) -> Self {
        let mut map = Self::new();
        let mut next_floor = 0_u32;
        let mut visited = BTreeSet::new();

        for start in cells {
            if visited.contains(start) {
                continue;
            }
            let floor = FloorId(next_floor);
            next_floor += 1;

            let mut frontier = VecDeque::new();
            frontier.push_back(*start);
            visited.insert(*start);
            while let Some(pos) = frontier.pop_front() {
                map.floor_by_position.insert(pos, floor);
                for (dx, dy) in HORIZONTAL_STEPS {
                    let next = pos.offset(dx, dy, 0);
                    if cells.contains(&next) && visited.insert(next) {
                        frontier.push_back(next);
                    }
                }
            }
        }

        map.rebuild_entrances();
        map
    }

    /// Build from ASCII levels, lowest z first. `.` is walkable, anything
    /// else solid. Row index is y, column index is x.
    pub fn from_ascii_levels(levels: &[&str]) -> Self {
        let mut cells = BTreeSet::new();
        for (z, level) in levels.iter().enumerate() {
            for (y, row) in level.lines().filter(|row| !row.is_empty()).enumerate() {
                for (x, cell) in row.chars().enumerate() {
                    if cell == '.' {
                        cells.insert(BlockPos::new(x as i32, y as i32, z as i32));
                    }
                }
            }
        }
        Self::from_walkable(&cells)
    }

    pub fn is_walkable(&self, position: BlockPos) -> bool {
        self.floor_by_position.contains_key(&position)
    }

    pub fn floor_of(&self, position: BlockPos) -> Option<FloorId> {
        self.floor_by_position.get(&position).copied()
    }

    /// Entrance positions of a floor, in discovery order.
    pub fn entrances(&self, floor: FloorId) -> &[BlockPos] {
        self.entrances_by_floor
            .get(&floor)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn floor_count(&self) -> usize {
        self.entrances_by_floor.len()
    }

    pub fn walkable_count(&self) -> usize {
        self.floor_by_position.len()
    }

    /// Walkable positions reachable from `position` in one step: the four
    /// horizontal neighbors at the same level, or one level up/down.
    pub fn neighbors(&self, position: BlockPos) -> Vec<BlockPos> {
        let mut found = Vec::new();
        for (dx, dy) in HORIZONTAL_STEPS {
            for dz in [0, 1, -1] {
                let next = position.offset(dx, dy, dz);
                if self.is_walkable(next) {
                    found.push(next);
                }
            }
        }
        found
    }

    /// Walkable positions adjacent to an arbitrary (possibly solid) block,
    /// usable as work targets for jobs bound to that block.
    pub fn adjacent_walkable(&self, position: BlockPos) -> Vec<BlockPos> {
        let mut found = Vec::new();
        for (dx, dy) in HORIZONTAL_STEPS {
            for dz in [0, 1, -1] {
                let next = position.offset(dx, dy, dz);
                if self.is_walkable(next) {
                    found.push(next);
                }
            }
        }
        if self.is_walkable(position.offset(0, 0, 1)) {
            found.push(position.offset(0, 0, 1));
        }
        found
    }

    fn rebuild_entrances(&mut self) {
        let mut entrances: BTreeMap<FloorId, Vec<BlockPos>> = BTreeMap::new();
        for floor in self.floor_by_position.values() {
            entrances.entry(*floor).or_default();
        }
        for (position, floor) in &self.floor_by_position {
            let is_entrance = self.neighbors(*position).iter().any(|neighbor| {
                self.floor_of(*neighbor)
                    .map(|other| other != *floor)
                    .unwrap_or(false)
            });
            if is_entrance {
                entrances.entry(*floor).or_default().push(*position);
            }
        }
        self.entrances_by_floor = entrances;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_floor_map() -> NavMap {
        // Ground level with a stair cell at (2,0) leading up to a ledge.
        NavMap::from_ascii_levels(&[
            "...\n\
             ...",
            "##.\n\
             ###",
        ])
    }

    #[test]
    fn single_level_is_one_floor() {
        let map = NavMap::from_ascii_levels(&["...\n..."]);
        assert_eq!(map.floor_count(), 1);
        assert_eq!(map.walkable_count(), 6);
        let floor = map.floor_of(BlockPos::new(0, 0, 0)).unwrap();
        assert_eq!(map.floor_of(BlockPos::new(2, 1, 0)), Some(floor));
    }

    #[test]
    fn disconnected_areas_get_distinct_floors() {
        let map = NavMap::from_ascii_levels(&["..#..\n..#.."]);
        assert_eq!(map.floor_count(), 2);
        let left = map.floor_of(BlockPos::new(0, 0, 0)).unwrap();
        let right = map.floor_of(BlockPos::new(3, 0, 0)).unwrap();
        assert_ne!(left, right);
    }

    #[test]
    fn levels_are_separate_floors_with_entrances() {
        let map = two_floor_map();
        assert_eq!(map.floor_count(), 2);
        let ground = map.floor_of(BlockPos::new(0, 0, 0)).unwrap();
        let ledge = map.floor_of(BlockPos::new(2, 0, 1)).unwrap();
        assert_ne!(ground, ledge);
        assert!(!map.entrances(ground).is_empty());
        assert!(!map.entrances(ledge).is_empty());
    }

    #[test]
    fn neighbors_include_stair_steps() {
        let map = two_floor_map();
        let neighbors = map.neighbors(BlockPos::new(1, 0, 0));
        assert!(neighbors.contains(&BlockPos::new(0, 0, 0)));
        assert!(neighbors.contains(&BlockPos::new(2, 0, 0)));
        assert!(neighbors.contains(&BlockPos::new(2, 0, 1)));
    }

    #[test]
    fn adjacent_walkable_finds_work_targets_around_solid_block() {
        let map = NavMap::from_ascii_levels(&[".#."]);
        let targets = map.adjacent_walkable(BlockPos::new(1, 0, 0));
        assert_eq!(
            targets,
            vec![BlockPos::new(2, 0, 0), BlockPos::new(0, 0, 0)]
        );
    }

    #[test]
    fn non_walkable_lookups_are_none() {
        let map = two_floor_map();
        assert!(!map.is_walkable(BlockPos::new(0, 0, 1)));
        assert_eq!(map.floor_of(BlockPos::new(9, 9, 9)), None);
    }
}
