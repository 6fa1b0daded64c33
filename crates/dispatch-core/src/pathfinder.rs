//! Asynchronous shortest-path service consumed by the assignment
//! coordinator.
//!
//! The coordinator only depends on the `PathfinderService` contract: issue
//! one batched request, receive one positionally-aligned result some ticks
//! later, correlate by request id. `GridPathfinder` is the bundled
//! implementation: breadth-first search over the nav map, a configurable
//! result latency, and an optional worker pool that computes due batches in
//! parallel while committing results in issue order.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use contracts::{BlockPos, Path, PathRequestId, PathResult};

use crate::nav::NavMap;

pub trait PathfinderService: fmt::Debug {
    /// Issue a batched request: one source, one path per target. Targets
    /// may repeat; the result aligns positionally with this list.
    fn request_paths(
        &mut self,
        tick: u64,
        source: BlockPos,
        targets: Vec<BlockPos>,
    ) -> PathRequestId;

    /// Results whose computation latency has elapsed by `tick`, in issue
    /// order. A request is delivered exactly once.
    fn poll_ready(&mut self, nav: &NavMap, tick: u64) -> Vec<PathResult>;

    /// Requests issued but not yet delivered.
    fn pending_count(&self) -> usize;
}

#[derive(Debug, Clone)]
struct PendingRequest {
    request_id: PathRequestId,
    source: BlockPos,
    targets: Vec<BlockPos>,
    ready_tick: u64,
}

/// Breadth-first pathfinder over the nav map's step adjacency.
pub struct GridPathfinder {
    next_request_id: u64,
    latency_ticks: u64,
    pending: VecDeque<PendingRequest>,
    pool: Option<rayon::ThreadPool>,
}

impl fmt::Debug for GridPathfinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridPathfinder")
            .field("latency_ticks", &self.latency_ticks)
            .field("pending", &self.pending.len())
            .field("workers", &self.pool.as_ref().map(|p| p.current_num_threads()))
            .finish()
    }
}

impl GridPathfinder {
    /// `worker_threads` of 0 computes inline on the logic thread.
    pub fn new(latency_ticks: u64, worker_threads: usize) -> Self {
        let pool = if worker_threads > 0 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(worker_threads)
                .build()
                .ok()
        } else {
            None
        };
        Self {
            next_request_id: 0,
            latency_ticks,
            pending: VecDeque::new(),
            pool,
        }
    }

    fn compute(nav: &NavMap, request: &PendingRequest) -> PathResult {
        let paths = bfs_paths(nav, request.source, &request.targets);
        PathResult {
            request_id: request.request_id,
            paths,
        }
    }
}

impl PathfinderService for GridPathfinder {
    fn request_paths(
        &mut self,
        tick: u64,
        source: BlockPos,
        targets: Vec<BlockPos>,
    ) -> PathRequestId {
        self.next_request_id += 1;
        let request_id = PathRequestId(self.next_request_id);
        self.pending.push_back(PendingRequest {
            request_id,
            source,
            targets,
            ready_tick: tick.saturating_add(self.latency_ticks),
        });
        request_id
    }

    fn poll_ready(&mut self, nav: &NavMap, tick: u64) -> Vec<PathResult> {
        let mut due = Vec::new();
        while let Some(front) = self.pending.front() {
            if front.ready_tick <= tick {
                due.push(self.pending.pop_front().expect("front just checked"));
            } else {
                break;
            }
        }
        if due.is_empty() {
            return Vec::new();
        }
        match &self.pool {
            Some(pool) => pool.install(|| {
                use rayon::prelude::*;
                due.par_iter().map(|request| Self::compute(nav, request)).collect()
            }),
            None => due.iter().map(|request| Self::compute(nav, request)).collect(),
        }
    }

    fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// One search serves the whole batch: expand from the source until every
/// reachable target has a parent, then reconstruct per target. Unreachable
/// targets stay `None`.
fn bfs_paths(nav: &NavMap, source: BlockPos, targets: &[BlockPos]) -> Vec<Option<Path>> {
    if targets.is_empty() {
        return Vec::new();
    }
    let mut parent: BTreeMap<BlockPos, BlockPos> = BTreeMap::new();
    let mut remaining: usize = {
        let mut distinct: Vec<BlockPos> = targets.to_vec();
        distinct.sort_unstable();
        distinct.dedup();
        distinct.iter().filter(|t| **t != source).count()
    };

    if nav.is_walkable(source) {
        let mut frontier = VecDeque::new();
        frontier.push_back(source);
        parent.insert(source, source);
        while let Some(pos) = frontier.pop_front() {
            if remaining == 0 {
                break;
            }
            for next in nav.neighbors(pos) {
                if parent.contains_key(&next) {
                    continue;
                }
                parent.insert(next, pos);
                if targets.contains(&next) {
                    remaining -= 1;
                }
                frontier.push_back(next);
            }
        }
    }

    targets
        .iter()
        .map(|target| {
            if !parent.contains_key(target) {
                return None;
            }
            let mut steps = vec![*target];
            let mut cursor = *target;
            while cursor != source {
                cursor = parent[&cursor];
                steps.push(cursor);
            }
            steps.reverse();
            Some(Path { steps })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corridor() -> NavMap {
        NavMap::from_ascii_levels(&["....."])
    }

    #[test]
    fn paths_align_with_requested_targets() {
        let nav = NavMap::from_ascii_levels(&["...#."]);
        let mut finder = GridPathfinder::new(0, 0);
        let source = BlockPos::new(0, 0, 0);
        let reachable = BlockPos::new(2, 0, 0);
        let walled_off = BlockPos::new(4, 0, 0);
        let id = finder.request_paths(1, source, vec![reachable, walled_off]);

        let results = finder.poll_ready(&nav, 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].request_id, id);
        assert_eq!(results[0].paths.len(), 2);
        let path = results[0].paths[0].as_ref().expect("reachable target");
        assert_eq!(path.start(), Some(source));
        assert_eq!(path.target(), Some(reachable));
        assert_eq!(path.len(), 3);
        assert!(results[0].paths[1].is_none(), "wall blocks the second target");
    }

    #[test]
    fn latency_delays_delivery() {
        let nav = corridor();
        let mut finder = GridPathfinder::new(2, 0);
        finder.request_paths(5, BlockPos::new(0, 0, 0), vec![BlockPos::new(3, 0, 0)]);

        assert!(finder.poll_ready(&nav, 5).is_empty());
        assert!(finder.poll_ready(&nav, 6).is_empty());
        assert_eq!(finder.pending_count(), 1);
        assert_eq!(finder.poll_ready(&nav, 7).len(), 1);
        assert_eq!(finder.pending_count(), 0);
    }

    #[test]
    fn results_come_back_in_issue_order() {
        let nav = corridor();
        let mut finder = GridPathfinder::new(0, 0);
        let first = finder.request_paths(1, BlockPos::new(0, 0, 0), vec![BlockPos::new(1, 0, 0)]);
        let second = finder.request_paths(1, BlockPos::new(4, 0, 0), vec![BlockPos::new(2, 0, 0)]);

        let results = finder.poll_ready(&nav, 1);
        assert_eq!(
            results.iter().map(|r| r.request_id).collect::<Vec<_>>(),
            vec![first, second]
        );
    }

    #[test]
    fn worker_pool_preserves_result_order() {
        let nav = corridor();
        let mut finder = GridPathfinder::new(0, 2);
        let ids: Vec<PathRequestId> = (0..6)
            .map(|i| {
                finder.request_paths(1, BlockPos::new(0, 0, 0), vec![BlockPos::new(i % 5, 0, 0)])
            })
            .collect();
        let results = finder.poll_ready(&nav, 1);
        assert_eq!(results.iter().map(|r| r.request_id).collect::<Vec<_>>(), ids);
    }

    #[test]
    fn source_equal_to_target_yields_single_step_path() {
        let nav = corridor();
        let mut finder = GridPathfinder::new(0, 0);
        let here = BlockPos::new(2, 0, 0);
        finder.request_paths(1, here, vec![here]);
        let results = finder.poll_ready(&nav, 1);
        let path = results[0].paths[0].as_ref().expect("trivial path");
        assert_eq!(path.steps, vec![here]);
    }

    #[test]
    fn unwalkable_source_invalidates_all_paths() {
        let nav = corridor();
        let mut finder = GridPathfinder::new(0, 0);
        finder.request_paths(1, BlockPos::new(0, 0, 9), vec![BlockPos::new(1, 0, 0)]);
        let results = finder.poll_ready(&nav, 1);
        assert!(results[0].paths[0].is_none());
    }

    #[test]
    fn cross_floor_path_uses_the_stair() {
        let nav = NavMap::from_ascii_levels(&[
            "...\n\
             ...",
            "#..\n\
             ###",
        ]);
        let mut finder = GridPathfinder::new(0, 0);
        finder.request_paths(1, BlockPos::new(0, 0, 0), vec![BlockPos::new(2, 0, 1)]);
        let results = finder.poll_ready(&nav, 1);
        let path = results[0].paths[0].as_ref().expect("stair reachable");
        assert_eq!(path.start(), Some(BlockPos::new(0, 0, 0)));
        assert_eq!(path.target(), Some(BlockPos::new(2, 0, 1)));
        assert_eq!(path.len(), 3, "one stair step up, no detour");
    }
}
