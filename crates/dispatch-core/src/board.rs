//! The job board: open job instances per kind, a per-floor target index
//! rebuilt once per tick, and candidate generation for requesting minions.
//!
//! Mutation intake is two-phase: `mark`/`unmark` only queue, and the queues
//! are applied at the next `rebuild` boundary, so a scan in progress never
//! observes the open set shrinking under it.

use std::collections::{BTreeMap, BTreeSet};

use contracts::{BlockPos, BoardSnapshot, FloorId, JobPossibility, JobRef, JobSnapshot};

use crate::job::{BoardError, JobCatalog, JobInstance, WALK_KIND_ID};
use crate::nav::NavMap;

/// Rebuilt-per-tick discovery index for one job kind.
#[derive(Debug, Clone, Default)]
struct KindIndex {
    targets_by_floor: BTreeMap<FloorId, Vec<BlockPos>>,
}

#[derive(Debug, Clone)]
pub struct JobBoard {
    catalog: JobCatalog,
    next_job_id: u64,
    /// Open instances keyed by their marked location.
    open: BTreeMap<BlockPos, JobInstance>,
    pending_marks: Vec<(BlockPos, String)>,
    pending_unmarks: BTreeSet<BlockPos>,
    index_by_kind: BTreeMap<String, KindIndex>,
    /// Global target position -> marked location of the owning instance.
    target_index: BTreeMap<BlockPos, BlockPos>,
}

impl JobBoard {
    pub fn new(catalog: JobCatalog) -> Self {
        Self {
            catalog,
            next_job_id: 0,
            open: BTreeMap::new(),
            pending_marks: Vec::new(),
            pending_unmarks: BTreeSet::new(),
            index_by_kind: BTreeMap::new(),
            target_index: BTreeMap::new(),
        }
    }

    pub fn catalog(&self) -> &JobCatalog {
        &self.catalog
    }

    /// Queue a new instance of `kind_id` at `location`. Takes effect at the
    /// next rebuild; a queued mark on an already-marked location replaces
    /// the previous instance there, discarding it unperformed.
    ///
    /// Returns `Ok(false)` when the kind rejects the location.
    pub fn mark(
        &mut self,
        nav: &NavMap,
        location: BlockPos,
        kind_id: &str,
    ) -> Result<bool, BoardError> {
        let kind = self.catalog.get(kind_id).ok_or_else(|| BoardError::UnknownKind {
            kind_id: kind_id.to_string(),
        })?;
        if !kind.is_assignable(location, nav) {
            return Ok(false);
        }
        self.pending_marks.push((location, kind_id.to_string()));
        Ok(true)
    }

    /// Queue removal of whatever instance sits at `location`. No-op if the
    /// location is unmarked when the queue is applied.
    pub fn unmark(&mut self, location: BlockPos) {
        self.pending_unmarks.insert(location);
    }

    /// Apply queued marks and unmarks, scrub completed instances, then
    /// recompute the per-floor and global target indexes from the open,
    /// unreserved instances. Runs once per scheduling tick.
    pub fn rebuild(&mut self, nav: &NavMap) {
        for (location, kind_id) in std::mem::take(&mut self.pending_marks) {
            self.next_job_id += 1;
            self.open
                .insert(location, JobInstance::new(self.next_job_id, kind_id, location));
        }
        for location in std::mem::take(&mut self.pending_unmarks) {
            self.open.remove(&location);
        }
        self.open.retain(|_, instance| !instance.completed);

        self.index_by_kind.clear();
        self.target_index.clear();
        for instance in self.open.values() {
            if instance.reserved_by.is_some() {
                continue;
            }
            let Some(kind) = self.catalog.get(&instance.kind_id) else {
                continue;
            };
            for target in kind.target_positions(instance, nav) {
                let Some(floor) = nav.floor_of(target) else {
                    continue;
                };
                self.index_by_kind
                    .entry(instance.kind_id.clone())
                    .or_default()
                    .targets_by_floor
                    .entry(floor)
                    .or_default()
                    .push(target);
                self.target_index.insert(target, instance.location);
            }
        }
    }

    /// Candidate generation for a minion standing on `current_floor`.
    ///
    /// Per kind: every target on the minion's floor, resolved to its
    /// instance through the global map. A kind with nothing local instead
    /// contributes the first-enumerated entrance of each other floor that
    /// has targets, offered as an instance-less walk candidate so the
    /// minion can close in on cross-floor work.
    pub fn find_targets(&self, current_floor: FloorId, nav: &NavMap) -> Vec<JobPossibility> {
        let mut possibilities = Vec::new();
        for kind in self.catalog.kinds() {
            let Some(index) = self.index_by_kind.get(kind.id()) else {
                continue;
            };
            let local = index
                .targets_by_floor
                .get(&current_floor)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            if !local.is_empty() {
                for target in local {
                    possibilities.push(self.possibility_for(kind.id(), *target));
                }
            } else {
                for floor in index.targets_by_floor.keys() {
                    if let Some(entrance) = nav.entrances(*floor).first() {
                        possibilities.push(self.possibility_for(kind.id(), *entrance));
                    }
                }
            }
        }
        possibilities
    }

    fn possibility_for(&self, kind_id: &str, target: BlockPos) -> JobPossibility {
        match self.instance_at(target) {
            Some(instance) => JobPossibility {
                kind_id: kind_id.to_string(),
                target,
                instance: Some(JobRef {
                    job_id: instance.job_id,
                    location: instance.location,
                }),
            },
            None => JobPossibility {
                kind_id: WALK_KIND_ID.to_string(),
                target,
                instance: None,
            },
        }
    }

    /// Resolve a target position to its open instance via the global map.
    pub fn instance_at(&self, target: BlockPos) -> Option<&JobInstance> {
        let location = self.target_index.get(&target)?;
        self.open.get(location)
    }

    /// The instance marked at `location`, regardless of reservation.
    pub fn get(&self, location: BlockPos) -> Option<&JobInstance> {
        self.open.get(&location)
    }

    pub fn get_mut(&mut self, location: BlockPos) -> Option<&mut JobInstance> {
        self.open.get_mut(&location)
    }

    /// Reserve the instance for `minion_id`. Fails when the instance is
    /// gone, replaced (id mismatch), or held by another minion.
    pub fn reserve(&mut self, location: BlockPos, job_id: u64, minion_id: &str) -> bool {
        match self.open.get_mut(&location) {
            Some(instance) if instance.job_id == job_id => match &instance.reserved_by {
                Some(holder) if holder != minion_id => false,
                _ => {
                    instance.reserved_by = Some(minion_id.to_string());
                    true
                }
            },
            _ => false,
        }
    }

    /// Clear the reservation if `minion_id` holds it.
    pub fn release_if_held(&mut self, location: BlockPos, job_id: u64, minion_id: &str) {
        if let Some(instance) = self.open.get_mut(&location) {
            if instance.job_id == job_id && instance.reserved_by.as_deref() == Some(minion_id) {
                instance.reserved_by = None;
            }
        }
    }

    /// Clear the reservation no matter who holds it. Arrival uses this so
    /// a stale reservation never blocks rediscovery, even on failure paths.
    pub fn clear_reservation(&mut self, location: BlockPos, job_id: u64) {
        if let Some(instance) = self.open.get_mut(&location) {
            if instance.job_id == job_id {
                instance.reserved_by = None;
            }
        }
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn open_jobs(&self) -> impl Iterator<Item = &JobInstance> {
        self.open.values()
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            open: self
                .open
                .values()
                .map(|instance| JobSnapshot {
                    job_id: instance.job_id,
                    kind_id: instance.kind_id.clone(),
                    location: instance.location,
                    reserved_by: instance.reserved_by.clone(),
                    completed: instance.completed,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_map() -> NavMap {
        NavMap::from_ascii_levels(&[".....\n.....\n....."])
    }

    fn board() -> JobBoard {
        JobBoard::new(JobCatalog::default_catalog())
    }

    #[test]
    fn mark_takes_effect_only_at_rebuild() {
        let nav = flat_map();
        let mut board = board();
        let site = BlockPos::new(2, 1, 0);
        assert!(board.mark(&nav, site, "work:build").unwrap());
        assert_eq!(board.open_count(), 0);

        board.rebuild(&nav);
        assert_eq!(board.open_count(), 1);
        assert_eq!(board.instance_at(site).map(|i| i.kind_id.as_str()), Some("work:build"));
    }

    #[test]
    fn mark_unknown_kind_is_an_error() {
        let nav = flat_map();
        let mut board = board();
        let err = board
            .mark(&nav, BlockPos::new(0, 0, 0), "work:unheard_of")
            .unwrap_err();
        assert_eq!(
            err,
            BoardError::UnknownKind {
                kind_id: "work:unheard_of".to_string()
            }
        );
    }

    #[test]
    fn mark_unassignable_location_is_a_noop() {
        let nav = flat_map();
        let mut board = board();
        // Excavate wants a solid block; open ground is not assignable.
        assert!(!board.mark(&nav, BlockPos::new(1, 1, 0), "work:excavate").unwrap());
        board.rebuild(&nav);
        assert_eq!(board.open_count(), 0);
    }

    #[test]
    fn remark_replaces_previous_instance() {
        let nav = flat_map();
        let mut board = board();
        let site = BlockPos::new(2, 1, 0);
        board.mark(&nav, site, "work:build").unwrap();
        board.rebuild(&nav);
        let first_id = board.get(site).unwrap().job_id;

        board.mark(&nav, site, "work:build").unwrap();
        board.rebuild(&nav);
        assert_eq!(board.open_count(), 1);
        assert_ne!(board.get(site).unwrap().job_id, first_id);
    }

    #[test]
    fn unmark_is_deferred_to_next_rebuild() {
        let nav = flat_map();
        let mut board = board();
        let site = BlockPos::new(2, 1, 0);
        board.mark(&nav, site, "work:build").unwrap();
        board.rebuild(&nav);

        board.unmark(site);
        assert_eq!(board.open_count(), 1, "removal must not act mid-tick");
        board.rebuild(&nav);
        assert_eq!(board.open_count(), 0);
    }

    #[test]
    fn unmark_of_empty_location_is_a_noop() {
        let nav = flat_map();
        let mut board = board();
        board.unmark(BlockPos::new(4, 4, 4));
        board.rebuild(&nav);
        assert_eq!(board.open_count(), 0);
    }

    #[test]
    fn reserved_instances_are_excluded_from_discovery() {
        let nav = flat_map();
        let mut board = board();
        let site = BlockPos::new(2, 1, 0);
        board.mark(&nav, site, "work:build").unwrap();
        board.rebuild(&nav);
        let floor = nav.floor_of(site).unwrap();
        assert_eq!(board.find_targets(floor, &nav).len(), 1);

        let job_id = board.get(site).unwrap().job_id;
        assert!(board.reserve(site, job_id, "minion_a"));
        board.rebuild(&nav);
        assert!(board.find_targets(floor, &nav).is_empty());
        assert_eq!(board.instance_at(site), None);

        board.release_if_held(site, job_id, "minion_a");
        board.rebuild(&nav);
        assert_eq!(board.find_targets(floor, &nav).len(), 1);
    }

    #[test]
    fn local_candidates_resolve_to_their_instances() {
        let nav = flat_map();
        let mut board = board();
        let site_a = BlockPos::new(1, 1, 0);
        let site_b = BlockPos::new(3, 2, 0);
        board.mark(&nav, site_a, "work:build").unwrap();
        board.mark(&nav, site_b, "work:build").unwrap();
        board.rebuild(&nav);

        let floor = nav.floor_of(site_a).unwrap();
        let possibilities = board.find_targets(floor, &nav);
        assert_eq!(possibilities.len(), 2);
        for possibility in &possibilities {
            assert_eq!(possibility.kind_id, "work:build");
            let job_ref = possibility.instance.expect("local candidate keeps its instance");
            assert_eq!(
                board.get(job_ref.location).map(|i| i.job_id),
                Some(job_ref.job_id)
            );
        }
    }

    #[test]
    fn remote_floor_yields_single_entrance_walk_candidate() {
        // Ground floor plus a two-cell ledge reached by a stair step; the
        // ledge's first entrance (1,0,1) is not the marked cell.
        let nav = NavMap::from_ascii_levels(&[
            "...\n\
             ...",
            "#..\n\
             ###",
        ]);
        let ledge = BlockPos::new(2, 0, 1);
        let ground_floor = nav.floor_of(BlockPos::new(0, 0, 0)).unwrap();
        let ledge_floor = nav.floor_of(ledge).unwrap();

        let mut board = board();
        board.mark(&nav, ledge, "work:build").unwrap();
        board.rebuild(&nav);

        let possibilities = board.find_targets(ground_floor, &nav);
        assert_eq!(possibilities.len(), 1);
        let fallback = &possibilities[0];
        assert_eq!(fallback.kind_id, WALK_KIND_ID);
        assert!(fallback.instance.is_none());
        assert_eq!(
            Some(fallback.target),
            nav.entrances(ledge_floor).first().copied(),
            "fallback offers the first-enumerated entrance, not the job position"
        );
        assert_ne!(fallback.target, ledge);
    }

    #[test]
    fn find_targets_is_empty_when_nothing_is_open() {
        let nav = flat_map();
        let board = board();
        let floor = nav.floor_of(BlockPos::new(0, 0, 0)).unwrap();
        assert!(board.find_targets(floor, &nav).is_empty());
    }

    #[test]
    fn completed_instances_are_scrubbed_at_rebuild() {
        let nav = flat_map();
        let mut board = board();
        let site = BlockPos::new(2, 1, 0);
        board.mark(&nav, site, "work:build").unwrap();
        board.rebuild(&nav);

        board.get_mut(site).unwrap().completed = true;
        board.rebuild(&nav);
        assert_eq!(board.open_count(), 0);
    }

    #[test]
    fn reserve_rejects_mismatched_id_and_foreign_holder() {
        let nav = flat_map();
        let mut board = board();
        let site = BlockPos::new(2, 1, 0);
        board.mark(&nav, site, "work:build").unwrap();
        board.rebuild(&nav);
        let job_id = board.get(site).unwrap().job_id;

        assert!(!board.reserve(site, job_id + 99, "minion_a"), "stale id");
        assert!(board.reserve(site, job_id, "minion_a"));
        assert!(!board.reserve(site, job_id, "minion_b"), "held by another");
        assert!(board.reserve(site, job_id, "minion_a"), "re-reserve by holder");

        board.release_if_held(site, job_id, "minion_b");
        assert_eq!(board.get(site).unwrap().reserved_by.as_deref(), Some("minion_a"));
        board.release_if_held(site, job_id, "minion_a");
        assert_eq!(board.get(site).unwrap().reserved_by, None);
    }
}
