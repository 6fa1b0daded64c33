//! Job kinds and instances.
//!
//! A `JobKind` is the capability contract a category of work satisfies:
//! where it may be marked, where a minion can stand to perform it, and what
//! performing it does. Kinds are registered once in a `JobCatalog` and
//! shared by reference; concrete behavior is expressed as a returned
//! `JobEffect` the host applies, never as ambient world mutation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use contracts::{BlockPos, JobEffect};

use crate::nav::NavMap;

/// Kind id of the built-in instance-less walk filler.
pub const WALK_KIND_ID: &str = "core:walk";

/// A single open unit of work bound to a marked location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInstance {
    pub job_id: u64,
    pub kind_id: String,
    pub location: BlockPos,
    /// Minion currently en route, or none. Reserved instances are excluded
    /// from the rebuilt discovery index.
    pub reserved_by: Option<String>,
    /// Latched by the first successful perform; later arrivals in the same
    /// tick window see the instance as spent.
    pub completed: bool,
}

impl JobInstance {
    pub fn new(job_id: u64, kind_id: impl Into<String>, location: BlockPos) -> Self {
        Self {
            job_id,
            kind_id: kind_id.into(),
            location,
            reserved_by: None,
            completed: false,
        }
    }
}

/// Capability contract for a category of work.
pub trait JobKind: fmt::Debug + Send + Sync {
    /// Stable namespaced identifier, e.g. `work:excavate`.
    fn id(&self) -> &str;

    /// Whether a location can host this kind of work.
    fn is_assignable(&self, location: BlockPos, nav: &NavMap) -> bool;

    /// Walkable positions from which the work can be performed.
    fn target_positions(&self, instance: &JobInstance, nav: &NavMap) -> Vec<BlockPos>;

    /// Arrival-time re-validation, after the board's identity check.
    fn can_perform(&self, instance: &JobInstance, minion_id: &str) -> bool;

    /// Execute the work and return the effect for the host to apply.
    fn perform(&self, instance: &JobInstance, minion_id: &str) -> JobEffect;
}

/// The always-available filler kind: walking there was the entire task.
#[derive(Debug, Default)]
pub struct WalkKind;

impl JobKind for WalkKind {
    fn id(&self) -> &str {
        WALK_KIND_ID
    }

    fn is_assignable(&self, _location: BlockPos, _nav: &NavMap) -> bool {
        false
    }

    fn target_positions(&self, _instance: &JobInstance, _nav: &NavMap) -> Vec<BlockPos> {
        Vec::new()
    }

    fn can_perform(&self, _instance: &JobInstance, _minion_id: &str) -> bool {
        true
    }

    fn perform(&self, _instance: &JobInstance, _minion_id: &str) -> JobEffect {
        JobEffect::None
    }
}

/// Where a minion must stand relative to the marked location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkReach {
    /// Stand on any walkable block adjacent to the (solid) location.
    Adjacent,
    /// Stand on the walkable location itself.
    OnTop,
}

/// Data-driven block-bound kind covering the common mark-a-block jobs.
#[derive(Debug)]
pub struct BlockJobKind {
    id: String,
    reach: WorkReach,
    effect: fn(BlockPos) -> JobEffect,
}

impl BlockJobKind {
    pub fn new(id: impl Into<String>, reach: WorkReach, effect: fn(BlockPos) -> JobEffect) -> Self {
        Self {
            id: id.into(),
            reach,
            effect,
        }
    }
}

impl JobKind for BlockJobKind {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_assignable(&self, location: BlockPos, nav: &NavMap) -> bool {
        match self.reach {
            WorkReach::Adjacent => {
                !nav.is_walkable(location) && !nav.adjacent_walkable(location).is_empty()
            }
            WorkReach::OnTop => nav.is_walkable(location),
        }
    }

    fn target_positions(&self, instance: &JobInstance, nav: &NavMap) -> Vec<BlockPos> {
        match self.reach {
            WorkReach::Adjacent => nav.adjacent_walkable(instance.location),
            WorkReach::OnTop => {
                if nav.is_walkable(instance.location) {
                    vec![instance.location]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn can_perform(&self, instance: &JobInstance, _minion_id: &str) -> bool {
        !instance.completed
    }

    fn perform(&self, instance: &JobInstance, _minion_id: &str) -> JobEffect {
        (self.effect)(instance.location)
    }
}

/// Errors surfaced by board operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    UnknownKind { kind_id: String },
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardError::UnknownKind { kind_id } => write!(f, "unknown job kind: {kind_id}"),
        }
    }
}

/// Name-keyed registry of job kinds, populated once at startup.
#[derive(Debug, Clone, Default)]
pub struct JobCatalog {
    kinds: BTreeMap<String, Arc<dyn JobKind>>,
}

impl JobCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in set: the walk filler plus the two reference block
    /// kinds. Hosts extend it with `register`.
    pub fn default_catalog() -> Self {
        let mut catalog = Self::new();
        catalog.register(Arc::new(WalkKind));
        catalog.register(Arc::new(BlockJobKind::new(
            "work:excavate",
            WorkReach::Adjacent,
            |position| JobEffect::ClearBlock { position },
        )));
        catalog.register(Arc::new(BlockJobKind::new(
            "work:build",
            WorkReach::OnTop,
            |position| JobEffect::PlaceBlock { position },
        )));
        catalog
    }

    /// Register a kind. A later registration under the same id replaces
    /// the earlier one.
    pub fn register(&mut self, kind: Arc<dyn JobKind>) {
        self.kinds.insert(kind.id().to_string(), kind);
    }

    pub fn get(&self, kind_id: &str) -> Option<&Arc<dyn JobKind>> {
        self.kinds.get(kind_id)
    }

    /// Registered kinds in id order.
    pub fn kinds(&self) -> impl Iterator<Item = &Arc<dyn JobKind>> {
        self.kinds.values()
    }

    pub fn contains(&self, kind_id: &str) -> bool {
        self.kinds.contains_key(kind_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_map() -> NavMap {
        NavMap::from_ascii_levels(&["...\n...\n..."])
    }

    #[test]
    fn default_catalog_registers_builtin_kinds() {
        let catalog = JobCatalog::default_catalog();
        assert!(catalog.contains(WALK_KIND_ID));
        assert!(catalog.contains("work:excavate"));
        assert!(catalog.contains("work:build"));
        let ids: Vec<&str> = catalog.kinds().map(|kind| kind.id()).collect();
        assert_eq!(ids, vec![WALK_KIND_ID, "work:build", "work:excavate"]);
    }

    #[test]
    fn walk_kind_offers_nothing_and_always_succeeds() {
        let nav = flat_map();
        let walk = WalkKind;
        let instance = JobInstance::new(1, WALK_KIND_ID, BlockPos::new(0, 0, 0));
        assert!(!walk.is_assignable(BlockPos::new(0, 0, 0), &nav));
        assert!(walk.target_positions(&instance, &nav).is_empty());
        assert!(walk.can_perform(&instance, "minion_a"));
        assert_eq!(walk.perform(&instance, "minion_a"), JobEffect::None);
    }

    #[test]
    fn adjacent_kind_targets_surrounding_walkable_blocks() {
        let nav = NavMap::from_ascii_levels(&[".#."]);
        let catalog = JobCatalog::default_catalog();
        let excavate = catalog.get("work:excavate").unwrap();
        let solid = BlockPos::new(1, 0, 0);
        assert!(excavate.is_assignable(solid, &nav));

        let instance = JobInstance::new(7, "work:excavate", solid);
        let targets = excavate.target_positions(&instance, &nav);
        assert_eq!(targets.len(), 2);
        assert_eq!(
            excavate.perform(&instance, "minion_a"),
            JobEffect::ClearBlock { position: solid }
        );
    }

    #[test]
    fn on_top_kind_targets_the_location_itself() {
        let nav = flat_map();
        let catalog = JobCatalog::default_catalog();
        let build = catalog.get("work:build").unwrap();
        let site = BlockPos::new(1, 1, 0);
        assert!(build.is_assignable(site, &nav));

        let instance = JobInstance::new(8, "work:build", site);
        assert_eq!(build.target_positions(&instance, &nav), vec![site]);
    }

    #[test]
    fn completed_instance_fails_revalidation() {
        let catalog = JobCatalog::default_catalog();
        let excavate = catalog.get("work:excavate").unwrap();
        let mut instance = JobInstance::new(9, "work:excavate", BlockPos::new(1, 0, 0));
        assert!(excavate.can_perform(&instance, "minion_a"));
        instance.completed = true;
        assert!(!excavate.can_perform(&instance, "minion_b"));
    }

    #[test]
    fn excavate_is_not_assignable_on_walkable_ground() {
        let nav = flat_map();
        let catalog = JobCatalog::default_catalog();
        let excavate = catalog.get("work:excavate").unwrap();
        assert!(!excavate.is_assignable(BlockPos::new(1, 1, 0), &nav));
    }
}
