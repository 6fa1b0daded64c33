use std::collections::BTreeMap;

mod assign;
mod commands;
mod events;
mod snapshot;
mod step;

use contracts::{
    ActorRef, AssignmentState, BlockPos, Command, CommandPayload, Event, EventType, Path,
    PathRequestId, PathResult, RunConfig, RunMode, RunStatus, WorldSnapshot, SCHEMA_VERSION_V1,
};
use serde_json::{json, Value};

use crate::board::JobBoard;
use crate::job::JobCatalog;
use crate::nav::NavMap;
use crate::pathfinder::{GridPathfinder, PathfinderService};

#[derive(Debug, Clone)]
struct QueuedCommand {
    effective_tick: u64,
    insertion_sequence: u64,
    command: Command,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepMetrics {
    pub advanced_ticks: u64,
    pub open_jobs: u64,
    pub requests_issued: u64,
    pub results_applied: u64,
    pub stale_results: u64,
    pub arrivals: u64,
}

/// Movement-glue stand-in for the external walk subsystem: the remaining
/// span of the chosen path, advanced `walk_speed` steps per tick.
#[derive(Debug, Clone)]
pub struct ActiveWalk {
    pub walk_id: PathRequestId,
    pub path: Path,
    pub next_step: usize,
}

/// A mobile agent. The assignment coordinator is the only writer of
/// `state`; `walk` belongs to the movement glue.
#[derive(Debug, Clone)]
pub struct Minion {
    pub id: String,
    pub position: BlockPos,
    pub state: AssignmentState,
    pub walk: Option<ActiveWalk>,
}

impl Minion {
    fn new(id: impl Into<String>, position: BlockPos) -> Self {
        Self {
            id: id.into(),
            position,
            state: AssignmentState::Idle,
            walk: None,
        }
    }
}

/// Single-threaded dispatch world: fixed-order tick loop over command
/// intake, board rebuild, assignment, path results, and movement.
#[derive(Debug)]
pub struct DispatchWorld {
    config: RunConfig,
    status: RunStatus,
    nav: NavMap,
    board: JobBoard,
    minions: BTreeMap<String, Minion>,
    pathfinder: Box<dyn PathfinderService>,
    /// Outstanding request -> requesting minion; entries for superseded
    /// requests linger until their result arrives and is discarded.
    request_owner: BTreeMap<PathRequestId, String>,
    queued_commands: Vec<QueuedCommand>,
    next_command_sequence: u64,
    event_log: Vec<Event>,
    replay_hash: u64,
    last_step_metrics: StepMetrics,
}

impl DispatchWorld {
    pub fn new(config: RunConfig, nav: NavMap, catalog: JobCatalog) -> Self {
        let pathfinder = Box::new(GridPathfinder::new(
            config.path_latency_ticks,
            config.path_worker_threads,
        ));
        Self::with_pathfinder(config, nav, catalog, pathfinder)
    }

    /// Inject a host pathfinder in place of the bundled grid search.
    pub fn with_pathfinder(
        config: RunConfig,
        nav: NavMap,
        catalog: JobCatalog,
        pathfinder: Box<dyn PathfinderService>,
    ) -> Self {
        let status = RunStatus {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            run_id: config.run_id.clone(),
            current_tick: 0,
            max_ticks: config.max_ticks,
            mode: RunMode::Paused,
            queue_depth: 0,
        };
        Self {
            config,
            status,
            nav,
            board: JobBoard::new(catalog),
            minions: BTreeMap::new(),
            pathfinder,
            request_owner: BTreeMap::new(),
            queued_commands: Vec::new(),
            next_command_sequence: 0,
            event_log: Vec::new(),
            replay_hash: 0,
            last_step_metrics: StepMetrics::default(),
        }
    }

    pub fn nav(&self) -> &NavMap {
        &self.nav
    }

    pub fn board(&self) -> &JobBoard {
        &self.board
    }

    pub fn minion(&self, minion_id: &str) -> Option<&Minion> {
        self.minions.get(minion_id)
    }

    pub fn minion_count(&self) -> usize {
        self.minions.len()
    }
}

fn synthetic_timestamp(tick: u64, seq: u64) -> String {
    format!(
        "1970-01-01T{:02}:{:02}:{:02}Z",
        (tick / 3600) % 24,
        (tick / 60) % 60,
        (tick + seq) % 60
    )
}

fn mix_replay_hash(current: u64, event_id: &str, tick: u64, sequence: u64) -> u64 {
    let mut hash = current ^ tick.wrapping_mul(0xA24B_1C62_5B93_2D47);
    hash ^= sequence.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    for byte in event_id.as_bytes() {
        hash = hash.rotate_left(7) ^ u64::from(*byte);
        hash = hash.wrapping_mul(0x517C_C1B7_2722_0A95);
    }
    hash
}

fn block_location_id(position: BlockPos) -> String {
    format!("block:{position}")
}
