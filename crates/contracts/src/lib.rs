//! Cross-boundary contracts for the minion dispatch core, CLI, and hosts.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SCHEMA_VERSION_V1: &str = "1.0";

// ---------------------------------------------------------------------------
// Positions and floors
// ---------------------------------------------------------------------------

/// A discrete world position. Ordered so it can key `BTreeMap`s.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

/// Opaque handle to a maximal connected reachability region ("floor").
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FloorId(pub u32);

impl fmt::Display for FloorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "floor:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Correlation identifier for a batched path request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathRequestId(pub u64);

/// An ordered walk from source to target, both endpoints included.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Path {
    pub steps: Vec<BlockPos>,
}

impl Path {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn start(&self) -> Option<BlockPos> {
        self.steps.first().copied()
    }

    pub fn target(&self) -> Option<BlockPos> {
        self.steps.last().copied()
    }
}

/// Batched path computation outcome. `paths` is positionally aligned with
/// the requested target list; `None` marks an unreachable target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathResult {
    pub request_id: PathRequestId,
    pub paths: Vec<Option<Path>>,
}

// ---------------------------------------------------------------------------
// Job possibilities and assignment state
// ---------------------------------------------------------------------------

/// Reference to an open job instance on the board.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobRef {
    pub job_id: u64,
    pub location: BlockPos,
}

/// One candidate offered to a requesting minion. Ephemeral; regenerated on
/// every request. `instance` is absent for walk-filler candidates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobPossibility {
    pub kind_id: String,
    pub target: BlockPos,
    pub instance: Option<JobRef>,
}

/// Per-minion assignment state machine tag plus its payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AssignmentState {
    #[default]
    Idle,
    PathsRequested {
        request_id: PathRequestId,
        possibilities: Vec<JobPossibility>,
    },
    Assigned {
        chosen: JobPossibility,
        walk_id: PathRequestId,
    },
}

impl AssignmentState {
    pub fn is_idle(&self) -> bool {
        matches!(self, AssignmentState::Idle)
    }
}

// ---------------------------------------------------------------------------
// Job effects
// ---------------------------------------------------------------------------

/// Declarative outcome of performing a job, applied by the host world.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum JobEffect {
    None,
    ClearBlock { position: BlockPos },
    PlaceBlock { position: BlockPos },
    Emit { details: Value },
}

// ---------------------------------------------------------------------------
// Run configuration and status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunConfig {
    pub schema_version: String,
    pub run_id: String,
    #[serde(with = "serde_u64_string")]
    pub seed: u64,
    pub max_ticks: u64,
    /// Steps a walking minion covers per tick.
    pub walk_speed: u32,
    /// Ticks between issuing a path request and its result becoming ready.
    pub path_latency_ticks: u64,
    /// Worker threads for batch path computation; 0 computes inline.
    pub path_worker_threads: usize,
    pub notes: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            run_id: "run_local_001".to_string(),
            seed: 1337,
            max_ticks: 1_000,
            walk_speed: 1,
            path_latency_ticks: 1,
            path_worker_threads: 0,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Running,
    Paused,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunStatus {
    pub schema_version: String,
    pub run_id: String,
    pub current_tick: u64,
    pub max_ticks: u64,
    pub mode: RunMode,
    pub queue_depth: usize,
}

impl RunStatus {
    pub fn is_complete(&self) -> bool {
        self.current_tick >= self.max_ticks
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_id={} tick={}/{} mode={:?} queue_depth={}",
            self.run_id, self.current_tick, self.max_ticks, self.mode, self.queue_depth
        )
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    SimStart,
    SimPause,
    MarkJobs,
    UnmarkJobs,
    SpawnMinion,
    RemoveMinion,
    InterruptMinion,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandPayload {
    SimStart,
    SimPause,
    /// Mark every assignable location inside the axis-aligned box
    /// `[min, max]` (inclusive) with the given job kind.
    MarkJobs {
        kind_id: String,
        min: BlockPos,
        max: BlockPos,
    },
    /// Queue removal of any job instance inside the box.
    UnmarkJobs {
        min: BlockPos,
        max: BlockPos,
    },
    SpawnMinion {
        minion_id: String,
        position: BlockPos,
    },
    RemoveMinion {
        minion_id: String,
    },
    /// Force the minion back to Idle, abandoning any outstanding path
    /// request, reservation, or walk.
    InterruptMinion {
        minion_id: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Command {
    pub schema_version: String,
    pub command_id: String,
    pub run_id: String,
    pub issued_at_tick: u64,
    pub command_type: CommandType,
    pub payload: CommandPayload,
}

impl Command {
    pub fn new(
        command_id: impl Into<String>,
        run_id: impl Into<String>,
        issued_at_tick: u64,
        command_type: CommandType,
        payload: CommandPayload,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            command_id: command_id.into(),
            run_id: run_id.into(),
            issued_at_tick,
            command_type,
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActorRef {
    pub actor_id: String,
    pub actor_kind: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    CommandApplied,
    JobsMarked,
    JobsUnmarked,
    MinionSpawned,
    MinionRemoved,
    MinionInterrupted,
    PathsRequested,
    JobAssigned,
    PathsRejected,
    WalkFinished,
    JobPerformed,
    JobAborted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub schema_version: String,
    pub run_id: String,
    pub tick: u64,
    pub created_at: String,
    pub event_id: String,
    pub sequence_in_tick: u64,
    pub event_type: EventType,
    pub location_id: String,
    pub actors: Vec<ActorRef>,
    pub caused_by: Vec<String>,
    pub details: Option<Value>,
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobSnapshot {
    pub job_id: u64,
    pub kind_id: String,
    pub location: BlockPos,
    pub reserved_by: Option<String>,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoardSnapshot {
    pub open: Vec<JobSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MinionSnapshot {
    pub minion_id: String,
    pub position: BlockPos,
    pub floor: Option<FloorId>,
    pub state: AssignmentState,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorldSnapshot {
    pub schema_version: String,
    pub run_id: String,
    pub tick: u64,
    pub board: BoardSnapshot,
    pub minions: Vec<MinionSnapshot>,
}

pub mod serde_u64_string {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<u64>().map_err(D::Error::custom)
    }
}
