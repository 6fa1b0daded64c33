use super::*;

use contracts::MinionSnapshot;

impl DispatchWorld {
    pub fn snapshot_for_current_tick(&self) -> WorldSnapshot {
        WorldSnapshot {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            run_id: self.status.run_id.clone(),
            tick: self.status.current_tick,
            board: self.board.snapshot(),
            minions: self
                .minions
                .values()
                .map(|minion| MinionSnapshot {
                    minion_id: minion.id.clone(),
                    position: minion.position,
                    floor: self.nav.floor_of(minion.position),
                    state: minion.state.clone(),
                })
                .collect(),
        }
    }
}
