use super::*;

impl DispatchWorld {
    pub fn start(&mut self) {
        if !self.status.is_complete() {
            self.status.mode = RunMode::Running;
        }
    }

    pub fn pause(&mut self) {
        self.status.mode = RunMode::Paused;
    }

    pub fn run_id(&self) -> &str {
        &self.status.run_id
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn status(&self) -> &RunStatus {
        &self.status
    }

    pub fn events(&self) -> &[Event] {
        &self.event_log
    }

    pub fn replay_hash(&self) -> u64 {
        self.replay_hash
    }

    pub fn last_step_metrics(&self) -> StepMetrics {
        self.last_step_metrics
    }

    pub fn enqueue_command(&mut self, command: Command, effective_tick: u64) {
        self.queued_commands.push(QueuedCommand {
            effective_tick,
            insertion_sequence: self.next_command_sequence,
            command,
        });
        self.next_command_sequence = self.next_command_sequence.saturating_add(1);
        self.sync_queue_depth();
    }

    /// Enqueue for the next tick boundary.
    pub fn inject_command(&mut self, command: Command) {
        let effective_tick = self.status.current_tick + 1;
        self.enqueue_command(command, effective_tick);
    }

    /// Advance one tick. Fixed phase order: command intake, board rebuild,
    /// assignment pass over Idle minions, path-result pump, walk advance
    /// with arrival handshakes. Returns false once the run is complete.
    pub fn step(&mut self) -> bool {
        let previous_tick = self.status.current_tick;
        self.last_step_metrics = StepMetrics::default();
        if self.status.is_complete() {
            self.status.mode = RunMode::Paused;
            return false;
        }
        self.status.mode = RunMode::Running;
        let tick = self.status.current_tick.saturating_add(1);
        if tick > self.status.max_ticks {
            self.status.mode = RunMode::Paused;
            return false;
        }
        self.status.current_tick = tick;
        let mut sequence_in_tick = 0_u64;

        self.process_due_commands(tick, &mut sequence_in_tick);
        self.board.rebuild(&self.nav);
        self.last_step_metrics.open_jobs = self.board.open_count() as u64;

        self.request_paths_for_idle(tick, &mut sequence_in_tick);
        self.apply_ready_path_results(tick, &mut sequence_in_tick);
        self.advance_walkers(tick, &mut sequence_in_tick);

        self.last_step_metrics.advanced_ticks =
            self.status.current_tick.saturating_sub(previous_tick);

        if self.status.current_tick >= self.status.max_ticks {
            self.status.mode = RunMode::Paused;
        }
        self.sync_queue_depth();

        true
    }

    pub fn step_n(&mut self, n: u64) -> u64 {
        let mut committed = 0_u64;
        for _ in 0..n {
            if !self.step() {
                break;
            }
            committed += 1;
        }
        committed
    }

    pub fn run_to_tick(&mut self, tick: u64) -> u64 {
        let mut committed = 0_u64;
        while self.status.current_tick < tick {
            if !self.step() {
                break;
            }
            committed += 1;
        }
        committed
    }

    pub(super) fn sync_queue_depth(&mut self) {
        self.status.queue_depth = self.queued_commands.len() + self.pathfinder.pending_count();
    }

    /// Movement glue: advance every active walk by `walk_speed` steps and
    /// run the arrival transition for walks that reach their target.
    pub(super) fn advance_walkers(&mut self, tick: u64, sequence_in_tick: &mut u64) {
        let mut arrivals: Vec<(String, PathRequestId)> = Vec::new();
        let walk_speed = self.config.walk_speed.max(1) as usize;
        for minion in self.minions.values_mut() {
            let Some(walk) = minion.walk.as_mut() else {
                continue;
            };
            walk.next_step = (walk.next_step + walk_speed).min(walk.path.len().saturating_sub(1));
            if let Some(position) = walk.path.steps.get(walk.next_step) {
                minion.position = *position;
            }
            if walk.next_step + 1 >= walk.path.len() {
                arrivals.push((minion.id.clone(), walk.walk_id));
                minion.walk = None;
            }
        }
        for (minion_id, walk_id) in arrivals {
            self.last_step_metrics.arrivals += 1;
            self.on_walk_finished(&minion_id, walk_id, tick, sequence_in_tick);
        }
    }
}
