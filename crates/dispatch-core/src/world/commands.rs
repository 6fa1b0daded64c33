use super::*;

impl DispatchWorld {
    pub(super) fn process_due_commands(&mut self, tick: u64, sequence_in_tick: &mut u64) {
        self.queued_commands.sort_by(|a, b| {
            a.effective_tick
                .cmp(&b.effective_tick)
                .then(a.insertion_sequence.cmp(&b.insertion_sequence))
        });

        let mut future = Vec::new();
        let mut due = Vec::new();
        for queued in self.queued_commands.drain(..) {
            if queued.effective_tick <= tick {
                due.push(queued);
            } else {
                future.push(queued);
            }
        }
        self.queued_commands = future;
        self.sync_queue_depth();

        for queued in due {
            self.apply_command(queued.command, tick, sequence_in_tick);
        }
    }

    pub(super) fn apply_command(
        &mut self,
        command: Command,
        tick: u64,
        sequence_in_tick: &mut u64,
    ) {
        let command_ref = format!("cmd:{}", command.command_id);
        let mut accepted = true;
        let mut rejection: Option<&str> = None;

        match &command.payload {
            CommandPayload::SimStart => self.start(),
            CommandPayload::SimPause => self.pause(),
            CommandPayload::MarkJobs { kind_id, min, max } => {
                let mut marked = 0_u64;
                let mut skipped = 0_u64;
                let mut unknown_kind = false;
                for_each_in_box(*min, *max, |position| {
                    match self.board.mark(&self.nav, position, kind_id) {
                        Ok(true) => marked += 1,
                        Ok(false) => skipped += 1,
                        Err(_) => unknown_kind = true,
                    }
                });
                if unknown_kind {
                    accepted = false;
                    rejection = Some("unknown_kind");
                } else {
                    self.push_event(
                        tick,
                        sequence_in_tick,
                        EventType::JobsMarked,
                        block_location_id(*min),
                        Vec::new(),
                        vec![command_ref.clone()],
                        Some(json!({
                            "kind_id": kind_id,
                            "min": min,
                            "max": max,
                            "marked": marked,
                            "skipped": skipped,
                        })),
                    );
                }
            }
            CommandPayload::UnmarkJobs { min, max } => {
                let mut queued = 0_u64;
                for_each_in_box(*min, *max, |position| {
                    if self.board.get(position).is_some() {
                        queued += 1;
                    }
                    self.board.unmark(position);
                });
                self.push_event(
                    tick,
                    sequence_in_tick,
                    EventType::JobsUnmarked,
                    block_location_id(*min),
                    Vec::new(),
                    vec![command_ref.clone()],
                    Some(json!({ "min": min, "max": max, "queued": queued })),
                );
            }
            CommandPayload::SpawnMinion {
                minion_id,
                position,
            } => {
                if !self.nav.is_walkable(*position) {
                    accepted = false;
                    rejection = Some("position_not_walkable");
                } else if self.minions.contains_key(minion_id) {
                    accepted = false;
                    rejection = Some("minion_exists");
                } else {
                    self.minions
                        .insert(minion_id.clone(), Minion::new(minion_id.clone(), *position));
                    self.push_event(
                        tick,
                        sequence_in_tick,
                        EventType::MinionSpawned,
                        block_location_id(*position),
                        vec![ActorRef {
                            actor_id: minion_id.clone(),
                            actor_kind: "minion".to_string(),
                        }],
                        vec![command_ref.clone()],
                        None,
                    );
                }
            }
            CommandPayload::RemoveMinion { minion_id } => {
                if let Some(minion) = self.minions.remove(minion_id) {
                    self.release_chosen_reservation(&minion);
                    self.push_event(
                        tick,
                        sequence_in_tick,
                        EventType::MinionRemoved,
                        block_location_id(minion.position),
                        vec![ActorRef {
                            actor_id: minion_id.clone(),
                            actor_kind: "minion".to_string(),
                        }],
                        vec![command_ref.clone()],
                        None,
                    );
                } else {
                    accepted = false;
                    rejection = Some("minion_not_found");
                }
            }
            CommandPayload::InterruptMinion { minion_id } => {
                if self.interrupt_minion(minion_id) {
                    let position = self
                        .minions
                        .get(minion_id)
                        .map(|minion| minion.position)
                        .unwrap_or(BlockPos::new(0, 0, 0));
                    self.push_event(
                        tick,
                        sequence_in_tick,
                        EventType::MinionInterrupted,
                        block_location_id(position),
                        vec![ActorRef {
                            actor_id: minion_id.clone(),
                            actor_kind: "minion".to_string(),
                        }],
                        vec![command_ref.clone()],
                        None,
                    );
                } else {
                    accepted = false;
                    rejection = Some("minion_not_found");
                }
            }
        }

        self.push_event(
            tick,
            sequence_in_tick,
            EventType::CommandApplied,
            "world".to_string(),
            Vec::new(),
            vec![command_ref],
            Some(json!({
                "command_type": command.command_type,
                "accepted": accepted,
                "rejection": rejection,
            })),
        );
    }
}

fn for_each_in_box(min: BlockPos, max: BlockPos, mut visit: impl FnMut(BlockPos)) {
    for z in min.z..=max.z {
        for y in min.y..=max.y {
            for x in min.x..=max.x {
                visit(BlockPos::new(x, y, z));
            }
        }
    }
}
