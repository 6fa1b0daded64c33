use super::*;

impl DispatchWorld {
    /// Idle -> PathsRequested: one batched path request per Idle minion
    /// that stands on a walkable block and has at least one candidate.
    /// Every minion in the pass reads the same rebuilt board snapshot.
    pub(super) fn request_paths_for_idle(&mut self, tick: u64, sequence_in_tick: &mut u64) {
        let idle_ids: Vec<String> = self
            .minions
            .values()
            .filter(|minion| minion.state.is_idle())
            .map(|minion| minion.id.clone())
            .collect();

        for minion_id in idle_ids {
            let Some(minion) = self.minions.get(&minion_id) else {
                continue;
            };
            let position = minion.position;
            let Some(floor) = self.nav.floor_of(position) else {
                continue;
            };
            let possibilities = self.board.find_targets(floor, &self.nav);
            if possibilities.is_empty() {
                continue;
            }

            let targets: Vec<BlockPos> = possibilities.iter().map(|p| p.target).collect();
            let request_id = self.pathfinder.request_paths(tick, position, targets);
            self.request_owner.insert(request_id, minion_id.clone());
            self.last_step_metrics.requests_issued += 1;

            let candidate_count = possibilities.len();
            if let Some(minion) = self.minions.get_mut(&minion_id) {
                minion.state = AssignmentState::PathsRequested {
                    request_id,
                    possibilities,
                };
            }
            self.push_event(
                tick,
                sequence_in_tick,
                EventType::PathsRequested,
                block_location_id(position),
                vec![minion_actor(&minion_id)],
                Vec::new(),
                Some(json!({
                    "request_id": request_id.0,
                    "candidates": candidate_count,
                })),
            );
        }
    }

    /// Pump the pathfinder and feed each ready result to its owner.
    pub(super) fn apply_ready_path_results(&mut self, tick: u64, sequence_in_tick: &mut u64) {
        let results = self.pathfinder.poll_ready(&self.nav, tick);
        for result in results {
            self.on_paths_ready(result, tick, sequence_in_tick);
        }
        self.sync_queue_depth();
    }

    /// PathsRequested -> Assigned (or back to Idle). Results for unknown,
    /// superseded, or no-longer-waiting owners are discarded silently.
    pub(super) fn on_paths_ready(
        &mut self,
        result: PathResult,
        tick: u64,
        sequence_in_tick: &mut u64,
    ) {
        let Some(minion_id) = self.request_owner.remove(&result.request_id) else {
            self.last_step_metrics.stale_results += 1;
            return;
        };
        let Some(minion) = self.minions.get(&minion_id) else {
            self.last_step_metrics.stale_results += 1;
            return;
        };
        let possibilities = match &minion.state {
            AssignmentState::PathsRequested {
                request_id,
                possibilities,
            } if *request_id == result.request_id => possibilities.clone(),
            _ => {
                self.last_step_metrics.stale_results += 1;
                return;
            }
        };
        self.last_step_metrics.results_applied += 1;

        // Fewest steps wins; ties go to the first-discovered candidate.
        let mut best: Option<(usize, &Path)> = None;
        for (index, path) in result.paths.iter().enumerate() {
            let Some(path) = path else {
                continue;
            };
            if best.map(|(_, found)| path.len() < found.len()).unwrap_or(true) {
                best = Some((index, path));
            }
        }

        let Some((best_index, best_path)) = best else {
            if let Some(minion) = self.minions.get_mut(&minion_id) {
                minion.state = AssignmentState::Idle;
            }
            self.push_event(
                tick,
                sequence_in_tick,
                EventType::PathsRejected,
                "world".to_string(),
                vec![minion_actor(&minion_id)],
                Vec::new(),
                Some(json!({ "request_id": result.request_id.0 })),
            );
            return;
        };

        let chosen = possibilities[best_index].clone();
        let path = best_path.clone();

        if let Some(job_ref) = chosen.instance {
            self.board
                .reserve(job_ref.location, job_ref.job_id, &minion_id);
        }
        if let Some(minion) = self.minions.get_mut(&minion_id) {
            minion.state = AssignmentState::Assigned {
                chosen: chosen.clone(),
                walk_id: result.request_id,
            };
            minion.walk = Some(ActiveWalk {
                walk_id: result.request_id,
                path: path.clone(),
                next_step: 0,
            });
        }
        self.push_event(
            tick,
            sequence_in_tick,
            EventType::JobAssigned,
            block_location_id(chosen.target),
            vec![minion_actor(&minion_id)],
            Vec::new(),
            Some(json!({
                "kind_id": chosen.kind_id,
                "target": chosen.target,
                "job_id": chosen.instance.map(|job_ref| job_ref.job_id),
                "path_len": path.len(),
            })),
        );
    }

    /// Assigned -> Idle plus the execution handshake. The state reverts
    /// unconditionally; whether the job is actually performed depends on
    /// the re-validation below.
    pub(super) fn on_walk_finished(
        &mut self,
        minion_id: &str,
        walk_id: PathRequestId,
        tick: u64,
        sequence_in_tick: &mut u64,
    ) {
        let Some(minion) = self.minions.get_mut(minion_id) else {
            return;
        };
        let chosen = match &minion.state {
            AssignmentState::Assigned {
                chosen,
                walk_id: assigned_walk,
            } if *assigned_walk == walk_id => chosen.clone(),
            _ => return,
        };
        minion.state = AssignmentState::Idle;
        let position = minion.position;

        self.push_event(
            tick,
            sequence_in_tick,
            EventType::WalkFinished,
            block_location_id(position),
            vec![minion_actor(minion_id)],
            Vec::new(),
            Some(json!({ "walk_id": walk_id.0 })),
        );

        // Walk-filler candidate: the movement itself was the entire task.
        let Some(job_ref) = chosen.instance else {
            return;
        };

        // Identity check: the instance must still be the one that was
        // chosen. Unmarked or replaced instances fail here.
        let same_instance = self
            .board
            .get(job_ref.location)
            .map(|instance| instance.job_id == job_ref.job_id)
            .unwrap_or(false);
        if !same_instance {
            return;
        }

        // A stale reservation must never outlive the arrival, even on
        // failure paths.
        self.board.clear_reservation(job_ref.location, job_ref.job_id);

        let Some(kind) = self.board.catalog().get(&chosen.kind_id).cloned() else {
            return;
        };
        let Some(instance) = self.board.get(job_ref.location).cloned() else {
            return;
        };

        if instance.completed || !kind.can_perform(&instance, minion_id) {
            self.push_event(
                tick,
                sequence_in_tick,
                EventType::JobAborted,
                block_location_id(job_ref.location),
                vec![minion_actor(minion_id)],
                Vec::new(),
                Some(json!({
                    "kind_id": chosen.kind_id,
                    "job_id": job_ref.job_id,
                })),
            );
            return;
        }

        let effect = kind.perform(&instance, minion_id);
        if let Some(instance) = self.board.get_mut(job_ref.location) {
            instance.completed = true;
        }
        self.board.unmark(job_ref.location);
        self.push_event(
            tick,
            sequence_in_tick,
            EventType::JobPerformed,
            block_location_id(job_ref.location),
            vec![minion_actor(minion_id)],
            Vec::new(),
            Some(json!({
                "kind_id": chosen.kind_id,
                "job_id": job_ref.job_id,
                "effect": effect,
            })),
        );
    }

    /// Forced reset to Idle: drops the walk, releases a held reservation,
    /// and leaves any outstanding path request to be discarded on arrival.
    pub(super) fn interrupt_minion(&mut self, minion_id: &str) -> bool {
        let Some(minion) = self.minions.get_mut(minion_id) else {
            return false;
        };
        minion.walk = None;
        let previous = std::mem::take(&mut minion.state);
        if let AssignmentState::Assigned { chosen, .. } = &previous {
            if let Some(job_ref) = chosen.instance {
                self.board
                    .release_if_held(job_ref.location, job_ref.job_id, minion_id);
            }
        }
        true
    }

    pub(super) fn release_chosen_reservation(&mut self, minion: &Minion) {
        if let AssignmentState::Assigned { chosen, .. } = &minion.state {
            if let Some(job_ref) = chosen.instance {
                self.board
                    .release_if_held(job_ref.location, job_ref.job_id, &minion.id);
            }
        }
    }
}

fn minion_actor(minion_id: &str) -> ActorRef {
    ActorRef {
        actor_id: minion_id.to_string(),
        actor_kind: "minion".to_string(),
    }
}
