use super::*;

impl DispatchWorld {
    pub(super) fn push_event(
        &mut self,
        tick: u64,
        sequence_in_tick: &mut u64,
        event_type: EventType,
        location_id: String,
        actors: Vec<ActorRef>,
        caused_by: Vec<String>,
        details: Option<Value>,
    ) -> String {
        *sequence_in_tick = sequence_in_tick.saturating_add(1);
        let event_id = format!("evt_{tick:06}_{:04}", *sequence_in_tick);
        self.event_log.push(Event {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            run_id: self.status.run_id.clone(),
            tick,
            created_at: synthetic_timestamp(tick, *sequence_in_tick),
            event_id: event_id.clone(),
            sequence_in_tick: *sequence_in_tick,
            event_type,
            location_id,
            actors,
            caused_by,
            details,
        });
        self.replay_hash = mix_replay_hash(self.replay_hash, &event_id, tick, *sequence_in_tick);
        event_id
    }
}
