use super::duocache::DuoCache;
use crate::identifiers::*;
use crate::serialize::*;
use log::*;
use screeps::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Squad lifecycle phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SquadPhase {
    /// Gathering at the rally point.
    #[default]
    Assemble,
    /// Walking the waypoint list.
    Route,
    /// Closing on the attack point.
    Engage,
    /// Falling back to heal up.
    Retreat,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AssembledState {
    pub done: bool,
    pub at: Option<u32>,
    pub pos: Option<Position>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WipeState {
    /// Tick at which both members were first seen missing.
    pub last_full_missing_at: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpawnState {
    pub allow: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteState {
    pub waypoint_index: usize,
}

/// Everything a squad remembers between ticks.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SquadRuntime {
    pub phase: SquadPhase,
    pub assembled: AssembledState,
    pub wipe: WipeState,
    pub spawn: SpawnState,
    pub route: RouteState,
    pub regroup: bool,
    pub cache: DuoCache,
    pub leader_id: Option<AgentId>,
    pub support_id: Option<AgentId>,
}

impl SquadRuntime {
    /// Whether the wipe countdown has run past `ttl` ticks.
    pub fn wipe_expired(&self, tick: u32, ttl: u32) -> bool {
        self.wipe
            .last_full_missing_at
            .map(|since| tick.saturating_sub(since) > ttl)
            .unwrap_or(false)
    }
}

/// Runtime records keyed by squad. Nothing is shared between squads.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SquadRuntimeStore {
    runtimes: HashMap<SquadKey, SquadRuntime>,
}

impl SquadRuntimeStore {
    pub fn new() -> SquadRuntimeStore {
        SquadRuntimeStore::default()
    }

    pub fn get(&self, key: &SquadKey) -> Option<&SquadRuntime> {
        self.runtimes.get(key)
    }

    pub fn get_or_create(&mut self, key: &SquadKey) -> &mut SquadRuntime {
        self.runtimes.entry(key.clone()).or_insert_with(|| {
            info!("Creating squad runtime for {}", key);

            SquadRuntime::default()
        })
    }

    /// Replace the runtime with a fresh one.
    pub fn reset(&mut self, key: &SquadKey) -> &mut SquadRuntime {
        let runtime = self.get_or_create(key);
        *runtime = SquadRuntime::default();
        runtime
    }

    pub fn remove(&mut self, key: &SquadKey) -> Option<SquadRuntime> {
        self.runtimes.remove(key)
    }

    pub fn len(&self) -> usize {
        self.runtimes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runtimes.is_empty()
    }

    pub fn save(&self) -> Result<String, String> {
        encode_to_string(self)
    }

    pub fn load(data: &str) -> Result<SquadRuntimeStore, String> {
        decode_from_string(data)
    }
}
