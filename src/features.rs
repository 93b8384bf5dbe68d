use serde::{Deserialize, Serialize};

/// Cohesion range used to mean "no cohesion requirement".
pub const UNBOUNDED_COHESION: u32 = u32::MAX;

/// Where the support sits relative to the leader's heading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupportOffset {
    /// Pick whichever trailing tile has the most open space around it.
    Auto,
    Left,
    Right,
    /// Directly opposite the leader's heading.
    #[default]
    Behind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormationConfig {
    pub cohesion_range: u32,
    pub support_offset: SupportOffset,
    pub allow_swap: bool,
}

impl Default for FormationConfig {
    fn default() -> Self {
        FormationConfig {
            cohesion_range: 1,
            support_offset: SupportOffset::Behind,
            allow_swap: true,
        }
    }
}

impl FormationConfig {
    pub fn is_unbounded(&self) -> bool {
        self.cohesion_range == UNBOUNDED_COHESION
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    pub allow_split: bool,
    pub use_path_cache: bool,
    pub path_reuse_ticks: u32,
    pub stall_repath_ticks: u32,
    pub prefer_roads: bool,
}

impl Default for MovementConfig {
    fn default() -> Self {
        MovementConfig {
            allow_split: false,
            use_path_cache: true,
            path_reuse_ticks: 25,
            stall_repath_ticks: 3,
            prefer_roads: true,
        }
    }
}

/// Phase machine thresholds. These are tuning values, not invariants.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseConfig {
    /// Health ratio at or below which the squad retreats.
    pub retreat_ratio: f32,
    /// Health ratio both agents must reach before re-engaging.
    pub reengage_ratio: f32,
    /// Threat level at which cohesion widens.
    pub elevated_threat: u8,
    /// Cohesion range while retreating or under elevated threat.
    pub threat_cohesion_range: u32,
    /// Cycles both agents may be absent before the runtime is rebuilt.
    pub wipe_ttl: u32,
    /// Range from the rally point counted as "near".
    pub rally_range: u32,
    /// Range from a waypoint counted as "near".
    pub waypoint_range: u32,
    /// Range kept from the attack point while engaging.
    pub engage_range: u32,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        PhaseConfig {
            retreat_ratio: 0.3,
            reengage_ratio: 0.7,
            elevated_threat: 2,
            threat_cohesion_range: 3,
            wipe_ttl: 15,
            rally_range: 2,
            waypoint_range: 2,
            engage_range: 1,
        }
    }
}

/// Search budgets for the route search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub max_rooms: usize,
    pub max_ops: u32,
    pub local_max_ops: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            max_rooms: 16,
            max_ops: 4000,
            local_max_ops: 1000,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuoFeatures {
    pub formation: FormationConfig,
    pub movement: MovementConfig,
    pub phase: PhaseConfig,
    pub search: SearchConfig,
}

pub fn features() -> DuoFeatures {
    DuoFeatures::default()
}

/// Parse a (possibly partial) feature document. Missing fields keep their defaults.
pub fn load(data: &str) -> Result<DuoFeatures, String> {
    serde_json::from_str(data).map_err(|e| e.to_string())
}
