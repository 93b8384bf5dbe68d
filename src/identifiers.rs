use serde::{Deserialize, Serialize};
use shrinkwraprs::*;
use std::fmt;

/// Stable identity of an agent (creep name in the bot).
#[derive(Shrinkwrap, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> AgentId {
        AgentId(id.into())
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(id: &str) -> Self {
        AgentId(id.to_owned())
    }
}

/// Key that owns a squad's persisted runtime record.
#[derive(Shrinkwrap, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SquadKey(pub String);

impl SquadKey {
    pub fn new(key: impl Into<String>) -> SquadKey {
        SquadKey(key.into())
    }
}

impl fmt::Display for SquadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SquadKey {
    fn from(key: &str) -> Self {
        SquadKey(key.to_owned())
    }
}
