use crate::identifiers::AgentId;
use screeps::*;
use std::collections::{HashMap, HashSet};

/// A structure as seen by the cost map builder.
#[derive(Clone, Debug)]
pub struct ZoneStructure {
    pub pos: Position,
    pub structure_type: StructureType,
    /// Owned by us or an ally, or a public rampart. Only meaningful for ramparts.
    pub friendly: bool,
}

/// Another agent standing in a room this tick.
#[derive(Clone, Debug)]
pub struct ZoneAgent {
    pub id: AgentId,
    pub pos: Position,
}

/// Read-only view of the world the planner consults each cycle. Implemented by
/// the host on top of live game objects.
pub trait ZoneDataSource {
    /// Whether the room exists and may be pathed through.
    fn has_room(&self, room_name: RoomName) -> bool;

    fn terrain(&self, pos: Position) -> Terrain;

    fn structures(&self, room_name: RoomName) -> Vec<ZoneStructure>;

    fn agents(&self, room_name: RoomName) -> Vec<ZoneAgent>;
}

#[derive(Clone, Default)]
struct StaticRoom {
    walls: HashSet<(u8, u8)>,
    swamps: HashSet<(u8, u8)>,
    structures: Vec<ZoneStructure>,
}

/// In-memory world. Rooms default to open plains; used by simulators and tests.
#[derive(Clone, Default)]
pub struct StaticWorld {
    rooms: HashMap<RoomName, StaticRoom>,
    agents: Vec<ZoneAgent>,
}

impl StaticWorld {
    pub fn new() -> StaticWorld {
        StaticWorld::default()
    }

    pub fn add_room(&mut self, room_name: RoomName) -> &mut Self {
        self.rooms.entry(room_name).or_default();
        self
    }

    pub fn set_terrain(&mut self, pos: Position, terrain: Terrain) -> &mut Self {
        let room = self.rooms.entry(pos.room_name()).or_default();
        let key = (pos.x().u8(), pos.y().u8());

        room.walls.remove(&key);
        room.swamps.remove(&key);

        match terrain {
            Terrain::Wall => {
                room.walls.insert(key);
            }
            Terrain::Swamp => {
                room.swamps.insert(key);
            }
            _ => {}
        }

        self
    }

    pub fn add_structure(&mut self, pos: Position, structure_type: StructureType, friendly: bool) -> &mut Self {
        self.rooms.entry(pos.room_name()).or_default().structures.push(ZoneStructure {
            pos,
            structure_type,
            friendly,
        });
        self
    }

    /// Place an agent, replacing any previous position for the same id.
    pub fn place_agent(&mut self, id: impl Into<AgentId>, pos: Position) -> &mut Self {
        let id = id.into();

        self.agents.retain(|agent| agent.id != id);
        self.agents.push(ZoneAgent { id, pos });
        self
    }

    pub fn remove_agent(&mut self, id: &AgentId) -> &mut Self {
        self.agents.retain(|agent| &agent.id != id);
        self
    }

    pub fn agent_position(&self, id: &AgentId) -> Option<Position> {
        self.agents.iter().find(|agent| &agent.id == id).map(|agent| agent.pos)
    }
}

impl ZoneDataSource for StaticWorld {
    fn has_room(&self, room_name: RoomName) -> bool {
        self.rooms.contains_key(&room_name)
    }

    fn terrain(&self, pos: Position) -> Terrain {
        let key = (pos.x().u8(), pos.y().u8());

        match self.rooms.get(&pos.room_name()) {
            Some(room) if room.walls.contains(&key) => Terrain::Wall,
            Some(room) if room.swamps.contains(&key) => Terrain::Swamp,
            Some(_) => Terrain::Plain,
            None => Terrain::Wall,
        }
    }

    fn structures(&self, room_name: RoomName) -> Vec<ZoneStructure> {
        self.rooms
            .get(&room_name)
            .map(|room| room.structures.clone())
            .unwrap_or_default()
    }

    fn agents(&self, room_name: RoomName) -> Vec<ZoneAgent> {
        self.agents
            .iter()
            .filter(|agent| agent.pos.room_name() == room_name)
            .cloned()
            .collect()
    }
}
