use super::tiles::*;
use super::world::*;
use crate::identifiers::AgentId;
use screeps::*;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

pub const IMPASSABLE_COST: u8 = 255;
pub const ROAD_COST: u8 = 1;
pub const PLAIN_COST: u8 = 2;
pub const SWAMP_COST: u8 = 10;
pub const BORDER_PENALTY: u8 = 8;

/// Per-build overlay options. Everything here is scoped to a single planning call.
#[derive(Clone, Debug, Default)]
pub struct CostMapOptions {
    pub prefer_roads: bool,
    pub avoid_borders: bool,
    pub ignore_agent_ids: Vec<AgentId>,
    pub vacating_tiles: HashSet<Position>,
}

impl CostMapOptions {
    pub fn new(prefer_roads: bool) -> CostMapOptions {
        CostMapOptions {
            prefer_roads,
            ..Default::default()
        }
    }

    pub fn avoid_borders(mut self, avoid: bool) -> Self {
        self.avoid_borders = avoid;
        self
    }

    pub fn ignore_agent(mut self, id: &AgentId) -> Self {
        self.ignore_agent_ids.push(id.clone());
        self
    }

    pub fn vacating(mut self, pos: Position) -> Self {
        self.vacating_tiles.insert(pos);
        self
    }

    pub fn vacating_all<I: IntoIterator<Item = Position>>(mut self, tiles: I) -> Self {
        self.vacating_tiles.extend(tiles);
        self
    }
}

fn xy_iter() -> impl Iterator<Item = RoomXY> {
    (0..50u8).flat_map(|x| (0..50u8).filter_map(move |y| RoomXY::checked_new(x, y).ok()))
}

/// Builds traversal cost grids for rooms from terrain, structures and agents.
pub struct CostMapBuilder<'a> {
    source: &'a dyn ZoneDataSource,
}

impl<'a> CostMapBuilder<'a> {
    pub fn new(source: &'a dyn ZoneDataSource) -> CostMapBuilder<'a> {
        CostMapBuilder { source }
    }

    pub fn source(&self) -> &'a dyn ZoneDataSource {
        self.source
    }

    /// Terrain and structure costs only. Agents are not included.
    pub fn base(&self, room_name: RoomName, prefer_roads: bool) -> LocalCostMatrix {
        let mut cost_matrix = LocalCostMatrix::new();

        for xy in xy_iter() {
            let pos = Position::new(xy.x, xy.y, room_name);

            let cost = match self.source.terrain(pos) {
                Terrain::Wall => IMPASSABLE_COST,
                Terrain::Swamp => SWAMP_COST,
                _ => PLAIN_COST,
            };

            cost_matrix.set(xy, cost);
        }

        let structures = self.source.structures(room_name);

        // Blocking structures win regardless of the order they are reported in.
        let blocked: HashSet<RoomXY> = structures
            .iter()
            .filter(|structure| match structure.structure_type {
                StructureType::Road | StructureType::Container => false,
                StructureType::Rampart => !structure.friendly,
                _ => true,
            })
            .map(|structure| structure.pos.xy())
            .collect();

        for structure in structures.iter().filter(|structure| structure.structure_type == StructureType::Road) {
            let xy = structure.pos.xy();

            if blocked.contains(&xy) {
                continue;
            }

            if prefer_roads {
                cost_matrix.set(xy, ROAD_COST);
            } else if cost_matrix.get(xy) == IMPASSABLE_COST {
                // Tunnel through natural wall.
                cost_matrix.set(xy, PLAIN_COST);
            }
        }

        for xy in blocked {
            cost_matrix.set(xy, IMPASSABLE_COST);
        }

        cost_matrix
    }

    /// Build a full cost grid for a room. The base override is cloned, never mutated.
    pub fn build(&self, room_name: RoomName, base_override: Option<&LocalCostMatrix>, options: &CostMapOptions) -> LocalCostMatrix {
        let mut cost_matrix = match base_override {
            Some(base) => base.clone(),
            None => self.base(room_name, options.prefer_roads),
        };

        for agent in self.source.agents(room_name) {
            if options.ignore_agent_ids.contains(&agent.id) || options.vacating_tiles.contains(&agent.pos) {
                continue;
            }

            cost_matrix.set(agent.pos.xy(), IMPASSABLE_COST);
        }

        if options.avoid_borders {
            for xy in xy_iter() {
                let pos = Position::new(xy.x, xy.y, room_name);

                if is_edge(pos) {
                    let current = cost_matrix.get(xy);

                    if current < IMPASSABLE_COST {
                        cost_matrix.set(xy, current.saturating_add(BORDER_PENALTY).min(IMPASSABLE_COST - 1));
                    }
                }
            }
        }

        cost_matrix
    }
}

/// Base grids shared by every lookup inside one planning call. Overlays are
/// produced by cloning out of this cache, so the cached grids stay untouched.
pub struct ZoneCostCache<'a> {
    builder: CostMapBuilder<'a>,
    prefer_roads: bool,
    bases: HashMap<RoomName, LocalCostMatrix>,
}

impl<'a> ZoneCostCache<'a> {
    pub fn new(source: &'a dyn ZoneDataSource, prefer_roads: bool) -> ZoneCostCache<'a> {
        ZoneCostCache {
            builder: CostMapBuilder::new(source),
            prefer_roads,
            bases: HashMap::new(),
        }
    }

    pub fn source(&self) -> &'a dyn ZoneDataSource {
        self.builder.source()
    }

    pub fn base(&mut self, room_name: RoomName) -> &LocalCostMatrix {
        match self.bases.entry(room_name) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(self.builder.base(room_name, self.prefer_roads)),
        }
    }

    /// Static cost of a tile. Rooms that do not exist are impassable.
    pub fn cost(&mut self, pos: Position) -> u8 {
        if !self.builder.source().has_room(pos.room_name()) {
            return IMPASSABLE_COST;
        }

        self.base(pos.room_name()).get(pos.xy())
    }

    pub fn is_walkable(&mut self, pos: Position) -> bool {
        self.cost(pos) < IMPASSABLE_COST
    }

    /// Copy-on-write overlay for a room: clones the cached base and applies options.
    pub fn overlay(&mut self, room_name: RoomName, options: &CostMapOptions) -> Option<LocalCostMatrix> {
        if !self.builder.source().has_room(room_name) {
            return None;
        }

        let base = self.base(room_name).clone();

        Some(self.builder.build(room_name, Some(&base), options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(x: u8, y: u8) -> Position {
        Position::new(
            RoomCoordinate::new(x).unwrap(),
            RoomCoordinate::new(y).unwrap(),
            RoomName::new("W1N1").unwrap(),
        )
    }

    fn world() -> StaticWorld {
        let mut world = StaticWorld::new();
        world.add_room(RoomName::new("W1N1").unwrap());
        world
    }

    #[test]
    fn terrain_seeds_costs() {
        let mut world = world();
        world.set_terrain(pos(10, 10), Terrain::Wall);
        world.set_terrain(pos(11, 10), Terrain::Swamp);

        let cost_matrix = CostMapBuilder::new(&world).base(RoomName::new("W1N1").unwrap(), true);

        assert_eq!(cost_matrix.get(pos(10, 10).xy()), IMPASSABLE_COST);
        assert_eq!(cost_matrix.get(pos(11, 10).xy()), SWAMP_COST);
        assert_eq!(cost_matrix.get(pos(12, 10).xy()), PLAIN_COST);
    }

    #[test]
    fn structures_follow_passability_rules() {
        let mut world = world();
        world.add_structure(pos(5, 5), StructureType::Road, false);
        world.add_structure(pos(6, 5), StructureType::Container, false);
        world.add_structure(pos(7, 5), StructureType::Rampart, true);
        world.add_structure(pos(8, 5), StructureType::Rampart, false);
        world.add_structure(pos(9, 5), StructureType::Tower, false);

        let room_name = RoomName::new("W1N1").unwrap();
        let with_roads = CostMapBuilder::new(&world).base(room_name, true);
        let without_roads = CostMapBuilder::new(&world).base(room_name, false);

        assert_eq!(with_roads.get(pos(5, 5).xy()), ROAD_COST);
        assert_eq!(without_roads.get(pos(5, 5).xy()), PLAIN_COST);
        assert_eq!(with_roads.get(pos(6, 5).xy()), PLAIN_COST);
        assert_eq!(with_roads.get(pos(7, 5).xy()), PLAIN_COST);
        assert_eq!(with_roads.get(pos(8, 5).xy()), IMPASSABLE_COST);
        assert_eq!(with_roads.get(pos(9, 5).xy()), IMPASSABLE_COST);
    }

    #[test]
    fn road_under_hostile_rampart_stays_blocked() {
        let mut world = world();
        world.add_structure(pos(10, 10), StructureType::Rampart, false);
        world.add_structure(pos(10, 10), StructureType::Road, false);
        world.add_structure(pos(11, 10), StructureType::Road, false);
        world.add_structure(pos(11, 10), StructureType::Rampart, false);
        world.add_structure(pos(12, 10), StructureType::Road, false);
        world.add_structure(pos(12, 10), StructureType::Rampart, true);

        let room_name = RoomName::new("W1N1").unwrap();

        for prefer_roads in [true, false] {
            let cost_matrix = CostMapBuilder::new(&world).base(room_name, prefer_roads);

            assert_eq!(cost_matrix.get(pos(10, 10).xy()), IMPASSABLE_COST);
            assert_eq!(cost_matrix.get(pos(11, 10).xy()), IMPASSABLE_COST);
        }

        assert_eq!(CostMapBuilder::new(&world).base(room_name, true).get(pos(12, 10).xy()), ROAD_COST);
    }

    #[test]
    fn agents_block_unless_ignored_or_vacating() {
        let mut world = world();
        world.place_agent("a", pos(20, 20));
        world.place_agent("b", pos(21, 20));
        world.place_agent("c", pos(22, 20));

        let options = CostMapOptions::new(true)
            .ignore_agent(&AgentId::from("a"))
            .vacating(pos(21, 20));

        let cost_matrix = CostMapBuilder::new(&world).build(RoomName::new("W1N1").unwrap(), None, &options);

        assert_eq!(cost_matrix.get(pos(20, 20).xy()), PLAIN_COST);
        assert_eq!(cost_matrix.get(pos(21, 20).xy()), PLAIN_COST);
        assert_eq!(cost_matrix.get(pos(22, 20).xy()), IMPASSABLE_COST);
    }

    #[test]
    fn border_penalty_and_override_is_not_mutated() {
        let world = world();
        let room_name = RoomName::new("W1N1").unwrap();
        let builder = CostMapBuilder::new(&world);
        let base = builder.base(room_name, true);

        let options = CostMapOptions::new(true).avoid_borders(true);
        let built = builder.build(room_name, Some(&base), &options);

        assert_eq!(built.get(pos(0, 10).xy()), PLAIN_COST + BORDER_PENALTY);
        assert_eq!(built.get(pos(10, 10).xy()), PLAIN_COST);
        assert_eq!(base.get(pos(0, 10).xy()), PLAIN_COST);
    }

    #[test]
    fn missing_rooms_are_impassable() {
        let world = world();
        let mut cache = ZoneCostCache::new(&world, true);
        let elsewhere = Position::new(
            RoomCoordinate::new(10).unwrap(),
            RoomCoordinate::new(10).unwrap(),
            RoomName::new("W5N5").unwrap(),
        );

        assert!(!cache.is_walkable(elsewhere));
        assert!(cache.is_walkable(pos(10, 10)));
        assert!(cache.overlay(RoomName::new("W5N5").unwrap(), &CostMapOptions::default()).is_none());
    }
}
