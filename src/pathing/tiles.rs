use screeps::*;

/// Number of tiles along one side of a room.
pub const ROOM_SIZE: i32 = 50;

/// Clockwise ordering used for all rotation math.
pub const DIRECTIONS: [Direction; 8] = [
    Direction::Top,
    Direction::TopRight,
    Direction::Right,
    Direction::BottomRight,
    Direction::Bottom,
    Direction::BottomLeft,
    Direction::Left,
    Direction::TopLeft,
];

pub fn direction_offset(direction: Direction) -> (i32, i32) {
    match direction {
        Direction::Top => (0, -1),
        Direction::TopRight => (1, -1),
        Direction::Right => (1, 0),
        Direction::BottomRight => (1, 1),
        Direction::Bottom => (0, 1),
        Direction::BottomLeft => (-1, 1),
        Direction::Left => (-1, 0),
        Direction::TopLeft => (-1, -1),
    }
}

fn direction_index(direction: Direction) -> i32 {
    match direction {
        Direction::Top => 0,
        Direction::TopRight => 1,
        Direction::Right => 2,
        Direction::BottomRight => 3,
        Direction::Bottom => 4,
        Direction::BottomLeft => 5,
        Direction::Left => 6,
        Direction::TopLeft => 7,
    }
}

/// Rotate a direction by the given number of 45 degree steps (positive is clockwise).
pub fn rotate(direction: Direction, steps: i32) -> Direction {
    let index = (direction_index(direction) + steps).rem_euclid(8);

    DIRECTIONS[index as usize]
}

pub fn opposite(direction: Direction) -> Direction {
    rotate(direction, 4)
}

/// Number of 45 degree steps between two directions (0..=4).
pub fn angle_between(a: Direction, b: Direction) -> u32 {
    let diff = (direction_index(a) - direction_index(b)).rem_euclid(8);

    diff.min(8 - diff) as u32
}

/// Step a position one tile in a direction using world coordinates, so moving off
/// the edge of a room lands on the facing edge tile of the neighbouring room.
pub fn step(pos: Position, direction: Direction) -> Position {
    let (dx, dy) = direction_offset(direction);

    Position::from_world_coords(pos.world_x() + dx, pos.world_y() + dy)
}

/// Chebyshev distance in world coordinates. Valid across room boundaries.
pub fn range(a: Position, b: Position) -> u32 {
    let dx = (a.world_x() - b.world_x()).unsigned_abs();
    let dy = (a.world_y() - b.world_y()).unsigned_abs();

    dx.max(dy)
}

/// Room grid coordinates of the room containing the position.
pub fn room_coords(pos: Position) -> (i32, i32) {
    (pos.world_x().div_euclid(ROOM_SIZE), pos.world_y().div_euclid(ROOM_SIZE))
}

/// Chebyshev distance between the rooms containing two positions.
pub fn room_range(a: Position, b: Position) -> u32 {
    let (ax, ay) = room_coords(a);
    let (bx, by) = room_coords(b);

    (ax - bx).unsigned_abs().max((ay - by).unsigned_abs())
}

pub fn same_room(a: Position, b: Position) -> bool {
    a.room_name() == b.room_name()
}

/// Direction that most directly reduces the distance from `from` to `to`.
pub fn direction_to(from: Position, to: Position) -> Option<Direction> {
    let dx = (to.world_x() - from.world_x()).signum();
    let dy = (to.world_y() - from.world_y()).signum();

    match (dx, dy) {
        (0, -1) => Some(Direction::Top),
        (1, -1) => Some(Direction::TopRight),
        (1, 0) => Some(Direction::Right),
        (1, 1) => Some(Direction::BottomRight),
        (0, 1) => Some(Direction::Bottom),
        (-1, 1) => Some(Direction::BottomLeft),
        (-1, 0) => Some(Direction::Left),
        (-1, -1) => Some(Direction::TopLeft),
        _ => None,
    }
}

pub fn is_edge(pos: Position) -> bool {
    let x = pos.x().u8();
    let y = pos.y().u8();

    x == 0 || y == 0 || x == 49 || y == 49
}

/// Outward direction of an edge tile, i.e. the direction that leaves the room.
pub fn exit_direction(pos: Position) -> Option<Direction> {
    let x = pos.x().u8();
    let y = pos.y().u8();

    if x == 49 {
        Some(Direction::Right)
    } else if x == 0 {
        Some(Direction::Left)
    } else if y == 49 {
        Some(Direction::Bottom)
    } else if y == 0 {
        Some(Direction::Top)
    } else {
        None
    }
}

/// Cardinal direction from one room toward another, preferring the dominant axis.
pub fn room_exit_toward(from: Position, to: Position) -> Option<Direction> {
    let (fx, fy) = room_coords(from);
    let (tx, ty) = room_coords(to);
    let dx = tx - fx;
    let dy = ty - fy;

    if dx == 0 && dy == 0 {
        return None;
    }

    if dx.abs() >= dy.abs() {
        Some(if dx > 0 { Direction::Right } else { Direction::Left })
    } else {
        Some(if dy > 0 { Direction::Bottom } else { Direction::Top })
    }
}

/// Build a position in the same room from raw coordinates, if in bounds.
pub fn with_xy(room_name: RoomName, x: i32, y: i32) -> Option<Position> {
    if !(0..ROOM_SIZE).contains(&x) || !(0..ROOM_SIZE).contains(&y) {
        return None;
    }

    Some(Position::new(
        RoomCoordinate::new(x as u8).ok()?,
        RoomCoordinate::new(y as u8).ok()?,
        room_name,
    ))
}

/// Tile on the given boundary of a room, at `along` on the boundary axis.
pub fn boundary_tile(room_name: RoomName, side: Direction, along: i32) -> Option<Position> {
    let along = along.clamp(1, ROOM_SIZE - 2);

    match side {
        Direction::Right => with_xy(room_name, ROOM_SIZE - 1, along),
        Direction::Left => with_xy(room_name, 0, along),
        Direction::Bottom => with_xy(room_name, along, ROOM_SIZE - 1),
        Direction::Top => with_xy(room_name, along, 0),
        _ => None,
    }
}

/// Coordinate of a position along the axis parallel to the given boundary.
pub fn along_boundary(pos: Position, side: Direction) -> i32 {
    match side {
        Direction::Left | Direction::Right => pos.y().u8() as i32,
        _ => pos.x().u8() as i32,
    }
}

/// Inward neighbours of a tile that are not themselves edge tiles, most direct first.
pub fn inward_steps(pos: Position) -> Vec<Direction> {
    let Some(outward) = exit_direction(pos) else {
        return Vec::new();
    };

    let inward = opposite(outward);

    [inward, rotate(inward, -1), rotate(inward, 1)]
        .into_iter()
        .filter(|dir| {
            let next = step(pos, *dir);
            same_room(pos, next) && !is_edge(next)
        })
        .collect()
}

/// Human readable short form used in diagnostic lines.
pub fn describe(pos: Position) -> String {
    format!("{}:{},{}", pos.room_name(), pos.x().u8(), pos.y().u8())
}
