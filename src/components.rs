use serde::{Deserialize, Serialize};

use crate::tables::TILE_SIZE;

/// The four cardinal headings. Declaration order is the tie-break order used
/// by tile-targeting resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    /// Unit step for this heading. The y axis grows upward.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, 1),
            Direction::Down => (0, -1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::Left | Direction::Right)
    }

    /// Quarter turn counter-clockwise.
    pub fn left(self) -> Direction {
        match self {
            Direction::Up => Direction::Left,
            Direction::Down => Direction::Right,
            Direction::Left => Direction::Down,
            Direction::Right => Direction::Up,
        }
    }

    /// Quarter turn clockwise.
    pub fn right(self) -> Direction {
        match self {
            Direction::Up => Direction::Right,
            Direction::Down => Direction::Left,
            Direction::Left => Direction::Up,
            Direction::Right => Direction::Down,
        }
    }

    pub fn behind(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

/// Integer tile coordinate. Not necessarily inside the grid: targets such as
/// scatter corners or ambush points may lie beyond the edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Tile containing the given pixel (truncating, like the pixel lookups
    /// the movement code performs).
    pub fn from_pixel(position: Vec2) -> Self {
        let size = TILE_SIZE as i32;
        Self {
            x: (position.x as i32) / size,
            y: (position.y as i32) / size,
        }
    }

    pub fn step(self, direction: Direction, tiles: i32) -> Self {
        let (dx, dy) = direction.delta();
        Self {
            x: self.x + dx * tiles,
            y: self.y + dy * tiles,
        }
    }

    pub fn distance_squared(self, other: TilePos) -> i64 {
        let dx = i64::from(self.x - other.x);
        let dy = i64::from(self.y - other.y);
        dx * dx + dy * dy
    }

    /// Pixel a mover is pulled toward when centering inside this tile.
    pub fn center_pixel(self) -> Vec2 {
        let size = TILE_SIZE as f64;
        Vec2::new(
            self.x as f64 * size + size / 2.0 - 1.0,
            self.y as f64 * size + size / 2.0 - 1.0,
        )
    }
}

/// Continuous pixel-space position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn approx_eq(self, other: Vec2, epsilon: f64) -> bool {
        (self.x - other.x).abs() <= epsilon && (self.y - other.y).abs() <= epsilon
    }
}

/// Contents of one maze cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileState {
    Space,
    Pellet,
    PowerPellet,
    Wall,
    Tunnel,
    Pen,
}

impl TileState {
    /// Passable for every mover. Pen tiles are only entered through the
    /// scripted pen routines of the pursuers.
    pub fn is_passable(self) -> bool {
        !matches!(self, TileState::Wall | TileState::Pen)
    }

    pub fn is_pellet(self) -> bool {
        matches!(self, TileState::Pellet | TileState::PowerPellet)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Player,
    Pursuer,
    Fruit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PursuerState {
    Chase,
    Scatter,
    Frightened,
    Eaten,
}

impl PursuerState {
    /// The global chase/scatter phase as a pursuer state.
    pub fn from_mode(chase: bool) -> Self {
        if chase {
            PursuerState::Chase
        } else {
            PursuerState::Scatter
        }
    }

    /// Chase and scatter are the "hunting" states: touching the player in
    /// either kills the player.
    pub fn is_hunting(self) -> bool {
        matches!(self, PursuerState::Chase | PursuerState::Scatter)
    }
}

/// Why a maze stopped ticking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalReason {
    /// Every pellet and power pellet has been eaten.
    Win,
    /// The player was caught.
    Lose,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turns_compose() {
        for dir in Direction::ALL {
            assert_eq!(dir.left().right(), dir);
            assert_eq!(dir.right().right(), dir.behind());
            assert_eq!(dir.behind().behind(), dir);
        }
    }

    #[test]
    fn pixel_to_tile_truncates() {
        assert_eq!(TilePos::from_pixel(Vec2::new(15.9, 8.0)), TilePos::new(1, 1));
        assert_eq!(TilePos::new(2, 0).center_pixel(), Vec2::new(19.0, 3.0));
    }

    #[test]
    fn up_grows_y() {
        let origin = TilePos::new(3, 3);
        assert_eq!(origin.step(Direction::Up, 4), TilePos::new(3, 7));
        assert_eq!(origin.step(Direction::Left, 1), TilePos::new(2, 3));
        assert_eq!(origin.distance_squared(TilePos::new(6, 7)), 25);
    }
}
