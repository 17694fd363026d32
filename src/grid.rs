use crate::components::{Direction, TilePos, TileState, Vec2};
use crate::error::{Result, SimError};
use crate::tables::TILE_SIZE;

/// One cell as seen through a (wrapped) lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub pos: TilePos,
    pub state: TileState,
}

/// Static per-level board. Every coordinate lookup wraps modulo the
/// dimensions, so leaving through one edge re-enters at the opposite one.
#[derive(Debug, Clone)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<TileState>,
    total_pellets: u32,
    pellets_remaining: u32,
}

impl Grid {
    /// Builds a grid from rows indexed `rows[y][x]`, with `y = 0` at the bottom.
    pub fn new(rows: Vec<Vec<TileState>>) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if height == 0 || width == 0 {
            return Err(SimError::EmptyLayout);
        }

        let mut cells = Vec::with_capacity(width * height);
        for (row, tiles) in rows.into_iter().enumerate() {
            if tiles.len() != width {
                return Err(SimError::RaggedLayout {
                    row,
                    expected: width,
                    found: tiles.len(),
                });
            }
            cells.extend(tiles);
        }

        let mut grid = Grid {
            width,
            height,
            cells,
            total_pellets: 0,
            pellets_remaining: 0,
        };
        grid.rescan();
        Ok(grid)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Width and height in pixels.
    pub fn pixel_dimensions(&self) -> Vec2 {
        Vec2::new(
            (self.width as u32 * TILE_SIZE) as f64,
            (self.height as u32 * TILE_SIZE) as f64,
        )
    }

    pub fn total_pellets(&self) -> u32 {
        self.total_pellets
    }

    pub fn pellets_remaining(&self) -> u32 {
        self.pellets_remaining
    }

    /// Canonical in-grid coordinate for any tile position.
    pub fn wrap(&self, pos: TilePos) -> TilePos {
        TilePos::new(
            pos.x.rem_euclid(self.width as i32),
            pos.y.rem_euclid(self.height as i32),
        )
    }

    fn index(&self, pos: TilePos) -> usize {
        let pos = self.wrap(pos);
        pos.y as usize * self.width + pos.x as usize
    }

    pub fn state_at(&self, x: i32, y: i32) -> TileState {
        self.cells[self.index(TilePos::new(x, y))]
    }

    pub fn set_state(&mut self, x: i32, y: i32, state: TileState) {
        let index = self.index(TilePos::new(x, y));
        self.cells[index] = state;
    }

    pub fn tile(&self, pos: TilePos) -> Tile {
        Tile {
            pos: self.wrap(pos),
            state: self.cells[self.index(pos)],
        }
    }

    pub fn neighbor(&self, tile: Tile, direction: Direction) -> Tile {
        self.tile(tile.pos.step(direction, 1))
    }

    pub fn center_pixel(&self, tile: Tile) -> Vec2 {
        tile.pos.center_pixel()
    }

    /// Wraps a pixel position through the toroidal board (the tunnel effect).
    pub fn wrap_pixel(&self, position: Vec2) -> Vec2 {
        let size = self.pixel_dimensions();
        Vec2::new(position.x.rem_euclid(size.x), position.y.rem_euclid(size.y))
    }

    /// True when the pixel lies on the board without wrapping.
    pub fn contains_pixel(&self, position: Vec2) -> bool {
        let size = self.pixel_dimensions();
        (0.0..size.x).contains(&position.x) && (0.0..size.y).contains(&position.y)
    }

    /// Clears a pellet or power pellet, returning what was there.
    pub(crate) fn take_pellet(&mut self, pos: TilePos) -> TileState {
        let index = self.index(pos);
        let state = self.cells[index];
        if state.is_pellet() {
            self.cells[index] = TileState::Space;
            self.pellets_remaining = self.pellets_remaining.saturating_sub(1);
        }
        state
    }

    /// Recomputes the pellet counters after a bulk edit of the tiles.
    pub fn rescan(&mut self) {
        let count = self.cells.iter().filter(|state| state.is_pellet()).count() as u32;
        self.total_pellets = count;
        self.pellets_remaining = count;
    }

    /// Rows from top to bottom, for display.
    pub fn rows_top_down(&self) -> impl Iterator<Item = &[TileState]> {
        self.cells.chunks(self.width).rev()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn grid() -> Grid {
        use TileState::*;
        Grid::new(vec![
            vec![Wall, Wall, Wall, Wall],
            vec![Tunnel, Pellet, PowerPellet, Tunnel],
            vec![Wall, Pen, Space, Wall],
        ])
        .unwrap()
    }

    #[test]
    fn counts_pellets_on_construction() {
        let grid = grid();
        assert_eq!(grid.total_pellets(), 2);
        assert_eq!(grid.pellets_remaining(), 2);
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = Grid::new(vec![vec![TileState::Wall; 3], vec![TileState::Wall; 2]]).unwrap_err();
        assert!(matches!(err, SimError::RaggedLayout { row: 1, expected: 3, found: 2 }));
        assert!(matches!(Grid::new(Vec::new()), Err(SimError::EmptyLayout)));
    }

    #[test]
    fn lookups_wrap() {
        let grid = grid();
        assert_eq!(grid.state_at(-1, 1), TileState::Tunnel);
        assert_eq!(grid.state_at(6, 4), TileState::PowerPellet);
        let left_edge = grid.tile(TilePos::new(0, 1));
        assert_eq!(grid.neighbor(left_edge, Direction::Left).pos, TilePos::new(3, 1));
    }

    #[test]
    fn rescan_after_bulk_edit() {
        let mut grid = grid();
        grid.set_state(1, 1, TileState::Space);
        assert_eq!(grid.pellets_remaining(), 2);
        grid.rescan();
        assert_eq!(grid.total_pellets(), 1);
        assert_eq!(grid.pellets_remaining(), 1);
    }

    #[test]
    fn take_pellet_only_counts_pellets() {
        let mut grid = grid();
        assert_eq!(grid.take_pellet(TilePos::new(0, 0)), TileState::Wall);
        assert_eq!(grid.take_pellet(TilePos::new(2, 1)), TileState::PowerPellet);
        assert_eq!(grid.state_at(2, 1), TileState::Space);
        assert_eq!(grid.pellets_remaining(), 1);
    }

    #[test]
    fn wraps_pixels() {
        let grid = grid();
        let wrapped = grid.wrap_pixel(Vec2::new(-0.5, 24.0));
        assert_eq!(wrapped, Vec2::new(31.5, 0.0));
    }

    proptest! {
        #[test]
        fn neighbor_round_trip(x in -50i32..50, y in -50i32..50, d in 0usize..4) {
            let grid = grid();
            let direction = Direction::ALL[d];
            let start = grid.tile(TilePos::new(x, y));
            let back = grid.neighbor(grid.neighbor(start, direction), direction.behind());
            prop_assert_eq!(back, start);
        }
    }
}
