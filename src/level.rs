//! Level layouts: the ASCII parser, the classic board and a procedural
//! generator, all feeding [`LevelPlan`]s to the game.

use std::collections::VecDeque;

use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use tracing::debug;

use crate::behavior::ChaseKind;
use crate::components::{Direction, TilePos, TileState, Vec2};
use crate::error::{Result, SimError};

/// Parses an ASCII layout into rows indexed `rows[y][x]` with `y = 0` at the
/// bottom, so the first text line becomes the top row.
///
/// | symbol | tile |
/// |--------|------|
/// | `#` | wall |
/// | `.` | pellet |
/// | `o` | power pellet |
/// | ` ` | empty floor |
/// | `T` | tunnel |
/// | `-` | pen |
pub fn parse_layout(text: &str) -> Result<Vec<Vec<TileState>>> {
    let mut rows = Vec::new();
    for (line_index, line) in text.lines().enumerate() {
        let mut row = Vec::with_capacity(line.len());
        for (column, symbol) in line.chars().enumerate() {
            let state = match symbol {
                '#' => TileState::Wall,
                '.' => TileState::Pellet,
                'o' => TileState::PowerPellet,
                ' ' => TileState::Space,
                'T' => TileState::Tunnel,
                '-' => TileState::Pen,
                other => {
                    return Err(SimError::UnknownTile {
                        line: line_index + 1,
                        column: column + 1,
                        symbol: other,
                    })
                }
            };
            row.push(state);
        }
        rows.push(row);
    }

    if rows.iter().all(Vec::is_empty) {
        return Err(SimError::EmptyLayout);
    }
    rows.reverse();
    Ok(rows)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PursuerPlan {
    pub name: String,
    pub chase: ChaseKind,
    pub lead: bool,
    pub elroy: bool,
    pub spawn: Vec2,
    pub spawn_direction: Direction,
    pub released: bool,
    pub scatter_tile: TilePos,
}

/// Everything needed to build and populate one level's maze.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelPlan {
    pub tiles: Vec<Vec<TileState>>,
    pub fruit_spawn: Vec2,
    pub player_spawn: Vec2,
    /// Pixel above the pen door where eaten pursuers head.
    pub revive: Vec2,
    pub pursuers: Vec<PursuerPlan>,
}

pub trait LevelSource: Send {
    fn level(&mut self, level: u32, rng: &mut dyn RngCore) -> Result<LevelPlan>;
}

/// The standard four pursuers: the lead hunts from the revive point, the
/// other three wait in the pen. `pen` is the middle, left and right pen slot.
fn standard_pursuers(revive: Vec2, pen: [Vec2; 3], width: usize, height: usize) -> Vec<PursuerPlan> {
    let (width, height) = (width as i32, height as i32);
    let [middle, left, right] = pen;
    let plan = |name: &str, chase, spawn, spawn_direction, released, scatter_tile| PursuerPlan {
        name: name.to_owned(),
        chase,
        lead: false,
        elroy: false,
        spawn,
        spawn_direction,
        released,
        scatter_tile,
    };

    vec![
        PursuerPlan {
            lead: true,
            elroy: true,
            ..plan(
                "Blinky",
                ChaseKind::Pursue,
                revive,
                Direction::Left,
                true,
                TilePos::new(width - 3, height + 2),
            )
        },
        plan("Pinky", ChaseKind::Ambush, middle, Direction::Down, true, TilePos::new(2, height + 2)),
        plan("Inky", ChaseKind::Patrol, left, Direction::Up, false, TilePos::new(width - 1, -2)),
        plan("Clyde", ChaseKind::Feign, right, Direction::Up, false, TilePos::new(0, -2)),
    ]
}

const CLASSIC_LAYOUT: [&str; 31] = [
    "############################",
    "#............##............#",
    "#.####.#####.##.#####.####.#",
    "#o####.#####.##.#####.####o#",
    "#.####.#####.##.#####.####.#",
    "#..........................#",
    "#.####.##.########.##.####.#",
    "#.####.##.########.##.####.#",
    "#......##....##....##......#",
    "######.##### ## #####.######",
    "######.##### ## #####.######",
    "######.##          ##.######",
    "######.## ###--### ##.######",
    "######.## #------# ##.######",
    "TTTTTT.   #------#   .TTTTTT",
    "######.## #------# ##.######",
    "######.## ######## ##.######",
    "######.##          ##.######",
    "######.## ######## ##.######",
    "######.## ######## ##.######",
    "#............##............#",
    "#.####.#####.##.#####.####.#",
    "#.####.#####.##.#####.####.#",
    "#o..##.......  .......##..o#",
    "###.##.##.########.##.##.###",
    "###.##.##.########.##.##.###",
    "#......##....##....##......#",
    "#.##########.##.##########.#",
    "#.##########.##.##########.#",
    "#..........................#",
    "############################",
];

/// The arcade board, identical on every level.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassicLevels;

impl LevelSource for ClassicLevels {
    fn level(&mut self, _level: u32, _rng: &mut dyn RngCore) -> Result<LevelPlan> {
        let tiles = parse_layout(&CLASSIC_LAYOUT.join("\n"))?;
        let (width, height) = (tiles[0].len(), tiles.len());

        // The pen door sits between columns 13 and 14; x = 112 is the
        // horizontal middle of the board.
        let middle_x = 112.0;
        let revive = Vec2::new(middle_x, 155.0);
        let pen_y = 131.0;
        let pen = [
            Vec2::new(middle_x, pen_y),
            Vec2::new(middle_x - 16.0, pen_y),
            Vec2::new(middle_x + 16.0, pen_y),
        ];

        Ok(LevelPlan {
            pursuers: standard_pursuers(revive, pen, width, height),
            tiles,
            fruit_spawn: Vec2::new(middle_x, 107.0),
            player_spawn: Vec2::new(middle_x, 59.0),
            revive,
        })
    }
}

const PEN_WIDTH: usize = 9;
const PEN_HEIGHT: usize = 5;
const BRAID_CHANCE: f64 = 0.45;
const EXTRA_OPENINGS: f64 = 0.08;
const MIN_WIDTH: usize = PEN_WIDTH + 6;
const MIN_HEIGHT: usize = PEN_HEIGHT + 6;

/// Fresh braided maze for every level: a randomized Prim spanning tree with
/// every dead end knocked through, a centered pen and wrap-around tunnels.
#[derive(Debug, Clone, Copy)]
pub struct GeneratedLevels {
    width: usize,
    height: usize,
}

impl GeneratedLevels {
    /// Dimensions are raised to the minimum that fits the pen and rounded
    /// up to odd numbers.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width: width.max(MIN_WIDTH) | 1,
            height: height.max(MIN_HEIGHT) | 1,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }
}

impl Default for GeneratedLevels {
    fn default() -> Self {
        Self::new(31, 21)
    }
}

impl LevelSource for GeneratedLevels {
    fn level(&mut self, level: u32, rng: &mut dyn RngCore) -> Result<LevelPlan> {
        let mut carver = Carver::new(self.width, self.height);
        carver.span(rng);
        carver.braid(rng);
        let pen = carver.carve_pen();
        carver.ensure_connected(&pen);
        carver.remove_dead_ends(&pen, rng);
        carver.open_tunnel(&pen);
        carver.scatter_pellets(&pen);

        let door_x = pen.door_x();
        let player = carver
            .nearest_open(&pen, door_x, self.height - 2)
            .ok_or(SimError::LevelUnavailable(level))?;
        let fruit = carver
            .nearest_open(&pen, door_x, (pen.y1 + 2).min(self.height - 2))
            .ok_or(SimError::LevelUnavailable(level))?;
        carver.rows[player.1][player.0] = TileState::Space;

        let pixel = |x: usize, row: usize| TilePos::new(x as i32, (self.height - 1 - row) as i32).center_pixel();
        let revive = pixel(door_x, pen.y0 - 1);
        let middle_row = (pen.y0 + pen.y1) / 2;
        let pen_spawns = [
            pixel(door_x, middle_row),
            pixel(door_x - 2, middle_row),
            pixel(door_x + 2, middle_row),
        ];

        debug!(level, width = self.width, height = self.height, "generated maze");
        let mut tiles = carver.rows;
        tiles.reverse();
        Ok(LevelPlan {
            tiles,
            fruit_spawn: pixel(fruit.0, fruit.1),
            player_spawn: pixel(player.0, player.1),
            revive,
            pursuers: standard_pursuers(revive, pen_spawns, self.width, self.height),
        })
    }
}

/// Pen rectangle in top-down generator coordinates, walls included.
#[derive(Debug, Clone, Copy)]
struct Pen {
    x0: usize,
    y0: usize,
    x1: usize,
    y1: usize,
}

impl Pen {
    fn door_x(&self) -> usize {
        (self.x0 + self.x1) / 2
    }

    fn contains(&self, x: usize, y: usize) -> bool {
        (self.x0..=self.x1).contains(&x) && (self.y0..=self.y1).contains(&y)
    }
}

/// Works top-down (`rows[0]` is the top line) like the text layouts; the
/// rows are flipped once the plan is assembled.
struct Carver {
    rows: Vec<Vec<TileState>>,
    width: usize,
    height: usize,
}

impl Carver {
    fn new(width: usize, height: usize) -> Self {
        Self {
            rows: vec![vec![TileState::Wall; width]; height],
            width,
            height,
        }
    }

    fn cells(&self) -> (usize, usize) {
        ((self.width - 1) / 2, (self.height - 1) / 2)
    }

    fn cell_neighbors(&self, (cx, cy): (usize, usize)) -> Vec<(usize, usize)> {
        let (cells_w, cells_h) = self.cells();
        let mut out = Vec::with_capacity(4);
        if cy > 0 {
            out.push((cx, cy - 1));
        }
        if cy + 1 < cells_h {
            out.push((cx, cy + 1));
        }
        if cx > 0 {
            out.push((cx - 1, cy));
        }
        if cx + 1 < cells_w {
            out.push((cx + 1, cy));
        }
        out
    }

    fn open_cell(&mut self, (cx, cy): (usize, usize)) {
        self.rows[cy * 2 + 1][cx * 2 + 1] = TileState::Space;
    }

    /// The wall tile separating two adjacent cells.
    fn between(a: (usize, usize), b: (usize, usize)) -> (usize, usize) {
        (a.0 + b.0 + 1, a.1 + b.1 + 1)
    }

    fn open_between(&mut self, a: (usize, usize), b: (usize, usize)) {
        let (x, y) = Self::between(a, b);
        self.rows[y][x] = TileState::Space;
    }

    fn is_open_between(&self, a: (usize, usize), b: (usize, usize)) -> bool {
        let (x, y) = Self::between(a, b);
        self.rows[y][x] != TileState::Wall
    }

    /// Randomized Prim: grow a spanning tree from a random cell.
    fn span(&mut self, rng: &mut dyn RngCore) {
        let (cells_w, cells_h) = self.cells();
        let mut in_maze = vec![vec![false; cells_w]; cells_h];
        let mut frontier = Vec::new();

        let start = (rng.gen_range(0..cells_w), rng.gen_range(0..cells_h));
        in_maze[start.1][start.0] = true;
        self.open_cell(start);
        frontier.extend(self.cell_neighbors(start));

        while !frontier.is_empty() {
            let cell = frontier.swap_remove(rng.gen_range(0..frontier.len()));
            if in_maze[cell.1][cell.0] {
                continue;
            }
            let joined: Vec<_> = self
                .cell_neighbors(cell)
                .into_iter()
                .filter(|&(nx, ny)| in_maze[ny][nx])
                .collect();
            let Some(&other) = joined.choose(rng) else {
                continue;
            };

            in_maze[cell.1][cell.0] = true;
            self.open_between(cell, other);
            self.open_cell(cell);
            frontier.extend(
                self.cell_neighbors(cell)
                    .into_iter()
                    .filter(|&(nx, ny)| !in_maze[ny][nx]),
            );
        }
    }

    /// Knocks through most dead ends and a few extra walls so the maze has loops.
    fn braid(&mut self, rng: &mut dyn RngCore) {
        let (cells_w, cells_h) = self.cells();
        for cy in 0..cells_h {
            for cx in 0..cells_w {
                let cell = (cx, cy);
                let (open, closed): (Vec<_>, Vec<_>) = self
                    .cell_neighbors(cell)
                    .into_iter()
                    .partition(|&other| self.is_open_between(cell, other));
                let chance = if open.len() == 1 { BRAID_CHANCE } else { EXTRA_OPENINGS };
                if rng.gen::<f64>() >= chance {
                    continue;
                }
                if let Some(&other) = closed.choose(rng) {
                    self.open_between(cell, other);
                    self.open_cell(other);
                }
            }
        }
    }

    /// Walls in a centered pen with a door in the middle of its top side,
    /// then digs upward from the door until it meets a corridor.
    fn carve_pen(&mut self) -> Pen {
        let x0 = (self.width - PEN_WIDTH) / 2;
        let y0 = (self.height - PEN_HEIGHT) / 2;
        let pen = Pen {
            x0,
            y0,
            x1: x0 + PEN_WIDTH - 1,
            y1: y0 + PEN_HEIGHT - 1,
        };

        for y in pen.y0..=pen.y1 {
            for x in pen.x0..=pen.x1 {
                let edge = y == pen.y0 || y == pen.y1 || x == pen.x0 || x == pen.x1;
                self.rows[y][x] = if edge { TileState::Wall } else { TileState::Pen };
            }
        }

        let door_x = pen.door_x();
        self.rows[pen.y0][door_x] = TileState::Pen;
        let mut y = pen.y0 - 1;
        while y > 0 && self.rows[y][door_x] == TileState::Wall {
            self.rows[y][door_x] = TileState::Space;
            y -= 1;
        }
        pen
    }

    fn walkable(&self, pen: &Pen, x: usize, y: usize) -> bool {
        !pen.contains(x, y) && self.rows[y][x] != TileState::Wall
    }

    fn flood(&self, pen: &Pen, start: (usize, usize)) -> Vec<Vec<bool>> {
        let mut seen = vec![vec![false; self.width]; self.height];
        let mut queue = VecDeque::from([start]);
        seen[start.1][start.0] = true;
        while let Some((x, y)) = queue.pop_front() {
            for (nx, ny) in [(x, y - 1), (x, y + 1), (x - 1, y), (x + 1, y)] {
                if nx == 0 || ny == 0 || nx >= self.width - 1 || ny >= self.height - 1 {
                    continue;
                }
                if seen[ny][nx] || !self.walkable(pen, nx, ny) {
                    continue;
                }
                seen[ny][nx] = true;
                queue.push_back((nx, ny));
            }
        }
        seen
    }

    fn interior(&self) -> impl Iterator<Item = (usize, usize)> {
        let (width, height) = (self.width, self.height);
        (1..height - 1).flat_map(move |y| (1..width - 1).map(move |x| (x, y)))
    }

    /// Opens walls until every corridor outside the pen is reachable.
    fn ensure_connected(&mut self, pen: &Pen) {
        let Some(start) = self.interior().find(|&(x, y)| self.walkable(pen, x, y)) else {
            return;
        };

        for _ in 0..self.width * self.height {
            let reachable = self.flood(pen, start);
            let isolated = self
                .interior()
                .any(|(x, y)| self.walkable(pen, x, y) && !reachable[y][x]);
            if !isolated {
                return;
            }

            let bridge = self.interior().find(|&(x, y)| {
                if self.rows[y][x] != TileState::Wall || pen.contains(x, y) {
                    return false;
                }
                let sides: Vec<bool> = [(x, y - 1), (x, y + 1), (x - 1, y), (x + 1, y)]
                    .into_iter()
                    .filter(|&(nx, ny)| self.walkable(pen, nx, ny))
                    .map(|(nx, ny)| reachable[ny][nx])
                    .collect();
                sides.contains(&true) && sides.contains(&false)
            });
            match bridge {
                Some((x, y)) => self.rows[y][x] = TileState::Space,
                None => return,
            }
        }
    }

    fn exits(&self, pen: &Pen, x: usize, y: usize) -> usize {
        [(x, y - 1), (x, y + 1), (x - 1, y), (x + 1, y)]
            .into_iter()
            .filter(|&(nx, ny)| self.walkable(pen, nx, ny))
            .count()
    }

    /// Pursuers never reverse on their own, so a corridor tile with a single
    /// exit traps them. Knocks out walls until every tile outside the pen has
    /// two ways out, preferring walls that lead straight into another corridor.
    fn remove_dead_ends(&mut self, pen: &Pen, rng: &mut dyn RngCore) {
        for _ in 0..self.width * self.height {
            let dead_end = self
                .interior()
                .find(|&(x, y)| self.walkable(pen, x, y) && self.exits(pen, x, y) < 2);
            let Some((x, y)) = dead_end else {
                return;
            };

            let walls: Vec<_> = [(x, y - 1), (x, y + 1), (x - 1, y), (x + 1, y)]
                .into_iter()
                .filter(|&(nx, ny)| {
                    nx > 0
                        && ny > 0
                        && nx < self.width - 1
                        && ny < self.height - 1
                        && !pen.contains(nx, ny)
                        && self.rows[ny][nx] == TileState::Wall
                })
                .collect();
            let (through, blind): (Vec<_>, Vec<_>) = walls
                .into_iter()
                .partition(|&(nx, ny)| self.exits(pen, nx, ny) > 1);
            let pick = through.choose(rng).or_else(|| blind.choose(rng));
            match pick {
                Some(&(nx, ny)) => self.rows[ny][nx] = TileState::Space,
                None => {
                    debug!(x, y, "dead end cannot be opened");
                    return;
                }
            }
        }
    }

    /// Turns the border ends of the corridor row closest to the pen's middle
    /// into a wrap-around tunnel.
    fn open_tunnel(&mut self, pen: &Pen) {
        let middle = (pen.y0 + pen.y1) / 2;
        let row = (1..self.height - 1)
            .filter(|&y| self.rows[y][1] != TileState::Wall && self.rows[y][self.width - 2] != TileState::Wall)
            .min_by_key(|&y| y.abs_diff(middle));
        if let Some(y) = row {
            self.rows[y][0] = TileState::Tunnel;
            self.rows[y][self.width - 1] = TileState::Tunnel;
        }
    }

    fn scatter_pellets(&mut self, pen: &Pen) {
        let tiles: Vec<_> = self.interior().collect();
        for (x, y) in tiles {
            if self.rows[y][x] == TileState::Space && !pen.contains(x, y) {
                self.rows[y][x] = TileState::Pellet;
            }
        }
        let (right, bottom) = (self.width - 2, self.height - 2);
        for (x, y) in [(1, 1), (right, 1), (1, bottom), (right, bottom)] {
            if self.rows[y][x] != TileState::Wall {
                self.rows[y][x] = TileState::PowerPellet;
            }
        }
    }

    /// Open non-tunnel tile closest to the given point, scanning top-down.
    fn nearest_open(&self, pen: &Pen, x: usize, y: usize) -> Option<(usize, usize)> {
        self.interior()
            .filter(|&(tx, ty)| self.walkable(pen, tx, ty) && self.rows[ty][tx] != TileState::Tunnel)
            .min_by_key(|&(tx, ty)| {
                let (dx, dy) = (tx.abs_diff(x), ty.abs_diff(y));
                dx * dx + dy * dy
            })
    }
}
