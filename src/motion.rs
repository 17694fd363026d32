//! Movement primitives shared by every actor: the can-move test with corner
//! cutting, sub-tile advancing with center correction, and tunnel wrapping.

use crate::components::{Direction, TilePos, TileState, Vec2};
use crate::grid::Grid;

/// Position and heading of an actor.
#[derive(Debug, Clone)]
pub struct Body {
    position: Vec2,
    last_position: Vec2,
    direction: Direction,
    ticks_alive: u64,
}

impl Body {
    pub fn new(position: Vec2, direction: Direction) -> Self {
        Self {
            position,
            last_position: position,
            direction,
            ticks_alive: 0,
        }
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn last_position(&self) -> Vec2 {
        self.last_position
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn ticks_alive(&self) -> u64 {
        self.ticks_alive
    }

    pub fn tile(&self) -> TilePos {
        TilePos::from_pixel(self.position)
    }

    /// Tile occupied before the most recent position change.
    pub fn last_tile(&self) -> TilePos {
        TilePos::from_pixel(self.last_position)
    }

    pub(crate) fn set_position(&mut self, position: Vec2) {
        self.last_position = self.position;
        self.position = position;
    }

    pub(crate) fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    /// Teleports without leaving a trail, so the previous tile equals the
    /// current one.
    pub(crate) fn place(&mut self, position: Vec2, direction: Direction) {
        self.position = position;
        self.last_position = position;
        self.direction = direction;
    }

    pub(crate) fn tick(&mut self) {
        self.ticks_alive += 1;
    }
}

/// Who is asking to move; passability depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mover {
    Player,
    Pursuer,
    /// A pursuer that has not been released from the pen yet.
    PennedPursuer,
}

pub fn passable_for(state: TileState, mover: Mover) -> bool {
    match state {
        TileState::Pen => mover == Mover::PennedPursuer,
        other => other.is_passable(),
    }
}

pub fn move_towards(current: f64, target: f64, max_delta: f64) -> f64 {
    if current < target {
        (current + max_delta).min(target)
    } else {
        (current - max_delta).max(target)
    }
}

/// True when facing `direction` would let the body advance: either the next
/// tile is passable, or there is still room inside the current tile along
/// that axis (what lets the player cut corners).
pub fn can_move(grid: &Grid, body: &Body, mover: Mover, direction: Direction) -> bool {
    let current = grid.tile(body.tile());
    let next = grid.neighbor(current, direction);
    if passable_for(next.state, mover) {
        return true;
    }

    let center = current.pos.center_pixel();
    let to_center_x = center.x as i32 - body.position.x as i32;
    let to_center_y = center.y as i32 - body.position.y as i32;
    let (dx, dy) = direction.delta();
    to_center_x * dx + to_center_y * dy != 0
}

/// Advances `body` by `speed` pixels along `direction`.
///
/// A player facing a blocked tile slides toward the current tile's center
/// instead of overshooting into the wall. With `correct_center` the axis
/// perpendicular to motion is pulled toward the center by up to `speed`.
/// The result is wrapped through the board edges.
pub fn advance(grid: &Grid, body: &mut Body, mover: Mover, direction: Direction, speed: f64, correct_center: bool) {
    let mut position = body.position;
    let current = grid.tile(body.tile());
    let next = grid.neighbor(current, direction);
    let center = current.pos.center_pixel();

    if mover == Mover::Player && !passable_for(next.state, mover) {
        position.x = move_towards(position.x, center.x, speed);
        position.y = move_towards(position.y, center.y, speed);
    } else {
        let (dx, dy) = direction.delta();
        position.x += speed * f64::from(dx);
        position.y += speed * f64::from(dy);
    }

    if correct_center {
        if direction.is_horizontal() {
            position.y = move_towards(position.y, center.y, speed);
        } else {
            position.x = move_towards(position.x, center.x, speed);
        }
    }

    body.set_position(grid.wrap_pixel(position));
}
