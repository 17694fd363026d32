use std::fmt;

use rand::RngCore;

use crate::behavior::{decide, Behavior, Sight, SteerContext};
use crate::components::{Direction, TilePos, TileState, Vec2};
use crate::grid::Grid;
use crate::motion::{advance, can_move, Body, Mover};
use crate::tables::{PELLET_FREEZE, POWER_PELLET_FREEZE};

pub struct PlayerConfig {
    /// Where the heading comes from each tick: a joystick, an agent, a script.
    pub behavior: Box<dyn Behavior>,
    pub spawn: Vec2,
    pub spawn_direction: Direction,
}

impl PlayerConfig {
    pub fn new(behavior: Box<dyn Behavior>, spawn: Vec2) -> Self {
        Self {
            behavior,
            spawn,
            spawn_direction: Direction::Up,
        }
    }
}

impl fmt::Debug for PlayerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerConfig")
            .field("spawn", &self.spawn)
            .field("spawn_direction", &self.spawn_direction)
            .finish_non_exhaustive()
    }
}

pub struct Player {
    body: Body,
    behavior: Box<dyn Behavior>,
    spawn: Vec2,
    spawn_direction: Direction,
    freeze_ticks: u32,
    alive: bool,
}

impl Player {
    pub fn new(config: PlayerConfig) -> Self {
        Self {
            body: Body::new(config.spawn, config.spawn_direction),
            behavior: config.behavior,
            spawn: config.spawn,
            spawn_direction: config.spawn_direction,
            freeze_ticks: 0,
            alive: true,
        }
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn freeze_ticks(&self) -> u32 {
        self.freeze_ticks
    }

    pub fn kill(&mut self) {
        self.alive = false;
    }

    pub(crate) fn reset(&mut self) {
        self.body.place(self.spawn, self.spawn_direction);
        self.freeze_ticks = 0;
        self.alive = true;
    }

    /// Steers and moves. Returns the tile to check for pellets, or `None`
    /// while the player is frozen.
    pub(crate) fn step(&mut self, grid: &Grid, sight: Sight, rng: &mut dyn RngCore, speed: f64) -> Option<TilePos> {
        self.body.tick();
        if self.freeze_ticks > 0 {
            self.freeze_ticks -= 1;
            return None;
        }

        let mut cx = SteerContext {
            grid,
            body: &self.body,
            mover: Mover::Player,
            home: None,
            sight,
            rng,
        };
        let direction = decide(self.behavior.as_mut(), &mut cx);
        self.body.set_direction(direction);

        if can_move(grid, &self.body, Mover::Player, direction) {
            advance(grid, &mut self.body, Mover::Player, direction, speed, true);
        }

        Some(self.body.tile())
    }

    /// Eating stalls the player for a moment.
    pub(crate) fn digest(&mut self, eaten: TileState) {
        match eaten {
            TileState::Pellet => self.freeze_ticks += PELLET_FREEZE,
            TileState::PowerPellet => self.freeze_ticks += POWER_PELLET_FREEZE,
            _ => {}
        }
    }
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Player")
            .field("body", &self.body)
            .field("freeze_ticks", &self.freeze_ticks)
            .field("alive", &self.alive)
            .finish_non_exhaustive()
    }
}
