//! Tile-based maze chase simulation: a player eating pellets while four
//! pursuers hunt it on a fixed timestep.
//!
//! A [`Game`] owns the current [`Maze`] and a [`Session`] (score, lives, rng
//! and the [`EventBus`]). Drive it with [`Game::update`] followed by
//! [`Game::post_update`] once per tick.

pub mod behavior;
pub mod components;
pub mod error;
pub mod events;
pub mod fruit;
pub mod game;
pub mod ghost;
pub mod grid;
pub mod level;
pub mod maze;
pub mod motion;
pub mod player;
pub mod tables;

pub use behavior::{Behavior, ChaseKind, Joystick, Steer};
pub use components::{Direction, EntityKind, PursuerState, TerminalReason, TilePos, TileState, Vec2};
pub use error::{Result, SimError};
pub use events::{Event, EventBus, EventKind};
pub use game::{Game, GameConfig, Session, Snapshot};
pub use grid::Grid;
pub use level::{ClassicLevels, GeneratedLevels, LevelPlan, LevelSource};
pub use maze::{ActorConfig, Entity, Maze};
