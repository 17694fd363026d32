use thiserror::Error;

use crate::components::EntityKind;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("level layout has no tiles")]
    EmptyLayout,

    #[error("layout row {row} has {found} tiles, expected {expected}")]
    RaggedLayout { row: usize, expected: usize, found: usize },

    #[error("unknown tile symbol {symbol:?} at line {line}, column {column}")]
    UnknownTile { line: usize, column: usize, symbol: char },

    #[error("{kind:?} spawn point ({x}, {y}) lies outside the maze")]
    SpawnOutOfBounds { kind: EntityKind, x: f64, y: f64 },

    #[error("pre-spawn handler swapped a {expected:?} config for a {found:?} config")]
    ConfigKindMismatch { expected: EntityKind, found: EntityKind },

    #[error("maze has no player")]
    MissingPlayer,

    #[error("no maze is active")]
    NoActiveMaze,

    #[error("no layout available for level {0}")]
    LevelUnavailable(u32),
}

pub type Result<T> = std::result::Result<T, SimError>;
