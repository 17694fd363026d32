//! Cancellable publish/subscribe hooks into the simulation.
//!
//! Producers build an [`Event`], publish it, then read back whatever the
//! handlers changed: mutable payload fields and the `cancelled` flag. A
//! handler that returns an error or panics is logged and counted; delivery
//! to the remaining handlers carries on.

use std::error::Error;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use tracing::error;

use crate::components::{EntityKind, TilePos};
use crate::maze::{ActorConfig, Entity, Maze};

pub type HandlerError = Box<dyn Error + Send + Sync>;

type Handler = Box<dyn FnMut(&mut Event<'_>) -> Result<(), HandlerError> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MazeCreated,
    EntityPreSpawn,
    EntitySpawned,
    EntityRemoved,
    ModeChange,
    PowerPelletEaten,
    LifeLost,
    GameEnded,
}

pub enum Event<'a> {
    /// A level's maze is fully populated and about to become current.
    MazeCreated { level: u32, maze: &'a mut Maze },
    /// An actor is about to be built; the config may be edited in place.
    EntityPreSpawn {
        config: &'a mut ActorConfig,
        cancelled: bool,
    },
    /// An actor was built and is about to join the live list.
    EntitySpawned { entity: &'a Entity, cancelled: bool },
    /// A flagged actor is about to leave the live list.
    EntityRemoved { entity: &'a Entity, cancelled: bool },
    /// The global chase/scatter timer flipped. A negative duration holds
    /// the mode for the rest of the level.
    ModeChange { chase: bool, duration: i32 },
    PowerPelletEaten {
        tile: TilePos,
        score: u32,
        fright_ticks: u32,
    },
    /// The player was caught; `lives` is what will remain.
    LifeLost { lives: i32, cancelled: bool },
    GameEnded { score: u64, level: u32 },
}

impl Event<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::MazeCreated { .. } => EventKind::MazeCreated,
            Event::EntityPreSpawn { .. } => EventKind::EntityPreSpawn,
            Event::EntitySpawned { .. } => EventKind::EntitySpawned,
            Event::EntityRemoved { .. } => EventKind::EntityRemoved,
            Event::ModeChange { .. } => EventKind::ModeChange,
            Event::PowerPelletEaten { .. } => EventKind::PowerPelletEaten,
            Event::LifeLost { .. } => EventKind::LifeLost,
            Event::GameEnded { .. } => EventKind::GameEnded,
        }
    }

    /// Vetoes the default effect. No-op on events that cannot be cancelled.
    pub fn cancel(&mut self) {
        match self {
            Event::EntityPreSpawn { cancelled, .. }
            | Event::EntitySpawned { cancelled, .. }
            | Event::EntityRemoved { cancelled, .. }
            | Event::LifeLost { cancelled, .. } => *cancelled = true,
            _ => {}
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            Event::EntityPreSpawn { cancelled, .. }
            | Event::EntitySpawned { cancelled, .. }
            | Event::EntityRemoved { cancelled, .. }
            | Event::LifeLost { cancelled, .. } => *cancelled,
            _ => false,
        }
    }

    /// Kind of actor the event concerns, when it concerns one.
    pub fn entity_kind(&self) -> Option<EntityKind> {
        match self {
            Event::EntityPreSpawn { config, .. } => Some(config.kind()),
            Event::EntitySpawned { entity, .. } | Event::EntityRemoved { entity, .. } => Some(entity.kind()),
            _ => None,
        }
    }
}

impl fmt::Debug for Event<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::MazeCreated { level, .. } => f.debug_struct("MazeCreated").field("level", level).finish_non_exhaustive(),
            Event::ModeChange { chase, duration } => f
                .debug_struct("ModeChange")
                .field("chase", chase)
                .field("duration", duration)
                .finish(),
            Event::PowerPelletEaten {
                tile,
                score,
                fright_ticks,
            } => f
                .debug_struct("PowerPelletEaten")
                .field("tile", tile)
                .field("score", score)
                .field("fright_ticks", fright_ticks)
                .finish(),
            Event::LifeLost { lives, cancelled } => f
                .debug_struct("LifeLost")
                .field("lives", lives)
                .field("cancelled", cancelled)
                .finish(),
            Event::GameEnded { score, level } => f
                .debug_struct("GameEnded")
                .field("score", score)
                .field("level", level)
                .finish(),
            other => f
                .debug_struct("Event")
                .field("kind", &other.kind())
                .field("entity", &other.entity_kind())
                .field("cancelled", &other.is_cancelled())
                .finish(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener {
    id: ListenerId,
    kind: EventKind,
    handler: Handler,
}

/// One bus per simulation instance; nothing is shared between instances.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<Listener>,
    next_id: u64,
    failures: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, kind: EventKind, handler: F) -> ListenerId
    where
        F: FnMut(&mut Event<'_>) -> Result<(), HandlerError> + Send + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push(Listener {
            id,
            kind,
            handler: Box::new(handler),
        });
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|listener| listener.id != id);
        self.listeners.len() != before
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.iter().filter(|listener| listener.kind == kind).count()
    }

    /// Handler errors and panics caught so far.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn publish(&mut self, event: &mut Event<'_>) {
        let kind = event.kind();
        for listener in self.listeners.iter_mut().filter(|listener| listener.kind == kind) {
            let handler = &mut listener.handler;
            match panic::catch_unwind(AssertUnwindSafe(|| handler(&mut *event))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    self.failures += 1;
                    error!(?kind, listener = listener.id.0, %err, "event handler failed");
                }
                Err(_) => {
                    self.failures += 1;
                    error!(?kind, listener = listener.id.0, "event handler panicked");
                }
            }
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .field("failures", &self.failures)
            .finish()
    }
}
