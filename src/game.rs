//! Level management: score, lives and level progression around a [`Maze`].

use std::env;
use std::str::FromStr;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::behavior::Behavior;
use crate::components::{Direction, EntityKind, PursuerState, TerminalReason, TilePos, Vec2};
use crate::error::{Result, SimError};
use crate::events::{Event, EventBus};
use crate::ghost::PursuerConfig;
use crate::level::LevelSource;
use crate::maze::{ActorConfig, Entity, Maze};
use crate::player::PlayerConfig;
use crate::tables::EXTRA_LIFE_EVERY;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Level before the first; the first `next_level` enters `start_level + 1`.
    pub start_level: u32,
    pub start_lives: i32,
    pub start_score: u64,
    /// Delays the per-level difficulty curve by this many levels.
    pub handicap: u32,
    pub seed: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            start_level: 0,
            start_lives: 2,
            start_score: 0,
            handicap: 0,
            seed: 0,
        }
    }
}

impl GameConfig {
    /// Defaults overlaid with `PACMAN_START_LEVEL`, `PACMAN_LIVES`,
    /// `PACMAN_HANDICAP` and `PACMAN_SEED`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        overlay(&mut config.start_level, "PACMAN_START_LEVEL");
        overlay(&mut config.start_lives, "PACMAN_LIVES");
        overlay(&mut config.handicap, "PACMAN_HANDICAP");
        overlay(&mut config.seed, "PACMAN_SEED");
        config
    }
}

fn overlay<T: FromStr>(slot: &mut T, key: &str) {
    if let Some(value) = env::var(key).ok().and_then(|raw| raw.trim().parse().ok()) {
        *slot = value;
    }
}

/// Per-game state shared with the maze during a tick.
#[derive(Debug)]
pub struct Session {
    config: GameConfig,
    events: EventBus,
    rng: ChaCha8Rng,
    level: u32,
    score: u64,
    extra_lives: i32,
}

impl Session {
    pub fn new(config: GameConfig) -> Self {
        Self {
            events: EventBus::new(),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            level: config.start_level,
            score: config.start_score,
            extra_lives: config.start_lives,
            config,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    /// Level used by the speed, release and frighten tables.
    pub fn effective_level(&self) -> u32 {
        self.level.saturating_sub(self.config.handicap).max(1)
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn extra_lives(&self) -> i32 {
        self.extra_lives
    }

    pub fn set_extra_lives(&mut self, lives: i32) {
        self.extra_lives = lives;
    }

    /// Adds points, granting a life each time a multiple of 10,000 is crossed.
    pub fn add_score(&mut self, points: u32) {
        let before = self.score;
        self.score += u64::from(points);
        if before / EXTRA_LIFE_EVERY != self.score / EXTRA_LIFE_EVERY {
            self.extra_lives += 1;
            debug!(score = self.score, lives = self.extra_lives, "extra life");
        }
    }
}

type BehaviorFactory = Box<dyn FnMut() -> Box<dyn Behavior> + Send>;

pub struct Game {
    session: Session,
    maze: Option<Maze>,
    levels: Box<dyn LevelSource>,
    player_behavior: BehaviorFactory,
    ended: bool,
}

impl Game {
    /// `player_behavior` is called once per level to steer the new player.
    pub fn new<L, F>(config: GameConfig, levels: L, player_behavior: F) -> Self
    where
        L: LevelSource + 'static,
        F: FnMut() -> Box<dyn Behavior> + Send + 'static,
    {
        Self {
            session: Session::new(config),
            maze: None,
            levels: Box::new(levels),
            player_behavior: Box::new(player_behavior),
            ended: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn maze(&self) -> Result<&Maze> {
        self.maze.as_ref().ok_or(SimError::NoActiveMaze)
    }

    pub fn maze_mut(&mut self) -> Result<&mut Maze> {
        self.maze.as_mut().ok_or(SimError::NoActiveMaze)
    }

    /// Out of lives.
    pub fn is_over(&self) -> bool {
        self.session.extra_lives < 0
    }

    /// Builds and populates the maze for the next level.
    pub fn next_level(&mut self) -> Result<()> {
        self.session.level += 1;
        let level = self.session.level;
        let plan = self.levels.level(level, &mut self.session.rng)?;

        let mut maze = Maze::new(plan.tiles, plan.fruit_spawn)?;
        let revive_tile = TilePos::from_pixel(plan.revive);

        for pursuer in plan.pursuers {
            let config = PursuerConfig {
                name: pursuer.name,
                chase: pursuer.chase.behavior(),
                scatter_tile: pursuer.scatter_tile,
                revive_tile,
                spawn: pursuer.spawn,
                spawn_direction: pursuer.spawn_direction,
                released: pursuer.released,
                elroy: pursuer.elroy,
                lead: pursuer.lead,
            };
            maze.spawn(ActorConfig::Pursuer(config), &mut self.session)?;
        }

        let player = PlayerConfig::new((self.player_behavior)(), plan.player_spawn);
        maze.spawn(ActorConfig::Player(player), &mut self.session)?;

        self.session.events.publish(&mut Event::MazeCreated { level, maze: &mut maze });
        debug!(level, pellets = maze.pellets_remaining(), "maze created");
        self.maze = Some(maze);
        Ok(())
    }

    /// One simulation tick. Does nothing before the first level or after
    /// the game is over.
    pub fn update(&mut self) -> Result<()> {
        if self.is_over() {
            return Ok(());
        }
        match self.maze.as_mut() {
            Some(maze) => maze.update(&mut self.session),
            None => Ok(()),
        }
    }

    /// Level advance and life bookkeeping after a tick.
    pub fn post_update(&mut self) -> Result<()> {
        let reason = self.maze.as_ref().and_then(Maze::terminal_reason);

        match reason {
            Some(TerminalReason::Win) => self.next_level()?,
            Some(TerminalReason::Lose) => {
                if let Some(maze) = self.maze.as_mut() {
                    maze.reset();
                }

                let mut event = Event::LifeLost {
                    lives: self.session.extra_lives - 1,
                    cancelled: false,
                };
                self.session.events.publish(&mut event);
                match event {
                    Event::LifeLost { lives, cancelled: false } => {
                        self.session.extra_lives = lives;
                        debug!(lives, "life lost");
                    }
                    _ => return Ok(()),
                }
            }
            None => {}
        }

        if self.is_over() && !self.ended {
            self.ended = true;
            let score = self.session.score;
            let level = self.session.level;
            self.session.events.publish(&mut Event::GameEnded { score, level });
            info!(score, level, "game over");
        }
        Ok(())
    }

    /// Starts over from the configured level, lives and score.
    pub fn restart(&mut self) -> Result<()> {
        let config = self.session.config.clone();
        self.session.level = config.start_level;
        self.session.extra_lives = config.start_lives;
        self.session.score = config.start_score;
        self.ended = false;
        self.next_level()
    }

    pub fn snapshot(&self) -> Snapshot {
        let maze = self.maze.as_ref();
        Snapshot {
            level: self.session.level,
            score: self.session.score,
            extra_lives: self.session.extra_lives,
            pellets_remaining: maze.map_or(0, Maze::pellets_remaining),
            frightened_timer: maze.map_or(0, Maze::frightened_timer),
            chase_mode: maze.map_or(false, Maze::is_chase_mode),
            terminal: maze.and_then(Maze::terminal_reason),
            entities: maze
                .map(|maze| maze.entities().iter().map(EntitySnapshot::of).collect())
                .unwrap_or_default(),
        }
    }
}

/// Telemetry for renderers and harnesses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub level: u32,
    pub score: u64,
    pub extra_lives: i32,
    pub pellets_remaining: u32,
    pub frightened_timer: u32,
    pub chase_mode: bool,
    pub terminal: Option<TerminalReason>,
    pub entities: Vec<EntitySnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub kind: EntityKind,
    pub name: Option<String>,
    pub position: Vec2,
    pub tile: TilePos,
    pub direction: Direction,
    pub state: Option<PursuerState>,
    pub alive: Option<bool>,
}

impl EntitySnapshot {
    fn of(entity: &Entity) -> Self {
        let body = entity.body();
        let mut snapshot = Self {
            kind: entity.kind(),
            name: None,
            position: body.position(),
            tile: body.tile(),
            direction: body.direction(),
            state: None,
            alive: None,
        };
        match entity {
            Entity::Player(player) => snapshot.alive = Some(player.is_alive()),
            Entity::Pursuer(pursuer) => {
                snapshot.name = Some(pursuer.name().to_owned());
                snapshot.state = Some(pursuer.state());
            }
            Entity::Fruit(_) => {}
        }
        snapshot
    }
}
