//! One level's worth of simulation: the board, the live actors, and the
//! global timers that drive them.

use rand::Rng;
use tracing::{debug, trace};

use crate::behavior::{PlayerSighting, Sight};
use crate::components::{EntityKind, PursuerState, TerminalReason, TilePos, TileState, Vec2};
use crate::error::{Result, SimError};
use crate::events::Event;
use crate::fruit::{Fruit, FruitConfig};
use crate::game::Session;
use crate::ghost::{pursuer_speed, Phase, Pursuer, PursuerConfig};
use crate::grid::Grid;
use crate::motion::Body;
use crate::player::{Player, PlayerConfig};
use crate::tables::{
    fright_ticks, fruit_score, ghost_score, mode_phase, player_speed, release_threshold, FRUIT_LIFETIME_TICKS,
    FRUIT_THRESHOLDS, GHOST_EATEN_FREEZE, PELLET_SCORE, POWER_PELLET_SCORE, START_DELAY_TICKS,
};

/// A live actor. List order is update order.
#[derive(Debug)]
pub enum Entity {
    Player(Player),
    Pursuer(Pursuer),
    Fruit(Fruit),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Player(_) => EntityKind::Player,
            Entity::Pursuer(_) => EntityKind::Pursuer,
            Entity::Fruit(_) => EntityKind::Fruit,
        }
    }

    pub fn body(&self) -> &Body {
        match self {
            Entity::Player(player) => player.body(),
            Entity::Pursuer(pursuer) => pursuer.body(),
            Entity::Fruit(fruit) => fruit.body(),
        }
    }

    pub fn as_player(&self) -> Option<&Player> {
        match self {
            Entity::Player(player) => Some(player),
            _ => None,
        }
    }

    pub fn as_pursuer(&self) -> Option<&Pursuer> {
        match self {
            Entity::Pursuer(pursuer) => Some(pursuer),
            _ => None,
        }
    }

    pub fn as_fruit(&self) -> Option<&Fruit> {
        match self {
            Entity::Fruit(fruit) => Some(fruit),
            _ => None,
        }
    }

    fn is_flagged_for_removal(&self) -> bool {
        matches!(self, Entity::Fruit(fruit) if fruit.is_flagged_for_removal())
    }
}

/// Spawn request for any actor kind.
#[derive(Debug)]
pub enum ActorConfig {
    Player(PlayerConfig),
    Pursuer(PursuerConfig),
    Fruit(FruitConfig),
}

impl ActorConfig {
    pub fn kind(&self) -> EntityKind {
        match self {
            ActorConfig::Player(_) => EntityKind::Player,
            ActorConfig::Pursuer(_) => EntityKind::Pursuer,
            ActorConfig::Fruit(_) => EntityKind::Fruit,
        }
    }

    pub fn spawn(&self) -> Vec2 {
        match self {
            ActorConfig::Player(config) => config.spawn,
            ActorConfig::Pursuer(config) => config.spawn,
            ActorConfig::Fruit(config) => config.spawn,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnOutcome {
    /// Joined the live list at this index.
    Spawned(usize),
    Cancelled,
}

/// What happened when the player and a pursuer shared a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contact {
    PlayerCaught,
    PursuerEaten { score: u32 },
    /// Already eaten, or not a pursuer at all.
    Ignored,
}

pub struct Maze {
    grid: Grid,
    entities: Vec<Entity>,
    fruit_spawn: Vec2,
    ticks: u64,
    freeze_ticks: u32,
    start_delay: u32,
    frightened_timer: u32,
    mode_countdown: i32,
    chase_mode: bool,
    phase_index: usize,
    ghosts_eaten: u32,
    fruit_requested: bool,
}

impl Maze {
    /// Builds a maze from rows indexed `tiles[y][x]` (y grows upward).
    pub fn new(tiles: Vec<Vec<TileState>>, fruit_spawn: Vec2) -> Result<Self> {
        let grid = Grid::new(tiles)?;
        if !grid.contains_pixel(fruit_spawn) {
            return Err(SimError::SpawnOutOfBounds {
                kind: EntityKind::Fruit,
                x: fruit_spawn.x,
                y: fruit_spawn.y,
            });
        }

        Ok(Self {
            grid,
            entities: Vec::new(),
            fruit_spawn,
            ticks: 0,
            freeze_ticks: 0,
            start_delay: START_DELAY_TICKS,
            frightened_timer: 0,
            mode_countdown: 0,
            // The first live tick flips this into scatter.
            chase_mode: true,
            phase_index: 0,
            ghosts_eaten: 0,
            fruit_requested: false,
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Direct board access for bulk edits; call [`Grid::rescan`] afterwards.
    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn pursuers(&self) -> impl Iterator<Item = &Pursuer> {
        self.entities.iter().filter_map(Entity::as_pursuer)
    }

    pub fn fruit(&self) -> Option<&Fruit> {
        self.entities.iter().find_map(Entity::as_fruit)
    }

    pub fn player(&self) -> Result<&Player> {
        self.entities
            .iter()
            .find_map(Entity::as_player)
            .ok_or(SimError::MissingPlayer)
    }

    pub fn player_mut(&mut self) -> Result<&mut Player> {
        self.entities
            .iter_mut()
            .find_map(|entity| match entity {
                Entity::Player(player) => Some(player),
                _ => None,
            })
            .ok_or(SimError::MissingPlayer)
    }

    pub fn fruit_spawn(&self) -> Vec2 {
        self.fruit_spawn
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn freeze_ticks(&self) -> u32 {
        self.freeze_ticks
    }

    pub fn start_delay(&self) -> u32 {
        self.start_delay
    }

    pub fn set_start_delay(&mut self, ticks: u32) {
        self.start_delay = ticks;
    }

    pub fn frightened_timer(&self) -> u32 {
        self.frightened_timer
    }

    pub fn is_chase_mode(&self) -> bool {
        self.chase_mode
    }

    pub fn mode_countdown(&self) -> i32 {
        self.mode_countdown
    }

    pub fn ghosts_eaten(&self) -> u32 {
        self.ghosts_eaten
    }

    pub fn pellets_remaining(&self) -> u32 {
        self.grid.pellets_remaining()
    }

    /// Win once the board is clear, lose once the player is dead. A maze
    /// without a player can only be won.
    pub fn terminal_reason(&self) -> Option<TerminalReason> {
        if self.grid.pellets_remaining() == 0 {
            return Some(TerminalReason::Win);
        }
        match self.player() {
            Ok(player) if !player.is_alive() => Some(TerminalReason::Lose),
            _ => None,
        }
    }

    /// Puts every actor back on its spawn point after a lost life. Pellets,
    /// the mode timer and the fruit stay as they are.
    pub fn reset(&mut self) {
        self.frightened_timer = 0;
        let chase_mode = self.chase_mode;
        for entity in &mut self.entities {
            match entity {
                Entity::Player(player) => player.reset(),
                Entity::Pursuer(pursuer) => pursuer.reset(chase_mode),
                Entity::Fruit(_) => {}
            }
        }
    }

    /// Runs the spawn pipeline: pre-spawn event (may edit or cancel), build,
    /// spawned event (may cancel), join the live list.
    pub fn spawn(&mut self, config: ActorConfig, session: &mut Session) -> Result<SpawnOutcome> {
        let expected = config.kind();
        let mut config = config;

        let cancelled = {
            let mut event = Event::EntityPreSpawn {
                config: &mut config,
                cancelled: false,
            };
            session.events_mut().publish(&mut event);
            event.is_cancelled()
        };
        if cancelled {
            debug!(kind = ?expected, "spawn cancelled before construction");
            return Ok(SpawnOutcome::Cancelled);
        }

        let found = config.kind();
        if found != expected {
            return Err(SimError::ConfigKindMismatch { expected, found });
        }

        let spawn = config.spawn();
        if !self.grid.contains_pixel(spawn) {
            return Err(SimError::SpawnOutOfBounds {
                kind: expected,
                x: spawn.x,
                y: spawn.y,
            });
        }

        let entity = match config {
            ActorConfig::Player(config) => Entity::Player(Player::new(config)),
            ActorConfig::Pursuer(config) => Entity::Pursuer(Pursuer::new(config, self.chase_mode)),
            ActorConfig::Fruit(config) => Entity::Fruit(Fruit::new(config)),
        };

        let cancelled = {
            let mut event = Event::EntitySpawned {
                entity: &entity,
                cancelled: false,
            };
            session.events_mut().publish(&mut event);
            event.is_cancelled()
        };
        if cancelled {
            debug!(kind = ?expected, "spawn cancelled after construction");
            return Ok(SpawnOutcome::Cancelled);
        }

        debug!(kind = ?expected, position = ?entity.body().position(), "entity spawned");
        self.entities.push(entity);
        Ok(SpawnOutcome::Spawned(self.entities.len() - 1))
    }

    /// Replaces any fruit on the board with a fresh one at the fruit spawn.
    pub fn spawn_fruit(&mut self, session: &mut Session) -> Result<SpawnOutcome> {
        self.entities.retain(|entity| entity.kind() != EntityKind::Fruit);
        let config = FruitConfig {
            spawn: self.fruit_spawn,
            ticks_left: session.rng_mut().gen_range(FRUIT_LIFETIME_TICKS),
        };
        self.spawn(ActorConfig::Fruit(config), session)
    }

    /// Spawns a fruit once the current (or next) entity pass finishes.
    pub fn request_fruit(&mut self) {
        self.fruit_requested = true;
    }

    /// Advances the simulation by one tick.
    pub fn update(&mut self, session: &mut Session) -> Result<()> {
        self.ticks += 1;
        if self.freeze_ticks > 0 {
            self.freeze_ticks -= 1;
            return Ok(());
        }
        if self.start_delay > 0 {
            self.start_delay -= 1;
            return Ok(());
        }
        if self.terminal_reason().is_some() {
            return Ok(());
        }

        self.frightened_timer = self.frightened_timer.saturating_sub(1);
        self.advance_mode(session);

        for index in 0..self.entities.len() {
            self.update_entity(index, session);
        }

        if std::mem::take(&mut self.fruit_requested) {
            self.spawn_fruit(session)?;
        }
        self.remove_flagged(session);
        Ok(())
    }

    fn advance_mode(&mut self, session: &mut Session) {
        let expired = self.mode_countdown == 0;
        self.mode_countdown = self.mode_countdown.saturating_sub(1);
        if !expired {
            return;
        }

        let chase = !self.chase_mode;
        let duration = mode_phase(session.level(), self.phase_index);
        self.phase_index += 1;

        let mut event = Event::ModeChange { chase, duration };
        session.events_mut().publish(&mut event);
        if let Event::ModeChange { chase, duration } = event {
            self.chase_mode = chase;
            self.mode_countdown = duration;
        }
        trace!(chase = self.chase_mode, duration = self.mode_countdown, phase = self.phase_index, "mode flip");
    }

    /// What the actors can see of each other right now.
    fn sight(&self) -> Sight {
        let player = self.entities.iter().find_map(Entity::as_player).map(|player| PlayerSighting {
            tile: player.body().tile(),
            direction: player.body().direction(),
        });
        let lead = self
            .pursuers()
            .find(|pursuer| pursuer.is_lead())
            .map(|pursuer| pursuer.body().tile());
        Sight { player, lead }
    }

    fn update_entity(&mut self, index: usize, session: &mut Session) {
        let sight = self.sight();
        match self.entities[index].kind() {
            EntityKind::Player => self.update_player(index, sight, session),
            EntityKind::Pursuer => self.update_pursuer(index, sight, session),
            EntityKind::Fruit => self.update_fruit(index, sight, session),
        }
    }

    fn update_player(&mut self, index: usize, sight: Sight, session: &mut Session) {
        let speed = player_speed(session.effective_level(), self.frightened_timer > 0);
        let Entity::Player(player) = &mut self.entities[index] else {
            return;
        };
        let Some(tile) = player.step(&self.grid, sight, session.rng_mut(), speed) else {
            return;
        };

        let eaten = self.eat_pellet(tile, session);
        if let Entity::Player(player) = &mut self.entities[index] {
            player.digest(eaten);
        }
    }

    fn update_pursuer(&mut self, index: usize, sight: Sight, session: &mut Session) {
        let level = session.effective_level();
        let pellets = self.grid.pellets_remaining();
        let Entity::Pursuer(pursuer) = &mut self.entities[index] else {
            return;
        };

        let tile = self.grid.tile(pursuer.body().tile()).state;
        let speed = pursuer_speed(pursuer.state(), level, tile, pellets, pursuer.is_elroy());
        if pursuer.begin_tick(&self.grid, speed, self.chase_mode, self.frightened_timer) == Phase::Settled {
            return;
        }

        let here = pursuer.body().tile();
        if sight.player.map(|player| player.tile) == Some(here) {
            self.eat_ghost(index, session);
        }

        if let Entity::Pursuer(pursuer) = &mut self.entities[index] {
            pursuer.navigate(&self.grid, sight, session.rng_mut(), speed);
        }
    }

    fn update_fruit(&mut self, index: usize, sight: Sight, session: &mut Session) {
        let Entity::Fruit(fruit) = &mut self.entities[index] else {
            return;
        };
        if fruit.tick(sight.player.map(|player| player.tile)) {
            let points = fruit_score(session.level());
            session.add_score(points);
            debug!(points, "fruit collected");
        }
    }

    fn remove_flagged(&mut self, session: &mut Session) {
        let mut index = 0;
        while index < self.entities.len() {
            if self.entities[index].is_flagged_for_removal() {
                let cancelled = {
                    let mut event = Event::EntityRemoved {
                        entity: &self.entities[index],
                        cancelled: false,
                    };
                    session.events_mut().publish(&mut event);
                    event.is_cancelled()
                };
                if !cancelled {
                    let removed = self.entities.remove(index);
                    debug!(kind = ?removed.kind(), "entity removed");
                    continue;
                }
            }
            index += 1;
        }
    }

    /// Consumes whatever pellet lies on `tile` and applies its effects.
    /// Returns the tile's prior state.
    pub fn eat_pellet(&mut self, tile: TilePos, session: &mut Session) -> TileState {
        let state = self.grid.take_pellet(tile);
        let level = session.effective_level();

        match state {
            TileState::Pellet => {
                session.add_score(PELLET_SCORE);
                self.count_release(level);
            }
            TileState::PowerPellet => {
                self.ghosts_eaten = 0;

                let mut score = POWER_PELLET_SCORE;
                let mut duration = fright_ticks(level);
                let mut event = Event::PowerPelletEaten {
                    tile,
                    score,
                    fright_ticks: duration,
                };
                session.events_mut().publish(&mut event);
                if let Event::PowerPelletEaten {
                    score: edited_score,
                    fright_ticks: edited_duration,
                    ..
                } = event
                {
                    score = edited_score;
                    duration = edited_duration;
                }

                session.add_score(score);
                self.frighten(duration);
            }
            _ => return state,
        }

        let eaten = self.grid.total_pellets().saturating_sub(self.grid.pellets_remaining());
        if FRUIT_THRESHOLDS.contains(&eaten) {
            self.fruit_requested = true;
        }
        state
    }

    /// Pursuers leave the pen in spawn order once enough pellets are eaten.
    fn count_release(&mut self, level: u32) {
        let mut order = 0;
        for entity in &mut self.entities {
            let Entity::Pursuer(pursuer) = entity else {
                continue;
            };
            let threshold = release_threshold(level, order);
            order += 1;
            if pursuer.is_released() {
                continue;
            }
            if pursuer.dot_counter() >= threshold {
                pursuer.release();
                debug!(pursuer = pursuer.name(), "released from pen");
            } else {
                pursuer.count_dot();
            }
        }
    }

    fn frighten(&mut self, ticks: u32) {
        self.frightened_timer = ticks;
        for entity in &mut self.entities {
            if let Entity::Pursuer(pursuer) = entity {
                pursuer.set_state(&self.grid, PursuerState::Frightened);
            }
        }
    }

    /// Resolves the player touching the pursuer at `index`.
    pub fn eat_ghost(&mut self, index: usize, session: &mut Session) -> Contact {
        let state = match self.entities.get(index) {
            Some(Entity::Pursuer(pursuer)) => pursuer.state(),
            _ => return Contact::Ignored,
        };

        match state {
            PursuerState::Eaten => Contact::Ignored,
            PursuerState::Chase | PursuerState::Scatter => {
                if let Ok(player) = self.player_mut() {
                    player.kill();
                }
                debug!(pursuer = index, "player caught");
                Contact::PlayerCaught
            }
            PursuerState::Frightened => {
                if let Some(Entity::Pursuer(pursuer)) = self.entities.get_mut(index) {
                    pursuer.set_state(&self.grid, PursuerState::Eaten);
                }
                let score = ghost_score(self.ghosts_eaten);
                session.add_score(score);
                self.freeze_ticks += GHOST_EATEN_FREEZE;
                self.ghosts_eaten += 1;
                debug!(pursuer = index, score, "pursuer eaten");
                Contact::PursuerEaten { score }
            }
        }
    }
}
