use std::fmt;

use rand::RngCore;
use tracing::{trace, warn};

use crate::behavior::{decide, Behavior, FixedTarget, Sight, SteerContext, Wander};
use crate::components::{Direction, PursuerState, TilePos, TileState, Vec2};
use crate::grid::Grid;
use crate::motion::{advance, can_move, move_towards, Body, Mover};
use crate::tables::{
    elroy_pellets, PEN_SPEED, PURSUER_EATEN, PURSUER_ELROY_1, PURSUER_ELROY_2, PURSUER_FRIGHTENED,
    PURSUER_NORMAL, PURSUER_TUNNEL,
};

/// Everything needed to put a pursuer on the board.
pub struct PursuerConfig {
    pub name: String,
    pub chase: Box<dyn Behavior>,
    pub scatter_tile: TilePos,
    pub revive_tile: TilePos,
    pub spawn: Vec2,
    pub spawn_direction: Direction,
    pub released: bool,
    /// Gets the late-level speed bonus when few pellets remain.
    pub elroy: bool,
    /// Other pursuers coordinate relative to this one.
    pub lead: bool,
}

impl PursuerConfig {
    pub fn new(name: impl Into<String>, chase: Box<dyn Behavior>, spawn: Vec2) -> Self {
        Self {
            name: name.into(),
            chase,
            scatter_tile: TilePos::default(),
            revive_tile: TilePos::from_pixel(spawn),
            spawn,
            spawn_direction: Direction::Up,
            released: false,
            elroy: false,
            lead: false,
        }
    }
}

impl fmt::Debug for PursuerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PursuerConfig")
            .field("name", &self.name)
            .field("scatter_tile", &self.scatter_tile)
            .field("revive_tile", &self.revive_tile)
            .field("spawn", &self.spawn)
            .field("spawn_direction", &self.spawn_direction)
            .field("released", &self.released)
            .field("elroy", &self.elroy)
            .field("lead", &self.lead)
            .finish_non_exhaustive()
    }
}

/// Speed in pixels per tick. Depends only on its arguments.
pub fn pursuer_speed(state: PursuerState, level: u32, tile: TileState, pellets_remaining: u32, elroy: bool) -> f64 {
    match state {
        PursuerState::Eaten => return PURSUER_EATEN,
        PursuerState::Frightened => return PURSUER_FRIGHTENED.at(level),
        PursuerState::Chase | PursuerState::Scatter => {}
    }

    if tile == TileState::Tunnel {
        return PURSUER_TUNNEL.at(level);
    }

    if elroy {
        let threshold = elroy_pellets(level);
        if pellets_remaining < threshold / 2 {
            return PURSUER_ELROY_2.at(level);
        }
        if pellets_remaining < threshold {
            return PURSUER_ELROY_1.at(level);
        }
    }

    PURSUER_NORMAL.at(level)
}

/// Result of the scripted part of a pursuer's tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// The pen routines consumed the tick.
    Settled,
    /// Free to collide with the player and navigate the maze.
    Roam,
}

pub struct Pursuer {
    body: Body,
    name: String,
    chase: Box<dyn Behavior>,
    scatter: FixedTarget,
    frightened: Wander,
    eaten: FixedTarget,
    scatter_tile: TilePos,
    elroy: bool,
    lead: bool,
    spawn: Vec2,
    spawn_direction: Direction,
    spawn_released: bool,
    dot_counter: u32,
    released: bool,
    state: PursuerState,
    next_direction: Option<Direction>,
}

impl Pursuer {
    pub fn new(config: PursuerConfig, chase_mode: bool) -> Self {
        let mut pursuer = Self {
            body: Body::new(config.spawn, config.spawn_direction),
            name: config.name,
            chase: config.chase,
            scatter: FixedTarget(config.scatter_tile),
            frightened: Wander,
            eaten: FixedTarget(config.revive_tile),
            scatter_tile: config.scatter_tile,
            elroy: config.elroy,
            lead: config.lead,
            spawn: config.spawn,
            spawn_direction: config.spawn_direction,
            spawn_released: config.released,
            dot_counter: 0,
            released: config.released,
            state: PursuerState::from_mode(chase_mode),
            next_direction: None,
        };
        pursuer.reset(chase_mode);
        pursuer
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> PursuerState {
        self.state
    }

    pub fn scatter_tile(&self) -> TilePos {
        self.scatter_tile
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn is_elroy(&self) -> bool {
        self.elroy
    }

    pub fn is_lead(&self) -> bool {
        self.lead
    }

    pub fn dot_counter(&self) -> u32 {
        self.dot_counter
    }

    pub fn next_direction(&self) -> Option<Direction> {
        self.next_direction
    }

    pub(crate) fn release(&mut self) {
        self.released = true;
    }

    pub(crate) fn count_dot(&mut self) {
        self.dot_counter += 1;
    }

    fn mover(&self) -> Mover {
        if self.released {
            Mover::Pursuer
        } else {
            Mover::PennedPursuer
        }
    }

    /// Back to the spawn point. The dot counter survives so a pursuer that
    /// was nearly released stays nearly released.
    pub(crate) fn reset(&mut self, chase_mode: bool) {
        self.body.place(self.spawn, self.spawn_direction);
        self.released = self.spawn_released;
        self.state = PursuerState::from_mode(chase_mode);
        self.next_direction = None;
    }

    /// Switches state and turns around. Returns false when the request is
    /// refused: frightening a pursuer that is already frightened or eaten.
    pub fn set_state(&mut self, grid: &Grid, state: PursuerState) -> bool {
        if state == PursuerState::Frightened
            && matches!(self.state, PursuerState::Frightened | PursuerState::Eaten)
        {
            return false;
        }

        self.next_direction = None;

        let facing = self.body.direction();
        let mover = self.mover();
        if can_move(grid, &self.body, mover, facing.behind()) {
            self.body.set_direction(facing.behind());
        } else if can_move(grid, &self.body, mover, facing.right()) {
            self.body.set_direction(facing.right());
        } else if can_move(grid, &self.body, mover, facing.left()) {
            self.body.set_direction(facing.left());
        } else {
            warn!(pursuer = %self.name, ?facing, "cannot turn on state change, keeping heading");
        }

        trace!(pursuer = %self.name, from = ?self.state, to = ?state, "state change");
        self.state = state;
        true
    }

    /// Timers, pen choreography and the chase/scatter sync.
    pub(crate) fn begin_tick(&mut self, grid: &Grid, speed: f64, chase_mode: bool, frightened_timer: u32) -> Phase {
        self.body.tick();
        let current = grid.tile(self.body.tile());

        if self.state == PursuerState::Frightened && frightened_timer == 0 {
            self.set_state(grid, PursuerState::from_mode(chase_mode));
        }

        if !self.released {
            // Penned pursuers follow the mode without turning; bouncing owns the heading.
            if matches!(self.state, PursuerState::Chase | PursuerState::Scatter) {
                self.state = PursuerState::from_mode(chase_mode);
            }
            self.bounce(grid);
            return Phase::Settled;
        }

        // Single pen layout: one exit column at the horizontal center, exit upward.
        let center_x = grid.pixel_dimensions().x / 2.0;
        let position = self.body.position();

        if current.state == TileState::Pen && self.state != PursuerState::Eaten {
            let dx = position.x - center_x;
            if dx.abs() < 0.01 {
                self.body.set_direction(Direction::Up);
                advance(grid, &mut self.body, Mover::PennedPursuer, Direction::Up, PEN_SPEED, false);
                return Phase::Settled;
            }

            self.body.set_direction(if dx > 0.0 { Direction::Left } else { Direction::Right });
            self.body.set_position(Vec2::new(move_towards(position.x, center_x, PEN_SPEED), position.y));
            return Phase::Settled;
        }

        if self.state == PursuerState::Eaten {
            let down = grid.neighbor(current, Direction::Down);
            if down.state == TileState::Pen {
                let x = move_towards(position.x, center_x, speed);
                self.body.set_position(Vec2::new(x, position.y));
                if x == center_x {
                    self.body.set_direction(Direction::Down);
                    advance(grid, &mut self.body, Mover::PennedPursuer, Direction::Down, speed, false);
                }
                return Phase::Settled;
            }

            if current.state == TileState::Pen && down.state == TileState::Wall {
                self.set_state(grid, PursuerState::from_mode(chase_mode));
                return Phase::Settled;
            }
        }

        match self.state {
            PursuerState::Chase if !chase_mode => {
                self.set_state(grid, PursuerState::Scatter);
            }
            PursuerState::Scatter if chase_mode => {
                self.set_state(grid, PursuerState::Chase);
            }
            _ => {}
        }

        Phase::Roam
    }

    /// Bob inside the pen, turning around whenever the next step would leave
    /// the current tile.
    fn bounce(&mut self, grid: &Grid) {
        let position = self.body.position();
        let (dx, dy) = self.body.direction().delta();
        let probe = Vec2::new(
            position.x + f64::from(dx) * PEN_SPEED,
            position.y + f64::from(dy) * PEN_SPEED,
        );
        if grid.wrap(TilePos::from_pixel(probe)) != grid.wrap(self.body.tile()) {
            self.body.set_direction(self.body.direction().behind());
        }
        let direction = self.body.direction();
        advance(grid, &mut self.body, Mover::PennedPursuer, direction, PEN_SPEED, false);
    }

    /// Picks a heading at tile boundaries and moves along it.
    pub(crate) fn navigate(&mut self, grid: &Grid, sight: Sight, rng: &mut dyn RngCore, speed: f64) {
        let current = grid.tile(self.body.tile());
        let last = grid.tile(self.body.last_tile());

        if last.pos != current.pos || self.next_direction.is_none() {
            let Pursuer {
                body,
                chase,
                scatter,
                frightened,
                eaten,
                scatter_tile,
                state,
                next_direction,
                ..
            } = self;
            let behavior: &mut dyn Behavior = match state {
                PursuerState::Chase => chase.as_mut(),
                PursuerState::Scatter => scatter,
                PursuerState::Frightened => frightened,
                PursuerState::Eaten => eaten,
            };
            let mut cx = SteerContext {
                grid,
                body,
                mover: Mover::Pursuer,
                home: Some(*scatter_tile),
                sight,
                rng,
            };
            *next_direction = Some(decide(behavior, &mut cx));
        }

        if let Some(next) = self.next_direction {
            if next != self.body.direction() {
                // Line up with the tile center before turning.
                let center = current.pos.center_pixel();
                let position = self.body.position();
                if !position.approx_eq(center, 0.1) {
                    self.body.set_position(Vec2::new(
                        move_towards(position.x, center.x, speed),
                        move_towards(position.y, center.y, speed),
                    ));
                    return;
                }
                self.body.set_direction(next);
            }
        }

        let direction = self.body.direction();
        if !can_move(grid, &self.body, Mover::Pursuer, direction) {
            warn!(pursuer = %self.name, ?direction, tile = ?current.pos, "pursuer is stuck");
            return;
        }

        advance(grid, &mut self.body, Mover::Pursuer, direction, speed, true);
    }
}

impl fmt::Debug for Pursuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pursuer")
            .field("name", &self.name)
            .field("body", &self.body)
            .field("state", &self.state)
            .field("released", &self.released)
            .field("dot_counter", &self.dot_counter)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::Pursue;
    use crate::level::parse_layout;
    use crate::tables::BASE_SPEED;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn grid(text: &str) -> Grid {
        Grid::new(parse_layout(text).unwrap()).unwrap()
    }

    fn pursuer_at(tile: TilePos, direction: Direction, released: bool) -> Pursuer {
        let mut config = PursuerConfig::new("test", Box::new(Pursue), tile.center_pixel());
        config.spawn_direction = direction;
        config.released = released;
        Pursuer::new(config, true)
    }

    #[test]
    fn frightened_cannot_be_refreshed_or_override_eaten() {
        let grid = grid("#####\n#...#\n#####");
        let mut pursuer = pursuer_at(TilePos::new(2, 1), Direction::Right, true);

        assert!(pursuer.set_state(&grid, PursuerState::Frightened));
        assert_eq!(pursuer.body().direction(), Direction::Left);
        assert!(!pursuer.set_state(&grid, PursuerState::Frightened));
        assert_eq!(pursuer.body().direction(), Direction::Left);

        assert!(pursuer.set_state(&grid, PursuerState::Eaten));
        assert!(!pursuer.set_state(&grid, PursuerState::Frightened));
        assert_eq!(pursuer.state(), PursuerState::Eaten);
    }

    #[test]
    fn blocked_reversal_turns_right_then_left() {
        // Facing up into a dead end: behind is open.
        let open = grid("###\n#.#\n#.#\n###");
        let mut pursuer = pursuer_at(TilePos::new(1, 2), Direction::Up, true);
        pursuer.set_state(&open, PursuerState::Scatter);
        assert_eq!(pursuer.body().direction(), Direction::Down);

        // Facing up, behind walled, right open.
        let corner = grid("####\n#..#\n####");
        let mut pursuer = pursuer_at(TilePos::new(1, 1), Direction::Up, true);
        pursuer.set_state(&corner, PursuerState::Scatter);
        assert_eq!(pursuer.body().direction(), Direction::Right);

        // Facing up, only left open.
        let mut pursuer = pursuer_at(TilePos::new(2, 1), Direction::Up, true);
        pursuer.set_state(&corner, PursuerState::Scatter);
        assert_eq!(pursuer.body().direction(), Direction::Left);
    }

    #[test]
    fn speed_is_a_pure_table_lookup() {
        let normal = pursuer_speed(PursuerState::Chase, 1, TileState::Space, 200, false);
        assert_eq!(normal, BASE_SPEED * 0.75);
        assert_eq!(pursuer_speed(PursuerState::Eaten, 7, TileState::Tunnel, 0, true), BASE_SPEED * 2.0);
        assert_eq!(pursuer_speed(PursuerState::Scatter, 1, TileState::Tunnel, 5, true), BASE_SPEED * 0.40);
        assert_eq!(pursuer_speed(PursuerState::Chase, 1, TileState::Space, 29, true), BASE_SPEED * 0.80);
        assert_eq!(pursuer_speed(PursuerState::Chase, 1, TileState::Space, 14, true), BASE_SPEED * 0.85);
        assert_eq!(pursuer_speed(PursuerState::Frightened, 5, TileState::Space, 1, true), BASE_SPEED * 0.60);
    }

    #[test]
    fn unreleased_pursuer_bounces_inside_its_tile() {
        let grid = grid("#####\n#---#\n#####");
        let mut pursuer = pursuer_at(TilePos::new(2, 1), Direction::Up, false);
        for _ in 0..64 {
            assert_eq!(pursuer.begin_tick(&grid, 1.0, true, 0), Phase::Settled);
            assert_eq!(pursuer.body().tile(), TilePos::new(2, 1));
        }
    }

    #[test]
    fn penned_pursuer_follows_the_mode_without_turning() {
        let grid = grid("#####\n#---#\n#####");
        let mut pursuer = pursuer_at(TilePos::new(2, 1), Direction::Up, false);
        assert_eq!(pursuer.state(), PursuerState::Chase);

        pursuer.begin_tick(&grid, 1.0, false, 0);
        assert_eq!(pursuer.state(), PursuerState::Scatter);
        assert_eq!(pursuer.body().direction(), Direction::Up);

        pursuer.begin_tick(&grid, 1.0, true, 0);
        assert_eq!(pursuer.state(), PursuerState::Chase);
        assert_eq!(pursuer.body().tile(), TilePos::new(2, 1));
    }

    #[test]
    fn frightened_expires_when_the_timer_is_zero() {
        let grid = grid("#######\n#.....#\n#######");
        let mut pursuer = pursuer_at(TilePos::new(3, 1), Direction::Left, true);
        pursuer.set_state(&grid, PursuerState::Frightened);

        pursuer.begin_tick(&grid, 1.0, false, 1);
        assert_eq!(pursuer.state(), PursuerState::Frightened);
        pursuer.begin_tick(&grid, 1.0, false, 0);
        assert_eq!(pursuer.state(), PursuerState::Scatter);
    }

    #[test]
    fn navigation_turns_only_at_the_center() {
        let grid = grid(
            "#####\n\
             #...#\n\
             #.#.#\n\
             #####",
        );
        let mut pursuer = pursuer_at(TilePos::new(1, 1), Direction::Up, true);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let sight = Sight {
            player: Some(crate::behavior::PlayerSighting {
                tile: TilePos::new(3, 2),
                direction: Direction::Left,
            }),
            lead: None,
        };

        for _ in 0..40 {
            if pursuer.begin_tick(&grid, 1.0, true, 0) == Phase::Roam {
                pursuer.navigate(&grid, sight, &mut rng, 1.0);
            }
        }
        // Up the left column, across the top and down to the player.
        assert_eq!(pursuer.body().tile(), TilePos::new(3, 1));
    }
}
