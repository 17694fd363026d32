//! Steering strategies. A behavior either names a heading outright or names a
//! destination tile; [`decide`] turns destinations into headings by scoring the
//! passable, non-reversing neighbors.

use std::sync::{Arc, Mutex, PoisonError};

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::components::{Direction, TilePos};
use crate::grid::Grid;
use crate::motion::{can_move, Body, Mover};
use crate::tables::FEIGN_RADIUS_SQUARED;

/// What a behavior wants this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Steer {
    Face(Direction),
    Target(TilePos),
}

/// Where the player is, as seen by everyone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerSighting {
    pub tile: TilePos,
    pub direction: Direction,
}

/// Read-only facts about the other actors, gathered before an actor updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sight {
    pub player: Option<PlayerSighting>,
    /// Tile of the designated lead pursuer, if one is on the board.
    pub lead: Option<TilePos>,
}

pub struct SteerContext<'a> {
    pub grid: &'a Grid,
    pub body: &'a Body,
    pub mover: Mover,
    /// The actor's scatter corner, for pursuers.
    pub home: Option<TilePos>,
    pub sight: Sight,
    pub rng: &'a mut dyn RngCore,
}

impl SteerContext<'_> {
    pub fn can_move(&self, direction: Direction) -> bool {
        can_move(self.grid, self.body, self.mover, direction)
    }
}

pub trait Behavior: Send {
    fn steer(&mut self, cx: &mut SteerContext<'_>) -> Steer;
}

impl<F> Behavior for F
where
    F: FnMut(&mut SteerContext<'_>) -> Steer + Send,
{
    fn steer(&mut self, cx: &mut SteerContext<'_>) -> Steer {
        self(cx)
    }
}

/// Boxes a closure as a behavior.
pub fn from_fn<F>(steer: F) -> Box<dyn Behavior>
where
    F: FnMut(&mut SteerContext<'_>) -> Steer + Send + 'static,
{
    Box::new(steer)
}

/// Runs a behavior and resolves its answer to a heading.
pub fn decide(behavior: &mut dyn Behavior, cx: &mut SteerContext<'_>) -> Direction {
    match behavior.steer(cx) {
        Steer::Face(direction) => direction,
        Steer::Target(target) => resolve_target(cx.grid, cx.body, target),
    }
}

/// Picks the neighbor closest (squared euclidean) to `target`, never the one
/// behind and never an impassable one. Ties go to the earliest direction in
/// declaration order. With no candidate the current heading is kept.
pub fn resolve_target(grid: &Grid, body: &Body, target: TilePos) -> Direction {
    let origin = body.tile();
    let current = grid.tile(origin);
    let behind = body.direction().behind();

    let mut best: Option<(i64, Direction)> = None;
    for direction in Direction::ALL {
        if direction == behind {
            continue;
        }
        if !grid.neighbor(current, direction).state.is_passable() {
            continue;
        }
        let distance = origin.step(direction, 1).distance_squared(target);
        if best.map_or(true, |(smallest, _)| distance < smallest) {
            best = Some((distance, direction));
        }
    }

    best.map_or(body.direction(), |(_, direction)| direction)
}

/// Heads straight for the player's tile.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pursue;

impl Behavior for Pursue {
    fn steer(&mut self, cx: &mut SteerContext<'_>) -> Steer {
        match cx.sight.player {
            Some(player) => Steer::Target(player.tile),
            None => Steer::Face(cx.body.direction()),
        }
    }
}

/// Aims a fixed number of tiles ahead of the player.
#[derive(Debug, Clone, Copy)]
pub struct Ambush {
    pub lead_tiles: i32,
}

impl Default for Ambush {
    fn default() -> Self {
        Self { lead_tiles: 4 }
    }
}

impl Behavior for Ambush {
    fn steer(&mut self, cx: &mut SteerContext<'_>) -> Steer {
        match cx.sight.player {
            Some(player) => Steer::Target(player.tile.step(player.direction, self.lead_tiles)),
            None => Steer::Face(cx.body.direction()),
        }
    }
}

/// Always the same tile: scatter corners and the way home after being eaten.
#[derive(Debug, Clone, Copy)]
pub struct FixedTarget(pub TilePos);

impl Behavior for FixedTarget {
    fn steer(&mut self, _cx: &mut SteerContext<'_>) -> Steer {
        Steer::Target(self.0)
    }
}

/// Takes the point two tiles ahead of the player and doubles the vector from
/// the lead pursuer to it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Patrol;

impl Behavior for Patrol {
    fn steer(&mut self, cx: &mut SteerContext<'_>) -> Steer {
        let Some(player) = cx.sight.player else {
            return Steer::Face(cx.body.direction());
        };
        let pivot = player.tile.step(player.direction, 2);
        let Some(lead) = cx.sight.lead else {
            warn!("no lead pursuer on the board, patrolling toward the player");
            return Steer::Target(pivot);
        };
        Steer::Target(TilePos::new(
            lead.x + 2 * (pivot.x - lead.x),
            lead.y + 2 * (pivot.y - lead.y),
        ))
    }
}

/// Chases only from afar; once within the radius it retreats to its corner.
#[derive(Debug, Clone, Copy)]
pub struct Feign {
    pub radius_squared: i64,
}

impl Default for Feign {
    fn default() -> Self {
        Self {
            radius_squared: FEIGN_RADIUS_SQUARED,
        }
    }
}

impl Behavior for Feign {
    fn steer(&mut self, cx: &mut SteerContext<'_>) -> Steer {
        let Some(player) = cx.sight.player else {
            return Steer::Face(cx.body.direction());
        };
        if player.tile.distance_squared(cx.body.tile()) > self.radius_squared {
            return Steer::Target(player.tile);
        }
        Steer::Target(cx.home.unwrap_or(player.tile))
    }
}

/// Random walk: a uniformly random start, rotated clockwise until the
/// neighbor is passable and not behind.
#[derive(Debug, Clone, Copy, Default)]
pub struct Wander;

impl Behavior for Wander {
    fn steer(&mut self, cx: &mut SteerContext<'_>) -> Steer {
        let current = cx.grid.tile(cx.body.tile());
        let behind = cx.body.direction().behind();
        let mut direction = Direction::ALL[cx.rng.gen_range(0..Direction::ALL.len())];
        for _ in 0..Direction::ALL.len() {
            if direction != behind && cx.grid.neighbor(current, direction).state.is_passable() {
                return Steer::Face(direction);
            }
            direction = direction.right();
        }
        warn!(tile = ?current.pos, "random walk found no exit");
        Steer::Face(cx.body.direction())
    }
}

/// Chase strategies a level description can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChaseKind {
    Pursue,
    Ambush,
    Patrol,
    Feign,
}

impl ChaseKind {
    pub fn behavior(self) -> Box<dyn Behavior> {
        match self {
            ChaseKind::Pursue => Box::new(Pursue),
            ChaseKind::Ambush => Box::new(Ambush::default()),
            ChaseKind::Patrol => Box::new(Patrol),
            ChaseKind::Feign => Box::new(Feign::default()),
        }
    }
}

/// Latched direction input shared between an input source and the player.
#[derive(Debug, Clone, Default)]
pub struct Joystick {
    latch: Arc<Mutex<Option<Direction>>>,
}

impl Joystick {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&self, direction: Direction) {
        *self.latch.lock().unwrap_or_else(PoisonError::into_inner) = Some(direction);
    }

    pub fn pending(&self) -> Option<Direction> {
        *self.latch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn behavior(&self) -> JoystickBehavior {
        JoystickBehavior {
            joystick: self.clone(),
        }
    }
}

/// Turns toward the latched direction once the player can move that way and
/// consumes it; until then the current heading is kept.
#[derive(Debug, Clone)]
pub struct JoystickBehavior {
    joystick: Joystick,
}

impl Behavior for JoystickBehavior {
    fn steer(&mut self, cx: &mut SteerContext<'_>) -> Steer {
        let mut latch = self.joystick.latch.lock().unwrap_or_else(PoisonError::into_inner);
        match *latch {
            Some(direction) if cx.can_move(direction) => {
                *latch = None;
                Steer::Face(direction)
            }
            _ => Steer::Face(cx.body.direction()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Vec2;
    use crate::level::parse_layout;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn open_room() -> Grid {
        Grid::new(
            parse_layout(
                "#######\n\
                 #.....#\n\
                 #.....#\n\
                 #.....#\n\
                 #######",
            )
            .unwrap(),
        )
        .unwrap()
    }

    fn body_at(x: i32, y: i32, direction: Direction) -> Body {
        Body::new(TilePos::new(x, y).center_pixel(), direction)
    }

    fn steer_with(behavior: &mut dyn Behavior, grid: &Grid, body: &Body, sight: Sight) -> Steer {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut cx = SteerContext {
            grid,
            body,
            mover: Mover::Pursuer,
            home: Some(TilePos::new(0, 0)),
            sight,
            rng: &mut rng,
        };
        behavior.steer(&mut cx)
    }

    fn sight(tile: TilePos, direction: Direction) -> Sight {
        Sight {
            player: Some(PlayerSighting { tile, direction }),
            lead: None,
        }
    }

    #[test]
    fn never_turns_back_even_toward_the_target() {
        let grid = open_room();
        let body = body_at(3, 2, Direction::Right);
        assert_ne!(resolve_target(&grid, &body, TilePos::new(1, 2)), Direction::Left);
    }

    #[test]
    fn ties_go_to_declaration_order() {
        let grid = open_room();
        let body = body_at(3, 2, Direction::Left);
        // Up and Down are equally far from a target level with the actor.
        assert_eq!(resolve_target(&grid, &body, TilePos::new(3, 2)), Direction::Up);
    }

    #[test]
    fn dead_end_keeps_heading() {
        let grid = Grid::new(parse_layout("###\n#.#\n###").unwrap()).unwrap();
        let body = body_at(1, 1, Direction::Down);
        assert_eq!(resolve_target(&grid, &body, TilePos::new(5, 5)), Direction::Down);
    }

    #[test]
    fn ambush_leads_the_player() {
        let grid = open_room();
        let body = body_at(1, 1, Direction::Up);
        let steer = steer_with(&mut Ambush::default(), &grid, &body, sight(TilePos::new(2, 2), Direction::Left));
        assert_eq!(steer, Steer::Target(TilePos::new(-2, 2)));
    }

    #[test]
    fn patrol_reflects_through_the_lead() {
        let grid = open_room();
        let body = body_at(1, 1, Direction::Up);
        let mut view = sight(TilePos::new(3, 2), Direction::Up);
        view.lead = Some(TilePos::new(1, 1));
        // pivot (3, 4); lead + 2 * (pivot - lead) = (5, 7)
        let steer = steer_with(&mut Patrol, &grid, &body, view);
        assert_eq!(steer, Steer::Target(TilePos::new(5, 7)));
    }

    #[test]
    fn feign_retreats_when_close() {
        let grid = open_room();
        let body = body_at(1, 1, Direction::Up);
        let near = steer_with(&mut Feign::default(), &grid, &body, sight(TilePos::new(5, 3), Direction::Up));
        assert_eq!(near, Steer::Target(TilePos::new(0, 0)));
        let far = steer_with(&mut Feign::default(), &grid, &body, sight(TilePos::new(20, 3), Direction::Up));
        assert_eq!(far, Steer::Target(TilePos::new(20, 3)));
    }

    #[test]
    fn wander_picks_passable_non_reversing() {
        let grid = Grid::new(parse_layout("#####\n#...#\n#####").unwrap()).unwrap();
        let body = body_at(2, 1, Direction::Right);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..32 {
            let mut cx = SteerContext {
                grid: &grid,
                body: &body,
                mover: Mover::Pursuer,
                home: None,
                sight: Sight::default(),
                rng: &mut rng,
            };
            assert_eq!(Wander.steer(&mut cx), Steer::Face(Direction::Right));
        }
    }

    #[test]
    fn joystick_waits_until_the_turn_is_open() {
        let grid = Grid::new(parse_layout("#####\n#...#\n#.###\n#####").unwrap()).unwrap();
        let joystick = Joystick::new();
        let mut behavior = joystick.behavior();
        joystick.press(Direction::Down);

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let blocked = body_at(2, 2, Direction::Left);
        let mut cx = SteerContext {
            grid: &grid,
            body: &blocked,
            mover: Mover::Player,
            home: None,
            sight: Sight::default(),
            rng: &mut rng,
        };
        assert_eq!(behavior.steer(&mut cx), Steer::Face(Direction::Left));
        assert_eq!(joystick.pending(), Some(Direction::Down));

        let open = Body::new(Vec2::new(11.0, 19.0), Direction::Left);
        cx.body = &open;
        assert_eq!(behavior.steer(&mut cx), Steer::Face(Direction::Down));
        assert_eq!(joystick.pending(), None);
    }
}
