use crate::components::{Direction, TilePos, Vec2};
use crate::motion::Body;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FruitConfig {
    pub spawn: Vec2,
    /// Ticks before the fruit disappears uncollected.
    pub ticks_left: u32,
}

/// Stationary bonus item. Collected by standing on its tile.
#[derive(Debug, Clone)]
pub struct Fruit {
    body: Body,
    ticks_left: u32,
    remove: bool,
}

impl Fruit {
    pub fn new(config: FruitConfig) -> Self {
        Self {
            body: Body::new(config.spawn, Direction::Up),
            ticks_left: config.ticks_left,
            remove: false,
        }
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn ticks_left(&self) -> u32 {
        self.ticks_left
    }

    pub fn is_flagged_for_removal(&self) -> bool {
        self.remove
    }

    /// Counts down the lifetime. Returns true on the tick the player collects it.
    pub(crate) fn tick(&mut self, player_tile: Option<TilePos>) -> bool {
        if self.remove {
            return false;
        }
        self.body.tick();

        self.ticks_left = self.ticks_left.saturating_sub(1);
        if self.ticks_left == 0 {
            self.remove = true;
        }

        if player_tile == Some(self.body.tile()) {
            self.remove = true;
            return true;
        }
        false
    }
}
