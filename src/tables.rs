//! Balance tables shared by the simulation. Everything here is immutable;
//! per-level lookups clamp to the last authored entry.

pub const TILE_SIZE: u32 = 8;
pub const BASE_SPEED: f64 = 1.26262627083;

pub const PELLET_SCORE: u32 = 10;
pub const POWER_PELLET_SCORE: u32 = 50;
pub const GHOST_SCORES: [u32; 3] = [200, 400, 800];
pub const EXTRA_LIFE_EVERY: u64 = 10_000;

pub const GHOST_EATEN_FREEZE: u32 = 40;
pub const PELLET_FREEZE: u32 = 1;
pub const POWER_PELLET_FREEZE: u32 = 3;
pub const START_DELAY_TICKS: u32 = 60 * 4;

pub const PEN_SPEED: f64 = 0.5;
pub const FRUIT_THRESHOLDS: [u32; 2] = [70, 170];
pub const FRUIT_LIFETIME_TICKS: std::ops::Range<u32> = 540..600;
pub const FEIGN_RADIUS_SQUARED: i64 = 64;

const MODE_PHASES: [[i32; 8]; 3] = [
    [420, 1200, 420, 1200, 300, 1200, 300, -1],
    [420, 1200, 120, 1200, 300, 61980, 1, -1],
    [300, 1200, 300, 1200, 300, 62220, 1, -1],
];

const FRIGHT_TICKS: [u32; 19] = [
    360, 300, 240, 180, 120, 300, 120, 120, 60, 300, 120, 60, 60, 180, 60, 60, 0, 60, 0,
];

const ELROY_PELLETS: [u32; 21] = [
    20, 30, 40, 40, 40, 50, 50, 50, 60, 60, 60, 80, 80, 80, 100, 100, 100, 100, 120, 120, 120,
];

/// Levels are grouped into three speed buckets: 1, 2-4, 5+.
fn bucket(level: u32) -> usize {
    match level {
        0 | 1 => 0,
        2..=4 => 1,
        _ => 2,
    }
}

/// Duration of the chase/scatter phase `phase` on `level`. Negative means the
/// mode holds for the rest of the level; phases past the table do the same.
pub fn mode_phase(level: u32, phase: usize) -> i32 {
    MODE_PHASES[bucket(level)].get(phase).copied().unwrap_or(-1)
}

pub fn fright_ticks(level: u32) -> u32 {
    let index = (level.max(1) as usize - 1).min(FRIGHT_TICKS.len() - 1);
    FRIGHT_TICKS[index]
}

/// Pellets a not-yet-released pursuer waits for, by spawn order.
pub fn release_threshold(level: u32, pursuer_index: usize) -> u32 {
    let bounds: [u32; 4] = match level {
        0 | 1 => [0, 0, 30, 60],
        2 => [0, 0, 0, 50],
        _ => [0, 0, 0, 0],
    };
    bounds[pursuer_index.min(bounds.len() - 1)]
}

pub fn elroy_pellets(level: u32) -> u32 {
    ELROY_PELLETS[(level as usize).min(ELROY_PELLETS.len() - 1)]
}

pub fn ghost_score(eaten_so_far: u32) -> u32 {
    GHOST_SCORES[(eaten_so_far as usize).min(GHOST_SCORES.len() - 1)]
}

pub fn fruit_score(level: u32) -> u32 {
    match level {
        0 | 1 => 100,
        2 => 300,
        3 | 4 => 500,
        5 | 6 => 700,
        7 | 8 => 1000,
        9 | 10 => 2000,
        11 | 12 => 3000,
        _ => 5000,
    }
}

/// Multipliers of [`BASE_SPEED`], one column per level bucket.
pub struct SpeedRow([f64; 3]);

impl SpeedRow {
    pub fn at(&self, level: u32) -> f64 {
        BASE_SPEED * self.0[bucket(level)]
    }
}

pub const PURSUER_NORMAL: SpeedRow = SpeedRow([0.75, 0.85, 0.95]);
pub const PURSUER_FRIGHTENED: SpeedRow = SpeedRow([0.50, 0.55, 0.60]);
pub const PURSUER_TUNNEL: SpeedRow = SpeedRow([0.40, 0.45, 0.50]);
pub const PURSUER_ELROY_1: SpeedRow = SpeedRow([0.80, 0.90, 1.00]);
pub const PURSUER_ELROY_2: SpeedRow = SpeedRow([0.85, 0.95, 1.05]);
pub const PURSUER_EATEN: f64 = BASE_SPEED * 2.0;

pub const PLAYER_FRIGHTENING: SpeedRow = SpeedRow([0.90, 0.95, 1.00]);

pub fn player_speed(level: u32, frightening: bool) -> f64 {
    if frightening {
        return PLAYER_FRIGHTENING.at(level);
    }
    let multiplier = match level {
        0 | 1 => 0.80,
        2..=4 => 0.90,
        5..=20 => 1.00,
        _ => 0.90,
    };
    BASE_SPEED * multiplier
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_level_tables_hold_last_value() {
        assert_eq!(fright_ticks(1), 360);
        assert_eq!(fright_ticks(19), 0);
        assert_eq!(fright_ticks(250), 0);
        assert_eq!(elroy_pellets(1), 30);
        assert_eq!(elroy_pellets(99), 120);
        assert_eq!(release_threshold(1, 7), 60);
    }

    #[test]
    fn mode_table_holds_after_last_phase() {
        assert_eq!(mode_phase(1, 0), 420);
        assert_eq!(mode_phase(3, 5), 61980);
        assert_eq!(mode_phase(1, 7), -1);
        assert_eq!(mode_phase(1, 8), -1);
    }

    #[test]
    fn ghost_scores_double_then_cap() {
        let scores: Vec<u32> = (0..6).map(ghost_score).collect();
        assert_eq!(scores, vec![200, 400, 800, 800, 800, 800]);
    }
}
