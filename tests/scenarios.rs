use std::sync::{Arc, Mutex};

use pacman_sim::behavior::{from_fn, Behavior, Pursue, Steer};
use pacman_sim::ghost::PursuerConfig;
use pacman_sim::level::{parse_layout, PursuerPlan};
use pacman_sim::maze::{ActorConfig, Contact};
use pacman_sim::player::PlayerConfig;
use pacman_sim::{
    ChaseKind, ClassicLevels, Direction, Event, EventKind, Game, GameConfig, LevelPlan, LevelSource, Maze,
    PursuerState, Session, TerminalReason, TilePos, TileState,
};
use rand::{Rng, RngCore};

fn session() -> Session {
    Session::new(GameConfig::default())
}

fn maze(text: &str) -> Maze {
    let tiles = parse_layout(text).unwrap();
    let mut maze = Maze::new(tiles, TilePos::new(1, 1).center_pixel()).unwrap();
    maze.set_start_delay(0);
    maze
}

fn standing_still() -> Box<dyn Behavior> {
    from_fn(|cx| Steer::Face(cx.body.direction()))
}

fn player_at(tile: TilePos) -> ActorConfig {
    ActorConfig::Player(PlayerConfig::new(standing_still(), tile.center_pixel()))
}

fn pursuer_at(tile: TilePos, facing: Direction) -> ActorConfig {
    let mut config = PursuerConfig::new("pursuer", Box::new(Pursue), tile.center_pixel());
    config.released = true;
    config.spawn_direction = facing;
    ActorConfig::Pursuer(config)
}

#[test]
fn eating_the_last_pellet_wins() {
    let mut session = session();
    let mut maze = maze("###\n#.#\n###");
    maze.spawn(player_at(TilePos::new(1, 1)), &mut session).unwrap();

    maze.update(&mut session).unwrap();
    assert_eq!(maze.terminal_reason(), Some(TerminalReason::Win));
    assert_eq!(session.score(), 10);
    assert_eq!(maze.grid().state_at(1, 1), TileState::Space);

    let position = maze.player().unwrap().body().position();
    maze.update(&mut session).unwrap();
    assert_eq!(maze.player().unwrap().body().position(), position);
}

#[test]
fn hunting_pursuer_catches_the_player() {
    let mut session = session();
    let mut maze = maze("########\n#     .#\n########");
    // Facing away: the opening scatter flip turns it toward the player.
    maze.spawn(pursuer_at(TilePos::new(4, 1), Direction::Right), &mut session).unwrap();
    maze.spawn(player_at(TilePos::new(1, 1)), &mut session).unwrap();

    for _ in 0..100 {
        maze.update(&mut session).unwrap();
        if maze.terminal_reason().is_some() {
            break;
        }
    }
    assert_eq!(maze.terminal_reason(), Some(TerminalReason::Lose));
    assert!(!maze.player().unwrap().is_alive());

    let frozen = maze.pursuers().next().unwrap().body().position();
    maze.update(&mut session).unwrap();
    assert_eq!(maze.pursuers().next().unwrap().body().position(), frozen);
}

#[test]
fn mode_flips_reverse_pursuers_and_honor_edited_durations() {
    let mut session = session();
    let flips = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&flips);
    session.events_mut().subscribe(EventKind::ModeChange, move |event| {
        if let Event::ModeChange { chase, duration } = event {
            *duration = 5;
            seen.lock().unwrap().push(*chase);
        }
        Ok(())
    });

    let mut maze = maze("############\n#..........#\n############");
    maze.spawn(pursuer_at(TilePos::new(5, 1), Direction::Left), &mut session).unwrap();

    maze.update(&mut session).unwrap();
    let pursuer = maze.pursuers().next().unwrap();
    assert_eq!(pursuer.state(), PursuerState::Scatter);
    assert_eq!(pursuer.body().direction(), Direction::Right);
    assert_eq!(maze.mode_countdown(), 5);

    for _ in 0..6 {
        maze.update(&mut session).unwrap();
    }
    let pursuer = maze.pursuers().next().unwrap();
    assert!(maze.is_chase_mode());
    assert_eq!(pursuer.state(), PursuerState::Chase);
    assert_eq!(pursuer.body().direction(), Direction::Left);
    assert_eq!(*flips.lock().unwrap(), vec![false, true]);
}

#[test]
fn ghost_scores_escalate_and_reset_on_power_pellets() {
    let mut session = session();
    let mut maze = maze("#############\n#o.........o#\n#############");
    for x in 3..8 {
        maze.spawn(pursuer_at(TilePos::new(x, 1), Direction::Left), &mut session).unwrap();
    }

    maze.eat_pellet(TilePos::new(1, 1), &mut session);
    assert!(maze.pursuers().all(|pursuer| pursuer.state() == PursuerState::Frightened));

    let scores: Vec<Contact> = (0..5).map(|index| maze.eat_ghost(index, &mut session)).collect();
    let expected: Vec<Contact> = [200, 400, 800, 800, 800]
        .into_iter()
        .map(|score| Contact::PursuerEaten { score })
        .collect();
    assert_eq!(scores, expected);
    assert_eq!(session.score(), 50 + 3000);
    assert_eq!(maze.freeze_ticks(), 200);

    // Eaten pursuers can neither be eaten again nor re-frightened.
    assert_eq!(maze.eat_ghost(0, &mut session), Contact::Ignored);
    assert_eq!(session.score(), 3050);

    maze.eat_pellet(TilePos::new(11, 1), &mut session);
    assert_eq!(maze.ghosts_eaten(), 0);
    assert!(maze.pursuers().all(|pursuer| pursuer.state() == PursuerState::Eaten));
}

#[test]
fn frightened_ends_on_the_tick_the_timer_runs_out() {
    let mut session = session();
    let mut maze = maze("#########\n#o......#\n#########");
    maze.spawn(pursuer_at(TilePos::new(4, 1), Direction::Left), &mut session).unwrap();
    maze.eat_pellet(TilePos::new(1, 1), &mut session);
    let duration = maze.frightened_timer();
    assert_eq!(duration, 360);

    for _ in 1..duration {
        maze.update(&mut session).unwrap();
    }
    assert_eq!(maze.pursuers().next().unwrap().state(), PursuerState::Frightened);

    maze.update(&mut session).unwrap();
    assert_eq!(maze.frightened_timer(), 0);
    assert_eq!(maze.pursuers().next().unwrap().state(), PursuerState::Scatter);
}

#[test]
fn eaten_pursuer_revives_in_the_pen_and_walks_back_out() {
    let mut session = session();
    let plan = ClassicLevels.level(1, session.rng_mut()).unwrap();
    let revive_tile = TilePos::from_pixel(plan.revive);
    let mut maze = Maze::new(plan.tiles, plan.fruit_spawn).unwrap();
    maze.set_start_delay(0);

    let blinky = plan.pursuers[0].clone();
    let config = PursuerConfig {
        name: blinky.name,
        chase: blinky.chase.behavior(),
        scatter_tile: blinky.scatter_tile,
        revive_tile,
        spawn: blinky.spawn,
        spawn_direction: blinky.spawn_direction,
        released: blinky.released,
        elroy: blinky.elroy,
        lead: blinky.lead,
    };
    maze.spawn(ActorConfig::Pursuer(config), &mut session).unwrap();

    for _ in 0..60 {
        maze.update(&mut session).unwrap();
    }
    assert_ne!(maze.pursuers().next().unwrap().body().tile(), revive_tile);

    let grid = maze.grid();
    let power = (0..grid.height() as i32)
        .flat_map(|y| (0..grid.width() as i32).map(move |x| TilePos::new(x, y)))
        .find(|&pos| grid.tile(pos).state == TileState::PowerPellet)
        .unwrap();
    maze.eat_pellet(power, &mut session);
    assert_eq!(maze.eat_ghost(0, &mut session), Contact::PursuerEaten { score: 200 });

    let mut revived_in_pen = false;
    let mut back_out = false;
    for _ in 0..800 {
        maze.update(&mut session).unwrap();
        let pursuer = maze.pursuers().next().unwrap();
        let tile = maze.grid().tile(pursuer.body().tile());
        if pursuer.state() == PursuerState::Eaten {
            continue;
        }
        if tile.state == TileState::Pen {
            if !revived_in_pen {
                // Revived on the pen floor, right above the wall.
                assert_eq!(maze.grid().neighbor(tile, Direction::Down).state, TileState::Wall);
                assert_eq!(tile.pos.x, revive_tile.x);
                revived_in_pen = true;
            }
        } else if revived_in_pen && tile.pos == revive_tile {
            back_out = true;
            break;
        }
    }
    assert!(revived_in_pen);
    assert!(back_out);
    assert_ne!(maze.pursuers().next().unwrap().state(), PursuerState::Frightened);
}

/// One short corridor: player on the left, a pursuer three tiles away.
struct Corridor;

impl LevelSource for Corridor {
    fn level(&mut self, _level: u32, _rng: &mut dyn RngCore) -> pacman_sim::Result<LevelPlan> {
        let spawn = TilePos::new(4, 1).center_pixel();
        Ok(LevelPlan {
            tiles: parse_layout("#########\n#.     .#\n#########")?,
            fruit_spawn: spawn,
            player_spawn: TilePos::new(1, 1).center_pixel(),
            revive: spawn,
            pursuers: vec![PursuerPlan {
                name: "Blinky".to_owned(),
                chase: ChaseKind::Pursue,
                lead: true,
                elroy: false,
                spawn,
                spawn_direction: Direction::Right,
                released: true,
                scatter_tile: TilePos::new(0, 0),
            }],
        })
    }
}

fn counter(game: &mut Game, kind: EventKind) -> Arc<Mutex<u32>> {
    let count = Arc::new(Mutex::new(0));
    let seen = Arc::clone(&count);
    game.session_mut().events_mut().subscribe(kind, move |_| {
        *seen.lock().unwrap() += 1;
        Ok(())
    });
    count
}

fn run_until_over(game: &mut Game, ticks: usize) {
    for _ in 0..ticks {
        game.update().unwrap();
        game.post_update().unwrap();
        if game.is_over() {
            return;
        }
    }
}

#[test]
fn losing_the_last_life_ends_the_game_once() {
    let config = GameConfig {
        start_lives: 0,
        ..GameConfig::default()
    };
    let mut game = Game::new(config, Corridor, standing_still);
    let lives_lost = counter(&mut game, EventKind::LifeLost);
    let endings = counter(&mut game, EventKind::GameEnded);

    game.next_level().unwrap();
    game.maze_mut().unwrap().set_start_delay(0);
    run_until_over(&mut game, 200);

    assert!(game.is_over());
    assert_eq!(game.session().extra_lives(), -1);
    assert_eq!(*lives_lost.lock().unwrap(), 1);
    assert_eq!(*endings.lock().unwrap(), 1);

    for _ in 0..10 {
        game.update().unwrap();
        game.post_update().unwrap();
    }
    assert_eq!(*endings.lock().unwrap(), 1);
}

#[test]
fn cancelled_life_loss_keeps_the_lives() {
    let mut game = Game::new(GameConfig::default(), Corridor, standing_still);
    game.session_mut().events_mut().subscribe(EventKind::LifeLost, |event| {
        event.cancel();
        Ok(())
    });
    let endings = counter(&mut game, EventKind::GameEnded);

    game.next_level().unwrap();
    game.maze_mut().unwrap().set_start_delay(0);
    for _ in 0..100 {
        game.update().unwrap();
        if game.maze().unwrap().terminal_reason() == Some(TerminalReason::Lose) {
            break;
        }
    }
    assert_eq!(game.maze().unwrap().terminal_reason(), Some(TerminalReason::Lose));

    game.post_update().unwrap();
    assert_eq!(game.session().extra_lives(), 2);
    assert!(game.maze().unwrap().player().unwrap().is_alive());
    assert_eq!(*endings.lock().unwrap(), 0);
}

/// A single pellet under the player's spawn.
struct OnePellet;

impl LevelSource for OnePellet {
    fn level(&mut self, _level: u32, _rng: &mut dyn RngCore) -> pacman_sim::Result<LevelPlan> {
        let center = TilePos::new(1, 1).center_pixel();
        Ok(LevelPlan {
            tiles: parse_layout("###\n#.#\n###")?,
            fruit_spawn: center,
            player_spawn: center,
            revive: center,
            pursuers: Vec::new(),
        })
    }
}

#[test]
fn clearing_the_board_advances_the_level() {
    let mut game = Game::new(GameConfig::default(), OnePellet, standing_still);
    let mazes = counter(&mut game, EventKind::MazeCreated);
    game.next_level().unwrap();
    game.maze_mut().unwrap().set_start_delay(0);

    game.update().unwrap();
    assert_eq!(game.maze().unwrap().terminal_reason(), Some(TerminalReason::Win));
    game.post_update().unwrap();

    assert_eq!(game.session().level(), 2);
    assert_eq!(game.session().score(), 10);
    assert_eq!(game.maze().unwrap().pellets_remaining(), 1);
    assert_eq!(*mazes.lock().unwrap(), 2);
}

fn wandering_player() -> Box<dyn Behavior> {
    from_fn(|cx| Steer::Face(Direction::ALL[cx.rng.gen_range(0..4)]))
}

#[test]
fn same_seed_replays_identically() {
    let run = || {
        let config = GameConfig {
            seed: 7,
            ..GameConfig::default()
        };
        let mut game = Game::new(config, ClassicLevels, wandering_player);
        game.next_level().unwrap();
        for _ in 0..600 {
            game.update().unwrap();
            game.post_update().unwrap();
        }
        game.snapshot()
    };

    let first = run();
    assert_eq!(first, run());
    assert_eq!(first.entities.len(), 5);

    let json = serde_json::to_string(&first).unwrap();
    assert!(json.contains("\"Blinky\""));
}
