use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{ExecutableCommand, QueueableCommand};
use pacman_sim::behavior::{Behavior, Joystick};
use pacman_sim::{ClassicLevels, Direction, Entity, Game, GameConfig, GeneratedLevels, PursuerState, SimError, TileState};
use std::any::Any;
use std::env;
use std::fs::{self, File};
use std::io::{self, Stdout, Write};
use std::panic;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use unicode_width::UnicodeWidthStr;

const CELL_W: usize = 2;
const DEFAULT_TICK_MS: u64 = 16;
const DEFAULT_RENDER_FPS: u64 = 60;

#[derive(Clone, Copy, PartialEq)]
enum Glyph {
    Player,
    Pursuer,
    Frightened,
    Eyes,
    Fruit,
    Wall,
    Empty,
    Pellet,
    Power,
    Pen,
}

#[derive(Clone, Copy, PartialEq)]
struct Cell {
    glyph: Glyph,
    color: Color,
}

impl Cell {
    const fn new(glyph: Glyph, color: Color) -> Self {
        Self { glyph, color }
    }
}

struct Renderer {
    width: usize,
    height: usize,
    last: Vec<Cell>,
    last_hud: String,
    needs_full: bool,
    origin_x: u16,
    origin_y: u16,
}

impl Renderer {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            last: vec![Cell::new(Glyph::Empty, Color::Reset); width * height],
            last_hud: String::new(),
            needs_full: true,
            origin_x: 0,
            origin_y: 1,
        }
    }
}

fn main() -> io::Result<()> {
    init_logging()?;
    let mut stdout = io::stdout();
    terminal::enable_raw_mode()?;
    stdout.execute(EnterAlternateScreen)?;
    stdout.execute(Hide)?;
    install_panic_hook();

    let result = run(&mut stdout);

    // Back to the default hook so later panics reach stderr again.
    drop(panic::take_hook());
    stdout.execute(Show)?;
    stdout.execute(LeaveAlternateScreen)?;
    terminal::disable_raw_mode()?;

    let game = result?;
    if let Ok(path) = env::var("PACMAN_SNAPSHOT") {
        let json = serde_json::to_string_pretty(&game.snapshot()).map_err(io::Error::from)?;
        fs::write(path, json)?;
    }
    Ok(())
}

/// Logs go to the file named by `PACMAN_LOG`; the terminal belongs to the game.
fn init_logging() -> io::Result<()> {
    let Ok(path) = env::var("PACMAN_LOG") else {
        return Ok(());
    };
    let file = File::create(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .init();
    Ok(())
}

/// Panics caught inside event handlers would otherwise print over the
/// alternate screen. Send them to the log instead.
fn install_panic_hook() {
    panic::set_hook(Box::new(|info| {
        let loc = match info.location() {
            Some(l) => format!("{}:{}:{}", l.file(), l.line(), l.column()),
            None => "unknown".to_string(),
        };
        error!(location = %loc, "panic: {}", panic_message(info.payload()));
    }));
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn sim_error(err: SimError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err)
}

fn run(stdout: &mut Stdout) -> io::Result<Game> {
    let joystick = Joystick::new();
    let mut game = new_game(&joystick);
    game.next_level().map_err(sim_error)?;

    let (tick_ms, render_fps) = read_speed_settings();
    let tick_time = Duration::from_millis(tick_ms);
    let frame_time = Duration::from_micros(1_000_000 / render_fps.max(1));
    let mut renderer = renderer_for(&game)?;
    let mut last_tick = Instant::now();

    loop {
        let frame_start = Instant::now();
        while event::poll(Duration::from_millis(0))? {
            if let Event::Key(key) = event::read()? {
                if !matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') => return Ok(game),
                    code => {
                        if let Some(direction) = direction_for(code) {
                            joystick.press(direction);
                        }
                    }
                }
            }
        }

        if last_tick.elapsed() >= tick_time {
            last_tick = Instant::now();
            game.update().map_err(sim_error)?;
            game.post_update().map_err(sim_error)?;

            let (width, height) = dimensions(&game)?;
            if (width, height) != (renderer.width, renderer.height) {
                renderer = Renderer::new(width, height);
            }
            render(stdout, &game, &mut renderer)?;
            if game.is_over() {
                render_game_over(stdout, &game, &renderer)?;
                return Ok(game);
            }
        } else {
            render(stdout, &game, &mut renderer)?;
        }

        let elapsed = frame_start.elapsed();
        if elapsed < frame_time {
            thread::sleep(frame_time - elapsed);
        }
    }
}

fn new_game(joystick: &Joystick) -> Game {
    let config = GameConfig::from_env();
    let joystick = joystick.clone();
    let player = move || -> Box<dyn Behavior> { Box::new(joystick.behavior()) };

    let maze = env::var("PACMAN_MAZE").unwrap_or_default();
    info!(?config, maze = maze.as_str(), "starting game");
    match maze.trim() {
        "random" => Game::new(config, GeneratedLevels::default(), player),
        _ => Game::new(config, ClassicLevels, player),
    }
}

fn read_speed_settings() -> (u64, u64) {
    let read = |key: &str, default: u64| {
        env::var(key)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(default)
    };
    (read("PACMAN_TICK_MS", DEFAULT_TICK_MS), read("PACMAN_FPS", DEFAULT_RENDER_FPS))
}

fn direction_for(code: KeyCode) -> Option<Direction> {
    match code {
        KeyCode::Char('k') | KeyCode::Up => Some(Direction::Up),
        KeyCode::Char('j') | KeyCode::Down => Some(Direction::Down),
        KeyCode::Char('h') | KeyCode::Left => Some(Direction::Left),
        KeyCode::Char('l') | KeyCode::Right => Some(Direction::Right),
        _ => None,
    }
}

fn dimensions(game: &Game) -> io::Result<(usize, usize)> {
    let grid = game.maze().map_err(sim_error)?.grid();
    Ok((grid.width(), grid.height()))
}

fn renderer_for(game: &Game) -> io::Result<Renderer> {
    let (width, height) = dimensions(game)?;
    Ok(Renderer::new(width, height))
}

fn tile_cell(state: TileState) -> Cell {
    match state {
        TileState::Wall => Cell::new(Glyph::Wall, Color::Blue),
        TileState::Pen => Cell::new(Glyph::Pen, Color::DarkGrey),
        TileState::Space | TileState::Tunnel => Cell::new(Glyph::Empty, Color::Reset),
        TileState::Pellet => Cell::new(Glyph::Pellet, Color::White),
        TileState::PowerPellet => Cell::new(Glyph::Power, Color::Magenta),
    }
}

fn pursuer_color(name: &str) -> Color {
    match name {
        "Pinky" => Color::Magenta,
        "Inky" => Color::Cyan,
        "Clyde" => Color::DarkYellow,
        _ => Color::Red,
    }
}

fn entity_cell(entity: &Entity) -> Cell {
    match entity {
        Entity::Player(_) => Cell::new(Glyph::Player, Color::Yellow),
        Entity::Fruit(_) => Cell::new(Glyph::Fruit, Color::Green),
        Entity::Pursuer(pursuer) => match pursuer.state() {
            PursuerState::Frightened => Cell::new(Glyph::Frightened, Color::Blue),
            PursuerState::Eaten => Cell::new(Glyph::Eyes, Color::White),
            _ => Cell::new(Glyph::Pursuer, pursuer_color(pursuer.name())),
        },
    }
}

/// Board as display rows, top line first.
fn compose(game: &Game, renderer: &Renderer) -> io::Result<Vec<Cell>> {
    let maze = game.maze().map_err(sim_error)?;
    let mut frame: Vec<Cell> = maze.grid().rows_top_down().flatten().copied().map(tile_cell).collect();

    // Player last so it is drawn over anything sharing its tile.
    let mut entities: Vec<&Entity> = maze.entities().iter().collect();
    entities.sort_by_key(|entity| matches!(entity, Entity::Player(_)));
    for entity in entities {
        let tile = entity.body().tile();
        let (Ok(x), Ok(y)) = (usize::try_from(tile.x), usize::try_from(tile.y)) else {
            continue;
        };
        if x < renderer.width && y < renderer.height {
            frame[(renderer.height - 1 - y) * renderer.width + x] = entity_cell(entity);
        }
    }
    Ok(frame)
}

fn hud(game: &Game) -> io::Result<String> {
    let maze = game.maze().map_err(sim_error)?;
    let session = game.session();
    let mode = if maze.is_chase_mode() { "chase" } else { "scatter" };
    Ok(format!(
        "Score: {}  Lives: {}  Level: {}  Pellets: {}  Mode: {}  Fright: {}  (q to quit)",
        session.score(),
        session.extra_lives().max(0),
        session.level(),
        maze.pellets_remaining(),
        mode,
        maze.frightened_timer()
    ))
}

fn render(stdout: &mut Stdout, game: &Game, renderer: &mut Renderer) -> io::Result<()> {
    let needed_h = (renderer.height + 2) as u16;
    let needed_w = (renderer.width * CELL_W) as u16;

    stdout.queue(MoveTo(0, 0))?;

    let (term_w, term_h) = terminal::size()?;
    if term_w < needed_w || term_h < needed_h {
        stdout.queue(Clear(ClearType::All))?;
        let msg = format!(
            "Terminal too small. Need at least {}x{} (cols x rows). Current: {}x{}.",
            needed_w, needed_h, term_w, term_h
        );
        stdout.queue(Print(msg))?;
        stdout.flush()?;
        renderer.needs_full = true;
        return Ok(());
    }

    let origin_x = (term_w - needed_w) / 2;
    let origin_y = (term_h - needed_h) / 2 + 1;
    if origin_x != renderer.origin_x || origin_y != renderer.origin_y {
        renderer.origin_x = origin_x;
        renderer.origin_y = origin_y;
        renderer.needs_full = true;
    }
    if renderer.needs_full {
        stdout.queue(Clear(ClearType::All))?;
    }

    let hud = hud(game)?;
    if renderer.needs_full || hud != renderer.last_hud {
        stdout.queue(MoveTo(renderer.origin_x, renderer.origin_y - 1))?;
        stdout.queue(SetForegroundColor(Color::White))?;
        stdout.queue(Clear(ClearType::CurrentLine))?;
        stdout.queue(Print(&hud))?;
        stdout.queue(ResetColor)?;
        renderer.last_hud = hud;
    }

    let frame = compose(game, renderer)?;
    for (idx, cell) in frame.into_iter().enumerate() {
        if renderer.needs_full || cell != renderer.last[idx] {
            renderer.last[idx] = cell;
            draw_cell(stdout, renderer, idx % renderer.width, idx / renderer.width, cell)?;
        }
    }
    renderer.needs_full = false;

    stdout.flush()?;
    Ok(())
}

fn draw_cell(stdout: &mut Stdout, renderer: &Renderer, x: usize, y: usize, cell: Cell) -> io::Result<()> {
    let text = match cell.glyph {
        Glyph::Player => "😃",
        Glyph::Pursuer => "👻",
        Glyph::Frightened => "😱",
        Glyph::Eyes => "👀",
        Glyph::Fruit => "🍒",
        Glyph::Wall => "██",
        Glyph::Empty => "  ",
        Glyph::Pellet => "· ",
        Glyph::Power => "● ",
        Glyph::Pen => "░░",
    };
    let x_pos = renderer.origin_x + (x * CELL_W) as u16;
    let y_pos = renderer.origin_y + y as u16;
    stdout.queue(MoveTo(x_pos, y_pos))?;
    stdout.queue(SetForegroundColor(cell.color))?;
    stdout.queue(Print(text))?;
    let w = UnicodeWidthStr::width(text);
    for _ in w..CELL_W {
        stdout.queue(Print(' '))?;
    }
    stdout.queue(ResetColor)?;
    Ok(())
}

fn render_game_over(stdout: &mut Stdout, game: &Game, renderer: &Renderer) -> io::Result<()> {
    stdout.queue(MoveTo(renderer.origin_x, renderer.origin_y + renderer.height as u16))?;
    stdout.queue(Print(format!(
        "GAME OVER - Final Score: {} (press q to quit)",
        game.session().score()
    )))?;
    stdout.flush()?;
    loop {
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && key.code == KeyCode::Char('q') {
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_become_log_messages() {
        let literal = panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(&*literal), "boom");

        let formatted = panic::catch_unwind(|| panic!("bad tile {}", 7)).unwrap_err();
        assert_eq!(panic_message(&*formatted), "bad tile 7");

        let other = panic::catch_unwind(|| panic::panic_any(3_u8)).unwrap_err();
        assert_eq!(panic_message(&*other), "unknown panic");
    }
}
