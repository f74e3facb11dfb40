// src/main.rs
//
// Terminal front end: board rendering, command parsing, per-side clocks,
// save/load, and an optional automated opponent. All rules live in the
// library crate; this file only orchestrates.

use ascii_chess::{
    Color, Coord, Game, MoveError, Piece, PieceType, RestoreError, Snapshot,
};
use lazy_static::lazy_static;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::time::{Duration, Instant};

// --- Constants ---

const SAVE_FILENAME: &str = "chess_save.json";
const DEFAULT_TIME_SECONDS: u64 = 10 * 60;
const AI_CAPTURE_WEIGHT: u64 = 10;
const AI_CENTER_BONUS: u64 = 2;
const AI_TOP_CANDIDATES: usize = 3;

lazy_static! {
    static ref MOVE_RE: Regex =
        Regex::new(r"^([a-h][1-8])\s+([a-h][1-8])$").unwrap();
    static ref SHOW_RE: Regex = Regex::new(r"^show\s+([a-h][1-8])$").unwrap();
}

// --- Command Parsing ---

#[derive(Debug, PartialEq, Eq)]
enum UserInput {
    Move(Coord, Coord),
    Show(Coord),
    Undo,
    Save,
    Unicode,
    Help,
    Quit,
}

#[derive(Debug)]
enum CommandError {
    Empty,
    Unrecognized(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Empty => write!(f, "Empty input. Type 'help' for commands."),
            CommandError::Unrecognized(s) => {
                write!(f, "Unrecognized input '{}'. Type 'help' for commands.", s)
            }
        }
    }
}

impl Error for CommandError {}

/// Parses one line of user input. Move and show commands are matched by
/// regex, so a square that reaches the engine is always on the board.
fn parse_user_input(line: &str) -> Result<UserInput, CommandError> {
    let trimmed = line.trim().to_lowercase();
    if trimmed.is_empty() {
        return Err(CommandError::Empty);
    }
    if let Some(caps) = MOVE_RE.captures(&trimmed) {
        let from = Coord::from_algebraic(&caps[1])
            .unwrap_or_else(|| panic!("CRITICAL: regex admitted bad square {}", &caps[1]));
        let to = Coord::from_algebraic(&caps[2])
            .unwrap_or_else(|| panic!("CRITICAL: regex admitted bad square {}", &caps[2]));
        return Ok(UserInput::Move(from, to));
    }
    if let Some(caps) = SHOW_RE.captures(&trimmed) {
        let sq = Coord::from_algebraic(&caps[1])
            .unwrap_or_else(|| panic!("CRITICAL: regex admitted bad square {}", &caps[1]));
        return Ok(UserInput::Show(sq));
    }
    match trimmed.as_str() {
        "undo" => Ok(UserInput::Undo),
        "save" => Ok(UserInput::Save),
        "unicode" => Ok(UserInput::Unicode),
        "help" | "?" => Ok(UserInput::Help),
        "quit" | "exit" => Ok(UserInput::Quit),
        other => Err(CommandError::Unrecognized(other.to_string())),
    }
}

// --- Save / Load ---

#[derive(Debug)]
enum SaveLoadError {
    Io(io::Error),
    Format(serde_json::Error),
    Corrupt(RestoreError),
}

impl fmt::Display for SaveLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveLoadError::Io(e) => write!(f, "File error: {}", e),
            SaveLoadError::Format(e) => write!(f, "Save file is not valid JSON: {}", e),
            SaveLoadError::Corrupt(e) => write!(f, "{}", e),
        }
    }
}

impl Error for SaveLoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SaveLoadError::Io(e) => Some(e),
            SaveLoadError::Format(e) => Some(e),
            SaveLoadError::Corrupt(e) => Some(e),
        }
    }
}

impl From<io::Error> for SaveLoadError {
    fn from(e: io::Error) -> Self {
        SaveLoadError::Io(e)
    }
}

impl From<serde_json::Error> for SaveLoadError {
    fn from(e: serde_json::Error) -> Self {
        SaveLoadError::Format(e)
    }
}

impl From<RestoreError> for SaveLoadError {
    fn from(e: RestoreError) -> Self {
        SaveLoadError::Corrupt(e)
    }
}

/// On-disk format: the engine snapshot plus the front end's own state.
#[derive(Debug, Serialize, Deserialize)]
struct SaveFile {
    snapshot: Snapshot,
    time_white_ms: u64,
    time_black_ms: u64,
    use_timer: bool,
    vs_ai: bool,
}

fn save_game(session: &Session) -> Result<(), SaveLoadError> {
    let file = SaveFile {
        snapshot: session.game.snapshot(),
        time_white_ms: session.clock.remaining(Color::White).as_millis() as u64,
        time_black_ms: session.clock.remaining(Color::Black).as_millis() as u64,
        use_timer: session.clock.enabled,
        vs_ai: session.vs_ai,
    };
    let json = serde_json::to_string_pretty(&file)?;
    fs::write(SAVE_FILENAME, json)?;
    Ok(())
}

fn load_game() -> Result<Session, SaveLoadError> {
    let json = fs::read_to_string(SAVE_FILENAME)?;
    let file: SaveFile = serde_json::from_str(&json)?;
    let game = Game::restore(file.snapshot)?;
    Ok(Session {
        game,
        clock: Clock::restored(
            file.use_timer,
            Duration::from_millis(file.time_white_ms),
            Duration::from_millis(file.time_black_ms),
        ),
        vs_ai: file.vs_ai,
        unicode: true,
    })
}

// --- Clock ---

/// Count-down clocks for both sides. Time is charged when a turn completes,
/// matching how the prompt blocks on input.
struct Clock {
    enabled: bool,
    white: Duration,
    black: Duration,
    turn_started: Instant,
}

impl Clock {
    fn new(enabled: bool) -> Self {
        Clock::restored(
            enabled,
            Duration::from_secs(DEFAULT_TIME_SECONDS),
            Duration::from_secs(DEFAULT_TIME_SECONDS),
        )
    }

    fn restored(enabled: bool, white: Duration, black: Duration) -> Self {
        Clock { enabled, white, black, turn_started: Instant::now() }
    }

    fn remaining(&self, color: Color) -> Duration {
        match color {
            Color::White => self.white,
            Color::Black => self.black,
        }
    }

    fn start_turn(&mut self) {
        self.turn_started = Instant::now();
    }

    /// Charges the elapsed turn time to `color`. Returns true if that side
    /// just ran out of time.
    fn charge(&mut self, color: Color) -> bool {
        if !self.enabled {
            return false;
        }
        let elapsed = self.turn_started.elapsed();
        let slot = match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        };
        *slot = slot.saturating_sub(elapsed);
        slot.is_zero()
    }
}

/// Formats a clock reading as mm:ss.
fn format_duration(d: Duration) -> String {
    let total = d.as_secs();
    format!("{:02}:{:02}", total / 60, total % 60)
}

// --- Rendering ---

fn unicode_glyph(piece: Piece) -> char {
    match (piece.color, piece.kind) {
        (Color::White, PieceType::King) => '♔',
        (Color::White, PieceType::Queen) => '♕',
        (Color::White, PieceType::Rook) => '♖',
        (Color::White, PieceType::Bishop) => '♗',
        (Color::White, PieceType::Knight) => '♘',
        (Color::White, PieceType::Pawn) => '♙',
        (Color::Black, PieceType::King) => '♚',
        (Color::Black, PieceType::Queen) => '♛',
        (Color::Black, PieceType::Rook) => '♜',
        (Color::Black, PieceType::Bishop) => '♝',
        (Color::Black, PieceType::Knight) => '♞',
        (Color::Black, PieceType::Pawn) => '♟',
    }
}

/// Prints the board from White's perspective (rank 8 at the top), with the
/// captured-piece tallies and the last few moves under it.
fn render(session: &Session) {
    let game = &session.game;
    println!();
    println!("    a b c d e f g h");
    println!("  +-----------------+");
    for row in 0..8 {
        let rank = 8 - row;
        print!("{} | ", rank);
        for col in 0..8 {
            let square = Coord::new(row, col);
            let glyph = match game.board().piece_at(square) {
                Some(p) if session.unicode => unicode_glyph(p),
                Some(p) => p.to_string().chars().next().unwrap_or('?'),
                None if (row + col) % 2 == 1 => '·',
                None => ' ',
            };
            print!("{} ", glyph);
        }
        println!("| {}", rank);
    }
    println!("  +-----------------+");
    println!("    a b c d e f g h");

    for color in [Color::White, Color::Black] {
        let captured = game.captured_by(color);
        if !captured.is_empty() {
            let mut pieces: Vec<Piece> = captured.to_vec();
            pieces.sort_by(|a, b| b.value().cmp(&a.value()));
            let line: String = pieces
                .iter()
                .map(|&p| {
                    if session.unicode {
                        unicode_glyph(p).to_string()
                    } else {
                        p.to_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(" ");
            println!("{:?} has captured: {}", color, line);
        }
    }

    let log = game.move_log();
    if !log.is_empty() {
        let recent: Vec<String> = log
            .iter()
            .rev()
            .take(5)
            .rev()
            .map(|r| r.notation.clone())
            .collect();
        println!("Recent moves: {}", recent.join("  "));
    }

    if session.clock.enabled {
        println!(
            "Time  White {}  Black {}",
            format_duration(session.clock.remaining(Color::White)),
            format_duration(session.clock.remaining(Color::Black)),
        );
    }
}

fn show_destinations(session: &mut Session, from: Coord) {
    match session.game.board().piece_at(from) {
        None => println!("{} is empty.", from),
        Some(piece) => {
            let destinations = session.game.legal_destinations(from);
            if destinations.is_empty() {
                println!("{:?} {:?} on {} has no legal moves.", piece.color, piece.kind, from);
            } else {
                let list: Vec<String> =
                    destinations.iter().map(|d| d.to_algebraic()).collect();
                println!(
                    "{:?} {:?} on {} can move to: {}",
                    piece.color,
                    piece.kind,
                    from,
                    list.join(" ")
                );
            }
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  e2 e4      move the piece on e2 to e4");
    println!("  show e2    list the legal moves for the piece on e2");
    println!("  undo       take back the last move");
    println!("  save       save the game to {}", SAVE_FILENAME);
    println!("  unicode    toggle between figurine and letter pieces");
    println!("  help       show this message");
    println!("  quit       leave the game");
}

// --- Automated Opponent ---

/// Picks a move for `color`: every legal move is scored by capture value and
/// centralization with a dash of noise, then one of the top few is chosen at
/// random. Promotions are always resolved as a queen.
fn choose_ai_move(game: &mut Game, color: Color, rng: &mut StdRng) -> Option<(Coord, Coord)> {
    let mut scored: Vec<(u64, Coord, Coord)> = Vec::new();
    for from in Coord::all() {
        if !game.board().piece_at(from).is_some_and(|p| p.color == color) {
            continue;
        }
        for to in game.legal_destinations(from) {
            let mut score = 0u64;
            if let Some(victim) = game.board().piece_at(to) {
                score += u64::from(victim.value()) * AI_CAPTURE_WEIGHT;
            } else if game.en_passant_target() == Some(to)
                && game.board().piece_at(from).is_some_and(|p| p.kind == PieceType::Pawn)
                && from.col != to.col
            {
                score += AI_CAPTURE_WEIGHT;
            }
            if (3..=4).contains(&to.row) && (3..=4).contains(&to.col) {
                score += AI_CENTER_BONUS;
            }
            // Small random tiebreak so equal-scored moves vary between games.
            score = score * 1000 + rng.next_u64() % 1000;
            scored.push((score, from, to));
        }
    }
    if scored.is_empty() {
        return None;
    }
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    let pool = scored.len().min(AI_TOP_CANDIDATES);
    let pick = (rng.next_u64() % pool as u64) as usize;
    let (_, from, to) = scored[pick];
    Some((from, to))
}

// --- Session Setup ---

struct Session {
    game: Game,
    clock: Clock,
    vs_ai: bool,
    unicode: bool,
}

fn prompt(message: &str) -> io::Result<String> {
    print!("{}", message);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line)
}

fn prompt_yes_no(message: &str) -> io::Result<bool> {
    loop {
        let answer = prompt(message)?;
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => println!("Please answer y or n."),
        }
    }
}

fn setup_session() -> Result<Session, Box<dyn Error>> {
    if fs::metadata(SAVE_FILENAME).is_ok()
        && prompt_yes_no("Found a saved game. Load it? (y/n): ")?
    {
        match load_game() {
            Ok(session) => {
                println!("Game loaded.");
                return Ok(session);
            }
            Err(e) => {
                eprintln!("Warning: could not load the save: {}", e);
                println!("Starting a new game instead.");
            }
        }
    }

    let vs_ai = prompt_yes_no("Play against the computer (it takes Black)? (y/n): ")?;
    let timed = prompt_yes_no("Use a 10-minute clock per side? (y/n): ")?;
    Ok(Session {
        game: Game::new(),
        clock: Clock::new(timed),
        vs_ai,
        unicode: true,
    })
}

/// Prompts the human player until a valid promotion piece is chosen.
fn resolve_promotion_interactively(game: &mut Game) -> Result<(), Box<dyn Error>> {
    loop {
        let answer = prompt("Promote to (q/r/b/n): ")?;
        let kind = match answer.trim().to_lowercase().as_str() {
            "q" => PieceType::Queen,
            "r" => PieceType::Rook,
            "b" => PieceType::Bishop,
            "n" => PieceType::Knight,
            _ => {
                println!("Please choose q, r, b or n.");
                continue;
            }
        };
        match game.set_promotion_choice(kind) {
            Ok(()) => return Ok(()),
            Err(e) => {
                // Not reachable from the prompt flow; a second resolution
                // attempt would mean the pending marker vanished.
                eprintln!("Warning: {}", e);
                return Ok(());
            }
        }
    }
}

// --- Main Loop ---

fn main() -> Result<(), Box<dyn Error>> {
    println!("Terminal Chess");
    println!("Enter moves as two squares, e.g. 'e2 e4'. Type 'help' for commands.");

    let mut session = setup_session()?;
    let mut rng = StdRng::from_os_rng();

    'game_loop: loop {
        render(&session);

        let mover = session.game.side_to_move();
        if session.game.is_checkmate() {
            println!("Checkmate! {:?} wins.", mover.opponent());
            break 'game_loop;
        }
        if session.game.is_stalemate() {
            println!("Stalemate. The game is a draw.");
            break 'game_loop;
        }
        if session.game.is_in_check(mover) {
            println!("{:?} is in check!", mover);
        }

        session.clock.start_turn();

        // The automated opponent plays Black.
        if session.vs_ai && mover == Color::Black {
            let (from, to) = match choose_ai_move(&mut session.game, Color::Black, &mut rng) {
                Some(mv) => mv,
                None => panic!("CRITICAL: no move for a side that is neither mated nor stalemated"),
            };
            let outcome = match session.game.try_move(from, to) {
                Ok(outcome) => outcome,
                Err(e) => panic!("CRITICAL: chosen move {} {} rejected: {}", from, to, e),
            };
            if outcome.promotion_pending {
                session
                    .game
                    .set_promotion_choice(PieceType::Queen)
                    .unwrap_or_else(|e| panic!("CRITICAL: queen promotion rejected: {}", e));
            }
            let notation = &session.game.move_log().last()
                .unwrap_or_else(|| panic!("CRITICAL: move applied but log is empty"))
                .notation;
            println!("Black plays {} ({} {})", notation, from, to);
            if session.clock.charge(Color::Black) {
                render(&session);
                println!("Black ran out of time. White wins.");
                break 'game_loop;
            }
            continue 'game_loop;
        }

        let line = prompt(&format!("{:?} to move > ", mover))?;
        let input = match parse_user_input(&line) {
            Ok(input) => input,
            Err(e) => {
                println!("{}", e);
                continue 'game_loop;
            }
        };

        match input {
            UserInput::Move(from, to) => match session.game.try_move(from, to) {
                Ok(outcome) => {
                    if outcome.promotion_pending {
                        resolve_promotion_interactively(&mut session.game)?;
                    }
                    if let Some(taken) = outcome.captured {
                        println!("Captured a {:?}.", taken.kind);
                    }
                    if session.clock.charge(mover) {
                        render(&session);
                        println!("{:?} ran out of time. {:?} wins.", mover, mover.opponent());
                        break 'game_loop;
                    }
                }
                Err(e @ (MoveError::PromotionPending(_) | MoveError::NoPendingPromotion)) => {
                    // The interactive flow resolves promotions inline, so
                    // these indicate a front-end bug rather than bad input.
                    eprintln!("Warning: {}", e);
                }
                Err(e) => println!("{}", e),
            },
            UserInput::Show(sq) => show_destinations(&mut session, sq),
            UserInput::Undo => {
                // Against the computer, take back its reply too so the human
                // is to move again.
                let count = if session.vs_ai && mover == Color::White { 2 } else { 1 };
                let mut undone = 0;
                for _ in 0..count {
                    if session.game.undo_last_move() {
                        undone += 1;
                    }
                }
                if undone == 0 {
                    println!("Nothing to undo.");
                } else {
                    println!("Took back {} move(s).", undone);
                }
            }
            UserInput::Save => match save_game(&session) {
                Ok(()) => println!("Game saved to {}.", SAVE_FILENAME),
                Err(e) => eprintln!("Warning: save failed: {}", e),
            },
            UserInput::Unicode => {
                session.unicode = !session.unicode;
            }
            UserInput::Help => print_help(),
            UserInput::Quit => {
                println!("Goodbye.");
                break 'game_loop;
            }
        }
    }

    Ok(())
}
