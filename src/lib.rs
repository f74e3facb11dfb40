// src/lib.rs
//
// Chess rules engine: board model, per-piece move geometry, attack and
// self-check detection, move application with exact undo, terminal-state
// search, and a serializable snapshot of the whole game. Everything that
// touches a terminal or the filesystem lives in the binary, not here.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

// --- Board Geometry Constants ---

// Row 0 is rank 8 (Black's home row), row 7 is rank 1 (White's home row).
const WHITE_BACK_ROW: usize = 7;
const BLACK_BACK_ROW: usize = 0;
const WHITE_PAWN_ROW: usize = 6;
const BLACK_PAWN_ROW: usize = 1;
const WHITE_PROMOTION_ROW: usize = 0;
const BLACK_PROMOTION_ROW: usize = 7;

const KING_START_COL: usize = 4; // e-file
const ROOK_A_COL: usize = 0; // queenside rook home
const ROOK_H_COL: usize = 7; // kingside rook home
const KINGSIDE_ROOK_DEST_COL: usize = 5; // f-file after O-O
const QUEENSIDE_ROOK_DEST_COL: usize = 3; // d-file after O-O-O

// --- Enums and Basic Structs ---

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opponent(&self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// Row delta a pawn of this color moves by: White advances toward row 0.
    fn forward(&self) -> i32 {
        match self {
            Color::White => -1,
            Color::Black => 1,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PieceType {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Piece {
    pub kind: PieceType,
    pub color: Color,
}

impl Piece {
    pub fn new(kind: PieceType, color: Color) -> Self {
        Piece { kind, color }
    }

    /// Conventional material value, used by callers for capture scoring and
    /// captured-piece display ordering.
    pub fn value(&self) -> u32 {
        match self.kind {
            PieceType::Pawn => 1,
            PieceType::Knight => 3,
            PieceType::Bishop => 3,
            PieceType::Rook => 5,
            PieceType::Queen => 9,
            PieceType::King => 0,
        }
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self.kind {
            PieceType::Pawn => 'p',
            PieceType::Knight => 'n',
            PieceType::Bishop => 'b',
            PieceType::Rook => 'r',
            PieceType::Queen => 'q',
            PieceType::King => 'k',
        };
        let symbol = match self.color {
            Color::White => symbol.to_ascii_uppercase(),
            Color::Black => symbol,
        };
        write!(f, "{}", symbol)
    }
}

// --- Coordinates ---

/// A board square. `row` 0 is rank 8, `row` 7 is rank 1; `col` 0 is the
/// a-file. Values are always in 0..8 — text parsing (and therefore rejection
/// of out-of-range input) happens in the caller, never here.
#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}

impl Coord {
    pub fn new(row: usize, col: usize) -> Self {
        debug_assert!(row < 8 && col < 8, "coordinate off the board: {},{}", row, col);
        Coord { row, col }
    }

    /// Parses algebraic form like "e2". Returns None for anything malformed.
    pub fn from_algebraic(s: &str) -> Option<Coord> {
        let mut chars = s.chars();
        let file = chars.next()?;
        let rank = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        let col = match file {
            'a'..='h' => file as usize - 'a' as usize,
            _ => return None,
        };
        let row = match rank {
            '1'..='8' => 8 - (rank as usize - '0' as usize),
            _ => return None,
        };
        Some(Coord { row, col })
    }

    pub fn to_algebraic(&self) -> String {
        format!("{}{}", (b'a' + self.col as u8) as char, 8 - self.row)
    }

    /// Offsets by a signed delta, returning None when it leaves the board.
    fn offset(&self, dr: i32, dc: i32) -> Option<Coord> {
        let row = self.row as i32 + dr;
        let col = self.col as i32 + dc;
        if (0..8).contains(&row) && (0..8).contains(&col) {
            Some(Coord { row: row as usize, col: col as usize })
        } else {
            None
        }
    }

    /// All 64 squares, row-major.
    pub fn all() -> impl Iterator<Item = Coord> {
        (0..8).flat_map(|row| (0..8).map(move |col| Coord { row, col }))
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_algebraic())
    }
}

// --- Board ---

/// 8×8 mailbox board. A plain value type: freely clonable and comparable,
/// which is what exact-restore checks and the snapshot rely on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    squares: [[Option<Piece>; 8]; 8],
}

impl Board {
    pub fn empty() -> Self {
        Board { squares: [[None; 8]; 8] }
    }

    /// The standard initial arrangement.
    pub fn initial() -> Self {
        use PieceType::*;
        let mut board = Board::empty();
        let back = [Rook, Knight, Bishop, Queen, King, Bishop, Knight, Rook];
        for (col, &kind) in back.iter().enumerate() {
            board.squares[BLACK_BACK_ROW][col] = Some(Piece::new(kind, Color::Black));
            board.squares[WHITE_BACK_ROW][col] = Some(Piece::new(kind, Color::White));
        }
        for col in 0..8 {
            board.squares[BLACK_PAWN_ROW][col] = Some(Piece::new(Pawn, Color::Black));
            board.squares[WHITE_PAWN_ROW][col] = Some(Piece::new(Pawn, Color::White));
        }
        board
    }

    pub fn piece_at(&self, sq: Coord) -> Option<Piece> {
        self.squares[sq.row][sq.col]
    }

    pub fn put(&mut self, sq: Coord, piece: Option<Piece>) {
        self.squares[sq.row][sq.col] = piece;
    }

    /// Locates the king of the given color. Exactly one king per color exists
    /// at all times during play; a board violating that is corrupt beyond
    /// recovery since every check computation depends on this lookup.
    pub fn find_king(&self, color: Color) -> Coord {
        match self.king_square(color) {
            Some(sq) => sq,
            None => panic!("CRITICAL: no {:?} king on the board; game state is corrupt", color),
        }
    }

    fn king_square(&self, color: Color) -> Option<Coord> {
        Coord::all().find(|&sq| {
            self.piece_at(sq) == Some(Piece::new(PieceType::King, color))
        })
    }

    fn king_count(&self, color: Color) -> usize {
        Coord::all()
            .filter(|&sq| self.piece_at(sq) == Some(Piece::new(PieceType::King, color)))
            .count()
    }
}

// --- Castling Move History ---

/// Per-piece "has ever moved" flags. Each rook is tracked independently;
/// moving the h-rook must not forfeit queenside castling.
#[derive(Debug, Default, Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
pub struct MovedFlags {
    pub white_king: bool,
    pub white_rook_a: bool,
    pub white_rook_h: bool,
    pub black_king: bool,
    pub black_rook_a: bool,
    pub black_rook_h: bool,
}

impl MovedFlags {
    fn king(&self, color: Color) -> bool {
        match color {
            Color::White => self.white_king,
            Color::Black => self.black_king,
        }
    }

    fn rook(&self, color: Color, kingside: bool) -> bool {
        match (color, kingside) {
            (Color::White, true) => self.white_rook_h,
            (Color::White, false) => self.white_rook_a,
            (Color::Black, true) => self.black_rook_h,
            (Color::Black, false) => self.black_rook_a,
        }
    }

    /// Marks flags for a piece leaving `from`. Only kings and rooks standing
    /// on their home squares affect castling state.
    fn mark(&mut self, piece: Piece, from: Coord) {
        match (piece.kind, piece.color) {
            (PieceType::King, Color::White) => self.white_king = true,
            (PieceType::King, Color::Black) => self.black_king = true,
            (PieceType::Rook, Color::White) if from.row == WHITE_BACK_ROW => {
                if from.col == ROOK_A_COL {
                    self.white_rook_a = true;
                } else if from.col == ROOK_H_COL {
                    self.white_rook_h = true;
                }
            }
            (PieceType::Rook, Color::Black) if from.row == BLACK_BACK_ROW => {
                if from.col == ROOK_A_COL {
                    self.black_rook_a = true;
                } else if from.col == ROOK_H_COL {
                    self.black_rook_h = true;
                }
            }
            _ => {}
        }
    }
}

// --- Move Log ---

/// Everything needed to reverse one applied move exactly. Restoring board
/// contents alone is not enough: castling also relocated a rook, en passant
/// removed a pawn off the destination square, and the has-moved flags and
/// en-passant target are not derivable from the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub from: Coord,
    pub to: Coord,
    pub piece: Piece,
    /// Piece captured directly on the destination square.
    pub captured: Option<Piece>,
    /// Pawn captured via en passant; it never sat on the destination square.
    pub en_passant_captured: Option<Piece>,
    /// The en-passant target as it was before this move.
    pub en_passant_before: Option<Coord>,
    /// Full flag state before this move, restored verbatim on undo.
    pub moved_before: MovedFlags,
    pub castled: bool,
    pub promotion: Option<PieceType>,
    /// Minimal algebraic notation ("e4", "exd5", "Nxf3", "O-O", "e8=Q").
    pub notation: String,
}

/// What `apply_move` did, for the caller's benefit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    pub captured: Option<Piece>,
    /// True when a pawn reached the far rank: the caller must supply a
    /// promotion choice via `set_promotion_choice` before play continues.
    pub promotion_pending: bool,
    pub notation: String,
}

// --- Errors ---

#[derive(Debug, PartialEq, Eq)]
pub enum MoveError {
    EmptySquare(Coord),
    NotYourTurn(Coord),
    IllegalMove { from: Coord, to: Coord },
    LeavesKingInCheck { from: Coord, to: Coord },
    PromotionPending(Coord),
    NoPendingPromotion,
    InvalidPromotionPiece(PieceType),
}

impl fmt::Display for MoveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveError::EmptySquare(sq) => write!(f, "No piece at {}", sq),
            MoveError::NotYourTurn(sq) => write!(f, "The piece at {} is not yours to move", sq),
            MoveError::IllegalMove { from, to } => {
                write!(f, "Illegal move {} to {}", from, to)
            }
            MoveError::LeavesKingInCheck { from, to } => {
                write!(f, "Illegal move {} to {}: leaves your king in check", from, to)
            }
            MoveError::PromotionPending(sq) => {
                write!(f, "Promotion on {} must be resolved before the next move", sq)
            }
            MoveError::NoPendingPromotion => write!(f, "No promotion is pending"),
            MoveError::InvalidPromotionPiece(kind) => {
                write!(f, "Cannot promote a pawn to {:?}", kind)
            }
        }
    }
}

impl Error for MoveError {}

#[derive(Debug, PartialEq, Eq)]
pub enum RestoreError {
    MissingKing(Color),
    MultipleKings(Color),
}

impl fmt::Display for RestoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestoreError::MissingKing(color) => {
                write!(f, "Corrupt saved state: no {:?} king on the board", color)
            }
            RestoreError::MultipleKings(color) => {
                write!(f, "Corrupt saved state: more than one {:?} king on the board", color)
            }
        }
    }
}

impl Error for RestoreError {}

// --- Snapshot ---

/// The full serializable state of a game. Round-tripping a snapshot
/// reproduces identical legality results, including undo of moves that were
/// made before the save.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub board: Board,
    pub side_to_move: Color,
    pub moved: MovedFlags,
    pub en_passant_target: Option<Coord>,
    pub move_log: Vec<MoveRecord>,
    pub captured_by_white: Vec<Piece>,
    pub captured_by_black: Vec<Piece>,
}

// --- Game State ---

#[derive(Debug, Clone)]
pub struct Game {
    board: Board,
    side_to_move: Color,
    moved: MovedFlags,
    en_passant_target: Option<Coord>,
    move_log: Vec<MoveRecord>,
    captured_by_white: Vec<Piece>, // Black pieces White has taken
    captured_by_black: Vec<Piece>, // White pieces Black has taken
    /// Square of a pawn awaiting its promotion choice, if any.
    pending_promotion: Option<Coord>,
}

impl Default for Game {
    fn default() -> Self {
        Game::new()
    }
}

impl Game {
    /// A fresh game from the standard initial arrangement, White to move.
    pub fn new() -> Self {
        Game {
            board: Board::initial(),
            side_to_move: Color::White,
            moved: MovedFlags::default(),
            en_passant_target: None,
            move_log: Vec::new(),
            captured_by_white: Vec::new(),
            captured_by_black: Vec::new(),
            pending_promotion: None,
        }
    }

    // --- Read Access ---

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    pub fn en_passant_target(&self) -> Option<Coord> {
        self.en_passant_target
    }

    pub fn move_log(&self) -> &[MoveRecord] {
        &self.move_log
    }

    /// Pieces the given color has captured.
    pub fn captured_by(&self, color: Color) -> &[Piece] {
        match color {
            Color::White => &self.captured_by_white,
            Color::Black => &self.captured_by_black,
        }
    }

    pub fn promotion_pending(&self) -> Option<Coord> {
        self.pending_promotion
    }

    // --- Move Legality (geometry only) ---

    /// Checks whether the side to move may slide/step/jump `from` → `to`
    /// per that piece's movement rules, including castling and en passant.
    /// Does NOT verify the mover's own king stays safe afterward; compose
    /// with `would_expose_king` for full legality.
    pub fn is_valid_move(&self, from: Coord, to: Coord) -> bool {
        self.piece_move_fits(from, to, self.side_to_move, true)
    }

    /// Piece-geometry dispatch parameterized by the moving color. Rejection,
    /// not error: same square, empty source, wrong-color source, and
    /// own-piece destination all return false.
    ///
    /// `probe_castling` is false when called from attack detection: a
    /// castling king threatens nothing, and probing it there would recurse
    /// back through the castling transit-square checks.
    fn piece_move_fits(&self, from: Coord, to: Coord, mover: Color, probe_castling: bool) -> bool {
        if from == to {
            return false;
        }
        let piece = match self.board.piece_at(from) {
            Some(p) => p,
            None => return false,
        };
        if piece.color != mover {
            return false;
        }
        if self.board.piece_at(to).is_some_and(|t| t.color == mover) {
            return false;
        }

        match piece.kind {
            PieceType::Pawn => self.pawn_move_fits(from, to, piece.color),
            PieceType::Rook => self.rook_move_fits(from, to),
            PieceType::Knight => knight_move_fits(from, to),
            PieceType::Bishop => self.bishop_move_fits(from, to),
            PieceType::Queen => self.rook_move_fits(from, to) || self.bishop_move_fits(from, to),
            PieceType::King => {
                let row_diff = from.row.abs_diff(to.row);
                let col_diff = from.col.abs_diff(to.col);
                if row_diff <= 1 && col_diff <= 1 {
                    return true;
                }
                probe_castling && row_diff == 0 && col_diff == 2 && self.can_castle(from, to, mover)
            }
        }
    }

    fn pawn_move_fits(&self, from: Coord, to: Coord, color: Color) -> bool {
        let dir = color.forward();
        let start_row = match color {
            Color::White => WHITE_PAWN_ROW,
            Color::Black => BLACK_PAWN_ROW,
        };
        let target = self.board.piece_at(to);

        // One square forward onto an empty square.
        if from.col == to.col && to.row as i32 == from.row as i32 + dir && target.is_none() {
            return true;
        }

        // Two squares forward from the home rank, both squares empty.
        if from.col == to.col
            && from.row == start_row
            && to.row as i32 == from.row as i32 + 2 * dir
        {
            let skipped = Coord::new((from.row as i32 + dir) as usize, from.col);
            return target.is_none() && self.board.piece_at(skipped).is_none();
        }

        // Diagonal capture, or en passant onto the (empty) target square.
        if from.col.abs_diff(to.col) == 1 && to.row as i32 == from.row as i32 + dir {
            if target.is_some() {
                return true; // own-color destination was already rejected
            }
            return self.en_passant_target == Some(to);
        }

        false
    }

    fn rook_move_fits(&self, from: Coord, to: Coord) -> bool {
        (from.row == to.row || from.col == to.col) && self.path_clear(from, to)
    }

    fn bishop_move_fits(&self, from: Coord, to: Coord) -> bool {
        from.row.abs_diff(to.row) == from.col.abs_diff(to.col) && self.path_clear(from, to)
    }

    /// Steps one square at a time from `from` toward `to` along their shared
    /// row/column/diagonal. False as soon as an intermediate square is
    /// occupied; the destination itself is never inspected, so captures pass.
    fn path_clear(&self, from: Coord, to: Coord) -> bool {
        let dr = (to.row as i32 - from.row as i32).signum();
        let dc = (to.col as i32 - from.col as i32).signum();
        let mut sq = from;
        loop {
            sq = match sq.offset(dr, dc) {
                Some(next) => next,
                None => return false, // misaligned input walked off the board
            };
            if sq == to {
                return true;
            }
            if self.board.piece_at(sq).is_some() {
                return false;
            }
        }
    }

    // --- Castling Legality ---

    /// All clauses required, no partial castling: unmoved king, unmoved rook
    /// on the chosen side, same row, clear path between king and rook, rook
    /// actually standing on its home square, and no square the king occupies
    /// or crosses — start and destination included — attacked right now.
    fn can_castle(&self, from: Coord, to: Coord, mover: Color) -> bool {
        if self.moved.king(mover) {
            return false;
        }
        if from.row != to.row {
            return false;
        }

        let kingside = to.col > from.col;
        if self.moved.rook(mover, kingside) {
            return false;
        }

        let rook_col = if kingside { ROOK_H_COL } else { ROOK_A_COL };
        // The flag already implies the rook is home, but a captured rook
        // never moved either. Re-check the square.
        let rook_home = Coord::new(from.row, rook_col);
        if self.board.piece_at(rook_home) != Some(Piece::new(PieceType::Rook, mover)) {
            return false;
        }

        let between = if kingside {
            from.col + 1..rook_col
        } else {
            rook_col + 1..from.col
        };
        for col in between {
            if self.board.piece_at(Coord::new(from.row, col)).is_some() {
                return false;
            }
        }

        // The king may not castle out of, through, or into check.
        let opponent = mover.opponent();
        for col in from.col.min(to.col)..=from.col.max(to.col) {
            if self.is_square_attacked(Coord::new(from.row, col), opponent) {
                return false;
            }
        }

        true
    }

    // --- Attack Detection & Self-Check Avoidance ---

    /// True when any piece of `by_color` could move to `target` per its raw
    /// geometry. Deliberately ignores whose king the hypothetical move would
    /// endanger, and never probes castling geometry, so it cannot recurse.
    pub fn is_square_attacked(&self, target: Coord, by_color: Color) -> bool {
        Coord::all().any(|sq| {
            self.board.piece_at(sq).is_some_and(|p| p.color == by_color)
                && self.piece_move_fits(sq, target, by_color, false)
        })
    }

    /// True when the given color's king is currently attacked.
    pub fn is_in_check(&self, color: Color) -> bool {
        let king = self.board.find_king(color);
        self.is_square_attacked(king, color.opponent())
    }

    /// Plays `from` → `to` on the live board, asks whether the mover's king
    /// is attacked afterward, and restores the board before returning. The
    /// restore rides on a drop guard so no return path can leave the move
    /// half-applied.
    pub fn would_expose_king(&mut self, from: Coord, to: Coord) -> bool {
        let mover = match self.board.piece_at(from) {
            Some(p) => p.color,
            None => return false,
        };
        let scratch = ScratchMove::apply(self, from, to);
        scratch.exposes_king(mover)
    }

    /// Every destination square that is both geometrically valid and safe
    /// for the mover's own king. Enumerates all 64 candidates.
    pub fn legal_destinations(&mut self, from: Coord) -> Vec<Coord> {
        Coord::all()
            .collect::<Vec<_>>()
            .into_iter()
            .filter(|&to| self.is_valid_move(from, to) && !self.would_expose_king(from, to))
            .collect()
    }

    // --- Move Application ---

    /// Validates `from` → `to` for the side to move and applies it. The
    /// recoverable failure cases here are ordinary gameplay, not faults; the
    /// caller prints them and re-prompts.
    pub fn try_move(&mut self, from: Coord, to: Coord) -> Result<MoveOutcome, MoveError> {
        if let Some(sq) = self.pending_promotion {
            return Err(MoveError::PromotionPending(sq));
        }
        let piece = self.board.piece_at(from).ok_or(MoveError::EmptySquare(from))?;
        if piece.color != self.side_to_move {
            return Err(MoveError::NotYourTurn(from));
        }
        if !self.is_valid_move(from, to) {
            return Err(MoveError::IllegalMove { from, to });
        }
        if self.would_expose_king(from, to) {
            return Err(MoveError::LeavesKingInCheck { from, to });
        }
        Ok(self.apply_move(from, to))
    }

    /// Applies an already-validated legal move. Steps, in order: en-passant
    /// capture, flag updates, castling rook relocation, en-passant target
    /// refresh, the piece move itself, destination-capture bookkeeping,
    /// promotion pending marker, side flip, move record append.
    pub fn apply_move(&mut self, from: Coord, to: Coord) -> MoveOutcome {
        let piece = self
            .board
            .piece_at(from)
            .unwrap_or_else(|| panic!("CRITICAL: apply_move from empty square {}", from));
        let mover = piece.color;
        let captured = self.board.piece_at(to);
        let en_passant_before = self.en_passant_target;
        let moved_before = self.moved;

        // (a) En passant: a pawn moving diagonally onto the empty target
        // square captures the pawn behind the destination.
        let mut en_passant_captured = None;
        if piece.kind == PieceType::Pawn
            && captured.is_none()
            && from.col != to.col
            && en_passant_before == Some(to)
        {
            let victim_sq = Coord::new((to.row as i32 - mover.forward()) as usize, to.col);
            en_passant_captured = self.board.piece_at(victim_sq);
            self.board.put(victim_sq, None);
            if let Some(victim) = en_passant_captured {
                self.push_captured(mover, victim);
            }
        }

        // (b) Castling/move-history flags.
        self.moved.mark(piece, from);

        // (c) Castling relocates the rook as well.
        let castled = piece.kind == PieceType::King && from.col.abs_diff(to.col) == 2;
        if castled {
            let (rook_from, rook_to) = castle_rook_squares(from, to);
            let rook = self.board.piece_at(rook_from);
            self.board.put(rook_to, rook);
            self.board.put(rook_from, None);
        }

        // (d) A double pawn step offers en passant for exactly one ply.
        self.en_passant_target = if piece.kind == PieceType::Pawn && from.row.abs_diff(to.row) == 2
        {
            Some(Coord::new((from.row as i32 + mover.forward()) as usize, from.col))
        } else {
            None
        };

        let notation = move_notation(
            piece,
            from,
            to,
            captured.is_some() || en_passant_captured.is_some(),
            castled,
        );

        // (e) Move the piece.
        self.board.put(to, Some(piece));
        self.board.put(from, None);

        // (f) Destination-capture bookkeeping.
        if let Some(taken) = captured {
            self.push_captured(mover, taken);
        }

        // (g) A pawn on the far rank waits for the caller's promotion
        // choice; the engine has no default.
        let promotion_row = match mover {
            Color::White => WHITE_PROMOTION_ROW,
            Color::Black => BLACK_PROMOTION_ROW,
        };
        let promotion_pending = piece.kind == PieceType::Pawn && to.row == promotion_row;
        if promotion_pending {
            self.pending_promotion = Some(to);
        }

        // (h) Flip side to move.
        self.side_to_move = mover.opponent();

        // (i) Append the undo record.
        self.move_log.push(MoveRecord {
            from,
            to,
            piece,
            captured,
            en_passant_captured,
            en_passant_before,
            moved_before,
            castled,
            promotion: None,
            notation: notation.clone(),
        });

        MoveOutcome {
            captured: captured.or(en_passant_captured),
            promotion_pending,
            notation,
        }
    }

    /// Resolves a pending promotion. Accepts queen, rook, bishop or knight;
    /// the choice is always the caller's, even for automated players.
    pub fn set_promotion_choice(&mut self, kind: PieceType) -> Result<(), MoveError> {
        let sq = self.pending_promotion.ok_or(MoveError::NoPendingPromotion)?;
        if matches!(kind, PieceType::Pawn | PieceType::King) {
            return Err(MoveError::InvalidPromotionPiece(kind));
        }
        let pawn = self
            .board
            .piece_at(sq)
            .unwrap_or_else(|| panic!("CRITICAL: pending promotion square {} is empty", sq));
        self.board.put(sq, Some(Piece::new(kind, pawn.color)));
        if let Some(record) = self.move_log.last_mut() {
            record.promotion = Some(kind);
            record.notation.push('=');
            record.notation.push(promotion_letter(kind));
        }
        self.pending_promotion = None;
        Ok(())
    }

    /// Reverses the most recent move, undoing every side effect of its
    /// application in inverse order. Returns false (not a fault) when there
    /// is nothing to undo.
    pub fn undo_last_move(&mut self) -> bool {
        let record = match self.move_log.pop() {
            Some(r) => r,
            None => return false,
        };
        // An unresolved promotion dies with the move that created it.
        self.pending_promotion = None;

        self.side_to_move = self.side_to_move.opponent();
        // Restores the pawn even if it had already been promoted.
        self.board.put(record.from, Some(record.piece));
        self.board.put(record.to, record.captured);
        self.en_passant_target = record.en_passant_before;
        self.moved = record.moved_before;

        if let Some(victim) = record.en_passant_captured {
            let victim_sq = Coord::new(
                (record.to.row as i32 - record.piece.color.forward()) as usize,
                record.to.col,
            );
            self.board.put(victim_sq, Some(victim));
            self.pop_captured(record.piece.color, victim);
        }
        if let Some(taken) = record.captured {
            self.pop_captured(record.piece.color, taken);
        }
        if record.castled {
            let (rook_from, rook_to) = castle_rook_squares(record.from, record.to);
            let rook = self.board.piece_at(rook_to);
            self.board.put(rook_from, rook);
            self.board.put(rook_to, None);
        }
        true
    }

    fn push_captured(&mut self, capturer: Color, piece: Piece) {
        match capturer {
            Color::White => self.captured_by_white.push(piece),
            Color::Black => self.captured_by_black.push(piece),
        }
    }

    fn pop_captured(&mut self, capturer: Color, piece: Piece) {
        let list = match capturer {
            Color::White => &mut self.captured_by_white,
            Color::Black => &mut self.captured_by_black,
        };
        if let Some(idx) = list.iter().rposition(|&p| p == piece) {
            list.remove(idx);
        }
    }

    // --- Terminal State Detection ---

    /// Exhaustive scan over all (from, to) pairs composed with the
    /// self-check filter. The board is fixed and small; this is deliberately
    /// un-pruned so edge cases such as castling-through-check are judged by
    /// exactly the same predicates ordinary moves are.
    fn has_any_legal_move(&mut self) -> bool {
        let mover = self.side_to_move;
        for from in Coord::all() {
            if !self.board.piece_at(from).is_some_and(|p| p.color == mover) {
                continue;
            }
            for to in Coord::all() {
                if self.is_valid_move(from, to) && !self.would_expose_king(from, to) {
                    return true;
                }
            }
        }
        false
    }

    /// The side to move is in check and has no move that escapes it.
    pub fn is_checkmate(&mut self) -> bool {
        self.is_in_check(self.side_to_move) && !self.has_any_legal_move()
    }

    /// The side to move is NOT in check yet has no legal move at all.
    pub fn is_stalemate(&mut self) -> bool {
        !self.is_in_check(self.side_to_move) && !self.has_any_legal_move()
    }

    // --- Snapshot / Restore ---

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            board: self.board.clone(),
            side_to_move: self.side_to_move,
            moved: self.moved,
            en_passant_target: self.en_passant_target,
            move_log: self.move_log.clone(),
            captured_by_white: self.captured_by_white.clone(),
            captured_by_black: self.captured_by_black.clone(),
        }
    }

    /// Rebuilds a game from a snapshot. A board without exactly one king per
    /// color is a bad load and is rejected here, before any attack or
    /// checkmate computation can trip over it.
    pub fn restore(snapshot: Snapshot) -> Result<Game, RestoreError> {
        for color in [Color::White, Color::Black] {
            match snapshot.board.king_count(color) {
                0 => return Err(RestoreError::MissingKing(color)),
                1 => {}
                _ => return Err(RestoreError::MultipleKings(color)),
            }
        }
        Ok(Game {
            board: snapshot.board,
            side_to_move: snapshot.side_to_move,
            moved: snapshot.moved,
            en_passant_target: snapshot.en_passant_target,
            move_log: snapshot.move_log,
            captured_by_white: snapshot.captured_by_white,
            captured_by_black: snapshot.captured_by_black,
            pending_promotion: None,
        })
    }
}

// --- Scratch Move Guard ---

/// A hypothetical move held on the live board. `Drop` puts every touched
/// square back, so the probe can return through any path without leaving the
/// position half-applied.
struct ScratchMove<'a> {
    game: &'a mut Game,
    from: Coord,
    to: Coord,
    moved: Piece,
    captured: Option<Piece>,
    en_passant_victim: Option<(Coord, Piece)>,
}

impl<'a> ScratchMove<'a> {
    fn apply(game: &'a mut Game, from: Coord, to: Coord) -> ScratchMove<'a> {
        let moved = game
            .board
            .piece_at(from)
            .unwrap_or_else(|| panic!("CRITICAL: scratch move from empty square {}", from));
        let captured = game.board.piece_at(to);

        // A hypothetical en-passant capture must also lift the bypassed pawn,
        // or a discovered check along its rank would go unseen.
        let mut en_passant_victim = None;
        if moved.kind == PieceType::Pawn
            && captured.is_none()
            && from.col != to.col
            && game.en_passant_target == Some(to)
        {
            let victim_sq = Coord::new((to.row as i32 - moved.color.forward()) as usize, to.col);
            if let Some(victim) = game.board.piece_at(victim_sq) {
                game.board.put(victim_sq, None);
                en_passant_victim = Some((victim_sq, victim));
            }
        }

        game.board.put(to, Some(moved));
        game.board.put(from, None);
        ScratchMove { game, from, to, moved, captured, en_passant_victim }
    }

    fn exposes_king(&self, mover: Color) -> bool {
        let king = self.game.board.find_king(mover);
        self.game.is_square_attacked(king, mover.opponent())
    }
}

impl Drop for ScratchMove<'_> {
    fn drop(&mut self) {
        self.game.board.put(self.from, Some(self.moved));
        self.game.board.put(self.to, self.captured);
        if let Some((sq, victim)) = self.en_passant_victim {
            self.game.board.put(sq, Some(victim));
        }
    }
}

// --- Free Helpers ---

fn knight_move_fits(from: Coord, to: Coord) -> bool {
    let row_diff = from.row.abs_diff(to.row);
    let col_diff = from.col.abs_diff(to.col);
    (row_diff == 2 && col_diff == 1) || (row_diff == 1 && col_diff == 2)
}

/// Rook origin and destination for a castling king move.
fn castle_rook_squares(king_from: Coord, king_to: Coord) -> (Coord, Coord) {
    if king_to.col > king_from.col {
        (
            Coord::new(king_from.row, ROOK_H_COL),
            Coord::new(king_from.row, KINGSIDE_ROOK_DEST_COL),
        )
    } else {
        (
            Coord::new(king_from.row, ROOK_A_COL),
            Coord::new(king_from.row, QUEENSIDE_ROOK_DEST_COL),
        )
    }
}

fn promotion_letter(kind: PieceType) -> char {
    match kind {
        PieceType::Queen => 'Q',
        PieceType::Rook => 'R',
        PieceType::Bishop => 'B',
        PieceType::Knight => 'N',
        PieceType::Pawn | PieceType::King => unreachable!("not a promotion piece"),
    }
}

/// Minimal algebraic notation: castling, pawn captures by file, piece letter
/// plus destination otherwise. No disambiguation.
fn move_notation(piece: Piece, from: Coord, to: Coord, is_capture: bool, castled: bool) -> String {
    if castled {
        return if to.col > from.col { "O-O" } else { "O-O-O" }.to_string();
    }
    let dest = to.to_algebraic();
    match piece.kind {
        PieceType::Pawn => {
            if is_capture {
                format!("{}x{}", (b'a' + from.col as u8) as char, dest)
            } else {
                dest
            }
        }
        kind => {
            let symbol = match kind {
                PieceType::Knight => 'N',
                PieceType::Bishop => 'B',
                PieceType::Rook => 'R',
                PieceType::Queen => 'Q',
                PieceType::King => 'K',
                PieceType::Pawn => unreachable!(),
            };
            if is_capture {
                format!("{}x{}", symbol, dest)
            } else {
                format!("{}{}", symbol, dest)
            }
        }
    }
}

// --- Tests ---

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Coord {
        Coord::from_algebraic(s).expect("test square")
    }

    fn piece(kind: PieceType, color: Color) -> Piece {
        Piece::new(kind, color)
    }

    /// Builds a game from explicit placements, going through the snapshot
    /// path so restore validation is exercised too.
    fn position(placements: &[(&str, PieceType, Color)], side: Color) -> Game {
        let mut board = Board::empty();
        for &(at, kind, color) in placements {
            board.put(sq(at), Some(piece(kind, color)));
        }
        Game::restore(Snapshot {
            board,
            side_to_move: side,
            moved: MovedFlags::default(),
            en_passant_target: None,
            move_log: Vec::new(),
            captured_by_white: Vec::new(),
            captured_by_black: Vec::new(),
        })
        .expect("valid test position")
    }

    fn all_legal_moves(game: &mut Game) -> Vec<(Coord, Coord)> {
        let mover = game.side_to_move();
        let mut moves = Vec::new();
        for from in Coord::all() {
            if game.board().piece_at(from).is_some_and(|p| p.color == mover) {
                for to in game.legal_destinations(from) {
                    moves.push((from, to));
                }
            }
        }
        moves
    }

    #[test]
    fn initial_position_has_twenty_white_moves() {
        let mut game = Game::new();
        let moves = all_legal_moves(&mut game);
        assert_eq!(moves.len(), 20);
        assert_eq!(game.en_passant_target(), None);
        // No castling available: the path is blocked either side.
        assert!(!game.is_valid_move(sq("e1"), sq("g1")));
        assert!(!game.is_valid_move(sq("e1"), sq("c1")));
    }

    #[test]
    fn coordinates_round_trip_algebraic() {
        for s in ["a1", "h8", "e4", "d5"] {
            assert_eq!(sq(s).to_algebraic(), s);
        }
        assert_eq!(Coord::from_algebraic("i1"), None);
        assert_eq!(Coord::from_algebraic("a9"), None);
        assert_eq!(Coord::from_algebraic("e"), None);
        assert_eq!(Coord::from_algebraic("e22"), None);
        // a1 is the engine's bottom-left: White's home row.
        assert_eq!(sq("a1"), Coord::new(7, 0));
        assert_eq!(sq("h8"), Coord::new(0, 7));
    }

    #[test]
    fn rook_cannot_jump_but_can_capture_at_path_end() {
        let mut game = position(
            &[
                ("a1", PieceType::Rook, Color::White),
                ("a4", PieceType::Pawn, Color::Black),
                ("e1", PieceType::King, Color::White),
                ("e8", PieceType::King, Color::Black),
            ],
            Color::White,
        );
        assert!(game.is_valid_move(sq("a1"), sq("a3")));
        assert!(game.is_valid_move(sq("a1"), sq("a4"))); // capture at path end
        assert!(!game.is_valid_move(sq("a1"), sq("a5"))); // blocked behind the pawn
        let outcome = game.try_move(sq("a1"), sq("a4")).expect("legal capture");
        assert_eq!(outcome.captured, Some(piece(PieceType::Pawn, Color::Black)));
        assert_eq!(outcome.notation, "Rxa4");
    }

    #[test]
    fn rejects_basic_precondition_violations() {
        let mut game = Game::new();
        assert!(!game.is_valid_move(sq("e2"), sq("e2"))); // same square
        assert!(!game.is_valid_move(sq("e4"), sq("e5"))); // empty source
        assert!(!game.is_valid_move(sq("e7"), sq("e5"))); // opponent's piece
        assert!(!game.is_valid_move(sq("e1"), sq("e2"))); // own piece on destination
        assert_eq!(
            game.try_move(sq("e4"), sq("e5")),
            Err(MoveError::EmptySquare(sq("e4")))
        );
        assert_eq!(
            game.try_move(sq("e7"), sq("e5")),
            Err(MoveError::NotYourTurn(sq("e7")))
        );
    }

    #[test]
    fn pawn_double_step_sets_en_passant_target_for_one_ply() {
        let mut game = Game::new();
        game.try_move(sq("e2"), sq("e4")).unwrap();
        assert_eq!(game.en_passant_target(), Some(sq("e3")));
        game.try_move(sq("g8"), sq("f6")).unwrap();
        // Valid for exactly one subsequent move.
        assert_eq!(game.en_passant_target(), None);
    }

    #[test]
    fn en_passant_captures_the_bypassed_pawn() {
        let mut game = Game::new();
        game.try_move(sq("e2"), sq("e4")).unwrap();
        game.try_move(sq("a7"), sq("a6")).unwrap();
        game.try_move(sq("e4"), sq("e5")).unwrap();
        game.try_move(sq("d7"), sq("d5")).unwrap();
        assert_eq!(game.en_passant_target(), Some(sq("d6")));

        // d6 is empty, yet the capture onto it is legal.
        assert!(game.board().piece_at(sq("d6")).is_none());
        let outcome = game.try_move(sq("e5"), sq("d6")).expect("en passant");
        assert_eq!(outcome.captured, Some(piece(PieceType::Pawn, Color::Black)));
        assert_eq!(outcome.notation, "exd6");
        // The captured pawn came off d5, not d6.
        assert!(game.board().piece_at(sq("d5")).is_none());
        assert_eq!(
            game.board().piece_at(sq("d6")),
            Some(piece(PieceType::Pawn, Color::White))
        );
        assert_eq!(game.captured_by(Color::White).len(), 1);
    }

    #[test]
    fn en_passant_round_trips_through_undo() {
        let mut game = Game::new();
        game.try_move(sq("e2"), sq("e4")).unwrap();
        game.try_move(sq("a7"), sq("a6")).unwrap();
        game.try_move(sq("e4"), sq("e5")).unwrap();
        game.try_move(sq("d7"), sq("d5")).unwrap();
        let before = game.clone();
        game.try_move(sq("e5"), sq("d6")).unwrap();

        assert!(game.undo_last_move());
        assert_eq!(game.board(), before.board());
        assert_eq!(game.side_to_move(), before.side_to_move());
        assert_eq!(game.en_passant_target(), Some(sq("d6")));
        assert_eq!(game.captured_by(Color::White), before.captured_by(Color::White));
    }

    #[test]
    fn castling_both_sides_from_cleared_home_rank() {
        let mut game = position(
            &[
                ("e1", PieceType::King, Color::White),
                ("a1", PieceType::Rook, Color::White),
                ("h1", PieceType::Rook, Color::White),
                ("e8", PieceType::King, Color::Black),
            ],
            Color::White,
        );
        assert!(game.is_valid_move(sq("e1"), sq("g1")));
        assert!(game.is_valid_move(sq("e1"), sq("c1")));

        let outcome = game.try_move(sq("e1"), sq("g1")).expect("kingside castle");
        assert_eq!(outcome.notation, "O-O");
        assert_eq!(
            game.board().piece_at(sq("g1")),
            Some(piece(PieceType::King, Color::White))
        );
        assert_eq!(
            game.board().piece_at(sq("f1")),
            Some(piece(PieceType::Rook, Color::White))
        );
        assert!(game.board().piece_at(sq("h1")).is_none());

        // Undo reverses the rook relocation as well.
        assert!(game.undo_last_move());
        assert_eq!(
            game.board().piece_at(sq("e1")),
            Some(piece(PieceType::King, Color::White))
        );
        assert_eq!(
            game.board().piece_at(sq("h1")),
            Some(piece(PieceType::Rook, Color::White))
        );
        assert!(game.board().piece_at(sq("f1")).is_none());
        assert!(game.board().piece_at(sq("g1")).is_none());
        // Flags were restored, so castling is available again.
        assert!(game.is_valid_move(sq("e1"), sq("c1")));
    }

    #[test]
    fn queenside_castle_places_rook_on_d_file() {
        let mut game = position(
            &[
                ("e1", PieceType::King, Color::White),
                ("a1", PieceType::Rook, Color::White),
                ("e8", PieceType::King, Color::Black),
            ],
            Color::White,
        );
        let outcome = game.try_move(sq("e1"), sq("c1")).expect("queenside castle");
        assert_eq!(outcome.notation, "O-O-O");
        assert_eq!(
            game.board().piece_at(sq("c1")),
            Some(piece(PieceType::King, Color::White))
        );
        assert_eq!(
            game.board().piece_at(sq("d1")),
            Some(piece(PieceType::Rook, Color::White))
        );
        assert!(game.board().piece_at(sq("a1")).is_none());
    }

    #[test]
    fn castling_refused_when_transit_square_attacked() {
        // Black rook on f8 covers f1 — the square the king passes through
        // kingside. Queenside is unaffected.
        let game = position(
            &[
                ("e1", PieceType::King, Color::White),
                ("a1", PieceType::Rook, Color::White),
                ("h1", PieceType::Rook, Color::White),
                ("e8", PieceType::King, Color::Black),
                ("f8", PieceType::Rook, Color::Black),
            ],
            Color::White,
        );
        assert!(!game.is_valid_move(sq("e1"), sq("g1")));
        assert!(game.is_valid_move(sq("e1"), sq("c1")));
    }

    #[test]
    fn castling_refused_out_of_check() {
        let game = position(
            &[
                ("e1", PieceType::King, Color::White),
                ("h1", PieceType::Rook, Color::White),
                ("e8", PieceType::King, Color::Black),
                ("e6", PieceType::Rook, Color::Black),
            ],
            Color::White,
        );
        assert!(game.is_in_check(Color::White));
        assert!(!game.is_valid_move(sq("e1"), sq("g1")));
    }

    #[test]
    fn castling_rights_are_tracked_per_rook() {
        let mut game = position(
            &[
                ("e1", PieceType::King, Color::White),
                ("a1", PieceType::Rook, Color::White),
                ("h1", PieceType::Rook, Color::White),
                ("e8", PieceType::King, Color::Black),
                ("h8", PieceType::Rook, Color::Black),
            ],
            Color::White,
        );
        // Shuffle the h-rook out and back; the position repeats but the
        // right is gone for good — on that side only.
        game.try_move(sq("h1"), sq("g1")).unwrap();
        game.try_move(sq("h8"), sq("g8")).unwrap();
        game.try_move(sq("g1"), sq("h1")).unwrap();
        game.try_move(sq("g8"), sq("h8")).unwrap();
        assert!(!game.is_valid_move(sq("e1"), sq("g1")));
        assert!(game.is_valid_move(sq("e1"), sq("c1")));
    }

    #[test]
    fn castling_refused_without_rook_on_home_square() {
        // Flags say "never moved", but the rook is simply absent.
        let game = position(
            &[
                ("e1", PieceType::King, Color::White),
                ("e8", PieceType::King, Color::Black),
            ],
            Color::White,
        );
        assert!(!game.is_valid_move(sq("e1"), sq("g1")));
        assert!(!game.is_valid_move(sq("e1"), sq("c1")));
    }

    #[test]
    fn promotion_waits_for_the_callers_choice() {
        let mut game = position(
            &[
                ("e7", PieceType::Pawn, Color::White),
                ("a1", PieceType::King, Color::White),
                ("h8", PieceType::King, Color::Black),
            ],
            Color::White,
        );
        let outcome = game.try_move(sq("e7"), sq("e8")).expect("promotion push");
        assert!(outcome.promotion_pending);
        assert_eq!(game.promotion_pending(), Some(sq("e8")));
        // Play is blocked until the choice arrives.
        assert_eq!(
            game.try_move(sq("h8"), sq("g8")),
            Err(MoveError::PromotionPending(sq("e8")))
        );
        assert_eq!(
            game.set_promotion_choice(PieceType::King),
            Err(MoveError::InvalidPromotionPiece(PieceType::King))
        );

        game.set_promotion_choice(PieceType::Knight).unwrap();
        assert_eq!(
            game.board().piece_at(sq("e8")),
            Some(piece(PieceType::Knight, Color::White))
        );
        assert_eq!(game.move_log().last().unwrap().notation, "e8=N");

        // After Black replies, the square moves like a knight, not a pawn.
        game.try_move(sq("h8"), sq("h7")).unwrap();
        let destinations = game.legal_destinations(sq("e8"));
        assert!(destinations.contains(&sq("d6")));
        assert!(destinations.contains(&sq("f6")));
        assert!(!destinations.contains(&sq("e7")));
    }

    #[test]
    fn promotion_round_trips_through_undo() {
        let mut game = position(
            &[
                ("e7", PieceType::Pawn, Color::White),
                ("a1", PieceType::King, Color::White),
                ("h8", PieceType::King, Color::Black),
            ],
            Color::White,
        );
        let before = game.clone();
        game.try_move(sq("e7"), sq("e8")).unwrap();
        game.set_promotion_choice(PieceType::Queen).unwrap();

        assert!(game.undo_last_move());
        assert_eq!(game.board(), before.board());
        assert_eq!(game.side_to_move(), Color::White);
        assert_eq!(game.promotion_pending(), None);
    }

    #[test]
    fn undo_with_empty_history_is_a_harmless_failure() {
        let mut game = Game::new();
        assert!(!game.undo_last_move());
        // The position is untouched.
        assert_eq!(game.side_to_move(), Color::White);
        assert_eq!(game.board(), Game::new().board());
    }

    #[test]
    fn every_move_kind_round_trips_through_undo() {
        // Normal move, capture, double step — replay a short opening and
        // unwind it all.
        let mut game = Game::new();
        let reference = game.clone();
        let line = [
            ("e2", "e4"),
            ("d7", "d5"),
            ("e4", "d5"), // capture
            ("d8", "d5"), // recapture
            ("g1", "f3"),
        ];
        for (from, to) in line {
            game.try_move(sq(from), sq(to)).unwrap();
        }
        for _ in 0..line.len() {
            assert!(game.undo_last_move());
        }
        assert_eq!(game.board(), reference.board());
        assert_eq!(game.side_to_move(), Color::White);
        assert_eq!(game.en_passant_target(), None);
        assert!(game.captured_by(Color::White).is_empty());
        assert!(game.captured_by(Color::Black).is_empty());
        assert!(game.move_log().is_empty());
    }

    #[test]
    fn would_expose_king_restores_the_board_exactly() {
        let mut game = Game::new();
        game.try_move(sq("e2"), sq("e4")).unwrap();
        game.try_move(sq("d7"), sq("d5")).unwrap();
        let before = game.board().clone();
        // Probe a capture and a quiet move; neither may leave a trace.
        game.would_expose_king(sq("e4"), sq("d5"));
        game.would_expose_king(sq("g1"), sq("f3"));
        assert_eq!(game.board(), &before);
    }

    #[test]
    fn pinned_piece_may_only_move_along_the_pin_ray() {
        let mut game = position(
            &[
                ("e1", PieceType::King, Color::White),
                ("e4", PieceType::Rook, Color::White),
                ("e8", PieceType::Rook, Color::Black),
                ("a8", PieceType::King, Color::Black),
            ],
            Color::White,
        );
        let destinations = game.legal_destinations(sq("e4"));
        let expected: Vec<Coord> = ["e8", "e7", "e6", "e5", "e3", "e2"]
            .iter()
            .map(|s| sq(s))
            .collect();
        assert_eq!(destinations.len(), expected.len());
        for dest in expected {
            assert!(destinations.contains(&dest), "missing {}", dest);
        }
        // Post-hoc invariant: no returned destination leaves the king attacked.
        for dest in game.legal_destinations(sq("e4")) {
            assert!(!game.would_expose_king(sq("e4"), dest));
        }
    }

    #[test]
    fn attack_detection_basics() {
        let game = position(
            &[
                ("d4", PieceType::Knight, Color::White),
                ("e4", PieceType::Pawn, Color::White),
                ("a1", PieceType::King, Color::White),
                ("h8", PieceType::King, Color::Black),
            ],
            Color::White,
        );
        assert!(game.is_square_attacked(sq("e6"), Color::White)); // knight
        assert!(game.is_square_attacked(sq("d5"), Color::White)); // pawn diagonal
        assert!(game.is_square_attacked(sq("f5"), Color::White));
        // The pawn does not attack the occupied square straight ahead of a
        // defender standing there.
        let blocked = position(
            &[
                ("e4", PieceType::Pawn, Color::White),
                ("e5", PieceType::Rook, Color::Black),
                ("a1", PieceType::King, Color::White),
                ("h8", PieceType::King, Color::Black),
            ],
            Color::White,
        );
        assert!(!blocked.is_square_attacked(sq("e5"), Color::White));
    }

    #[test]
    fn stalemate_and_checkmate_in_the_corner() {
        // Black to move, king on h8: queen on g6 gives stalemate…
        let mut stalemate = position(
            &[
                ("h8", PieceType::King, Color::Black),
                ("f7", PieceType::King, Color::White),
                ("g6", PieceType::Queen, Color::White),
            ],
            Color::Black,
        );
        assert!(stalemate.is_stalemate());
        assert!(!stalemate.is_checkmate());

        // …while the queen one step closer gives mate.
        let mut checkmate = position(
            &[
                ("h8", PieceType::King, Color::Black),
                ("f7", PieceType::King, Color::White),
                ("g7", PieceType::Queen, Color::White),
            ],
            Color::Black,
        );
        assert!(checkmate.is_checkmate());
        assert!(!checkmate.is_stalemate());
    }

    #[test]
    fn fools_mate_is_detected() {
        let mut game = Game::new();
        game.try_move(sq("f2"), sq("f3")).unwrap();
        game.try_move(sq("e7"), sq("e5")).unwrap();
        game.try_move(sq("g2"), sq("g4")).unwrap();
        game.try_move(sq("d8"), sq("h4")).unwrap();
        assert!(game.is_checkmate());
        assert!(!game.is_stalemate());
    }

    #[test]
    fn check_does_not_end_the_game_while_escapes_exist() {
        let mut game = position(
            &[
                ("e1", PieceType::King, Color::White),
                ("e8", PieceType::Rook, Color::Black),
                ("a8", PieceType::King, Color::Black),
            ],
            Color::White,
        );
        assert!(game.is_in_check(Color::White));
        assert!(!game.is_checkmate());
        let destinations = game.legal_destinations(sq("e1"));
        assert!(destinations.contains(&sq("d1")));
        assert!(!destinations.contains(&sq("e2"))); // still on the rook's file
    }

    #[test]
    fn restore_rejects_kingless_and_twin_king_boards() {
        let mut board = Board::empty();
        board.put(sq("e1"), Some(piece(PieceType::King, Color::White)));
        let snapshot = Snapshot {
            board: board.clone(),
            side_to_move: Color::White,
            moved: MovedFlags::default(),
            en_passant_target: None,
            move_log: Vec::new(),
            captured_by_white: Vec::new(),
            captured_by_black: Vec::new(),
        };
        assert_eq!(
            Game::restore(snapshot.clone()).err(),
            Some(RestoreError::MissingKing(Color::Black))
        );

        board.put(sq("e8"), Some(piece(PieceType::King, Color::Black)));
        board.put(sq("a8"), Some(piece(PieceType::King, Color::Black)));
        let snapshot = Snapshot { board, ..snapshot };
        assert_eq!(
            Game::restore(snapshot).err(),
            Some(RestoreError::MultipleKings(Color::Black))
        );
    }
}
