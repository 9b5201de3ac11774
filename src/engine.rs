use rand::Rng;
use std::fmt;
use std::sync::OnceLock;

/// A direction to move/merge tiles.
///
/// The discriminant is the wire-level direction code: `0=Up, 1=Right, 2=Down, 3=Left`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Move {
    Up = 0,
    Right = 1,
    Down = 2,
    Left = 3,
}

impl Move {
    /// All directions in direction-code order.
    pub const ALL: [Move; 4] = [Move::Up, Move::Right, Move::Down, Move::Left];

    /// The numeric direction code of this move.
    #[inline]
    pub fn code(self) -> u8 { self as u8 }
}

impl TryFrom<u8> for Move {
    type Error = EngineError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Move::Up),
            1 => Ok(Move::Right),
            2 => Ok(Move::Down),
            3 => Ok(Move::Left),
            other => Err(EngineError::InvalidDirection(other)),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Move::Up => "up",
            Move::Right => "right",
            Move::Down => "down",
            Move::Left => "left",
        };
        f.write_str(name)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid direction code {0} (expected 0..=3)")]
    InvalidDirection(u8),
    #[error("tile value {0} does not fit in a 4-bit exponent")]
    TileOutOfRange(u64),
}

type BoardRaw = u64;
/// A tile exponent in `0..=15`; `0` is an empty cell.
pub type Exponent = u8;
/// One row or column of a board, in scan order.
pub type Line = [Exponent; 4];
pub type Score = u64;

const CELL_BITS: u32 = 4;
const CELL_MASK: u64 = 0xf;
/// Highest storable exponent. Two tiles at this exponent cannot merge.
pub const MAX_EXPONENT: Exponent = 15;
const LINE_TABLE_SIZE: usize = 0x1_0000; // 65,536 possible packed lines

/// Packed 4x4 board as 16 4-bit exponents in a `u64`.
///
/// Cell `i` (row-major, `i = row * 4 + col`) lives in bits `4*i .. 4*i+4`.
/// Every operation returns a new value; a `Board` is never mutated in place.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Board(BoardRaw);

impl Board {
    /// A constant empty board (all zeros).
    pub const EMPTY: Board = Board(0);

    /// Construct a `Board` from its raw packed representation.
    #[inline]
    pub fn from_raw(raw: BoardRaw) -> Self { Board(raw) }

    /// Borrow the raw packed `u64` for this `Board`.
    #[inline]
    pub fn raw(&self) -> BoardRaw { self.0 }

    /// Build a board from 16 row-major face values (`0`, `2`, `4`, ...).
    ///
    /// ```
    /// use mc_2048::engine::Board;
    /// let b = Board::from_tile_values([2, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4]).unwrap();
    /// assert_eq!(b.cell(0), 1);
    /// assert_eq!(b.cell(15), 2);
    /// ```
    pub fn from_tile_values(values: [u64; 16]) -> Result<Self, EngineError> {
        values
            .iter()
            .enumerate()
            .try_fold(Board::EMPTY, |board, (idx, &value)| {
                Ok(board.with_cell(idx, tile_exponent(value)?))
            })
    }

    #[inline]
    pub fn cell(self, idx: usize) -> Exponent { get_cell(self, idx) }

    #[inline]
    pub fn with_cell(self, idx: usize, exponent: Exponent) -> Self { set_cell(self, idx, exponent) }

    #[inline]
    pub fn row(self, row: usize) -> Line { get_row(self, row) }

    #[inline]
    pub fn with_row(self, row: usize, line: Line) -> Self { set_row(self, row, line) }

    #[inline]
    pub fn column(self, col: usize) -> Line { get_column(self, col) }

    #[inline]
    pub fn with_column(self, col: usize, line: Line) -> Self { set_column(self, col, line) }

    /// Slide/merge in `dir`, returning the new board and the points earned.
    ///
    /// ```
    /// use mc_2048::engine::{Board, Move};
    /// let b = Board::EMPTY.with_cell(0, 1).with_cell(1, 1);
    /// let (moved, score) = b.apply(Move::Left);
    /// assert_eq!(moved, Board::EMPTY.with_cell(0, 2));
    /// assert_eq!(score, 4);
    /// ```
    #[inline]
    pub fn apply(self, dir: Move) -> (Self, Score) { move_in(self, dir) }

    /// Slide/merge in `dir`, discarding the score.
    #[inline]
    pub fn shift(self, dir: Move) -> Self { move_in(self, dir).0 }

    /// Insert a 2 (90%) or 4 (10%) tile into a uniformly chosen empty cell.
    ///
    /// Returns the board unchanged when it has no empty cell.
    #[inline]
    pub fn with_random_tile<R: Rng + ?Sized>(self, rng: &mut R) -> Self { add_random_tile(self, rng) }

    /// Perform a move then insert a random tile if the move changed the board.
    #[inline]
    pub fn make_move<R: Rng + ?Sized>(self, dir: Move, rng: &mut R) -> Self {
        let moved = self.shift(dir);
        if moved != self { moved.with_random_tile(rng) } else { self }
    }

    /// Directions that change this board, in direction-code order.
    pub fn legal_moves(self) -> impl Iterator<Item = Move> {
        Move::ALL.into_iter().filter(move |&dir| self.shift(dir) != self)
    }

    /// True while at least one merge or empty cell remains.
    #[inline]
    pub fn has_valid_move(self) -> bool { has_valid_move(self) }

    /// Return true if no legal moves remain.
    #[inline]
    pub fn is_game_over(self) -> bool { !has_valid_move(self) }

    #[inline]
    pub fn count_empty(self) -> usize { count_empty(self) }

    /// Return the highest tile face value (e.g., 2048) present on the board.
    pub fn highest_tile(self) -> u64 {
        let max = (0..16).map(|idx| self.cell(idx)).max().unwrap_or(0);
        if max == 0 { 0 } else { 1 << max }
    }

    /// Face value at `idx` (0 if empty).
    #[inline]
    pub fn tile_value(self, idx: usize) -> u64 {
        match self.cell(idx) {
            0 => 0,
            e => 1 << e,
        }
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:#018x})", self.0)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..4 {
            if row > 0 {
                writeln!(f, "-----------------------------")?;
            }
            let cells: Vec<String> = (0..4).map(|col| format_val(self.tile_value(row * 4 + col))).collect();
            writeln!(f, "{}", cells.join("|"))?;
        }
        Ok(())
    }
}

impl From<BoardRaw> for Board { fn from(v: BoardRaw) -> Self { Board::from_raw(v) } }
impl From<Board> for BoardRaw { fn from(b: Board) -> Self { b.raw() } }

fn format_val(val: u64) -> String {
    if val == 0 { " ".repeat(6) } else { format!("{:^6}", val) }
}

/// Convert a face value to its stored exponent: `floor(log2(value))`, `0` for values <= 1.
///
/// ```
/// use mc_2048::engine::tile_exponent;
/// assert_eq!(tile_exponent(0).unwrap(), 0);
/// assert_eq!(tile_exponent(2048).unwrap(), 11);
/// assert!(tile_exponent(1 << 16).is_err());
/// ```
pub fn tile_exponent(value: u64) -> Result<Exponent, EngineError> {
    if value <= 1 {
        return Ok(0);
    }
    let exponent = 63 - value.leading_zeros();
    if exponent > MAX_EXPONENT as u32 {
        return Err(EngineError::TileOutOfRange(value));
    }
    Ok(exponent as Exponent)
}

// ---------------------------------------------------------------------------
// Board codec: the only code that touches the raw bit layout.
// ---------------------------------------------------------------------------

/// Extract the exponent at cell `idx` (`0..16`).
#[inline]
pub fn get_cell(board: Board, idx: usize) -> Exponent {
    debug_assert!(idx < 16);
    ((board.0 >> (idx as u32 * CELL_BITS)) & CELL_MASK) as Exponent
}

/// Return `board` with cell `idx` replaced by the low 4 bits of `exponent`.
#[inline]
pub fn set_cell(board: Board, idx: usize, exponent: Exponent) -> Board {
    debug_assert!(idx < 16);
    let shift = idx as u32 * CELL_BITS;
    let cleared = board.0 & !(CELL_MASK << shift);
    Board(cleared | ((exponent as u64 & CELL_MASK) << shift))
}

pub fn get_row(board: Board, row: usize) -> Line {
    std::array::from_fn(|i| get_cell(board, row * 4 + i))
}

pub fn set_row(board: Board, row: usize, line: Line) -> Board {
    line.iter().enumerate().fold(board, |b, (i, &e)| set_cell(b, row * 4 + i, e))
}

pub fn get_column(board: Board, col: usize) -> Line {
    std::array::from_fn(|i| get_cell(board, i * 4 + col))
}

pub fn set_column(board: Board, col: usize, line: Line) -> Board {
    line.iter().enumerate().fold(board, |b, (i, &e)| set_cell(b, i * 4 + col, e))
}

/// Pack a line into 16 bits, first entry in the low nibble.
#[inline]
pub fn pack_line(line: Line) -> u16 {
    line.iter().rev().fold(0u16, |acc, &e| (acc << 4) | (e as u16 & 0xf))
}

#[inline]
pub fn unpack_line(packed: u16) -> Line {
    std::array::from_fn(|i| ((packed >> (i * 4)) & 0xf) as Exponent)
}

// ---------------------------------------------------------------------------
// Line mechanics
// ---------------------------------------------------------------------------

/// Slide a line towards index 0 and merge equal neighbours once.
///
/// Each merge of two `e` tiles yields one `e + 1` tile and scores `2^(e+1)`.
/// A merged tile is not merged again in the same pass. Exponent-15 tiles never merge.
///
/// ```
/// use mc_2048::engine::move_and_merge_line;
/// assert_eq!(move_and_merge_line([1, 1, 1, 0]), ([2, 1, 0, 0], 4));
/// ```
pub fn move_and_merge_line(line: Line) -> (Line, Score) {
    let mut tiles = line.into_iter().filter(|&e| e != 0).peekable();
    let mut out: Line = [0; 4];
    let mut len = 0;
    let mut score = 0;
    while let Some(e) = tiles.next() {
        let merged = e < MAX_EXPONENT && tiles.next_if_eq(&e).is_some();
        out[len] = if merged {
            score += 1 << (e + 1);
            e + 1
        } else {
            e
        };
        len += 1;
    }
    (out, score)
}

/// Memoized `move_and_merge_line` over every packed line.
struct LineTable {
    moved: Box<[u16]>,
    score: Box<[u32]>,
}

static LINE_TABLE: OnceLock<LineTable> = OnceLock::new();

/// Initialize the line table on first use. Safe to call multiple times.
pub fn new() {
    line_table();
}

#[inline(always)]
fn line_table() -> &'static LineTable {
    LINE_TABLE.get_or_init(create_line_table)
}

fn create_line_table() -> LineTable {
    // Allocate on the heap to avoid large stack frames
    let mut moved = vec![0u16; LINE_TABLE_SIZE];
    let mut score = vec![0u32; LINE_TABLE_SIZE];
    for (key, (moved_slot, score_slot)) in moved.iter_mut().zip(score.iter_mut()).enumerate() {
        let (line, points) = move_and_merge_line(unpack_line(key as u16));
        *moved_slot = pack_line(line);
        *score_slot = points as u32;
    }
    LineTable { moved: moved.into_boxed_slice(), score: score.into_boxed_slice() }
}

#[inline(always)]
fn merge_line_cached(line: Line) -> (Line, Score) {
    let table = line_table();
    let key = pack_line(line) as usize;
    (unpack_line(table.moved[key]), table.score[key] as Score)
}

#[inline(always)]
fn reversed(mut line: Line) -> Line {
    line.reverse();
    line
}

// ---------------------------------------------------------------------------
// Move engine
// ---------------------------------------------------------------------------

pub fn move_left(board: Board) -> (Board, Score) {
    (0..4).fold((board, 0), |(b, score), row| {
        let (line, points) = merge_line_cached(get_row(b, row));
        (set_row(b, row, line), score + points)
    })
}

pub fn move_right(board: Board) -> (Board, Score) {
    (0..4).fold((board, 0), |(b, score), row| {
        let (line, points) = merge_line_cached(reversed(get_row(b, row)));
        (set_row(b, row, reversed(line)), score + points)
    })
}

pub fn move_up(board: Board) -> (Board, Score) {
    (0..4).fold((board, 0), |(b, score), col| {
        let (line, points) = merge_line_cached(get_column(b, col));
        (set_column(b, col, line), score + points)
    })
}

pub fn move_down(board: Board) -> (Board, Score) {
    (0..4).fold((board, 0), |(b, score), col| {
        let (line, points) = merge_line_cached(reversed(get_column(b, col)));
        (set_column(b, col, reversed(line)), score + points)
    })
}

/// Slide/merge tiles in the given direction. No randomness.
#[inline]
pub fn move_in(board: Board, dir: Move) -> (Board, Score) {
    match dir {
        Move::Up => move_up(board),
        Move::Right => move_right(board),
        Move::Down => move_down(board),
        Move::Left => move_left(board),
    }
}

/// Dispatch on a raw direction code; codes outside `0..=3` are rejected.
pub fn move_by_code(board: Board, code: u8) -> Result<(Board, Score), EngineError> {
    Move::try_from(code).map(|dir| move_in(board, dir))
}

/// True if two horizontally or vertically adjacent non-empty cells could merge.
pub fn has_adjacent_merges(board: Board) -> bool {
    let mergeable = |a: Exponent, b: Exponent| a != 0 && a == b && a < MAX_EXPONENT;
    (0..4).any(|row| {
        (0..4).any(|col| {
            let idx = row * 4 + col;
            let here = get_cell(board, idx);
            (col < 3 && mergeable(here, get_cell(board, idx + 1)))
                || (row < 3 && mergeable(here, get_cell(board, idx + 4)))
        })
    })
}

/// A board is terminal exactly when this is false.
#[inline]
pub fn has_valid_move(board: Board) -> bool {
    count_empty(board) > 0 || has_adjacent_merges(board)
}

/// Indices of every empty cell, ascending.
pub fn empty_cells(board: Board) -> Vec<usize> {
    (0..16).filter(|&idx| get_cell(board, idx) == 0).collect()
}

// https://stackoverflow.com/questions/38225571/count-number-of-zero-nibbles-in-an-unsigned-64-bit-integer
/// Count the number of zero tiles.
pub fn count_empty(board: Board) -> usize {
    let mut occupied = board.0;
    occupied |= occupied >> 1;
    occupied |= occupied >> 2;
    occupied &= 0x1111_1111_1111_1111;
    16 - occupied.count_ones() as usize
}

/// Place a 2 (exponent 1, p=0.9) or 4 (exponent 2, p=0.1) on a uniformly chosen empty cell.
pub fn add_random_tile<R: Rng + ?Sized>(board: Board, rng: &mut R) -> Board {
    let empties = empty_cells(board);
    if empties.is_empty() {
        return board;
    }
    let idx = empties[rng.gen_range(0..empties.len())];
    set_cell(board, idx, generate_random_tile(rng))
}

fn generate_random_tile<R: Rng + ?Sized>(rng: &mut R) -> Exponent { if rng.gen_range(0..10) < 9 { 1 } else { 2 } }
