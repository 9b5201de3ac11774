//! Monte Carlo move selection for 2048.
//!
//! For every direction that changes the current board, a batch of uniformly
//! random playouts is run from the post-move board until game over. The
//! direction whose batch accumulates the highest total score wins.
//!
//! - [`playout`]: a single random game ([`random_run`]) and a batch of them ([`random_runs`]).
//! - [`MonteCarlo`]: the rayon fan-out over candidate directions.
//!
//! Quick start
//! ```
//! use mc_2048::engine::Board;
//! use mc_2048::rollout::{Decision, MonteCarlo, RolloutConfig};
//!
//! let cfg = RolloutConfig { runs_per_move: 20, seed: Some(7), ..Default::default() };
//! let mut mc = MonteCarlo::with_config(cfg);
//! let b = Board::EMPTY.with_cell(0, 1).with_cell(1, 1);
//! let decision = mc.best_move(b).unwrap();
//! assert!(matches!(decision, Decision::Move(_)));
//! ```

use std::time::Duration;

use crate::engine::{self, Move, Score};

pub mod playout;
mod search;

pub use playout::{random_run, random_runs, Playout};
pub use search::{select_best, MonteCarlo};

/// Reference number of playouts per candidate direction.
pub const DEFAULT_RUNS_PER_MOVE: u32 = 1000;

/// Configurable knobs for the Monte Carlo policy.
///
/// - `runs_per_move`: playouts per candidate direction.
/// - `seed`: when set, every batch is seeded from `(seed, board, direction)`.
/// - `max_moves_per_run`: optional cap on random moves inside one playout.
/// - `batch_timeout`: optional wall-clock budget per batch, checked between playouts.
/// - `noop_consumes_turn`: whether a random move that changes nothing still spawns a tile.
#[derive(Debug, Clone)]
pub struct RolloutConfig {
    pub runs_per_move: u32,
    pub seed: Option<u64>,
    pub max_moves_per_run: Option<u64>,
    pub batch_timeout: Option<Duration>,
    pub noop_consumes_turn: bool,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            runs_per_move: DEFAULT_RUNS_PER_MOVE,
            seed: None,
            max_moves_per_run: None,
            batch_timeout: None,
            noop_consumes_turn: true,
        }
    }
}

impl RolloutConfig {
    pub(crate) fn playout(&self) -> Playout {
        Playout { max_moves: self.max_moves_per_run, noop_consumes_turn: self.noop_consumes_turn }
    }
}

/// Why a single candidate's batch produced no score.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayoutError {
    #[error("batch timed out after {completed} playouts")]
    TimedOut { completed: u32 },
    #[error("batch panicked: {0}")]
    Panicked(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("every candidate batch failed")]
    AllCandidatesUnavailable,
}

/// Outcome of one candidate direction at the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchStatus {
    /// The direction does not change the board.
    Illegal,
    /// Aggregate score over all playouts of the batch.
    Scored(Score),
    /// The batch was dispatched but failed.
    Unavailable(PlayoutError),
}

/// Per-direction evaluation at the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchEval {
    pub dir: Move,
    pub status: BranchStatus,
}

impl BranchEval {
    #[inline]
    pub fn score(&self) -> Option<Score> {
        match self.status {
            BranchStatus::Scored(score) => Some(score),
            _ => None,
        }
    }

    #[inline]
    pub fn legal(&self) -> bool { !matches!(self.status, BranchStatus::Illegal) }
}

/// What the policy wants to do with the current board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Move(Move),
    /// No direction changes the board.
    GameOver,
}

/// Basic stats for the last evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchStats {
    /// Candidate batches dispatched.
    pub batches: u32,
    /// Playouts finished across all batches.
    pub playouts: u64,
    pub elapsed: Duration,
}

/// Constructors call this so the first batch doesn't pay for the line table.
fn warm_engine() {
    engine::new();
}
