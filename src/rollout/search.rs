use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;

use crate::engine::{Board, Move, Score};

use super::{
    warm_engine, BranchEval, BranchStatus, Decision, PlayoutError, RolloutConfig, SearchError,
    SearchStats,
};

/// Parallel Monte Carlo policy: one rayon task per candidate direction.
///
/// Tasks share nothing but the read-only config; each owns its board copy and RNG,
/// and results are matched back to directions by label, not completion order.
pub struct MonteCarlo {
    cfg: RolloutConfig,
    stats: SearchStats,
}

impl MonteCarlo {
    pub fn new() -> Self { Self::with_config(RolloutConfig::default()) }

    pub fn with_config(cfg: RolloutConfig) -> Self {
        warm_engine();
        Self { cfg, stats: SearchStats::default() }
    }

    #[inline]
    pub fn config(&self) -> &RolloutConfig { &self.cfg }

    /// Pick the direction whose playouts scored highest.
    ///
    /// Returns [`Decision::GameOver`] when no direction changes the board, and
    /// [`SearchError::AllCandidatesUnavailable`] when every dispatched batch failed.
    ///
    /// ```
    /// use mc_2048::engine::Board;
    /// use mc_2048::rollout::{Decision, MonteCarlo, RolloutConfig};
    /// let cfg = RolloutConfig { runs_per_move: 10, ..Default::default() };
    /// let mut mc = MonteCarlo::with_config(cfg);
    /// let stuck = Board::from_raw(0x1212_2121_1212_2121);
    /// assert_eq!(mc.best_move(stuck), Ok(Decision::GameOver));
    /// ```
    pub fn best_move(&mut self, board: Board) -> Result<Decision, SearchError> {
        let branches = self.branch_evals(board);
        let decision = select_best(&branches);
        log::debug!("decision for {:?}: {:?}", board, decision);
        decision
    }

    /// The chosen move, or `None` when the board is over or no batch produced a score.
    #[inline]
    pub fn get_next_move(&mut self, board: Board) -> Option<Move> {
        match self.best_move(board) {
            Ok(Decision::Move(dir)) => Some(dir),
            _ => None,
        }
    }

    /// Core function: evaluate every direction, running candidate batches in parallel.
    ///
    /// Returns a fixed array in direction-code order `[Up, Right, Down, Left]`;
    /// no-op directions are marked [`BranchStatus::Illegal`] and never dispatched.
    pub fn branch_evals(&mut self, board: Board) -> [BranchEval; 4] {
        let start = Instant::now();
        let candidates: Vec<(Move, Board)> = Move::ALL
            .iter()
            .filter_map(|&dir| {
                let moved = board.shift(dir);
                (moved != board).then_some((dir, moved))
            })
            .collect();

        let results: Vec<(Move, Result<Score, PlayoutError>)> = candidates
            .par_iter()
            .map(|&(dir, moved)| {
                let mut rng = self.batch_rng(board, dir);
                let playout = self.cfg.playout();
                let runs = self.cfg.runs_per_move;
                let deadline = self.cfg.batch_timeout.map(|budget| Instant::now() + budget);
                match guarded(|| playout.run_batch(moved, runs, dir, &mut rng, deadline)) {
                    Ok((score, label)) => (label, Ok(score)),
                    Err(err) => (dir, Err(err)),
                }
            })
            .collect();

        let mut out = Move::ALL.map(|dir| BranchEval { dir, status: BranchStatus::Illegal });
        let mut playouts = 0u64;
        for (dir, result) in results {
            out[dir.code() as usize].status = match result {
                Ok(score) => {
                    log::debug!("{dir}: {score} over {} playouts", self.cfg.runs_per_move);
                    playouts += self.cfg.runs_per_move as u64;
                    BranchStatus::Scored(score)
                }
                Err(err) => {
                    log::warn!("{dir}: candidate unavailable: {err}");
                    if let PlayoutError::TimedOut { completed } = &err {
                        playouts += *completed as u64;
                    }
                    BranchStatus::Unavailable(err)
                }
            };
        }
        self.stats = SearchStats {
            batches: candidates.len() as u32,
            playouts,
            elapsed: start.elapsed(),
        };
        out
    }

    /// Statistics collected from the last call to [`Self::best_move`] or [`Self::branch_evals`].
    #[inline]
    pub fn last_stats(&self) -> SearchStats { self.stats }

    /// Reset accumulated stats to zero.
    #[inline]
    pub fn reset_stats(&mut self) { self.stats = SearchStats::default(); }

    fn batch_rng(&self, board: Board, dir: Move) -> StdRng {
        match self.cfg.seed {
            Some(seed) => StdRng::seed_from_u64(batch_seed(seed, board, dir)),
            None => StdRng::from_entropy(),
        }
    }
}

impl Default for MonteCarlo { fn default() -> Self { Self::new() } }

/// Highest aggregate score wins; on a tie the earliest direction code is kept.
pub fn select_best(branches: &[BranchEval]) -> Result<Decision, SearchError> {
    if !branches.iter().any(BranchEval::legal) {
        return Ok(Decision::GameOver);
    }
    let mut best: Option<(Move, Score)> = None;
    for branch in branches {
        if let Some(score) = branch.score() {
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((branch.dir, score));
            }
        }
    }
    best.map(|(dir, _)| Decision::Move(dir)).ok_or(SearchError::AllCandidatesUnavailable)
}

/// Run one batch, turning a panic into an unavailable candidate.
fn guarded<F>(batch: F) -> Result<(Score, Move), PlayoutError>
where
    F: FnOnce() -> Result<(Score, Move), PlayoutError>,
{
    panic::catch_unwind(AssertUnwindSafe(batch))
        .unwrap_or_else(|payload| Err(PlayoutError::Panicked(panic_message(payload))))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        String::from("unknown panic")
    }
}

// splitmix64 finalizer over (seed, board, direction)
fn batch_seed(seed: u64, board: Board, dir: Move) -> u64 {
    let mut z = seed
        ^ board.raw().rotate_left(17)
        ^ (dir.code() as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(dir: Move, score: Score) -> BranchEval {
        BranchEval { dir, status: BranchStatus::Scored(score) }
    }
    fn illegal(dir: Move) -> BranchEval { BranchEval { dir, status: BranchStatus::Illegal } }

    #[test]
    fn it_selects_highest() {
        let branches = [
            scored(Move::Up, 10),
            scored(Move::Right, 30),
            illegal(Move::Down),
            scored(Move::Left, 20),
        ];
        assert_eq!(select_best(&branches), Ok(Decision::Move(Move::Right)));
    }

    #[test]
    fn it_breaks_ties_by_first() {
        let branches = [
            illegal(Move::Up),
            scored(Move::Right, 50),
            scored(Move::Down, 50),
            scored(Move::Left, 50),
        ];
        assert_eq!(select_best(&branches), Ok(Decision::Move(Move::Right)));
    }

    #[test]
    fn it_reports_game_over() {
        let branches = Move::ALL.map(illegal);
        assert_eq!(select_best(&branches), Ok(Decision::GameOver));
    }

    #[test]
    fn it_skips_unavailable() {
        let failed = |dir| BranchEval {
            dir,
            status: BranchStatus::Unavailable(PlayoutError::Panicked("boom".into())),
        };
        let branches =
            [failed(Move::Up), scored(Move::Right, 1), illegal(Move::Down), illegal(Move::Left)];
        assert_eq!(select_best(&branches), Ok(Decision::Move(Move::Right)));
        let branches =
            [failed(Move::Up), illegal(Move::Right), illegal(Move::Down), failed(Move::Left)];
        assert_eq!(select_best(&branches), Err(SearchError::AllCandidatesUnavailable));
    }

    #[test]
    fn it_isolates_panicking_batch() {
        let out = guarded(|| panic!("rollout exploded"));
        assert_eq!(out, Err(PlayoutError::Panicked("rollout exploded".to_string())));
        assert_eq!(guarded(|| Ok((7, Move::Down))), Ok((7, Move::Down)));
    }

    #[test]
    fn it_seeds_per_direction() {
        let b = Board::from_raw(0x21);
        assert_ne!(batch_seed(1, b, Move::Up), batch_seed(1, b, Move::Left));
        assert_eq!(batch_seed(1, b, Move::Up), batch_seed(1, b, Move::Up));
    }

    #[test]
    fn it_marks_noop_directions_illegal() {
        let cfg = RolloutConfig { runs_per_move: 5, seed: Some(3), ..Default::default() };
        let mut mc = MonteCarlo::with_config(cfg);
        // Single tile in the top-left corner: only Right and Down move it.
        let branches = mc.branch_evals(Board::EMPTY.with_cell(0, 1));
        assert_eq!(branches[Move::Up.code() as usize].status, BranchStatus::Illegal);
        assert_eq!(branches[Move::Left.code() as usize].status, BranchStatus::Illegal);
        assert!(branches[Move::Right.code() as usize].score().is_some());
        assert!(branches[Move::Down.code() as usize].score().is_some());
        let stats = mc.last_stats();
        assert_eq!(stats.batches, 2);
        assert_eq!(stats.playouts, 10);
    }
}
