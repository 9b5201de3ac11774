use std::time::Instant;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::engine::{add_random_tile, has_valid_move, move_in, Board, Move, Score};

use super::PlayoutError;

/// Rules for a random playout.
///
/// The default plays until game over and lets a no-op move spawn a tile.
#[derive(Debug, Clone, Copy)]
pub struct Playout {
    /// Stop a playout after this many random moves.
    pub max_moves: Option<u64>,
    /// When false, only directions that change the board are drawn.
    pub noop_consumes_turn: bool,
}

impl Default for Playout {
    fn default() -> Self { Self { max_moves: None, noop_consumes_turn: true } }
}

impl Playout {
    /// Play uniformly random moves from `board` until game over, returning the total score.
    pub fn run<R: Rng + ?Sized>(&self, mut board: Board, rng: &mut R) -> Score {
        let mut score = 0;
        let mut moves = 0u64;
        while has_valid_move(board) {
            if self.max_moves.is_some_and(|cap| moves >= cap) {
                break;
            }
            let dir = if self.noop_consumes_turn {
                Move::ALL[rng.gen_range(0..4)]
            } else {
                let legal: Vec<Move> = board.legal_moves().collect();
                match legal.choose(rng) {
                    Some(&dir) => dir,
                    None => break,
                }
            };
            let (moved, points) = move_in(board, dir);
            score += points;
            board = add_random_tile(moved, rng);
            moves += 1;
        }
        score
    }

    /// Run `runs` independent playouts from `board`, summing their scores.
    ///
    /// `label` is handed back untouched so callers can match results to candidates.
    /// With a `deadline`, the batch stops between playouts once it has passed.
    pub fn run_batch<R, L>(
        &self,
        board: Board,
        runs: u32,
        label: L,
        rng: &mut R,
        deadline: Option<Instant>,
    ) -> Result<(Score, L), PlayoutError>
    where
        R: Rng + ?Sized,
    {
        let (total, completed) = self.accumulate(board, runs, rng, deadline);
        if completed < runs {
            return Err(PlayoutError::TimedOut { completed });
        }
        Ok((total, label))
    }

    /// Sum playouts until `runs` are done or `deadline` passes; returns (score, completed).
    fn accumulate<R: Rng + ?Sized>(
        &self,
        board: Board,
        runs: u32,
        rng: &mut R,
        deadline: Option<Instant>,
    ) -> (Score, u32) {
        let mut total: Score = 0;
        for completed in 0..runs {
            if deadline.is_some_and(|at| Instant::now() >= at) {
                return (total, completed);
            }
            total += self.run(board, rng);
        }
        (total, runs)
    }
}

/// One random game from `board` to game over under the default rules.
///
/// ```
/// use mc_2048::engine::Board;
/// use mc_2048::rollout::random_run;
/// use rand::{rngs::StdRng, SeedableRng};
/// let mut rng = StdRng::seed_from_u64(1);
/// let b = Board::EMPTY.with_cell(0, 1);
/// let _score = random_run(b, &mut rng);
/// ```
pub fn random_run<R: Rng + ?Sized>(board: Board, rng: &mut R) -> Score {
    Playout::default().run(board, rng)
}

/// `runs` independent games from `board`, summed and tagged with `label`.
///
/// Same loop as [`Playout::run_batch`] without a deadline, so it cannot time out.
pub fn random_runs<R: Rng + ?Sized, L>(
    board: Board,
    runs: u32,
    label: L,
    rng: &mut R,
) -> (Score, L) {
    let (total, _) = Playout::default().accumulate(board, runs, rng, None);
    (total, label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use std::time::Duration;

    fn stuck() -> Board {
        Board::from_raw(0x1212_2121_1212_2121)
    }

    #[test]
    fn it_scores_zero_on_terminal_board() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(random_run(stuck(), &mut rng), 0);
        assert_eq!(random_runs(stuck(), 50, 'x', &mut rng), (0, 'x'));
    }

    #[test]
    fn it_is_deterministic_with_seed() {
        let b = Board::EMPTY.with_cell(0, 1).with_cell(5, 2);
        let a = random_runs(b, 30, 2u8, &mut StdRng::seed_from_u64(99));
        let c = random_runs(b, 30, 2u8, &mut StdRng::seed_from_u64(99));
        assert_eq!(a, c);
        assert_eq!(a.1, 2);
    }

    #[test]
    fn it_accumulates_merge_points() {
        let mut rng = StdRng::seed_from_u64(4);
        let b = Board::EMPTY.with_cell(0, 1).with_cell(1, 1);
        let total: Score = (0..20).map(|_| random_run(b, &mut rng)).sum();
        assert!(total > 0);
        // Every merge scores an even power of two, at least 4.
        assert_eq!(total % 4, 0);
    }

    #[test]
    fn it_respects_move_cap() {
        let mut rng = StdRng::seed_from_u64(8);
        let capped = Playout { max_moves: Some(0), ..Default::default() };
        assert_eq!(capped.run(Board::EMPTY.with_cell(0, 1).with_cell(1, 1), &mut rng), 0);
    }

    #[test]
    fn it_stops_on_empty_board_without_noop_turns() {
        let mut rng = StdRng::seed_from_u64(8);
        let strict = Playout { noop_consumes_turn: false, ..Default::default() };
        assert_eq!(strict.run(Board::EMPTY, &mut rng), 0);
        let b = Board::EMPTY.with_cell(0, 1).with_cell(1, 1);
        assert!(strict.run(b, &mut rng) > 0);
    }

    #[test]
    fn it_matches_unbounded_batch() {
        let b = Board::EMPTY.with_cell(0, 1).with_cell(6, 1);
        let plain = random_runs(b, 25, 'u', &mut StdRng::seed_from_u64(12));
        let batch = Playout::default().run_batch(b, 25, 'u', &mut StdRng::seed_from_u64(12), None);
        assert_eq!(batch, Ok(plain));
    }

    #[test]
    fn it_times_out_batch() {
        let mut rng = StdRng::seed_from_u64(8);
        let past = Instant::now() - Duration::from_millis(1);
        let b = Board::EMPTY.with_cell(0, 1);
        let out = Playout::default().run_batch(b, 10, 0u8, &mut rng, Some(past));
        assert_eq!(out, Err(PlayoutError::TimedOut { completed: 0 }));
    }
}
