use mc_2048::engine::{self as GameEngine, Board, Move};
use mc_2048::rollout::{BranchStatus, Decision, MonteCarlo, PlayoutError, RolloutConfig};
use rand::{rngs::StdRng, SeedableRng};
use std::time::Duration;

fn seeded(runs: u32, seed: u64) -> MonteCarlo {
    let cfg = RolloutConfig { runs_per_move: runs, seed: Some(seed), ..Default::default() };
    MonteCarlo::with_config(cfg)
}

fn midgame(seed: u64) -> Board {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    for dir in [Move::Left, Move::Up, Move::Right, Move::Down].into_iter().cycle().take(12) {
        b = b.make_move(dir, &mut rng);
    }
    b
}

#[test]
fn seeded_pipeline_is_repeatable() {
    GameEngine::new();
    let b = midgame(17);
    let first = seeded(40, 5).branch_evals(b);
    let second = seeded(40, 5).branch_evals(b);
    assert_eq!(first, second);
    assert_eq!(seeded(40, 5).best_move(b), seeded(40, 5).best_move(b));
}

#[test]
fn only_board_changing_moves_are_candidates() {
    let b = Board::EMPTY.with_cell(0, 1).with_cell(1, 1);
    let branches = seeded(10, 1).branch_evals(b);
    for branch in &branches {
        let changes = b.shift(branch.dir) != b;
        assert_eq!(branch.legal(), changes, "{:?}", branch.dir);
    }
    assert_eq!(branches[Move::Up.code() as usize].status, BranchStatus::Illegal);
}

#[test]
fn chosen_move_has_top_score() {
    let b = midgame(3);
    let mut mc = seeded(30, 11);
    let branches = mc.branch_evals(b);
    let top = branches.iter().filter_map(|br| br.score()).max().unwrap();
    let Ok(Decision::Move(dir)) = mc.best_move(b) else { panic!("expected a move") };
    assert_eq!(branches[dir.code() as usize].score(), Some(top));
    let first_top = branches.iter().find(|br| br.score() == Some(top)).unwrap();
    assert_eq!(first_top.dir, dir);
}

#[test]
fn terminal_board_is_game_over() {
    let stuck = Board::from_raw(0x1212_2121_1212_2121);
    let mut mc = seeded(10, 1);
    assert_eq!(mc.best_move(stuck), Ok(Decision::GameOver));
    assert_eq!(mc.get_next_move(stuck), None);
    assert_eq!(mc.last_stats().batches, 0);
}

#[test]
fn zero_budget_marks_candidates_unavailable() {
    let cfg = RolloutConfig {
        runs_per_move: 10,
        seed: Some(2),
        batch_timeout: Some(Duration::ZERO),
        ..Default::default()
    };
    let mut mc = MonteCarlo::with_config(cfg);
    let branches = mc.branch_evals(Board::EMPTY.with_cell(0, 1));
    for branch in branches.iter().filter(|br| br.legal()) {
        let timed_out = PlayoutError::TimedOut { completed: 0 };
        assert_eq!(branch.status, BranchStatus::Unavailable(timed_out));
    }
    assert!(mc.best_move(Board::EMPTY.with_cell(0, 1)).is_err());
}

#[test]
fn plays_a_short_game() {
    let mut rng = StdRng::seed_from_u64(21);
    let mut mc = MonteCarlo::with_config(RolloutConfig {
        runs_per_move: 8,
        seed: Some(21),
        max_moves_per_run: Some(200),
        ..Default::default()
    });
    let mut b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    let mut moves = 0;
    for _ in 0..10 {
        match mc.best_move(b).unwrap() {
            Decision::Move(dir) => {
                let moved = b.shift(dir);
                assert_ne!(moved, b);
                b = moved.with_random_tile(&mut rng);
                moves += 1;
            }
            Decision::GameOver => break,
        }
    }
    assert_eq!(moves, 10);
}
