use std::time::Instant;

use clap::Parser;
use mc_2048::engine::{self as GameEngine, Board};
use mc_2048::rollout::{Decision, MonteCarlo, RolloutConfig, DEFAULT_RUNS_PER_MOVE};
use rand::{rngs::StdRng, SeedableRng};

#[derive(Debug, Parser)]
#[command(name = "mc-2048", about = "Play one 2048 game with the Monte Carlo rollout policy")]
struct Args {
    /// Playouts per candidate direction
    #[arg(long, default_value_t = DEFAULT_RUNS_PER_MOVE)]
    runs: u32,

    /// Seed for both the game and the policy
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many moves
    #[arg(long)]
    steps: Option<u64>,

    /// Only print the final summary
    #[arg(long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    GameEngine::new();

    let cfg = RolloutConfig { runs_per_move: args.runs, seed: args.seed, ..Default::default() };
    let mut policy = MonteCarlo::with_config(cfg);
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut board = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    if !args.quiet {
        println!("{}", board);
    }

    let start = Instant::now();
    let mut move_count: u64 = 0;
    let mut score: u64 = 0;
    let mut playouts: u64 = 0;
    loop {
        if args.steps.is_some_and(|limit| move_count >= limit) {
            break;
        }
        let dir = match policy.best_move(board)? {
            Decision::Move(dir) => dir,
            Decision::GameOver => break,
        };
        playouts += policy.last_stats().playouts;
        let (moved, points) = board.apply(dir);
        score += points;
        board = moved.with_random_tile(&mut rng);
        move_count += 1;
        if !args.quiet {
            println!("{} (+{})\n{}", dir, points, board);
        }
    }

    println!(
        "Moves made: {}, score: {}, highest tile: {}, playouts: {}, elapsed: {:.1}s",
        move_count,
        score,
        board.highest_tile(),
        playouts,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
