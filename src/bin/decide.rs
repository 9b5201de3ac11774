use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use mc_2048::engine::Board;
use mc_2048::rollout::{Decision, MonteCarlo, RolloutConfig, DEFAULT_RUNS_PER_MOVE};

/// Print the direction code (0=up, 1=right, 2=down, 3=left) for one board.
#[derive(Debug, Parser)]
#[command(name = "decide", about = "Pick the next 2048 move by Monte Carlo rollouts")]
struct Args {
    /// Comma-separated face values, e.g. "2,0,4,..." (missing trailing fields are empty)
    #[arg(long)]
    state: String,

    /// Order of the 16 values in --state
    #[arg(long, value_enum, default_value_t = WireLayout::ColumnMajor)]
    layout: WireLayout,

    /// Playouts per candidate direction
    #[arg(long, default_value_t = DEFAULT_RUNS_PER_MOVE)]
    runs: u32,

    #[arg(long)]
    seed: Option<u64>,

    /// Per-candidate time budget in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Cap on random moves inside one playout
    #[arg(long)]
    max_moves: Option<u64>,

    /// Only draw directions that change the board during playouts
    #[arg(long)]
    skip_noop: bool,
}

/// How the 16 wire values map onto cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum WireLayout {
    /// `state[col * 4 + row]`
    ColumnMajor,
    /// `state[row * 4 + col]`
    RowMajor,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let board = parse_state(&args.state, args.layout)?;
    log::debug!("decoded board:\n{}", board);

    let cfg = RolloutConfig {
        runs_per_move: args.runs,
        seed: args.seed,
        max_moves_per_run: args.max_moves,
        batch_timeout: args.timeout_ms.map(Duration::from_millis),
        noop_consumes_turn: !args.skip_noop,
    };
    let mut policy = MonteCarlo::with_config(cfg);
    match policy.best_move(board)? {
        Decision::Move(dir) => println!("{}", dir.code()),
        Decision::GameOver => println!("game-over"),
    }
    Ok(())
}

fn parse_state(state: &str, layout: WireLayout) -> anyhow::Result<Board> {
    let fields: Vec<&str> = state.split(',').map(str::trim).collect();
    if fields.len() > 16 {
        bail!("expected at most 16 values, got {}", fields.len());
    }
    let mut values = [0u64; 16];
    for (i, field) in fields.iter().enumerate() {
        if field.is_empty() {
            continue;
        }
        let value: i64 = field.parse().with_context(|| format!("value {} is not a number: {:?}", i, field))?;
        let cell = match layout {
            WireLayout::RowMajor => i,
            WireLayout::ColumnMajor => (i % 4) * 4 + i / 4,
        };
        values[cell] = value.max(0) as u64;
    }
    Ok(Board::from_tile_values(values)?)
}
