//! mc-2048: a 2048 game engine + Monte Carlo rollout policy
//!
//! This crate provides:
//! - A compact `Board` type (16 4-bit exponents in a `u64`) with cell/row/column accessors
//! - The slide-and-merge move engine, terminal detection and random tile spawning (`engine` module)
//! - Random playouts and the parallel move scheduler built on them (`rollout` module)
//!
//! Quick start:
//! ```
//! use mc_2048::engine::{Board, Move};
//! use mc_2048::rollout::{Decision, MonteCarlo, RolloutConfig};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! // Deterministic board initialization with a seeded RNG
//! let mut rng = StdRng::seed_from_u64(42);
//! let b0 = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
//! let (_b1, score) = b0.apply(Move::Left);
//! assert!(score % 4 == 0);
//!
//! // Seeded policy: same board, same decision
//! let cfg = RolloutConfig { runs_per_move: 25, seed: Some(1), ..Default::default() };
//! let mut policy = MonteCarlo::with_config(cfg.clone());
//! let first = policy.best_move(b0).unwrap();
//! let again = MonteCarlo::with_config(cfg).best_move(b0).unwrap();
//! assert_eq!(first, again);
//! assert!(matches!(first, Decision::Move(_)));
//! ```
//!
//! Note: the move engine's line table is built lazily; `engine::new()` builds it eagerly.
//!
pub mod engine;
pub mod rollout;
