//! Parallel island-model genetic algorithm engine for single- and
//! multi-objective optimization with constraints.
//!
//! Several sub-populations ("islands") evolve concurrently and
//! periodically exchange their best individuals, driving the whole
//! archipelago toward Pareto-optimal regions while penalizing
//! out-of-range (constraint-violating) solutions.
//!
//! # Core pieces
//!
//! - [`Individual`](individual::Individual): a candidate solution with a
//!   heterogeneous chromosome (ints, floats, strings, keys, byte-strings,
//!   function tags), objective values and constraint violations.
//! - [`operators`]: crossover and mutation per gene kind, with named
//!   float schemes (`"de"`, `"blend"`, `"sbx"`) and a registry for custom
//!   ones.
//! - [`Population`](population::Population): demerit computation and
//!   stable ordering unifying feasible and unfeasible individuals.
//! - [`Island`](island::Island): one generation of crowding-tournament
//!   (or standard roulette/SUS) evolution, diversity tracking and
//!   regeneration.
//! - [`Evolver`](evolver::Evolver): N islands evolving in parallel with
//!   periodic migration via minimum-cost bipartite matching.
//!
//! # Example
//!
//! ```
//! use archipelago::{Evolver, EvolverConfig};
//! use archipelago::population::pop_flt_gen;
//!
//! let conf = EvolverConfig::default()
//!     .with_ninds(12)
//!     .with_crowd_size(3)
//!     .with_tf(50)
//!     .with_seed(42)
//!     .with_range_flt(vec![(-5.0, 5.0), (-5.0, 5.0)])
//!     .with_pop_flt_gen(pop_flt_gen)
//!     .with_ova_oor(|ind, _isl, _t, _rep| {
//!         let x = ind.get_floats();
//!         ind.ovas[0] = x[0] * x[0] + x[1] * x[1];
//!     });
//!
//! let mut evolver = Evolver::new(conf).unwrap();
//! evolver.run().unwrap();
//! assert!(evolver.best_individual().ovas[0] < 1.0);
//! ```
//!
//! # References
//!
//! - Goldberg (1989), *Genetic Algorithms in Search, Optimization, and
//!   Machine Learning*
//! - Deb (2001), *Multi-Objective Optimization using Evolutionary
//!   Algorithms*
//! - Cantu-Paz (2000), *Efficient and Accurate Parallel Genetic
//!   Algorithms*

pub mod bingo;
pub mod config;
pub mod error;
pub mod evolver;
pub mod individual;
pub mod island;
pub mod munkres;
pub mod operators;
pub mod population;
pub mod report;
pub mod rng;

pub use bingo::Bingo;
pub use config::{EvolverConfig, GaType};
pub use error::{EvolveError, Result};
pub use evolver::Evolver;
pub use individual::{compare_det, compare_prob, distance, GeneFunc, Individual};
pub use island::Island;
pub use operators::{OpParams, OperatorRegistry};
pub use population::Population;
pub use report::Report;
