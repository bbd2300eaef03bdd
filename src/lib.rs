//! # ac-eval: Exact Bayesian Inference over Arithmetic Circuits
//!
//! **`ac-eval`** evaluates compiled arithmetic circuits to answer probabilistic queries on
//! Bayesian networks exactly.
//! It reads the circuit and literal map produced by a knowledge compiler (c2d/Ace `.nnf` and
//! `.lmap` files), applies evidence, and computes probabilities, partials, marginals and posteriors.
//!
//! ## What is an Arithmetic Circuit?
//!
//! An arithmetic circuit is a DAG whose leaves are weighted literals and whose internal nodes are
//! sums and products.
//! Every indicator `λ(x = u)` and parameter `θ(u | parents)` of a network becomes a literal.
//! One upward pass yields the probability of evidence at the root; a second, downward pass yields
//! the derivative of the root at every leaf, which answers every single-variable marginal at once.
//!
//! ## Key Features
//!
//! - **Exact Zeros**: Products with zero children keep a "degenerate zero" marker, so derivatives
//!   stay exact even when evidence zeroes out parts of the circuit.
//! - **Underflow Detection**: A product of nonzero factors that rounds to `0.0` is an error,
//!   never a silent zero.
//! - **Shared Networks**: A loaded [`Network`][crate::model::Network] is immutable and can be shared
//!   across threads; each thread owns its [`Evidence`][crate::evidence::Evidence] and
//!   [`Evaluator`][crate::eval::Evaluator].
//! - **Search-Friendly Engine**: [`QueryEngine`][crate::engine::QueryEngine] diffs evidence vectors
//!   against the last evaluation and memoizes results per evidence prefix.
//!
//! ## Basic Usage
//!
//! ```rust
//! use ac_eval::eval::Evaluator;
//! use ac_eval::evidence::Evidence;
//! use ac_eval::model::Network;
//!
//! // One binary variable `a` with P(a = v0) = 0.3.
//! let circuit = "nnf 7 6 4\nL 1\nL 3\nA 2 0 1\nL 2\nL 4\nA 2 3 4\nO 0 2 2 5\n";
//! let literal_map = "\
//! cc$N$4
//! cc$V$a$2$v0$v1
//! cc$T$theta_a$3
//! cc$I$1$1.0$a$v0$0
//! cc$I$2$1.0$a$v1$1
//! cc$P$3$0.3$theta_a$1
//! cc$P$4$0.7$theta_a$2
//! ";
//!
//! // 1. Load the network
//! let network = Network::from_strs(circuit, literal_map).unwrap();
//! let a = network.variable("a").unwrap();
//!
//! // 2. Observe a = v1
//! let mut evidence = Evidence::new(&network);
//! evidence.var_commit(a, 1).unwrap();
//!
//! // 3. Evaluate both passes
//! let mut evaluator = Evaluator::new(&network);
//! let pe = evaluator.evaluate_with_derivatives(&evidence).unwrap();
//! assert!((pe - 0.7).abs() < 1e-12);
//!
//! // 4. Read the partials: what P(e) would be for each value of `a`
//! let partials = evaluator.variable_partials(a).unwrap();
//! assert!((partials[0] - 0.3).abs() < 1e-12);
//! ```
//!
//! ## Core Components
//!
//! - **[`model`]**: The immutable [`Network`][crate::model::Network]: circuit plus variables and potentials.
//! - **[`evidence`]**: Per-query literal weights.
//! - **[`eval`]**: Upward and two-pass evaluation.
//! - **[`query`]**: Probabilities, partials, marginals and posteriors.
//! - **[`engine`]**: Evidence diffing and result caching for search.

pub mod cache;
pub mod circuit;
pub mod config;
pub mod engine;
pub mod error;
pub mod eval;
pub mod evidence;
pub mod literal_map;
pub mod model;
pub mod query;
pub mod types;

pub use error::{Error, Result};
