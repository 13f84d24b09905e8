//! Error types for the evolution engine.
//!
//! Failures fall into a small taxonomy:
//!
//! - [`EvolveError::Config`]: invalid configuration, rejected at
//!   initialization before any island is built.
//! - [`EvolveError::Contract`]: a user callback broke its contract
//!   (negative constraint violation, wrong vector length). Aborts the run.
//! - [`EvolveError::Assignment`]: the bipartite matching solver received a
//!   degenerate cost matrix. Callers treat this as "skip this exchange"
//!   rather than a fatal condition.
//! - [`EvolveError::Io`]: report-sink failures. Logged by callers, never
//!   fatal to the evolutionary loop.

use thiserror::Error;

/// Errors produced by the evolution engine.
#[derive(Error, Debug)]
pub enum EvolveError {
    /// Invalid configuration detected during initialization.
    #[error("configuration error: {0}")]
    Config(String),

    /// A user-supplied callback violated its contract.
    #[error("callback contract violation: {0}")]
    Contract(String),

    /// The assignment solver could not produce a matching.
    #[error("assignment error: {0}")]
    Assignment(String),

    /// An I/O operation on a report sink failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Specialized `Result` for engine operations.
pub type Result<T> = std::result::Result<T, EvolveError>;
