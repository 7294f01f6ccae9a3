//! Error types for the remittance core

use thiserror::Error;

/// Result type for remittance operations
pub type Result<T> = std::result::Result<T, Error>;

/// Remittance errors
#[derive(Error, Debug)]
pub enum Error {
    /// Bad contract or rule input, rejected before persistence
    #[error("Validation error: {0}")]
    Validation(String),

    /// Cycle state machine violation; state is left unchanged
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        /// Current cycle status
        from: crate::types::CycleStatus,
        /// Requested cycle status
        to: crate::types::CycleStatus,
    },

    /// Fatal internal invariant breach; must halt, never silently correct
    #[error(
        "Waterfall imbalance: investor {investor_minor} + servicer {servicer_minor} != total {total_minor}"
    )]
    WaterfallImbalance {
        /// Sum of per-item investor shares
        investor_minor: i64,
        /// Sum of per-item servicer fees
        servicer_minor: i64,
        /// Sum of per-item collected totals
        total_minor: i64,
    },

    /// Entity lookup failure
    #[error("Not found: {0}")]
    NotFound(String),

    /// Export serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}
