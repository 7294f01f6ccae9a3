//! Investor Remittance Core
//!
//! Pure domain logic for aggregating per-loan mortgage collections into
//! investor remittance cycles:
//!
//! 1. **Waterfall**: split collected cash between investor and servicer
//!    according to the contract's remittance method and ranked rules
//! 2. **Periods**: cutoff-day period bounds and business-day settlement dates
//! 3. **State machine**: `open → closed → locked → settled`, forward-only
//! 4. **Exports**: byte-stable CSV/XML artifacts for investor reporting
//!
//! All monetary values are integer minor units (cents). Basis-point
//! intermediates use `rust_decimal::Decimal`; binary floats never touch money.
//!
//! # Example
//!
//! ```
//! use remittance_core::{compute_waterfall, LoanCollection, RemittanceMethod};
//!
//! let loans = vec![LoanCollection {
//!     loan_id: "LN-0001".to_string(),
//!     scheduled_principal_minor: 50_000,
//!     scheduled_interest_minor: 10_000,
//!     principal_minor: 50_000,
//!     interest_minor: 10_000,
//!     fees_minor: 2_500,
//!     escrow_minor: 0,
//!     recoveries_minor: 0,
//! }];
//!
//! let result = compute_waterfall(RemittanceMethod::ActualCash, &loans, &[], 50, 5000).unwrap();
//! assert_eq!(
//!     result.totals.investor_due_minor + result.totals.servicer_fee_minor,
//!     result.totals.total_collected_minor(),
//! );
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, missing_debug_implementations, clippy::all)]

pub mod error;
pub mod export;
pub mod period;
pub mod types;
pub mod waterfall;

// Re-exports
pub use error::{Error, Result};
pub use export::{content_hash, generate_export, sniff_content_type, CycleExport, ExportFormat};
pub use period::{active_period, cutoff_date, settlement_date, Period};
pub use types::*;
pub use waterfall::{compute_waterfall, WaterfallResult};
