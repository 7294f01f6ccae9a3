//! Core types for investor remittance
//!
//! All monetary fields are integer minor units (cents). Basis points are
//! whole integers on a 10,000 scale.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One basis point scale: 10,000 bps == 100%
pub const BPS_SCALE: i64 = 10_000;

/// Maximum day-of-month a contract cutoff may name
pub const MAX_CUTOFF_DAY: u32 = 31;

/// Remittance method governing what the investor is owed each cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemittanceMethod {
    /// Investor receives full scheduled P+I; collection shortfalls become
    /// servicer advances
    ScheduledPI,
    /// Investor receives exactly the cash collected, allocated by the
    /// contract's ranked waterfall rules
    ActualCash,
    /// Scheduled principal, but interest net of any collection shortfall
    ScheduledPIWithInterestShortfall,
}

impl RemittanceMethod {
    /// Stable wire/storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            RemittanceMethod::ScheduledPI => "scheduled_p_i",
            RemittanceMethod::ActualCash => "actual_cash",
            RemittanceMethod::ScheduledPIWithInterestShortfall => {
                "scheduled_p_i_with_interest_shortfall"
            }
        }
    }

    /// Parse from storage name
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "scheduled_p_i" => Ok(RemittanceMethod::ScheduledPI),
            "actual_cash" => Ok(RemittanceMethod::ActualCash),
            "scheduled_p_i_with_interest_shortfall" => {
                Ok(RemittanceMethod::ScheduledPIWithInterestShortfall)
            }
            other => Err(Error::Validation(format!(
                "Unknown remittance method: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for RemittanceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Allocation bucket named by a waterfall rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaterfallBucket {
    /// Collected interest
    Interest,
    /// Collected principal
    Principal,
    /// Collected late fees
    LateFees,
    /// Escrow collections (retained in the custodial escrow sub-account)
    Escrow,
    /// Principal recoveries on liquidated loans
    Recoveries,
}

impl WaterfallBucket {
    /// Stable wire/storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            WaterfallBucket::Interest => "interest",
            WaterfallBucket::Principal => "principal",
            WaterfallBucket::LateFees => "late_fees",
            WaterfallBucket::Escrow => "escrow",
            WaterfallBucket::Recoveries => "recoveries",
        }
    }

    /// Parse from storage name
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "interest" => Ok(WaterfallBucket::Interest),
            "principal" => Ok(WaterfallBucket::Principal),
            "late_fees" => Ok(WaterfallBucket::LateFees),
            "escrow" => Ok(WaterfallBucket::Escrow),
            "recoveries" => Ok(WaterfallBucket::Recoveries),
            other => Err(Error::Validation(format!(
                "Unknown waterfall bucket: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for WaterfallBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Remittance cycle lifecycle
///
/// Transitions are forward-only and single-step:
/// `Open -> Closed -> Locked -> Settled`. `Settled` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    /// Collecting; period not yet ended
    Open,
    /// Period ended, awaiting calculation
    Closed,
    /// Totals calculated and frozen, awaiting settlement
    Locked,
    /// Ledger entries posted; terminal
    Settled,
}

impl CycleStatus {
    /// The only status this one may advance to, if any
    pub fn successor(&self) -> Option<CycleStatus> {
        match self {
            CycleStatus::Open => Some(CycleStatus::Closed),
            CycleStatus::Closed => Some(CycleStatus::Locked),
            CycleStatus::Locked => Some(CycleStatus::Settled),
            CycleStatus::Settled => None,
        }
    }

    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, CycleStatus::Settled)
    }

    /// Validate a requested transition, leaving state decisions to the caller
    pub fn validate_transition(&self, to: CycleStatus) -> Result<()> {
        if self.successor() == Some(to) {
            Ok(())
        } else {
            Err(Error::InvalidTransition { from: *self, to })
        }
    }

    /// Stable wire/storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleStatus::Open => "open",
            CycleStatus::Closed => "closed",
            CycleStatus::Locked => "locked",
            CycleStatus::Settled => "settled",
        }
    }

    /// Parse from storage name
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "open" => Ok(CycleStatus::Open),
            "closed" => Ok(CycleStatus::Closed),
            "locked" => Ok(CycleStatus::Locked),
            "settled" => Ok(CycleStatus::Settled),
            other => Err(Error::Validation(format!("Unknown cycle status: {}", other))),
        }
    }
}

impl fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One ranked allocation rule of a contract's waterfall
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaterfallRule {
    /// Priority order; ascending rank is paid first
    pub rank: i32,

    /// Bucket this rank allocates into
    pub bucket: WaterfallBucket,

    /// Optional allocation ceiling in minor units
    pub cap_minor: Option<i64>,
}

/// Fee and schedule terms of an investor contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractTerms {
    /// Remittance method
    pub method: RemittanceMethod,

    /// Servicer fee in basis points of total collections (0-10000)
    pub servicer_fee_bps: i32,

    /// Servicer share of late fees in basis points (0-10000)
    pub late_fee_split_bps: i32,

    /// Day of month the collection period cuts off (1-31, clamped to month end)
    pub cutoff_day: u32,

    /// Business days after period end when settlement is due
    pub remittance_days: u32,
}

impl ContractTerms {
    /// Validate bps ranges and the cutoff day
    pub fn validate(&self) -> Result<()> {
        validate_bps("servicer_fee_bps", self.servicer_fee_bps)?;
        validate_bps("late_fee_split_bps", self.late_fee_split_bps)?;

        if self.cutoff_day == 0 || self.cutoff_day > MAX_CUTOFF_DAY {
            return Err(Error::Validation(format!(
                "cutoff_day must be 1-{}, got {}",
                MAX_CUTOFF_DAY, self.cutoff_day
            )));
        }

        Ok(())
    }
}

/// Validate a basis-point field is within 0-10000
pub fn validate_bps(field: &str, bps: i32) -> Result<()> {
    if !(0..=BPS_SCALE as i32).contains(&bps) {
        return Err(Error::Validation(format!(
            "{} must be 0-{}, got {}",
            field, BPS_SCALE, bps
        )));
    }
    Ok(())
}

/// Validate a contract's rule set: ranks must be unique
pub fn validate_rules(rules: &[WaterfallRule]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for rule in rules {
        if !seen.insert(rule.rank) {
            return Err(Error::Validation(format!(
                "Duplicate waterfall rank: {}",
                rule.rank
            )));
        }
        if let Some(cap) = rule.cap_minor {
            if cap < 0 {
                return Err(Error::Validation(format!(
                    "cap_minor must be non-negative, got {} at rank {}",
                    cap, rule.rank
                )));
            }
        }
    }
    Ok(())
}

/// Per-loan collection input for one cycle, all minor units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanCollection {
    /// Servicing loan identifier; exports order ascending by this
    pub loan_id: String,

    /// Contractual scheduled principal for the period
    pub scheduled_principal_minor: i64,

    /// Contractual scheduled interest for the period
    pub scheduled_interest_minor: i64,

    /// Principal actually collected
    pub principal_minor: i64,

    /// Interest actually collected
    pub interest_minor: i64,

    /// Late fees actually collected
    pub fees_minor: i64,

    /// Escrow actually collected
    pub escrow_minor: i64,

    /// Principal recoveries collected
    pub recoveries_minor: i64,
}

impl LoanCollection {
    /// Total cash actually collected across all buckets
    pub fn collected_cash_minor(&self) -> i64 {
        self.principal_minor
            + self.interest_minor
            + self.fees_minor
            + self.escrow_minor
            + self.recoveries_minor
    }
}

/// One remittance row: one loan in one cycle, all minor units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemittanceItem {
    /// Servicing loan identifier
    pub loan_id: String,

    /// Principal remitted
    pub principal_minor: i64,

    /// Interest remitted
    pub interest_minor: i64,

    /// Late fees remitted
    pub fees_minor: i64,

    /// Investor's share of this loan's remittance
    pub investor_share_minor: i64,

    /// Servicer's fee on this loan (base fee plus late-fee share)
    pub servicer_fee_minor: i64,
}

impl RemittanceItem {
    /// Total remitted for this loan
    pub fn total_minor(&self) -> i64 {
        self.principal_minor + self.interest_minor + self.fees_minor
    }

    /// Per-item conservation: investor + servicer must equal the total
    pub fn is_conserved(&self) -> bool {
        self.investor_share_minor + self.servicer_fee_minor == self.total_minor()
    }
}

/// Aggregate totals of a cycle, all minor units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleTotals {
    /// Sum of item principal
    pub total_principal_minor: i64,

    /// Sum of item interest
    pub total_interest_minor: i64,

    /// Sum of item fees
    pub total_fees_minor: i64,

    /// Sum of item servicer fees
    pub servicer_fee_minor: i64,

    /// Sum of item investor shares
    pub investor_due_minor: i64,
}

impl CycleTotals {
    /// Total cash the cycle remits
    pub fn total_collected_minor(&self) -> i64 {
        self.total_principal_minor + self.total_interest_minor + self.total_fees_minor
    }
}

/// A recoverable servicer advance created by a scheduled P+I shortfall
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicerAdvance {
    /// Loan the advance covers
    pub loan_id: String,

    /// Advanced amount in minor units
    pub amount_minor: i64,
}

/// Double-entry side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    /// Debit side
    Debit,
    /// Credit side
    Credit,
}

impl EntryType {
    /// Stable wire/storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Debit => "DEBIT",
            EntryType::Credit => "CREDIT",
        }
    }

    /// Parse from storage name
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "DEBIT" => Ok(EntryType::Debit),
            "CREDIT" => Ok(EntryType::Credit),
            other => Err(Error::Validation(format!("Unknown entry type: {}", other))),
        }
    }
}

/// Role an account plays in settlement posting
///
/// The chart of accounts itself belongs to the external ledger; this engine
/// only names the three roles it posts against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    /// Bank account holding collected borrower payments
    CustodialCash,
    /// Liability owed to the investor
    InvestorPayable,
    /// Servicer fee income
    ServicerFeeIncome,
}

impl AccountRole {
    /// Stable wire/storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountRole::CustodialCash => "custodial_cash",
            AccountRole::InvestorPayable => "investor_payable",
            AccountRole::ServicerFeeIncome => "servicer_fee_income",
        }
    }

    /// Parse from storage name
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "custodial_cash" => Ok(AccountRole::CustodialCash),
            "investor_payable" => Ok(AccountRole::InvestorPayable),
            "servicer_fee_income" => Ok(AccountRole::ServicerFeeIncome),
            other => Err(Error::Validation(format!("Unknown account role: {}", other))),
        }
    }
}

impl fmt::Display for AccountRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
