//! Waterfall computation
//!
//! Turns per-loan collections into investor/servicer splits for one cycle.
//! Pure: no I/O, no clock, deterministic for a given input.
//!
//! Per loan, for every method:
//!
//! ```text
//! total        = principal + interest + fees
//! servicerFee  = round_half_up(total * servicer_fee_bps / 10000)
//!              + round_half_up(fees  * late_fee_split_bps / 10000)
//! investor     = total - servicerFee
//! ```
//!
//! Rounding happens per loan at the cent boundary so drift cannot accumulate
//! across the aggregate. The calculator re-checks conservation over the summed
//! items before returning and fails with [`Error::WaterfallImbalance`] if the
//! identity does not hold.

use crate::error::{Error, Result};
use crate::types::{
    CycleTotals, LoanCollection, RemittanceItem, RemittanceMethod, ServicerAdvance,
    WaterfallBucket, WaterfallRule, BPS_SCALE,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Result of a waterfall computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaterfallResult {
    /// One item per loan, same order as the input collections
    pub items: Vec<RemittanceItem>,

    /// Aggregate cycle totals
    pub totals: CycleTotals,

    /// Servicer advances created by scheduled P+I shortfalls
    /// (empty for methods that do not advance)
    pub advances: Vec<ServicerAdvance>,
}

/// Compute the investor/servicer split for one cycle's collections.
///
/// `rules` drive allocation for [`RemittanceMethod::ActualCash`] only; the
/// scheduled methods remit contractual amounts regardless of rank order.
/// An empty rule set for `actual_cash` falls back to the standard rank order
/// (interest, principal, late fees, escrow, recoveries) with no caps.
pub fn compute_waterfall(
    method: RemittanceMethod,
    collections: &[LoanCollection],
    rules: &[WaterfallRule],
    servicer_fee_bps: i32,
    late_fee_split_bps: i32,
) -> Result<WaterfallResult> {
    crate::types::validate_bps("servicer_fee_bps", servicer_fee_bps)?;
    crate::types::validate_bps("late_fee_split_bps", late_fee_split_bps)?;
    crate::types::validate_rules(rules)?;

    let mut ranked = rules.to_vec();
    ranked.sort_by_key(|r| r.rank);

    let mut items = Vec::with_capacity(collections.len());
    let mut advances = Vec::new();
    let mut totals = CycleTotals::default();

    for loan in collections {
        validate_collection(loan)?;

        let remitted = match method {
            RemittanceMethod::ScheduledPI => {
                let shortfall = (loan.scheduled_principal_minor + loan.scheduled_interest_minor)
                    - (loan.principal_minor + loan.interest_minor);
                if shortfall > 0 {
                    advances.push(ServicerAdvance {
                        loan_id: loan.loan_id.clone(),
                        amount_minor: shortfall,
                    });
                }
                RemittedAmounts {
                    principal_minor: loan.scheduled_principal_minor,
                    interest_minor: loan.scheduled_interest_minor,
                    fees_minor: loan.fees_minor,
                }
            }
            RemittanceMethod::ActualCash => allocate_actual_cash(loan, &ranked),
            RemittanceMethod::ScheduledPIWithInterestShortfall => RemittedAmounts {
                principal_minor: loan.scheduled_principal_minor,
                // Investor absorbs interest-rate risk: remit scheduled
                // interest net of the collection shortfall, no advance
                interest_minor: loan.interest_minor.min(loan.scheduled_interest_minor),
                fees_minor: loan.fees_minor,
            },
        };

        let total_minor =
            remitted.principal_minor + remitted.interest_minor + remitted.fees_minor;
        let base_fee = bps_share(total_minor, servicer_fee_bps)?;
        let late_fee_share = bps_share(remitted.fees_minor, late_fee_split_bps)?;
        let servicer_fee_minor = base_fee + late_fee_share;
        let investor_share_minor = total_minor - servicer_fee_minor;

        let item = RemittanceItem {
            loan_id: loan.loan_id.clone(),
            principal_minor: remitted.principal_minor,
            interest_minor: remitted.interest_minor,
            fees_minor: remitted.fees_minor,
            investor_share_minor,
            servicer_fee_minor,
        };

        totals.total_principal_minor += item.principal_minor;
        totals.total_interest_minor += item.interest_minor;
        totals.total_fees_minor += item.fees_minor;
        totals.servicer_fee_minor += item.servicer_fee_minor;
        totals.investor_due_minor += item.investor_share_minor;

        items.push(item);
    }

    assert_conservation(&totals)?;

    Ok(WaterfallResult {
        items,
        totals,
        advances,
    })
}

/// Remitted principal/interest/fees for one loan before the fee split
struct RemittedAmounts {
    principal_minor: i64,
    interest_minor: i64,
    fees_minor: i64,
}

/// Allocate a loan's actually-collected cash in rank order.
///
/// The lowest rank is filled first, up to its `cap_minor` (or the full
/// collected amount of its bucket if uncapped), before any cash flows to the
/// next rank. Recoveries remit as principal; escrow allocations are retained
/// custodially and never enter the remitted totals.
fn allocate_actual_cash(loan: &LoanCollection, ranked_rules: &[WaterfallRule]) -> RemittedAmounts {
    let default_order;
    let rules: &[WaterfallRule] = if ranked_rules.is_empty() {
        default_order = standard_rank_order();
        &default_order
    } else {
        ranked_rules
    };

    let mut pool = loan.collected_cash_minor();
    let mut remitted = RemittedAmounts {
        principal_minor: 0,
        interest_minor: 0,
        fees_minor: 0,
    };

    for rule in rules {
        if pool == 0 {
            break;
        }

        let collected = match rule.bucket {
            WaterfallBucket::Interest => loan.interest_minor,
            WaterfallBucket::Principal => loan.principal_minor,
            WaterfallBucket::LateFees => loan.fees_minor,
            WaterfallBucket::Escrow => loan.escrow_minor,
            WaterfallBucket::Recoveries => loan.recoveries_minor,
        };

        let mut allocation = collected.min(pool);
        if let Some(cap) = rule.cap_minor {
            allocation = allocation.min(cap);
        }
        pool -= allocation;

        match rule.bucket {
            WaterfallBucket::Interest => remitted.interest_minor += allocation,
            WaterfallBucket::Principal | WaterfallBucket::Recoveries => {
                remitted.principal_minor += allocation
            }
            WaterfallBucket::LateFees => remitted.fees_minor += allocation,
            // Retained in the custodial escrow sub-account
            WaterfallBucket::Escrow => {}
        }
    }

    remitted
}

fn standard_rank_order() -> Vec<WaterfallRule> {
    [
        WaterfallBucket::Interest,
        WaterfallBucket::Principal,
        WaterfallBucket::LateFees,
        WaterfallBucket::Escrow,
        WaterfallBucket::Recoveries,
    ]
    .into_iter()
    .enumerate()
    .map(|(i, bucket)| WaterfallRule {
        rank: i as i32 + 1,
        bucket,
        cap_minor: None,
    })
    .collect()
}

/// Basis-point share of a minor-unit amount, rounded half-up at the cent.
///
/// The multiplication runs in `Decimal`; binary floats never touch money.
fn bps_share(amount_minor: i64, bps: i32) -> Result<i64> {
    let share = Decimal::from(amount_minor) * Decimal::from(bps) / Decimal::from(BPS_SCALE);
    share
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| {
            Error::Validation(format!(
                "bps share overflow: {} * {} bps",
                amount_minor, bps
            ))
        })
}

fn validate_collection(loan: &LoanCollection) -> Result<()> {
    let fields = [
        ("scheduled_principal_minor", loan.scheduled_principal_minor),
        ("scheduled_interest_minor", loan.scheduled_interest_minor),
        ("principal_minor", loan.principal_minor),
        ("interest_minor", loan.interest_minor),
        ("fees_minor", loan.fees_minor),
        ("escrow_minor", loan.escrow_minor),
        ("recoveries_minor", loan.recoveries_minor),
    ];
    for (name, value) in fields {
        if value < 0 {
            return Err(Error::Validation(format!(
                "loan {}: {} must be non-negative, got {}",
                loan.loan_id, name, value
            )));
        }
    }
    Ok(())
}

/// Mandatory sanity check: ΣinvestorShare + ΣservicerFee == Σtotal.
///
/// Cannot fail given the per-loan construction, but an imbalance here means
/// money was created or destroyed and must halt the cycle.
fn assert_conservation(totals: &CycleTotals) -> Result<()> {
    let total = totals.total_collected_minor();
    if totals.investor_due_minor + totals.servicer_fee_minor != total {
        return Err(Error::WaterfallImbalance {
            investor_minor: totals.investor_due_minor,
            servicer_minor: totals.servicer_fee_minor,
            total_minor: total,
        });
    }
    Ok(())
}
