use crate::database::Database;
use crate::errors::{EngineError, Result};
use crate::ledger;
use crate::models::{LedgerSumRow, SnapshotRow};
use remittance_core::{AccountRole, CycleStatus, CycleTotals, EntryType};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Net posted amounts per settlement leg, derived from ledger entry sums
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostedAmounts {
    pub custodial_outflow_minor: i64,
    pub investor_payable_minor: i64,
    pub servicer_fee_minor: i64,
}

/// Fold raw per-role debit/credit sums into the three settlement legs.
/// Debits against custodial cash count toward the outflow; credits reverse it.
/// Rows whose role or side does not parse are skipped with a warning rather
/// than silently miscounted.
pub fn fold_entry_sums(sums: &[LedgerSumRow]) -> PostedAmounts {
    let mut posted = PostedAmounts::default();

    for sum in sums {
        let entry_type = match EntryType::parse(&sum.entry_type) {
            Ok(entry_type) => entry_type,
            Err(_) => {
                warn!(entry_type = %sum.entry_type, "unknown entry type in ledger sums");
                continue;
            }
        };
        let signed = match entry_type {
            EntryType::Debit => sum.total_minor,
            EntryType::Credit => -sum.total_minor,
        };

        match AccountRole::parse(&sum.account_role) {
            Ok(AccountRole::CustodialCash) => posted.custodial_outflow_minor += signed,
            Ok(AccountRole::InvestorPayable) => posted.investor_payable_minor -= signed,
            Ok(AccountRole::ServicerFeeIncome) => posted.servicer_fee_minor -= signed,
            Err(_) => {
                warn!(account_role = %sum.account_role, "unknown account role in ledger sums");
            }
        }
    }

    posted
}

/// Differences between what the cycle says is due and what the ledger posted
pub fn diff_against_totals(totals: &CycleTotals, posted: &PostedAmounts) -> (i64, i64, i64) {
    let diff_investor = totals.investor_due_minor - posted.investor_payable_minor;
    let diff_servicer = totals.servicer_fee_minor - posted.servicer_fee_minor;
    let expected_outflow = totals.investor_due_minor + totals.servicer_fee_minor;
    let diff_total = expected_outflow - posted.custodial_outflow_minor;

    (diff_investor, diff_servicer, diff_total)
}

/// Statuses with frozen totals can reconcile; a register run never fails on
/// imbalance, only on a cycle whose totals are still moving.
pub fn check_reconcilable(status: CycleStatus) -> Result<()> {
    match status {
        CycleStatus::Locked | CycleStatus::Settled => Ok(()),
        status => Err(EngineError::Validation(format!(
            "cannot reconcile a cycle in status {}, totals are not final",
            status
        ))),
    }
}

/// Compares a cycle's frozen totals against posted ledger entries and records
/// an append-only snapshot of the differences. A locked cycle that has not
/// settled yet reconciles as fully outstanding and unbalanced.
pub struct ReconciliationService {
    db: Arc<Database>,
}

impl ReconciliationService {
    pub fn new(db: Arc<Database>) -> Self {
        ReconciliationService { db }
    }

    pub async fn reconcile(&self, cycle_id: Uuid, created_by: &str) -> Result<SnapshotRow> {
        let cycle = self
            .db
            .get_cycle(cycle_id)
            .await?
            .ok_or(EngineError::CycleNotFound(cycle_id))?;

        check_reconcilable(cycle.cycle_status()?)?;

        let sums = ledger::cycle_entry_sums(self.db.pool(), cycle_id).await?;
        let posted = fold_entry_sums(&sums);
        let (diff_investor, diff_servicer, diff_total) =
            diff_against_totals(&cycle.totals(), &posted);

        let is_balanced = diff_investor == 0 && diff_servicer == 0 && diff_total == 0;

        if !is_balanced {
            warn!(
                cycle_id = %cycle_id,
                diff_investor_minor = diff_investor,
                diff_servicer_minor = diff_servicer,
                diff_total_minor = diff_total,
                "cycle is out of balance"
            );
        } else {
            info!(cycle_id = %cycle_id, "cycle reconciled, balanced");
        }

        self.db
            .insert_snapshot(
                cycle_id,
                diff_investor,
                diff_servicer,
                diff_total,
                is_balanced,
                created_by,
            )
            .await
    }

    /// Cycles whose latest snapshot is out of balance
    pub async fn unbalanced(&self) -> Result<Vec<SnapshotRow>> {
        self.db.list_unbalanced_snapshots().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum(role: AccountRole, entry: EntryType, total: i64) -> LedgerSumRow {
        LedgerSumRow {
            account_role: role.as_str().to_string(),
            entry_type: entry.as_str().to_string(),
            total_minor: total,
        }
    }

    fn totals(investor_due: i64, servicer_fee: i64) -> CycleTotals {
        CycleTotals {
            total_principal_minor: 0,
            total_interest_minor: 0,
            total_fees_minor: 0,
            servicer_fee_minor: servicer_fee,
            investor_due_minor: investor_due,
        }
    }

    #[test]
    fn test_balanced_posting_has_zero_diffs() {
        let sums = vec![
            sum(AccountRole::CustodialCash, EntryType::Debit, 15_750_000),
            sum(AccountRole::InvestorPayable, EntryType::Credit, 15_296_200),
            sum(AccountRole::ServicerFeeIncome, EntryType::Credit, 453_800),
        ];

        let posted = fold_entry_sums(&sums);
        let diffs = diff_against_totals(&totals(15_296_200, 453_800), &posted);

        assert_eq!(diffs, (0, 0, 0));
    }

    #[test]
    fn test_missing_fee_leg_shows_in_diffs() {
        let sums = vec![
            sum(AccountRole::CustodialCash, EntryType::Debit, 15_750_000),
            sum(AccountRole::InvestorPayable, EntryType::Credit, 15_296_200),
        ];

        let posted = fold_entry_sums(&sums);
        let (diff_investor, diff_servicer, diff_total) =
            diff_against_totals(&totals(15_296_200, 453_800), &posted);

        assert_eq!(diff_investor, 0);
        assert_eq!(diff_servicer, 453_800);
        assert_eq!(diff_total, 0);
    }

    #[test]
    fn test_no_entries_means_everything_outstanding() {
        let posted = fold_entry_sums(&[]);
        let (diff_investor, diff_servicer, diff_total) =
            diff_against_totals(&totals(100_000, 5_000), &posted);

        assert_eq!(diff_investor, 100_000);
        assert_eq!(diff_servicer, 5_000);
        assert_eq!(diff_total, 105_000);
    }

    #[test]
    fn test_reversing_credit_nets_out_of_custodial_outflow() {
        let sums = vec![
            sum(AccountRole::CustodialCash, EntryType::Debit, 105_000),
            sum(AccountRole::CustodialCash, EntryType::Credit, 105_000),
        ];

        let posted = fold_entry_sums(&sums);
        assert_eq!(posted.custodial_outflow_minor, 0);
    }

    #[test]
    fn test_unparseable_rows_are_skipped() {
        let sums = vec![
            LedgerSumRow {
                account_role: "suspense".to_string(),
                entry_type: EntryType::Debit.as_str().to_string(),
                total_minor: 5_000,
            },
            LedgerSumRow {
                account_role: AccountRole::CustodialCash.as_str().to_string(),
                entry_type: "SIDEWAYS".to_string(),
                total_minor: 7_000,
            },
        ];

        assert_eq!(fold_entry_sums(&sums), PostedAmounts::default());
    }

    #[test]
    fn test_locked_and_settled_cycles_reconcile() {
        assert!(check_reconcilable(CycleStatus::Locked).is_ok());
        assert!(check_reconcilable(CycleStatus::Settled).is_ok());
    }

    #[test]
    fn test_unfrozen_cycles_do_not_reconcile() {
        assert!(check_reconcilable(CycleStatus::Open).is_err());
        assert!(check_reconcilable(CycleStatus::Closed).is_err());
    }
}
