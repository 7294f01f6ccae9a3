use crate::config::LedgerConfig;
use crate::errors::{EngineError, Result};
use crate::models::LedgerSumRow;
use chrono::Utc;
use remittance_core::{AccountRole, CycleTotals, EntryType};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// A ledger entry ready to post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub account_id: Uuid,
    pub account_role: AccountRole,
    pub entry_type: EntryType,
    pub amount_minor: i64,
}

/// Build the balanced entry set that settles a cycle.
///
/// One debit against custodial cash for everything leaving the custodial
/// account, offset by a credit to the investor payable for the remittance due
/// and a credit to servicer fee income for the retained fee. Zero-amount legs
/// are dropped rather than posted.
pub fn build_settlement_entries(totals: &CycleTotals, ledger: &LedgerConfig) -> Vec<NewEntry> {
    let outflow_minor = totals.investor_due_minor + totals.servicer_fee_minor;

    let candidates = [
        NewEntry {
            account_id: ledger.custodial_cash_account_id,
            account_role: AccountRole::CustodialCash,
            entry_type: EntryType::Debit,
            amount_minor: outflow_minor,
        },
        NewEntry {
            account_id: ledger.investor_payable_account_id,
            account_role: AccountRole::InvestorPayable,
            entry_type: EntryType::Credit,
            amount_minor: totals.investor_due_minor,
        },
        NewEntry {
            account_id: ledger.servicer_fee_income_account_id,
            account_role: AccountRole::ServicerFeeIncome,
            entry_type: EntryType::Credit,
            amount_minor: totals.servicer_fee_minor,
        },
    ];

    candidates
        .into_iter()
        .filter(|e| e.amount_minor != 0)
        .collect()
}

/// Debits must equal credits before anything touches the database
pub fn check_balanced(entries: &[NewEntry]) -> Result<()> {
    let debits: i64 = entries
        .iter()
        .filter(|e| e.entry_type == EntryType::Debit)
        .map(|e| e.amount_minor)
        .sum();
    let credits: i64 = entries
        .iter()
        .filter(|e| e.entry_type == EntryType::Credit)
        .map(|e| e.amount_minor)
        .sum();

    if debits != credits {
        return Err(EngineError::SettlementPosting(format!(
            "unbalanced entry set: debits {} != credits {}",
            debits, credits
        )));
    }
    if entries.iter().any(|e| e.amount_minor < 0) {
        return Err(EngineError::SettlementPosting(
            "negative entry amount".to_string(),
        ));
    }

    Ok(())
}

/// Insert entries within the caller's settlement transaction
pub async fn post_entries(
    tx: &mut Transaction<'_, Postgres>,
    cycle_id: Uuid,
    entries: &[NewEntry],
    posted_by: &str,
) -> Result<()> {
    let now = Utc::now();
    for entry in entries {
        sqlx::query(
            r#"
            INSERT INTO ledger_entry (
                id, cycle_id, account_id, account_role, entry_type,
                amount_minor, posted_by, posted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(cycle_id)
        .bind(entry.account_id)
        .bind(entry.account_role.as_str())
        .bind(entry.entry_type.as_str())
        .bind(entry.amount_minor)
        .bind(posted_by)
        .bind(now)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

/// Whether any entries have already been posted for a cycle
pub async fn has_entries(tx: &mut Transaction<'_, Postgres>, cycle_id: Uuid) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM ledger_entry WHERE cycle_id = $1")
            .bind(cycle_id)
            .fetch_one(&mut **tx)
            .await?;

    Ok(count > 0)
}

/// Per-role debit/credit sums for a cycle's posted entries
pub async fn cycle_entry_sums(pool: &PgPool, cycle_id: Uuid) -> Result<Vec<LedgerSumRow>> {
    let sums = sqlx::query_as::<_, LedgerSumRow>(
        r#"
        SELECT account_role, entry_type, COALESCE(SUM(amount_minor), 0)::BIGINT AS total_minor
        FROM ledger_entry
        WHERE cycle_id = $1
        GROUP BY account_role, entry_type
        ORDER BY account_role, entry_type
        "#,
    )
    .bind(cycle_id)
    .fetch_all(pool)
    .await?;

    Ok(sums)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_config() -> LedgerConfig {
        LedgerConfig {
            custodial_cash_account_id: Uuid::from_u128(1),
            investor_payable_account_id: Uuid::from_u128(2),
            servicer_fee_income_account_id: Uuid::from_u128(3),
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
    fn test_settlement_entries_balance() {
        let entries = build_settlement_entries(&totals(15_296_200, 453_800), &ledger_config());

        assert_eq!(entries.len(), 3);
        assert!(check_balanced(&entries).is_ok());

        let debit = &entries[0];
        assert_eq!(debit.entry_type, EntryType::Debit);
        assert_eq!(debit.amount_minor, 15_750_000);
    }

    #[test]
    fn test_zero_legs_dropped() {
        let entries = build_settlement_entries(&totals(100_000, 0), &ledger_config());

        assert_eq!(entries.len(), 2);
        assert!(entries
            .iter()
            .all(|e| e.account_role != AccountRole::ServicerFeeIncome));
        assert!(check_balanced(&entries).is_ok());
    }

    #[test]
    fn test_empty_cycle_posts_nothing() {
        let entries = build_settlement_entries(&totals(0, 0), &ledger_config());
        assert!(entries.is_empty());
        assert!(check_balanced(&entries).is_ok());
    }

    #[test]
    fn test_unbalanced_set_rejected() {
        let mut entries = build_settlement_entries(&totals(100_000, 5_000), &ledger_config());
        entries.pop();
        assert!(check_balanced(&entries).is_err());
    }
}
