use crate::errors::Result;
use crate::models::{
    CollectionRow, ContractRow, CycleRow, ExportRow, ItemRow, SnapshotRow, WaterfallRuleRow,
};
use chrono::{NaiveDate, Utc};
use remittance_core::{
    ContractTerms, CycleStatus, CycleTotals, RemittanceItem, ServicerAdvance, WaterfallRule,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Pool, Postgres, Transaction};
use std::time::Duration;
use uuid::Uuid;

pub struct Database {
    pool: Pool<Postgres>,
}

impl Database {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        Ok(Database { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ---------- Contracts ----------

    /// Insert a contract and its waterfall rules in one transaction
    pub async fn create_contract(
        &self,
        investor_id: Uuid,
        product_code: &str,
        custodial_account_id: Uuid,
        terms: &ContractTerms,
        rules: &[WaterfallRule],
    ) -> Result<(ContractRow, Vec<WaterfallRuleRow>)> {
        let mut tx = self.pool.begin().await?;

        let contract = sqlx::query_as::<_, ContractRow>(
            r#"
            INSERT INTO investor_contract (
                id, investor_id, product_code, method, remittance_days,
                cutoff_day, custodial_account_id, servicer_fee_bps,
                late_fee_split_bps, active, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, TRUE, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(investor_id)
        .bind(product_code)
        .bind(terms.method.as_str())
        .bind(terms.remittance_days as i32)
        .bind(terms.cutoff_day as i32)
        .bind(custodial_account_id)
        .bind(terms.servicer_fee_bps)
        .bind(terms.late_fee_split_bps)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        let mut rule_rows = Vec::with_capacity(rules.len());
        for rule in rules {
            let row = sqlx::query_as::<_, WaterfallRuleRow>(
                r#"
                INSERT INTO investor_waterfall_rule (id, contract_id, rank, bucket, cap_minor)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(contract.id)
            .bind(rule.rank)
            .bind(rule.bucket.as_str())
            .bind(rule.cap_minor)
            .fetch_one(&mut *tx)
            .await?;
            rule_rows.push(row);
        }

        tx.commit().await?;
        Ok((contract, rule_rows))
    }

    pub async fn get_contract(&self, contract_id: Uuid) -> Result<Option<ContractRow>> {
        let contract = sqlx::query_as::<_, ContractRow>(
            "SELECT * FROM investor_contract WHERE id = $1",
        )
        .bind(contract_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(contract)
    }

    pub async fn get_rules(&self, contract_id: Uuid) -> Result<Vec<WaterfallRuleRow>> {
        let rules = sqlx::query_as::<_, WaterfallRuleRow>(
            r#"
            SELECT * FROM investor_waterfall_rule
            WHERE contract_id = $1
            ORDER BY rank
            "#,
        )
        .bind(contract_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rules)
    }

    pub async fn list_active_contracts(&self) -> Result<Vec<ContractRow>> {
        let contracts = sqlx::query_as::<_, ContractRow>(
            r#"
            SELECT * FROM investor_contract
            WHERE active = TRUE
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(contracts)
    }

    // ---------- Cycles ----------

    /// Create a cycle for a period, idempotently.
    ///
    /// The `(contract_id, period_start, period_end)` partial unique index is
    /// the natural idempotency key: a concurrent or repeated call lands on
    /// `ON CONFLICT DO NOTHING` and the existing row is returned instead.
    pub async fn create_cycle(
        &self,
        contract_id: Uuid,
        period_start: NaiveDate,
        period_end: NaiveDate,
        settlement_date: NaiveDate,
    ) -> Result<CycleRow> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO remittance_cycle (
                id, contract_id, period_start, period_end, settlement_date,
                status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, 'open', $6, $6)
            ON CONFLICT (contract_id, period_start, period_end)
                WHERE status != 'settled'
                DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(contract_id)
        .bind(period_start)
        .bind(period_end)
        .bind(settlement_date)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let cycle = sqlx::query_as::<_, CycleRow>(
            r#"
            SELECT * FROM remittance_cycle
            WHERE contract_id = $1 AND period_start = $2 AND period_end = $3
              AND status != 'settled'
            "#,
        )
        .bind(contract_id)
        .bind(period_start)
        .bind(period_end)
        .fetch_one(&self.pool)
        .await?;

        Ok(cycle)
    }

    pub async fn get_cycle(&self, cycle_id: Uuid) -> Result<Option<CycleRow>> {
        let cycle =
            sqlx::query_as::<_, CycleRow>("SELECT * FROM remittance_cycle WHERE id = $1")
                .bind(cycle_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(cycle)
    }

    /// The contract's most recent cycle; gates next-period creation
    pub async fn latest_cycle(&self, contract_id: Uuid) -> Result<Option<CycleRow>> {
        let cycle = sqlx::query_as::<_, CycleRow>(
            r#"
            SELECT * FROM remittance_cycle
            WHERE contract_id = $1
            ORDER BY period_end DESC, created_at DESC
            LIMIT 1
            "#,
        )
        .bind(contract_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(cycle)
    }

    /// Open cycles whose period has ended, ready to close
    pub async fn open_cycles_past_period_end(
        &self,
        contract_id: Uuid,
        today: NaiveDate,
    ) -> Result<Vec<CycleRow>> {
        let cycles = sqlx::query_as::<_, CycleRow>(
            r#"
            SELECT * FROM remittance_cycle
            WHERE contract_id = $1 AND status = 'open' AND period_end < $2
            ORDER BY period_end
            "#,
        )
        .bind(contract_id)
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        Ok(cycles)
    }

    /// Locked cycles whose settlement date has arrived
    pub async fn locked_cycles_due(
        &self,
        contract_id: Uuid,
        today: NaiveDate,
    ) -> Result<Vec<CycleRow>> {
        let cycles = sqlx::query_as::<_, CycleRow>(
            r#"
            SELECT * FROM remittance_cycle
            WHERE contract_id = $1 AND status = 'locked' AND settlement_date <= $2
            ORDER BY settlement_date
            "#,
        )
        .bind(contract_id)
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        Ok(cycles)
    }

    /// Advance a cycle's status, guarded by the expected current status.
    /// Returns false when the row was not in `from` (lost race or stale view).
    pub async fn transition_cycle(
        &self,
        cycle_id: Uuid,
        from: CycleStatus,
        to: CycleStatus,
    ) -> Result<bool> {
        from.validate_transition(to)?;

        let result = sqlx::query(
            r#"
            UPDATE remittance_cycle
            SET status = $1, updated_at = $2
            WHERE id = $3 AND status = $4
            "#,
        )
        .bind(to.as_str())
        .bind(Utc::now())
        .bind(cycle_id)
        .bind(from.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Persist a calculation result: totals, items, and advances replace any
    /// prior result for the cycle in one transaction, so recalculation is
    /// idempotent.
    pub async fn save_cycle_results(
        &self,
        cycle_id: Uuid,
        totals: &CycleTotals,
        items: &[RemittanceItem],
        advances: &[ServicerAdvance],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE remittance_cycle
            SET total_principal_minor = $1,
                total_interest_minor = $2,
                total_fees_minor = $3,
                servicer_fee_minor = $4,
                investor_due_minor = $5,
                updated_at = $6
            WHERE id = $7
            "#,
        )
        .bind(totals.total_principal_minor)
        .bind(totals.total_interest_minor)
        .bind(totals.total_fees_minor)
        .bind(totals.servicer_fee_minor)
        .bind(totals.investor_due_minor)
        .bind(Utc::now())
        .bind(cycle_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM remittance_item WHERE cycle_id = $1")
            .bind(cycle_id)
            .execute(&mut *tx)
            .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO remittance_item (
                    id, cycle_id, loan_id, principal_minor, interest_minor,
                    fees_minor, investor_share_minor, servicer_fee_minor
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(cycle_id)
            .bind(&item.loan_id)
            .bind(item.principal_minor)
            .bind(item.interest_minor)
            .bind(item.fees_minor)
            .bind(item.investor_share_minor)
            .bind(item.servicer_fee_minor)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM servicer_advance WHERE cycle_id = $1")
            .bind(cycle_id)
            .execute(&mut *tx)
            .await?;

        for advance in advances {
            sqlx::query(
                r#"
                INSERT INTO servicer_advance (id, cycle_id, loan_id, amount_minor, outstanding)
                VALUES ($1, $2, $3, $4, TRUE)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(cycle_id)
            .bind(&advance.loan_id)
            .bind(advance.amount_minor)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_items(&self, cycle_id: Uuid) -> Result<Vec<ItemRow>> {
        let items = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT * FROM remittance_item
            WHERE cycle_id = $1
            ORDER BY loan_id
            "#,
        )
        .bind(cycle_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    // ---------- Collections ----------

    /// Per-loan collection aggregates for a contract's period `(start, end]`
    pub async fn collections_for_period(
        &self,
        contract_id: Uuid,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<Vec<CollectionRow>> {
        let rows = sqlx::query_as::<_, CollectionRow>(
            r#"
            SELECT
                loan_id,
                COALESCE(SUM(scheduled_principal_minor), 0)::BIGINT AS scheduled_principal_minor,
                COALESCE(SUM(scheduled_interest_minor), 0)::BIGINT AS scheduled_interest_minor,
                COALESCE(SUM(principal_minor), 0)::BIGINT AS principal_minor,
                COALESCE(SUM(interest_minor), 0)::BIGINT AS interest_minor,
                COALESCE(SUM(fees_minor), 0)::BIGINT AS fees_minor,
                COALESCE(SUM(escrow_minor), 0)::BIGINT AS escrow_minor,
                COALESCE(SUM(recoveries_minor), 0)::BIGINT AS recoveries_minor
            FROM loan_collection
            WHERE contract_id = $1 AND received_date > $2 AND received_date <= $3
            GROUP BY loan_id
            ORDER BY loan_id
            "#,
        )
        .bind(contract_id)
        .bind(period_start)
        .bind(period_end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // ---------- Settlement transaction helpers ----------

    /// Row-lock a cycle inside a caller-owned transaction. The settlement
    /// precondition check and status transition must see a consistent row.
    pub async fn lock_cycle(
        tx: &mut Transaction<'_, Postgres>,
        cycle_id: Uuid,
    ) -> Result<Option<CycleRow>> {
        let cycle = sqlx::query_as::<_, CycleRow>(
            "SELECT * FROM remittance_cycle WHERE id = $1 FOR UPDATE",
        )
        .bind(cycle_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(cycle)
    }

    /// Transition a row-locked cycle within the caller's transaction
    pub async fn transition_cycle_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        cycle_id: Uuid,
        from: CycleStatus,
        to: CycleStatus,
    ) -> Result<bool> {
        from.validate_transition(to)?;

        let result = sqlx::query(
            r#"
            UPDATE remittance_cycle
            SET status = $1, updated_at = $2
            WHERE id = $3 AND status = $4
            "#,
        )
        .bind(to.as_str())
        .bind(Utc::now())
        .bind(cycle_id)
        .bind(from.as_str())
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // ---------- Exports ----------

    pub async fn save_export(
        &self,
        cycle_id: Uuid,
        format: &str,
        content: &[u8],
        content_hash: &str,
    ) -> Result<ExportRow> {
        let export = sqlx::query_as::<_, ExportRow>(
            r#"
            INSERT INTO remittance_export (id, cycle_id, format, content, content_hash, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(cycle_id)
        .bind(format)
        .bind(content)
        .bind(content_hash)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(export)
    }

    pub async fn get_export(&self, export_id: Uuid) -> Result<Option<ExportRow>> {
        let export =
            sqlx::query_as::<_, ExportRow>("SELECT * FROM remittance_export WHERE id = $1")
                .bind(export_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(export)
    }

    // ---------- Reconciliation snapshots ----------

    /// Append a snapshot; prior snapshots are never mutated
    pub async fn insert_snapshot(
        &self,
        cycle_id: Uuid,
        diff_investor_minor: i64,
        diff_servicer_minor: i64,
        diff_total_minor: i64,
        is_balanced: bool,
        created_by: &str,
    ) -> Result<SnapshotRow> {
        let snapshot = sqlx::query_as::<_, SnapshotRow>(
            r#"
            INSERT INTO remittance_recon_snapshot (
                id, cycle_id, diff_investor_minor, diff_servicer_minor,
                diff_total_minor, is_balanced, created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(cycle_id)
        .bind(diff_investor_minor)
        .bind(diff_servicer_minor)
        .bind(diff_total_minor)
        .bind(is_balanced)
        .bind(created_by)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(snapshot)
    }

    /// Cycles whose most recent snapshot is unbalanced, for manual review
    pub async fn list_unbalanced_snapshots(&self) -> Result<Vec<SnapshotRow>> {
        let snapshots = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT * FROM (
                SELECT DISTINCT ON (cycle_id) *
                FROM remittance_recon_snapshot
                ORDER BY cycle_id, created_at DESC
            ) latest
            WHERE latest.is_balanced = FALSE
            ORDER BY latest.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(snapshots)
    }
}
