use crate::database::Database;
use crate::errors::{EngineError, Result};
use crate::models::{ContractRow, CycleRow, ItemRow};
use crate::settlement::SettlementPoster;
use chrono::{NaiveDate, Utc};
use remittance_core::{compute_waterfall, period, CycleStatus};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Source of "today" for period math. Injected so cycle progression is
/// testable at month boundaries.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Drives cycles through open -> closed -> locked -> settled.
///
/// Each pass walks the active contracts independently; one contract's failure
/// is logged and skipped so the rest still progress.
pub struct CycleScheduler {
    db: Arc<Database>,
    poster: Arc<SettlementPoster>,
    clock: Arc<dyn Clock>,
}

impl CycleScheduler {
    pub fn new(db: Arc<Database>, poster: Arc<SettlementPoster>, clock: Arc<dyn Clock>) -> Self {
        CycleScheduler { db, poster, clock }
    }

    pub async fn run(self: Arc<Self>, interval_secs: u64) {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        info!(interval_secs, "cycle scheduler started");

        loop {
            interval.tick().await;
            let today = self.clock.today();
            if let Err(e) = self.run_once(today).await {
                error!("scheduler pass failed: {}", e);
            }
        }
    }

    /// One full progression pass over all active contracts
    pub async fn run_once(&self, today: NaiveDate) -> Result<()> {
        let contracts = self.db.list_active_contracts().await?;

        for contract in contracts {
            if let Err(e) = self.progress_contract(&contract, today).await {
                warn!(
                    contract_id = %contract.id,
                    "contract progression failed: {}", e
                );
            }
        }

        Ok(())
    }

    async fn progress_contract(&self, contract: &ContractRow, today: NaiveDate) -> Result<()> {
        let latest = self.db.latest_cycle(contract.id).await?;
        if can_open_next_cycle(latest.as_ref())? {
            self.ensure_current_cycle(contract, today).await?;
        }

        for cycle in self
            .db
            .open_cycles_past_period_end(contract.id, today)
            .await?
        {
            self.close_cycle(cycle.id).await?;
            self.lock_cycle(cycle.id).await?;
        }

        for cycle in self.db.locked_cycles_due(contract.id, today).await? {
            self.poster.settle(cycle.id, "scheduler").await?;
        }

        Ok(())
    }

    /// Open the cycle covering the contract's current collection period.
    /// Idempotent: an existing non-settled cycle for the period is returned.
    pub async fn ensure_current_cycle(
        &self,
        contract: &ContractRow,
        today: NaiveDate,
    ) -> Result<CycleRow> {
        let terms = contract.terms()?;
        let active = period::active_period(terms.cutoff_day, today);
        let settle_on = period::settlement_date(active.end, terms.remittance_days);

        let cycle = self
            .db
            .create_cycle(contract.id, active.start, active.end, settle_on)
            .await?;

        Ok(cycle)
    }

    /// Close an open cycle; no further collections are attributed to it
    pub async fn close_cycle(&self, cycle_id: Uuid) -> Result<CycleRow> {
        let cycle = self
            .db
            .get_cycle(cycle_id)
            .await?
            .ok_or(EngineError::CycleNotFound(cycle_id))?;

        let status = cycle.cycle_status()?;
        if status != CycleStatus::Open {
            return Err(EngineError::InvalidTransition {
                from: status,
                to: CycleStatus::Closed,
            });
        }

        let transitioned = self
            .db
            .transition_cycle(cycle_id, CycleStatus::Open, CycleStatus::Closed)
            .await?;
        if !transitioned {
            return Err(EngineError::InvalidTransition {
                from: status,
                to: CycleStatus::Closed,
            });
        }

        info!(cycle_id = %cycle_id, "cycle closed");

        self.db
            .get_cycle(cycle_id)
            .await?
            .ok_or(EngineError::CycleNotFound(cycle_id))
    }

    /// Run the waterfall for a closed cycle and persist the result.
    ///
    /// Calculation does not advance the state machine; `lock_cycle` does.
    /// Recalculating a closed cycle replaces its items wholesale, and a locked
    /// cycle returns its frozen result unchanged, so repeated calls are
    /// idempotent. Open and settled cycles are rejected.
    pub async fn calculate_cycle(&self, cycle_id: Uuid) -> Result<(CycleRow, Vec<ItemRow>)> {
        let cycle = self
            .db
            .get_cycle(cycle_id)
            .await?
            .ok_or(EngineError::CycleNotFound(cycle_id))?;

        match cycle.cycle_status()? {
            CycleStatus::Closed => {}
            CycleStatus::Locked => {
                let items = self.db.get_items(cycle_id).await?;
                return Ok((cycle, items));
            }
            status => {
                return Err(EngineError::InvalidTransition {
                    from: status,
                    to: CycleStatus::Locked,
                });
            }
        }

        let contract = self
            .db
            .get_contract(cycle.contract_id)
            .await?
            .ok_or(EngineError::ContractNotFound(cycle.contract_id))?;
        let terms = contract.terms()?;

        let rules = self
            .db
            .get_rules(contract.id)
            .await?
            .iter()
            .map(|r| r.to_core())
            .collect::<Result<Vec<_>>>()?;

        let collections = self
            .db
            .collections_for_period(contract.id, cycle.period_start, cycle.period_end)
            .await?
            .iter()
            .map(|c| c.to_core())
            .collect::<Vec<_>>();

        let result = compute_waterfall(
            terms.method,
            &collections,
            &rules,
            terms.servicer_fee_bps,
            terms.late_fee_split_bps,
        )?;

        self.db
            .save_cycle_results(cycle_id, &result.totals, &result.items, &result.advances)
            .await?;

        info!(
            cycle_id = %cycle_id,
            loans = result.items.len(),
            advances = result.advances.len(),
            investor_due_minor = result.totals.investor_due_minor,
            "cycle calculated"
        );

        let calculated = self
            .db
            .get_cycle(cycle_id)
            .await?
            .ok_or(EngineError::CycleNotFound(cycle_id))?;
        let items = self.db.get_items(cycle_id).await?;
        Ok((calculated, items))
    }

    /// Freeze a closed cycle's calculated result.
    ///
    /// Runs the calculation first (idempotent) so a lock never freezes stale
    /// or absent totals, then advances closed -> locked.
    pub async fn lock_cycle(&self, cycle_id: Uuid) -> Result<(CycleRow, Vec<ItemRow>)> {
        let (cycle, items) = self.calculate_cycle(cycle_id).await?;

        if cycle.cycle_status()? == CycleStatus::Locked {
            return Ok((cycle, items));
        }

        let transitioned = self
            .db
            .transition_cycle(cycle_id, CycleStatus::Closed, CycleStatus::Locked)
            .await?;
        if !transitioned {
            return Err(EngineError::InvalidTransition {
                from: CycleStatus::Closed,
                to: CycleStatus::Locked,
            });
        }

        info!(cycle_id = %cycle_id, "cycle locked");

        let locked = self
            .db
            .get_cycle(cycle_id)
            .await?
            .ok_or(EngineError::CycleNotFound(cycle_id))?;
        Ok((locked, items))
    }
}

/// Whether the scheduler may open the next period's cycle.
///
/// Creation waits until the contract's most recent cycle has settled (or no
/// cycle exists at all), so an unsettled prior-period cycle never coexists
/// with a fresh open one. The manual initiate endpoint bypasses this gate.
fn can_open_next_cycle(latest: Option<&CycleRow>) -> Result<bool> {
    match latest {
        None => Ok(true),
        Some(cycle) => Ok(cycle.cycle_status()?.is_terminal()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn cycle_with_status(status: &str) -> CycleRow {
        let now = Utc::now();
        CycleRow {
            id: Uuid::from_u128(1),
            contract_id: Uuid::from_u128(2),
            period_start: NaiveDate::from_ymd_opt(2026, 6, 25).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2026, 7, 25).unwrap(),
            settlement_date: NaiveDate::from_ymd_opt(2026, 7, 28).unwrap(),
            status: status.to_string(),
            total_principal_minor: 0,
            total_interest_minor: 0,
            total_fees_minor: 0,
            servicer_fee_minor: 0,
            investor_due_minor: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_first_cycle_opens_without_history() {
        assert!(can_open_next_cycle(None).unwrap());
    }

    #[test]
    fn test_next_cycle_opens_after_settlement() {
        let settled = cycle_with_status("settled");
        assert!(can_open_next_cycle(Some(&settled)).unwrap());
    }

    #[test]
    fn test_unsettled_cycle_blocks_creation() {
        for status in ["open", "closed", "locked"] {
            let cycle = cycle_with_status(status);
            assert!(
                !can_open_next_cycle(Some(&cycle)).unwrap(),
                "a {} cycle must block the next period",
                status
            );
        }
    }

    #[test]
    fn test_unknown_status_propagates_error() {
        let cycle = cycle_with_status("reopened");
        assert!(can_open_next_cycle(Some(&cycle)).is_err());
    }
}
