use crate::config::LedgerConfig;
use crate::database::Database;
use crate::errors::{EngineError, Result};
use crate::ledger;
use crate::models::CycleRow;
use remittance_core::CycleStatus;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Posts balanced ledger entries and marks the cycle settled, atomically.
pub struct SettlementPoster {
    db: Arc<Database>,
    ledger: LedgerConfig,
}

impl SettlementPoster {
    pub fn new(db: Arc<Database>, ledger: LedgerConfig) -> Self {
        SettlementPoster { db, ledger }
    }

    /// Settle a locked cycle.
    ///
    /// The cycle row is locked for the duration of the transaction, so a
    /// concurrent settle sees either the `locked` row (and one of the two
    /// transactions wins the guarded transition) or the already-settled row.
    /// Ledger entries and the status change commit together or not at all.
    pub async fn settle(&self, cycle_id: Uuid, posted_by: &str) -> Result<CycleRow> {
        let mut tx = self.db.pool().begin().await?;

        let cycle = Database::lock_cycle(&mut tx, cycle_id)
            .await?
            .ok_or(EngineError::CycleNotFound(cycle_id))?;

        let status = cycle.cycle_status()?;
        if status != CycleStatus::Locked {
            return Err(EngineError::InvalidTransition {
                from: status,
                to: CycleStatus::Settled,
            });
        }

        if ledger::has_entries(&mut tx, cycle_id).await? {
            // Entries without a settled status means a previous attempt was
            // interrupted mid-transaction, which the commit boundary rules out
            return Err(EngineError::SettlementPosting(format!(
                "cycle {} already has ledger entries",
                cycle_id
            )));
        }

        let entries = ledger::build_settlement_entries(&cycle.totals(), &self.ledger);
        ledger::check_balanced(&entries)?;

        ledger::post_entries(&mut tx, cycle_id, &entries, posted_by).await?;

        let transitioned = Database::transition_cycle_in_tx(
            &mut tx,
            cycle_id,
            CycleStatus::Locked,
            CycleStatus::Settled,
        )
        .await?;
        if !transitioned {
            warn!(cycle_id = %cycle_id, "lost settlement race, rolling back");
            return Err(EngineError::InvalidTransition {
                from: CycleStatus::Locked,
                to: CycleStatus::Settled,
            });
        }

        tx.commit().await?;

        info!(
            cycle_id = %cycle_id,
            entries = entries.len(),
            investor_due_minor = cycle.investor_due_minor,
            servicer_fee_minor = cycle.servicer_fee_minor,
            "cycle settled"
        );

        let settled = self
            .db
            .get_cycle(cycle_id)
            .await?
            .ok_or(EngineError::CycleNotFound(cycle_id))?;
        Ok(settled)
    }
}
