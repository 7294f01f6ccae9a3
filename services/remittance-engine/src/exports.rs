use crate::database::Database;
use crate::errors::{EngineError, Result};
use crate::models::ExportRow;
use remittance_core::{content_hash, generate_export, CycleExport, CycleStatus, ExportFormat};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Generates and stores deterministic remittance statements.
pub struct ExportService {
    db: Arc<Database>,
}

impl ExportService {
    pub fn new(db: Arc<Database>) -> Self {
        ExportService { db }
    }

    /// Generate a statement for a locked or settled cycle.
    ///
    /// The artifact is a pure function of the cycle's persisted items, so
    /// regenerating produces byte-identical content and the same hash. Each
    /// generation stores a new row; consumers compare hashes to dedupe.
    pub async fn generate(&self, cycle_id: Uuid, format: ExportFormat) -> Result<ExportRow> {
        let cycle = self
            .db
            .get_cycle(cycle_id)
            .await?
            .ok_or(EngineError::CycleNotFound(cycle_id))?;

        match cycle.cycle_status()? {
            CycleStatus::Locked | CycleStatus::Settled => {}
            status => {
                return Err(EngineError::Validation(format!(
                    "cannot export a cycle in status {}, results are not final",
                    status
                )));
            }
        }

        let items = self
            .db
            .get_items(cycle_id)
            .await?
            .iter()
            .map(|i| i.to_core())
            .collect();

        let export = CycleExport {
            cycle_id: cycle.id,
            contract_id: cycle.contract_id,
            period_start: cycle.period_start,
            period_end: cycle.period_end,
            items,
        };

        let content = generate_export(&export, format)?;
        let hash = content_hash(&content);

        let row = self
            .db
            .save_export(cycle_id, format.as_str(), &content, &hash)
            .await?;

        info!(
            cycle_id = %cycle_id,
            export_id = %row.id,
            format = format.as_str(),
            hash = %hash,
            "export generated"
        );

        Ok(row)
    }

    pub async fn get(&self, export_id: Uuid) -> Result<ExportRow> {
        self.db
            .get_export(export_id)
            .await?
            .ok_or(EngineError::ExportNotFound(export_id))
    }
}
