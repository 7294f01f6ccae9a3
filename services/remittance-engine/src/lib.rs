pub mod config;
pub mod database;
pub mod errors;
pub mod exports;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod reconciliation;
pub mod scheduler;
pub mod settlement;

use crate::database::Database;
use crate::exports::ExportService;
use crate::reconciliation::ReconciliationService;
use crate::scheduler::{Clock, CycleScheduler};
use crate::settlement::SettlementPoster;
use std::sync::Arc;

/// Shared handler state
pub struct AppState {
    pub db: Arc<Database>,
    pub scheduler: Arc<CycleScheduler>,
    pub poster: Arc<SettlementPoster>,
    pub exports: Arc<ExportService>,
    pub recon: Arc<ReconciliationService>,
    pub clock: Arc<dyn Clock>,
}
