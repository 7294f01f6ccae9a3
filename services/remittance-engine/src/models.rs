use chrono::{DateTime, NaiveDate, Utc};
use remittance_core::{
    ContractTerms, CycleStatus, CycleTotals, LoanCollection, RemittanceItem, RemittanceMethod,
    WaterfallBucket, WaterfallRule,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::{EngineError, Result};

/// Investor contract row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContractRow {
    pub id: Uuid,
    pub investor_id: Uuid,
    pub product_code: String,
    pub method: String,
    pub remittance_days: i32,
    pub cutoff_day: i32,
    pub custodial_account_id: Uuid,
    pub servicer_fee_bps: i32,
    pub late_fee_split_bps: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl ContractRow {
    pub fn terms(&self) -> Result<ContractTerms> {
        Ok(ContractTerms {
            method: RemittanceMethod::parse(&self.method)?,
            servicer_fee_bps: self.servicer_fee_bps,
            late_fee_split_bps: self.late_fee_split_bps,
            cutoff_day: self.cutoff_day as u32,
            remittance_days: self.remittance_days as u32,
        })
    }
}

/// Waterfall rule row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WaterfallRuleRow {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub rank: i32,
    pub bucket: String,
    pub cap_minor: Option<i64>,
}

impl WaterfallRuleRow {
    pub fn to_core(&self) -> Result<WaterfallRule> {
        Ok(WaterfallRule {
            rank: self.rank,
            bucket: WaterfallBucket::parse(&self.bucket)?,
            cap_minor: self.cap_minor,
        })
    }
}

/// Remittance cycle row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CycleRow {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub settlement_date: NaiveDate,
    pub status: String,
    pub total_principal_minor: i64,
    pub total_interest_minor: i64,
    pub total_fees_minor: i64,
    pub servicer_fee_minor: i64,
    pub investor_due_minor: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CycleRow {
    pub fn cycle_status(&self) -> Result<CycleStatus> {
        Ok(CycleStatus::parse(&self.status)?)
    }

    pub fn totals(&self) -> CycleTotals {
        CycleTotals {
            total_principal_minor: self.total_principal_minor,
            total_interest_minor: self.total_interest_minor,
            total_fees_minor: self.total_fees_minor,
            servicer_fee_minor: self.servicer_fee_minor,
            investor_due_minor: self.investor_due_minor,
        }
    }
}

/// Remittance item row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ItemRow {
    pub id: Uuid,
    pub cycle_id: Uuid,
    pub loan_id: String,
    pub principal_minor: i64,
    pub interest_minor: i64,
    pub fees_minor: i64,
    pub investor_share_minor: i64,
    pub servicer_fee_minor: i64,
}

impl ItemRow {
    pub fn to_core(&self) -> RemittanceItem {
        RemittanceItem {
            loan_id: self.loan_id.clone(),
            principal_minor: self.principal_minor,
            interest_minor: self.interest_minor,
            fees_minor: self.fees_minor,
            investor_share_minor: self.investor_share_minor,
            servicer_fee_minor: self.servicer_fee_minor,
        }
    }
}

/// Per-loan collection aggregate for a period
#[derive(Debug, Clone, FromRow)]
pub struct CollectionRow {
    pub loan_id: String,
    pub scheduled_principal_minor: i64,
    pub scheduled_interest_minor: i64,
    pub principal_minor: i64,
    pub interest_minor: i64,
    pub fees_minor: i64,
    pub escrow_minor: i64,
    pub recoveries_minor: i64,
}

impl CollectionRow {
    pub fn to_core(&self) -> LoanCollection {
        LoanCollection {
            loan_id: self.loan_id.clone(),
            scheduled_principal_minor: self.scheduled_principal_minor,
            scheduled_interest_minor: self.scheduled_interest_minor,
            principal_minor: self.principal_minor,
            interest_minor: self.interest_minor,
            fees_minor: self.fees_minor,
            escrow_minor: self.escrow_minor,
            recoveries_minor: self.recoveries_minor,
        }
    }
}

/// Export artifact row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExportRow {
    pub id: Uuid,
    pub cycle_id: Uuid,
    pub format: String,
    #[serde(skip_serializing)]
    pub content: Vec<u8>,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Reconciliation snapshot row (append-only)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SnapshotRow {
    pub id: Uuid,
    pub cycle_id: Uuid,
    pub diff_investor_minor: i64,
    pub diff_servicer_minor: i64,
    pub diff_total_minor: i64,
    pub is_balanced: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Per-role debit/credit sums of a cycle's posted ledger entries
#[derive(Debug, Clone, FromRow)]
pub struct LedgerSumRow {
    pub account_role: String,
    pub entry_type: String,
    pub total_minor: i64,
}

// ---------- API DTOs ----------

/// Waterfall rule spec nested in contract creation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleSpec {
    pub rank: i32,
    pub bucket: String,
    pub cap_minor: Option<i64>,
}

/// Create contract + waterfall rules
#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct CreateContractRequest {
    pub investor_id: Uuid,
    pub product_code: String,
    pub method: String,
    #[validate(range(min = 0, max = 30))]
    pub remittance_days: i32,
    #[validate(range(min = 1, max = 31))]
    pub cutoff_day: i32,
    pub custodial_account_id: Uuid,
    #[validate(range(min = 0, max = 10000))]
    pub servicer_fee_bps: i32,
    #[validate(range(min = 0, max = 10000))]
    pub late_fee_split_bps: i32,
    pub rules: Vec<RuleSpec>,
}

impl CreateContractRequest {
    /// Domain validation beyond the field ranges: method/bucket names parse
    /// and rule ranks are unique.
    pub fn to_terms_and_rules(&self) -> Result<(ContractTerms, Vec<WaterfallRule>)> {
        let terms = ContractTerms {
            method: RemittanceMethod::parse(&self.method)?,
            servicer_fee_bps: self.servicer_fee_bps,
            late_fee_split_bps: self.late_fee_split_bps,
            cutoff_day: self.cutoff_day as u32,
            remittance_days: self.remittance_days as u32,
        };
        terms.validate()?;

        let rules = self
            .rules
            .iter()
            .map(|spec| {
                Ok(WaterfallRule {
                    rank: spec.rank,
                    bucket: WaterfallBucket::parse(&spec.bucket)?,
                    cap_minor: spec.cap_minor,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        remittance_core::validate_rules(&rules)?;

        Ok((terms, rules))
    }
}

/// Contract with its rule set
#[derive(Debug, Serialize, Deserialize)]
pub struct ContractResponse {
    pub contract: ContractRow,
    pub rules: Vec<WaterfallRuleRow>,
}

/// Force-create the current period's cycle
#[derive(Debug, Deserialize, Serialize)]
pub struct InitiateCycleRequest {
    pub contract_id: Uuid,
}

/// Request an export artifact
#[derive(Debug, Deserialize, Serialize)]
pub struct ExportRequest {
    pub format: String,
}

/// Reconcile a cycle on behalf of a user
#[derive(Debug, Deserialize, Serialize)]
pub struct ReconcileRequest {
    pub user_id: String,
}

impl ExportRequest {
    pub fn parse_format(&self) -> Result<remittance_core::ExportFormat> {
        remittance_core::ExportFormat::parse(&self.format).map_err(EngineError::from)
    }
}
