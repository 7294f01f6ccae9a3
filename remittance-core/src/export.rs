//! Export artifact generation
//!
//! Serializes a cycle's items for investor reporting. Both formats share one
//! determinism contract: items are ordered ascending by loan identifier, no
//! wall-clock timestamps or locale-dependent formatting are embedded, and
//! repeated generation against unchanged cycle data is byte-identical,
//! verified by SHA-256 equality.
//!
//! # Example CSV
//!
//! ```csv
//! loan_id,principal,interest,fees,investor_share,servicer_fee
//! LN-0001,500.00,100.00,25.00,609.37,15.63
//! ```

use crate::error::{Error, Result};
use crate::types::RemittanceItem;
use chrono::NaiveDate;
use quick_xml::se::to_string as to_xml_string;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Export serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// Comma-separated values
    Csv,
    /// XML remittance statement
    Xml,
}

impl ExportFormat {
    /// Stable wire/storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xml => "xml",
        }
    }

    /// Parse from storage name
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "csv" => Ok(ExportFormat::Csv),
            "xml" => Ok(ExportFormat::Xml),
            other => Err(Error::Validation(format!("Unknown export format: {}", other))),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The cycle data an export serializes: persisted state only, never the clock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleExport {
    /// Cycle identifier
    pub cycle_id: Uuid,

    /// Owning contract
    pub contract_id: Uuid,

    /// Period start (exclusive)
    pub period_start: NaiveDate,

    /// Period end (inclusive)
    pub period_end: NaiveDate,

    /// Cycle items in any order; serialization sorts them
    pub items: Vec<RemittanceItem>,
}

/// Generate an export artifact for a cycle
pub fn generate_export(cycle: &CycleExport, format: ExportFormat) -> Result<Vec<u8>> {
    let mut items = cycle.items.clone();
    items.sort_by(|a, b| a.loan_id.cmp(&b.loan_id));

    match format {
        ExportFormat::Csv => generate_csv(&items),
        ExportFormat::Xml => generate_xml(cycle, &items),
    }
}

/// SHA-256 content hash as lowercase hex
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Content type by leading-byte sniff: `<?xml` means XML, anything else CSV
pub fn sniff_content_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"<?xml") {
        "application/xml"
    } else {
        "text/csv"
    }
}

/// Minor units rendered as a fixed two-decimal amount, e.g. `1563` -> `15.63`
fn format_minor(minor: i64) -> String {
    Decimal::new(minor, 2).to_string()
}

fn generate_csv(items: &[RemittanceItem]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record([
            "loan_id",
            "principal",
            "interest",
            "fees",
            "investor_share",
            "servicer_fee",
        ])
        .map_err(|e| Error::Serialization(format!("CSV header: {}", e)))?;

    for item in items {
        writer
            .write_record([
                item.loan_id.as_str(),
                &format_minor(item.principal_minor),
                &format_minor(item.interest_minor),
                &format_minor(item.fees_minor),
                &format_minor(item.investor_share_minor),
                &format_minor(item.servicer_fee_minor),
            ])
            .map_err(|e| Error::Serialization(format!("CSV row: {}", e)))?;
    }

    writer
        .into_inner()
        .map_err(|e| Error::Serialization(format!("CSV flush: {}", e)))
}

fn generate_xml(cycle: &CycleExport, items: &[RemittanceItem]) -> Result<Vec<u8>> {
    let document = RemittanceStatement {
        cycle_id: cycle.cycle_id.to_string(),
        contract_id: cycle.contract_id.to_string(),
        period_start: cycle.period_start.format("%Y-%m-%d").to_string(),
        period_end: cycle.period_end.format("%Y-%m-%d").to_string(),
        loans: LoanList {
            loan: items
                .iter()
                .map(|item| LoanEntry {
                    loan_id: item.loan_id.clone(),
                    principal: format_minor(item.principal_minor),
                    interest: format_minor(item.interest_minor),
                    fees: format_minor(item.fees_minor),
                    investor_share: format_minor(item.investor_share_minor),
                    servicer_fee: format_minor(item.servicer_fee_minor),
                })
                .collect(),
        },
    };

    let xml = to_xml_string(&document)
        .map_err(|e| Error::Serialization(format!("XML serialization failed: {}", e)))?;

    Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", xml).into_bytes())
}

// XML statement structures

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "RemittanceStatement")]
struct RemittanceStatement {
    #[serde(rename = "CycleId")]
    cycle_id: String,

    #[serde(rename = "ContractId")]
    contract_id: String,

    #[serde(rename = "PeriodStart")]
    period_start: String,

    #[serde(rename = "PeriodEnd")]
    period_end: String,

    #[serde(rename = "Loans")]
    loans: LoanList,
}

#[derive(Debug, Serialize, Deserialize)]
struct LoanList {
    #[serde(rename = "Loan")]
    loan: Vec<LoanEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LoanEntry {
    #[serde(rename = "LoanId")]
    loan_id: String,

    #[serde(rename = "Principal")]
    principal: String,

    #[serde(rename = "Interest")]
    interest: String,

    #[serde(rename = "Fees")]
    fees: String,

    #[serde(rename = "InvestorShare")]
    investor_share: String,

    #[serde(rename = "ServicerFee")]
    servicer_fee: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(loan_id: &str, principal: i64) -> RemittanceItem {
        RemittanceItem {
            loan_id: loan_id.to_string(),
            principal_minor: principal,
            interest_minor: 10_000,
            fees_minor: 2_500,
            investor_share_minor: principal + 10_937,
            servicer_fee_minor: 1_563,
        }
    }

    fn cycle() -> CycleExport {
        CycleExport {
            cycle_id: Uuid::from_u128(1),
            contract_id: Uuid::from_u128(2),
            period_start: NaiveDate::from_ymd_opt(2025, 5, 15).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(),
            // Deliberately unsorted
            items: vec![item("LN-0002", 75_000), item("LN-0001", 50_000)],
        }
    }

    #[test]
    fn test_csv_sorted_by_loan_id() {
        let bytes = generate_export(&cycle(), ExportFormat::Csv).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "loan_id,principal,interest,fees,investor_share,servicer_fee"
        );
        assert!(lines[1].starts_with("LN-0001,500.00,100.00,25.00,"));
        assert!(lines[2].starts_with("LN-0002,750.00,100.00,25.00,"));
    }

    #[test]
    fn test_csv_determinism_three_hashes() {
        let c = cycle();
        let h1 = content_hash(&generate_export(&c, ExportFormat::Csv).unwrap());
        let h2 = content_hash(&generate_export(&c, ExportFormat::Csv).unwrap());
        let h3 = content_hash(&generate_export(&c, ExportFormat::Csv).unwrap());
        assert_eq!(h1, h2);
        assert_eq!(h2, h3);
    }

    #[test]
    fn test_xml_determinism_three_hashes() {
        let c = cycle();
        let h1 = content_hash(&generate_export(&c, ExportFormat::Xml).unwrap());
        let h2 = content_hash(&generate_export(&c, ExportFormat::Xml).unwrap());
        let h3 = content_hash(&generate_export(&c, ExportFormat::Xml).unwrap());
        assert_eq!(h1, h2);
        assert_eq!(h2, h3);
    }

    #[test]
    fn test_item_input_order_does_not_matter() {
        let a = cycle();
        let mut b = a.clone();
        b.items.reverse();

        for format in [ExportFormat::Csv, ExportFormat::Xml] {
            assert_eq!(
                generate_export(&a, format).unwrap(),
                generate_export(&b, format).unwrap()
            );
        }
    }

    #[test]
    fn test_xml_structure() {
        let bytes = generate_export(&cycle(), ExportFormat::Xml).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(text.contains("<RemittanceStatement>"));
        assert!(text.contains("<PeriodEnd>2025-06-15</PeriodEnd>"));
        assert!(text.contains("<LoanId>LN-0001</LoanId>"));
        assert!(text.contains("<Principal>500.00</Principal>"));
    }

    #[test]
    fn test_content_type_sniffing() {
        let xml = generate_export(&cycle(), ExportFormat::Xml).unwrap();
        let csv = generate_export(&cycle(), ExportFormat::Csv).unwrap();
        assert_eq!(sniff_content_type(&xml), "application/xml");
        assert_eq!(sniff_content_type(&csv), "text/csv");
        assert_eq!(sniff_content_type(b""), "text/csv");
    }

    #[test]
    fn test_empty_cycle_exports_header_only() {
        let mut c = cycle();
        c.items.clear();
        let bytes = generate_export(&c, ExportFormat::Csv).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn test_format_minor_rendering() {
        assert_eq!(format_minor(1_563), "15.63");
        assert_eq!(format_minor(0), "0.00");
        assert_eq!(format_minor(5), "0.05");
    }
}
