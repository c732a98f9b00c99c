//! Shared data model for the MGEN konnector.
//!
//! Preliminary entries come from the reimbursement table, detail records from
//! the per-row detail panel; merging the two yields the final
//! [`ReimbursementEntry`]. The correlation key ([`RowIndex`]) only exists on
//! the preliminary type, so it cannot leak into stored bills.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// Stable vendor identifier, used for bill tagging and de-duplication.
pub const VENDOR: &str = "MGEN";

/// Filename given to the complementary-coverage certificate.
pub const ATTESTATION_FILENAME: &str = "Attestation_mutuelle.pdf";

/// Per-row correlation key used to request a row's financial detail.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowIndex(String);

impl RowIndex {
    /// Wrap the raw cell text.
    #[must_use]
    pub fn new(index: impl Into<String>) -> Self {
        Self(index.into())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Feature URLs discovered on the authenticated landing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionUrls {
    /// Complementary-coverage certificate page; absent when the member has no such coverage
    pub mutuelle_url: Option<Url>,
    /// Reimbursement history page
    pub reimbursements_url: Url,
}

/// Downloadable PDF attached to a reimbursement row.
///
/// URL and filename always travel together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryFile {
    /// Absolute download URL
    pub file_url: Url,
    /// Target filename (`YYYYMM_mgen.pdf`)
    pub filename: String,
}

/// One row of the reimbursement table, before detail enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct PreliminaryEntry {
    /// Transient correlation key for the detail request
    pub row_index: RowIndex,
    /// Date of care
    pub original_date: NaiveDate,
    /// Insured person the care was for
    pub beneficiary: String,
    /// Amount reimbursed to the member, rounded to cents
    pub amount: f64,
    /// Reimbursement date
    pub date: NaiveDate,
    /// Statement PDF, when the row links one
    pub file: Option<EntryFile>,
}

impl PreliminaryEntry {
    /// Merge detail into this row, dropping the correlation key.
    #[must_use]
    pub fn into_entry(self, detail: DetailRecord) -> ReimbursementEntry {
        ReimbursementEntry {
            bill_type: BillType::Health,
            vendor: VENDOR.to_string(),
            is_refund: true,
            original_date: self.original_date,
            beneficiary: self.beneficiary,
            amount: detail.amount.unwrap_or(self.amount),
            date: self.date,
            file: self.file,
            original_amount: detail.original_amount,
            subtype: detail.subtype,
            is_third_party_payer: detail.is_third_party_payer,
            social_security_refund: detail.social_security_refund,
        }
    }
}

/// Financial detail read from a row's detail panel.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailRecord {
    /// Total cost of care
    pub original_amount: f64,
    /// Care designation(s) or prescriber, depending on the aggregation strategy
    pub subtype: String,
    /// Provider was paid directly; nothing owed to the member
    pub is_third_party_payer: bool,
    /// Share refunded by the national health insurance
    pub social_security_refund: Option<f64>,
    /// Replacement for the table amount, when the aggregation strategy computes one
    pub amount: Option<f64>,
}

/// Bill category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillType {
    /// Health reimbursement
    Health,
}

/// Fully enriched reimbursement, ready for the bill sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReimbursementEntry {
    /// Always [`BillType::Health`]
    #[serde(rename = "type")]
    pub bill_type: BillType,
    /// Always [`VENDOR`]
    pub vendor: String,
    /// Always true: every row is a refund to the member
    pub is_refund: bool,
    /// Date of care
    pub original_date: NaiveDate,
    /// Insured person the care was for
    pub beneficiary: String,
    /// Amount refunded to the member, rounded to cents
    pub amount: f64,
    /// Reimbursement date
    pub date: NaiveDate,
    /// Statement PDF, when the row links one
    #[serde(flatten)]
    pub file: Option<EntryFile>,
    /// Total cost of care
    pub original_amount: f64,
    /// Care designation(s) or prescriber
    pub subtype: String,
    /// Provider was paid directly
    pub is_third_party_payer: bool,
    /// Share refunded by the national health insurance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_security_refund: Option<f64>,
}

impl ReimbursementEntry {
    /// Statement PDF as a file-sink descriptor.
    #[must_use]
    pub fn output_file(&self) -> Option<OutputFile> {
        self.file.as_ref().map(|file| OutputFile {
            file_url: file.file_url.clone(),
            filename: file.filename.clone(),
            headers: BTreeMap::new(),
        })
    }
}

/// File to be fetched and stored by the file sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputFile {
    /// Absolute download URL
    pub file_url: Url,
    /// Target filename
    pub filename: String,
    /// Extra request headers the download endpoint insists on
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

/// Ordered form payload, as a browser would serialize it.
///
/// Field order is preserved; [`FormFields::set`] replaces the first field of
/// that name in place, or appends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields(Vec<(String, String)>);

impl FormFields {
    /// Empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field, keeping any existing one of the same name.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// Set a field's value, replacing the first occurrence or appending.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = value,
            None => self.0.push((name.to_string(), value)),
        }
    }

    /// First value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Fields in submission order.
    #[must_use]
    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormFields {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preliminary(file: Option<EntryFile>) -> PreliminaryEntry {
        PreliminaryEntry {
            row_index: RowIndex::new("3"),
            original_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            beneficiary: "DUPONT JEAN".to_string(),
            amount: 12.5,
            date: NaiveDate::from_ymd_opt(2024, 1, 20).unwrap(),
            file,
        }
    }

    fn detail(amount: Option<f64>) -> DetailRecord {
        DetailRecord {
            original_amount: 25.0,
            subtype: "Consultation".to_string(),
            is_third_party_payer: false,
            social_security_refund: Some(7.5),
            amount,
        }
    }

    #[test]
    fn test_merge_keeps_table_amount_without_override() {
        let entry = preliminary(None).into_entry(detail(None));
        assert_eq!(entry.amount, 12.5);
        assert_eq!(entry.vendor, VENDOR);
        assert!(entry.is_refund);
        assert_eq!(entry.bill_type, BillType::Health);
    }

    #[test]
    fn test_merge_applies_override() {
        let entry = preliminary(None).into_entry(detail(Some(0.0)));
        assert_eq!(entry.amount, 0.0);
    }

    #[test]
    fn test_entry_serialization_has_no_row_index() {
        let file = EntryFile {
            file_url: Url::parse("https://www.mgen.fr/releve.pdf").unwrap(),
            filename: "202401_mgen.pdf".to_string(),
        };
        let entry = preliminary(Some(file)).into_entry(detail(None));
        let json = serde_json::to_value(&entry).expect("serialize entry");

        assert_eq!(json["type"], "health");
        assert_eq!(json["originalDate"], "2024-01-10");
        assert_eq!(json["fileUrl"], "https://www.mgen.fr/releve.pdf");
        assert_eq!(json["filename"], "202401_mgen.pdf");
        assert_eq!(json["socialSecurityRefund"], 7.5);
        assert!(json.get("rowIndex").is_none());

        let back: ReimbursementEntry = serde_json::from_value(json).expect("deserialize entry");
        assert_eq!(back, entry);
    }

    #[test]
    fn test_entry_without_file_omits_both_fields() {
        let entry = preliminary(None).into_entry(detail(None));
        let json = serde_json::to_value(&entry).expect("serialize entry");
        assert!(json.get("fileUrl").is_none());
        assert!(json.get("filename").is_none());
        assert!(entry.output_file().is_none());
    }

    #[test]
    fn test_form_fields_set_replaces_in_place() {
        let mut fields: FormFields = [("a", "1"), ("b", "2")].into_iter().collect();
        fields.set("a", "9");
        fields.set("c", "3");
        assert_eq!(
            fields.pairs(),
            &[
                ("a".to_string(), "9".to_string()),
                ("b".to_string(), "2".to_string()),
                ("c".to_string(), "3".to_string()),
            ]
        );
        assert_eq!(fields.get("b"), Some("2"));
        assert_eq!(fields.get("z"), None);
    }
}
