//! JSON file bill store.

use async_trait::async_trait;
use chrono::NaiveDate;
use mgen_core::ReimbursementEntry;
use mgen_scraper::{BillOptions, BillSink, SinkError};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Fields that identify a bill across runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BillKey {
    vendor: String,
    date: NaiveDate,
    original_date: NaiveDate,
    beneficiary: String,
    cents: i64,
}

impl BillKey {
    #[allow(clippy::cast_possible_truncation)]
    fn of(entry: &ReimbursementEntry) -> Self {
        Self {
            vendor: entry.vendor.clone(),
            date: entry.date,
            original_date: entry.original_date,
            beneficiary: entry.beneficiary.clone(),
            cents: (entry.amount * 100.0).round() as i64,
        }
    }
}

/// Keeps every bill ever seen in one JSON array file, appending only the
/// ones not stored yet.
pub struct JsonBillStore {
    filename: String,
}

impl JsonBillStore {
    #[must_use]
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
        }
    }

    /// Location of the store inside `folder`.
    #[must_use]
    pub fn path(&self, folder: &Path) -> PathBuf {
        folder.join(&self.filename)
    }

    /// Bills already stored in `folder`; none when the file does not exist.
    pub async fn load(&self, folder: &Path) -> Result<Vec<ReimbursementEntry>, SinkError> {
        let path = self.path(folder);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(Vec::new());
        }
        let raw = tokio::fs::read(&path).await?;
        serde_json::from_slice(&raw).map_err(|e| SinkError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl BillSink for JsonBillStore {
    async fn save_bills(
        &self,
        entries: &[ReimbursementEntry],
        folder: &Path,
        options: &BillOptions,
    ) -> Result<usize, SinkError> {
        if options.is_expired() {
            return Err(SinkError::DeadlineExceeded("bills"));
        }

        let mut stored = self.load(folder).await?;
        let mut known: HashSet<BillKey> = stored.iter().map(BillKey::of).collect();

        let mut added = 0;
        for entry in entries {
            if known.insert(BillKey::of(entry)) {
                stored.push(entry.clone());
                added += 1;
            }
        }

        if added == 0 {
            tracing::debug!("No new {} bills", options.identifier);
            return Ok(0);
        }
        if options.is_expired() {
            return Err(SinkError::DeadlineExceeded("bills"));
        }

        let json =
            serde_json::to_vec_pretty(&stored).map_err(|e| SinkError::Serialization(e.to_string()))?;

        tokio::fs::create_dir_all(folder).await?;
        let path = self.path(folder);
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, json).await?;
        tokio::fs::rename(&staging, &path).await?;

        tracing::info!(
            "Stored {} new {} bills in {}",
            added,
            options.identifier,
            path.display()
        );
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use mgen_core::{BillType, VENDOR};
    use tempfile::TempDir;

    fn entry(beneficiary: &str, amount: f64) -> ReimbursementEntry {
        ReimbursementEntry {
            bill_type: BillType::Health,
            vendor: VENDOR.to_string(),
            is_refund: true,
            original_date: NaiveDate::from_ymd_opt(2024, 8, 2).unwrap(),
            beneficiary: beneficiary.to_string(),
            amount,
            date: NaiveDate::from_ymd_opt(2024, 8, 12).unwrap(),
            file: None,
            original_amount: 25.0,
            subtype: "Consultation".to_string(),
            is_third_party_payer: false,
            social_security_refund: Some(17.5),
        }
    }

    #[tokio::test]
    async fn test_saves_then_deduplicates() {
        let dir = TempDir::new().unwrap();
        let store = JsonBillStore::new("bills.json");
        let options = BillOptions::with_budget(60);

        let first = vec![entry("DUPONT JEAN", 16.5), entry("DUPONT MARIE", 7.0)];
        assert_eq!(store.save_bills(&first, dir.path(), &options).await.unwrap(), 2);

        let second = vec![entry("DUPONT JEAN", 16.5), entry("DUPONT LEA", 3.2)];
        assert_eq!(store.save_bills(&second, dir.path(), &options).await.unwrap(), 1);

        let stored = store.load(dir.path()).await.unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[2].beneficiary, "DUPONT LEA");
    }

    #[tokio::test]
    async fn test_same_beneficiary_different_amount_is_new() {
        let dir = TempDir::new().unwrap();
        let store = JsonBillStore::new("bills.json");
        let options = BillOptions::with_budget(60);

        store
            .save_bills(&[entry("DUPONT JEAN", 16.5)], dir.path(), &options)
            .await
            .unwrap();
        let added = store
            .save_bills(&[entry("DUPONT JEAN", 16.51)], dir.path(), &options)
            .await
            .unwrap();
        assert_eq!(added, 1);
    }

    #[tokio::test]
    async fn test_refuses_after_deadline() {
        let dir = TempDir::new().unwrap();
        let store = JsonBillStore::new("bills.json");
        let options = BillOptions {
            deadline: Utc::now() - Duration::seconds(5),
            identifier: VENDOR.to_string(),
        };

        let result = store
            .save_bills(&[entry("DUPONT JEAN", 16.5)], dir.path(), &options)
            .await;
        assert!(matches!(result, Err(SinkError::DeadlineExceeded(_))));
        assert!(!store.path(dir.path()).exists());
    }

    #[tokio::test]
    async fn test_corrupt_store_is_reported() {
        let dir = TempDir::new().unwrap();
        let store = JsonBillStore::new("bills.json");
        std::fs::write(store.path(dir.path()), "not json").unwrap();

        let result = store
            .save_bills(&[entry("DUPONT JEAN", 16.5)], dir.path(), &BillOptions::with_budget(60))
            .await;
        assert!(matches!(result, Err(SinkError::Serialization(_))));
    }
}
