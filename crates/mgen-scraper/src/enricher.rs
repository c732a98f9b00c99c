//! Per-row detail enrichment.
//!
//! Each reimbursement row has a detail panel behind a form submission. The
//! enricher fetches those panels through a bounded pool of in-flight
//! requests, merges the financial detail into the rows and hands back the
//! rows in table order. A row whose detail cannot be fetched or read is
//! reported on its own; it does not take the other rows down with it.

use crate::document::{cells, select_in, PortalDocument};
use crate::error::{Result, ScrapeError};
use crate::reimbursements::PreparedForm;
use futures::stream::{FuturesUnordered, StreamExt};
use mgen_core::locale::{normalize_amount, round_cents};
use mgen_core::{
    AppConfig, DetailLabels, DetailRecord, DetailStrategy, FormFields, PortalSelectors,
    PreliminaryEntry, ReimbursementEntry, RowIndex,
};
use mgen_session::Transport;
use scraper::{ElementRef, Selector};
use std::collections::HashMap;
use std::sync::OnceLock;
use url::Url;

const PAGE: &str = "reimbursement detail";

/// A row that did not make it into the output.
#[derive(Debug)]
pub struct RowFailure {
    /// Zero-based position of the row in the result table
    pub position: usize,
    /// Row index cell, when it could be read
    pub row_index: Option<RowIndex>,
    /// What went wrong
    pub error: ScrapeError,
}

/// Outcome of enriching a batch of rows.
#[derive(Debug, Default)]
pub struct EnrichmentReport {
    /// Enriched rows, in table order
    pub entries: Vec<ReimbursementEntry>,
    /// Rows whose detail could not be fetched or read
    pub failures: Vec<RowFailure>,
}

/// Fetches and merges each row's financial detail.
pub struct DetailEnricher<'a> {
    selectors: &'a PortalSelectors,
    labels: &'a DetailLabels,
    strategy: DetailStrategy,
    max_in_flight: usize,
}

impl<'a> DetailEnricher<'a> {
    #[must_use]
    pub fn new(config: &'a AppConfig) -> Self {
        Self {
            selectors: &config.selectors,
            labels: &config.labels,
            strategy: config.scraping.detail_strategy,
            max_in_flight: config.scraping.detail_concurrency.max(1),
        }
    }

    /// Enrich `entries` using the shared detail form.
    ///
    /// `row_order` lists the index cell of every row the table rendered,
    /// including rows that never became entries. Failure positions count
    /// from the start of `entries`.
    pub async fn enrich(
        &self,
        session: &dyn Transport,
        form: &PreparedForm,
        row_order: &[RowIndex],
        entries: Vec<PreliminaryEntry>,
    ) -> EnrichmentReport {
        let mut template = form.fields.clone();
        let order = row_order
            .iter()
            .map(RowIndex::as_str)
            .collect::<Vec<_>>()
            .join(",");
        template.set(&self.selectors.detail_order_field, order);

        let outcomes = self
            .fetch_all(session, &form.action, &template, &entries)
            .await;

        let mut report = EnrichmentReport::default();
        for ((position, entry), outcome) in entries.into_iter().enumerate().zip(outcomes) {
            match outcome {
                Ok(detail) => report.entries.push(entry.into_entry(detail)),
                Err(error) => {
                    tracing::warn!(
                        "Could not enrich reimbursement line {}: {}",
                        entry.row_index,
                        error
                    );
                    report.failures.push(RowFailure {
                        position,
                        row_index: Some(entry.row_index),
                        error,
                    });
                }
            }
        }

        tracing::info!(
            "Enriched {} reimbursements, {} failed",
            report.entries.len(),
            report.failures.len()
        );
        report
    }

    /// Fetch every row's detail, at most `max_in_flight` at a time.
    ///
    /// Outcomes are returned in `entries` order, whatever the completion order.
    async fn fetch_all(
        &self,
        session: &dyn Transport,
        action: &Url,
        template: &FormFields,
        entries: &[PreliminaryEntry],
    ) -> Vec<Result<DetailRecord>> {
        let mut futures = FuturesUnordered::new();
        let mut outcomes = Vec::with_capacity(entries.len());

        for (position, entry) in entries.iter().enumerate() {
            futures.push(async move {
                let outcome = self.fetch_detail(session, action, template, entry).await;
                (position, outcome)
            });

            // Respect concurrency limit
            while futures.len() >= self.max_in_flight {
                if let Some(done) = futures.next().await {
                    outcomes.push(done);
                }
            }
        }

        // Collect remaining results
        while let Some(done) = futures.next().await {
            outcomes.push(done);
        }

        outcomes.sort_by_key(|(position, _)| *position);
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }

    async fn fetch_detail(
        &self,
        session: &dyn Transport,
        action: &Url,
        template: &FormFields,
        entry: &PreliminaryEntry,
    ) -> Result<DetailRecord> {
        tracing::info!("Fetching details for line {}", entry.row_index);
        let mut fields = template.clone();
        fields.set(&self.selectors.detail_row_field, entry.row_index.as_str());

        let page = session.post_form(action, &fields).await?;
        self.parse_detail(&page.body)
    }

    /// Read a detail panel into a [`DetailRecord`].
    pub fn parse_detail(&self, html: &str) -> Result<DetailRecord> {
        let doc = PortalDocument::parse(html, PAGE);
        let tables = doc.find_all(&self.selectors.detail_tables)?;
        let summary_table = tables
            .first()
            .copied()
            .ok_or_else(|| doc.structure_error("detail summary table not found"))?;
        let summary = summary_fields(summary_table);

        let care_amount = summary
            .get(self.labels.care_amount.as_str())
            .ok_or_else(|| doc.structure_error(format!("no {:?} field", self.labels.care_amount)))?;
        let original_amount = normalize_amount(care_amount)?;

        let is_third_party_payer = match summary.get(self.labels.insured_refund.as_str()) {
            Some(refund) => normalize_amount(refund)?.abs() < f64::EPSILON,
            None => false,
        };

        let breakdown = tables.get(1).copied();
        match (self.strategy, breakdown) {
            (DetailStrategy::Auto | DetailStrategy::Itemized, Some(table)) => {
                let totals = itemized_totals(table)?;
                Ok(DetailRecord {
                    original_amount,
                    subtype: totals.designations.join(", "),
                    is_third_party_payer,
                    social_security_refund: Some(round_cents(totals.social_security)),
                    amount: Some(round_cents(totals.member)),
                })
            }
            (DetailStrategy::Itemized, None) => {
                Err(doc.structure_error("itemized breakdown table not found"))
            }
            (DetailStrategy::Auto | DetailStrategy::Flat, _) => {
                let prescriber = summary
                    .get(self.labels.prescriber.as_str())
                    .ok_or_else(|| {
                        doc.structure_error(format!("no {:?} field", self.labels.prescriber))
                    })?;
                Ok(DetailRecord {
                    original_amount,
                    subtype: prescriber.clone(),
                    is_third_party_payer,
                    social_security_refund: None,
                    amount: is_third_party_payer.then_some(0.0),
                })
            }
        }
    }
}

/// Label → value pairs of the summary table. Labels lose a trailing colon.
fn summary_fields(table: ElementRef<'_>) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    static TR: OnceLock<Selector> = OnceLock::new();
    let tr = TR.get_or_init(|| Selector::parse("tr").expect("valid selector"));
    for row in table.select(tr) {
        if let [label, value, ..] = cells(row).as_slice() {
            let label = label.trim_end_matches(':').trim_end();
            fields.insert(label.to_string(), value.clone());
        }
    }
    fields
}

#[derive(Debug, Default)]
struct ItemizedTotals {
    designations: Vec<String>,
    social_security: f64,
    member: f64,
}

/// Sum the refund columns of the breakdown table; designations are kept
/// once each, in first-seen order.
fn itemized_totals(table: ElementRef<'_>) -> Result<ItemizedTotals> {
    let mut totals = ItemizedTotals::default();
    for row in select_in(PAGE, table, "tbody tr")? {
        let row_cells = cells(row);
        let [designation, _, social_security, member, ..] = row_cells.as_slice() else {
            return Err(ScrapeError::structure(
                PAGE,
                format!("expected 4 cells per breakdown row, found {}", row_cells.len()),
            ));
        };

        if !totals.designations.contains(designation) {
            totals.designations.push(designation.clone());
        }
        totals.social_security += normalize_amount(social_security)?;
        totals.member += normalize_amount(member)?;
    }
    Ok(totals)
}
