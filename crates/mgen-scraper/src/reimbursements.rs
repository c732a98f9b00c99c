//! Reimbursement search and result table extraction.

use crate::document::{cells, parse_selector, serialize_form, text_of, PortalDocument};
use crate::enricher::RowFailure;
use crate::error::{Result, ScrapeError};
use mgen_core::locale::{
    format_portal_date, months_before, normalize_amount, parse_portal_date,
};
use mgen_core::{
    AppConfig, EntryFile, FormFields, PortalConfig, PortalSelectors, PreliminaryEntry, RowIndex,
};
use mgen_session::{resolve_link, Page, Transport};
use scraper::ElementRef;
use url::Url;

const PAGE: &str = "reimbursements";

/// A form ready to be submitted: resolved action plus serialized fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedForm {
    /// Absolute URL the form posts to
    pub action: Url,
    /// Field payload, in document order
    pub fields: FormFields,
}

/// What the result page yields: the rows, plus the shared detail form.
#[derive(Debug)]
pub struct ReimbursementPage {
    /// Parsed rows, in table order
    pub entries: Vec<PreliminaryEntry>,
    /// Rows that could not be parsed
    pub rejected: Vec<RowFailure>,
    /// Index cell of every row in the table, rejected rows included
    pub row_order: Vec<RowIndex>,
    /// Per-row detail form template; only required when there are rows
    pub detail_form: Option<PreparedForm>,
}

/// Runs the reimbursement search and parses the result table.
pub struct ReimbursementExtractor<'a> {
    portal: &'a PortalConfig,
    selectors: &'a PortalSelectors,
    lookback_months: u32,
}

impl<'a> ReimbursementExtractor<'a> {
    #[must_use]
    pub fn new(config: &'a AppConfig) -> Self {
        Self {
            portal: &config.portal,
            selectors: &config.selectors,
            lookback_months: config.scraping.lookback_months,
        }
    }

    /// Fetch the reimbursements section, submit the search and parse the results.
    pub async fn extract(&self, session: &dyn Transport, url: &Url) -> Result<ReimbursementPage> {
        tracing::info!("Fetching reimbursements");
        let page = session.get(url).await?;

        let search = self.search_request(&page)?;
        let results = session.post_form(&search.action, &search.fields).await?;

        let parsed = self.parse_results(&results)?;
        tracing::info!(
            "Found {} reimbursements ({} unreadable rows)",
            parsed.entries.len(),
            parsed.rejected.len()
        );
        Ok(parsed)
    }

    /// Build the search submission: the form as served, with the start date
    /// moved back from the form's own end date.
    pub fn search_request(&self, page: &Page) -> Result<PreparedForm> {
        let doc = PortalDocument::parse(&page.body, PAGE);
        let form = doc.require(&self.selectors.search_form, "search form")?;
        let action = form_action(&doc, form, &self.portal.base_url, &page.url)?;
        let mut fields = serialize_form(form);

        let end_field = &self.selectors.end_date_field;
        let end_text = fields
            .get(end_field)
            .ok_or_else(|| doc.structure_error(format!("search form has no {end_field} field")))?;
        let end = parse_portal_date(end_text)?;
        let start = months_before(end, self.lookback_months)?;

        tracing::debug!(
            "Searching reimbursements from {} to {}",
            format_portal_date(start),
            format_portal_date(end)
        );
        fields.set(&self.selectors.start_date_field, format_portal_date(start));

        Ok(PreparedForm { action, fields })
    }

    /// Parse the result table and the detail form out of a result page.
    pub fn parse_results(&self, page: &Page) -> Result<ReimbursementPage> {
        let doc = PortalDocument::parse(&page.body, PAGE);
        let pdf_selector = parse_selector(PAGE, &self.selectors.pdf_link)?;

        let mut entries = Vec::new();
        let mut rejected = Vec::new();
        let mut row_order = Vec::new();

        for (position, row) in doc.find_all(&self.selectors.result_rows)?.into_iter().enumerate() {
            let row_cells = cells(row);
            row_order.extend(row_cells.first().map(RowIndex::new));
            match self.parse_row(&row_cells, row, &pdf_selector) {
                Ok(entry) => entries.push(entry),
                Err(error) => {
                    tracing::warn!("Skipping reimbursement row {}: {}", position + 1, error);
                    rejected.push(RowFailure {
                        position,
                        row_index: row_cells.first().map(RowIndex::new),
                        error,
                    });
                }
            }
        }

        let detail_form = match doc.find(&self.selectors.detail_form)? {
            Some(form) => Some(PreparedForm {
                action: form_action(&doc, form, &self.portal.base_url, &page.url)?,
                fields: serialize_form(form),
            }),
            None if entries.is_empty() => None,
            None => {
                return Err(doc.structure_error(format!(
                    "detail form not found ({})",
                    self.selectors.detail_form
                )))
            }
        };

        Ok(ReimbursementPage {
            entries,
            rejected,
            row_order,
            detail_form,
        })
    }

    fn parse_row(
        &self,
        row_cells: &[String],
        row: ElementRef<'_>,
        pdf_selector: &scraper::Selector,
    ) -> Result<PreliminaryEntry> {
        let [index, original_date, beneficiary, amount, date, ..] = row_cells else {
            return Err(ScrapeError::structure(
                PAGE,
                format!("expected 5 cells per row, found {}", row_cells.len()),
            ));
        };

        let date = parse_portal_date(date)?;
        let file = match row.select(pdf_selector).next() {
            Some(link) => {
                let href = link.value().attr("href").ok_or_else(|| {
                    ScrapeError::structure(PAGE, format!("pdf link without href: {}", text_of(link)))
                })?;
                Some(EntryFile {
                    file_url: resolve_link(&self.portal.base_url, href)?,
                    filename: format!("{}_mgen.pdf", date.format("%Y%m")),
                })
            }
            None => None,
        };

        Ok(PreliminaryEntry {
            row_index: RowIndex::new(index.as_str()),
            original_date: parse_portal_date(original_date)?,
            beneficiary: beneficiary.clone(),
            amount: normalize_amount(amount)?,
            date,
            file,
        })
    }
}

/// Position in the result table of the `entry_position`-th parsed entry,
/// given the rows rejected while parsing (in table order).
#[must_use]
pub fn table_position(rejected: &[RowFailure], entry_position: usize) -> usize {
    let mut position = entry_position;
    for failure in rejected {
        if failure.position > position {
            break;
        }
        position += 1;
    }
    position
}

/// Resolve a form's `action`; a missing or empty one posts back to `current`.
fn form_action(
    doc: &PortalDocument,
    form: ElementRef<'_>,
    base_url: &str,
    current: &Url,
) -> Result<Url> {
    match form.value().attr("action").map(str::trim) {
        Some(action) if !action.is_empty() => resolve_link(base_url, action).map_err(|e| {
            doc.structure_error(format!("form action {action:?} is not a URL: {e}"))
        }),
        _ => Ok(current.clone()),
    }
}
