//! Typed queries over portal HTML.
//!
//! Every lookup either yields an element or says explicitly that it did not
//! find one; callers decide whether absence is legitimate (`find`) or means
//! the portal changed under us (`require`).

use crate::error::{Result, ScrapeError};
use mgen_core::FormFields;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

/// A parsed portal page.
pub struct PortalDocument {
    html: Html,
    page: &'static str,
}

impl PortalDocument {
    /// Parse `body`; `page` names the page in structure errors.
    #[must_use]
    pub fn parse(body: &str, page: &'static str) -> Self {
        Self {
            html: Html::parse_document(body),
            page,
        }
    }

    /// First element matching `css`, if any.
    pub fn find(&self, css: &str) -> Result<Option<ElementRef<'_>>> {
        let selector = parse_selector(self.page, css)?;
        Ok(self.html.select(&selector).next())
    }

    /// First element matching `css`; absence is a structure change.
    pub fn require(&self, css: &str, what: &str) -> Result<ElementRef<'_>> {
        self.find(css)?
            .ok_or_else(|| ScrapeError::structure(self.page, format!("{what} not found ({css})")))
    }

    /// Every element matching `css`, in document order.
    pub fn find_all(&self, css: &str) -> Result<Vec<ElementRef<'_>>> {
        let selector = parse_selector(self.page, css)?;
        Ok(self.html.select(&selector).collect())
    }

    /// Structure error attributed to this page.
    pub fn structure_error(&self, reason: impl Into<String>) -> ScrapeError {
        ScrapeError::structure(self.page, reason)
    }
}

/// Parse a CSS selector; an unparsable one counts as a structure change.
pub fn parse_selector(page: &'static str, css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| ScrapeError::structure(page, format!("invalid selector {css:?}: {e}")))
}

/// Descendants of `element` matching `css`.
pub fn select_in<'a>(
    page: &'static str,
    element: ElementRef<'a>,
    css: &str,
) -> Result<Vec<ElementRef<'a>>> {
    let selector = parse_selector(page, css)?;
    Ok(element.select(&selector).collect())
}

/// Trimmed text content.
#[must_use]
pub fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Trimmed text of each `td` cell of a row.
#[must_use]
pub fn cells(row: ElementRef<'_>) -> Vec<String> {
    static TD: OnceLock<Selector> = OnceLock::new();
    let td = TD.get_or_init(|| Selector::parse("td").expect("valid selector"));
    row.select(td).map(text_of).collect()
}

/// The element itself or its nearest ancestor carrying `attr`.
#[must_use]
pub fn closest_with_attr<'a>(element: ElementRef<'a>, attr: &str) -> Option<ElementRef<'a>> {
    std::iter::once(element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .find(|el| el.value().attr(attr).is_some())
}

/// The element sibling immediately before `element`.
#[must_use]
pub fn previous_element(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.prev_siblings().find_map(ElementRef::wrap)
}

/// Serialize a form's successful controls, in document order.
///
/// Follows what a browser submits: named, enabled controls only; no
/// buttons or file inputs; checkboxes and radios only when checked; a
/// single-choice `select` falls back to its first option.
#[must_use]
pub fn serialize_form(form: ElementRef<'_>) -> FormFields {
    static CONTROLS: OnceLock<Selector> = OnceLock::new();
    static OPTIONS: OnceLock<Selector> = OnceLock::new();
    let controls = CONTROLS.get_or_init(|| {
        Selector::parse("input[name], select[name], textarea[name]").expect("valid selector")
    });
    let options = OPTIONS.get_or_init(|| Selector::parse("option").expect("valid selector"));

    let mut fields = FormFields::new();

    for control in form.select(controls) {
        let el = control.value();
        let name = el.attr("name").unwrap_or_default();
        if name.is_empty() || el.attr("disabled").is_some() {
            continue;
        }

        match el.name() {
            "input" => {
                let kind = el.attr("type").unwrap_or("text").to_ascii_lowercase();
                match kind.as_str() {
                    "submit" | "button" | "image" | "reset" | "file" => {}
                    "checkbox" | "radio" => {
                        if el.attr("checked").is_some() {
                            fields.push(name, el.attr("value").unwrap_or("on"));
                        }
                    }
                    _ => fields.push(name, el.attr("value").unwrap_or_default()),
                }
            }
            "select" => {
                let all: Vec<ElementRef<'_>> = control.select(options).collect();
                let selected: Vec<ElementRef<'_>> = all
                    .iter()
                    .copied()
                    .filter(|opt| opt.value().attr("selected").is_some())
                    .collect();

                if el.attr("multiple").is_some() {
                    for opt in selected {
                        fields.push(name, option_value(opt));
                    }
                } else if let Some(opt) = selected.last().or_else(|| all.first()) {
                    fields.push(name, option_value(*opt));
                }
            }
            "textarea" => fields.push(name, control.text().collect::<String>()),
            _ => {}
        }
    }

    fields
}

fn option_value(option: ElementRef<'_>) -> String {
    option
        .value()
        .attr("value")
        .map_or_else(|| text_of(option), str::to_string)
}
