//! URL fragments embedded in inline page configuration.
//!
//! The certificate page declares its endpoints in an inline script, one
//! statement per line, each with a single-quoted, percent-escaped path:
//!
//! ```text
//! var urlGenerer = '%2Fmon-espace-perso%2Fattestation%3Faction%3Dgenerer';
//! var urlTelecharger = '%2Fmon-espace-perso%2Fattestation%3Faction%3Dtelecharger';
//! ```
//!
//! This is the most fragile extraction in the pipeline: it depends on the
//! script's line layout, not on markup. Callers must treat "too few
//! fragments" as a structure change.

use regex::Regex;
use std::sync::OnceLock;

/// Extract the single-quoted fragment of each line, unescaped, in order.
///
/// Lines without a quoted fragment are skipped.
#[must_use]
pub fn extract_quoted_urls(script: &str) -> Vec<String> {
    static QUOTED: OnceLock<Regex> = OnceLock::new();
    let quoted = QUOTED.get_or_init(|| Regex::new(r"'(.*)'").expect("valid regex"));

    script
        .trim()
        .lines()
        .filter_map(|line| quoted.captures(line))
        .filter_map(|caps| caps.get(1))
        .map(|m| {
            urlencoding::decode(m.as_str())
                .map_or_else(|_| m.as_str().to_string(), std::borrow::Cow::into_owned)
        })
        .collect()
}
