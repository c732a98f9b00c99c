//! Scripted in-memory portal for pipeline tests.

#![allow(dead_code)]

use async_trait::async_trait;
use mgen_core::{Credentials, FormFields};
use mgen_session::{Page, Result, SessionError, Transport};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

pub const BASE: &str = "https://www.mgen.fr";
pub const PLUGIN: &str = "tx_mtechremboursement_mtechremboursementsante";

pub const LOGIN_PATH: &str = "/login-adherent/";
pub const REIMBURSEMENTS_PATH: &str = "/mon-espace-perso/mes-remboursements/";
pub const SEARCH_PATH: &str = "/mon-espace-perso/mes-remboursements/recherche/";
pub const DETAIL_PATH: &str = "/mon-espace-perso/mes-remboursements/detail/";
pub const CERTIFICATE_PATH: &str = "/mon-espace-perso/attestation-de-droit-regime-complementaire/";
pub const GENERATE_PATH: &str = "/attestation/generer/";
pub const DOWNLOAD_PATH: &str = "/attestation/telecharger/";

/// One result table row.
#[derive(Debug, Clone)]
pub struct Row {
    pub index: String,
    pub original_date: &'static str,
    pub beneficiary: &'static str,
    pub amount: &'static str,
    pub date: &'static str,
    pub pdf: bool,
}

impl Row {
    pub fn new(index: usize, beneficiary: &'static str, amount: &'static str) -> Self {
        Self {
            index: index.to_string(),
            original_date: "02/08/2024",
            beneficiary,
            amount,
            date: "12/08/2024",
            pdf: false,
        }
    }

    pub fn with_pdf(mut self) -> Self {
        self.pdf = true;
        self
    }
}

/// How the portal answers one row's detail request.
#[derive(Debug, Clone)]
pub enum Detail {
    Body(String),
    Fail,
}

/// Fake portal: routes by path, scripts per-row detail answers and
/// records what the client sent.
pub struct FakePortal {
    landing: String,
    results: String,
    details: HashMap<String, Detail>,
    detail_delays: HashMap<String, Duration>,
    default_delay: Duration,
    fail_generation: bool,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub requests: Mutex<Vec<String>>,
    pub detail_submissions: Mutex<Vec<FormFields>>,
    pub generation_submissions: Mutex<Vec<FormFields>>,
}

impl FakePortal {
    pub fn new(with_certificate: bool, rows: &[Row]) -> Self {
        Self {
            landing: landing(with_certificate),
            results: results_page(rows),
            details: HashMap::new(),
            detail_delays: HashMap::new(),
            default_delay: Duration::ZERO,
            fail_generation: false,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            detail_submissions: Mutex::new(Vec::new()),
            generation_submissions: Mutex::new(Vec::new()),
        }
    }

    pub fn with_landing(mut self, landing: impl Into<String>) -> Self {
        self.landing = landing.into();
        self
    }

    pub fn with_detail(mut self, row: usize, detail: Detail) -> Self {
        self.details.insert(row.to_string(), detail);
        self
    }

    pub fn with_detail_delay(mut self, row: usize, delay: Duration) -> Self {
        self.detail_delays.insert(row.to_string(), delay);
        self
    }

    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    /// Answer certificate generation with a server error.
    pub fn with_failing_generation(mut self) -> Self {
        self.fail_generation = true;
        self
    }

    pub fn requested(&self, path: &str) -> bool {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .any(|request| request.ends_with(path))
    }

    fn record(&self, method: &str, url: &Url) {
        self.requests
            .lock()
            .unwrap()
            .push(format!("{method} {}", url.path()));
    }

    fn page(path: &str, body: &str) -> Page {
        Page {
            url: Url::parse(&format!("{BASE}{path}")).unwrap(),
            body: body.to_string(),
        }
    }

    async fn detail(&self, fields: &FormFields) -> Result<Page> {
        self.detail_submissions.lock().unwrap().push(fields.clone());
        let row = fields
            .get(&format!("{PLUGIN}[indexLine]"))
            .unwrap_or_default()
            .to_string();

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = self
            .detail_delays
            .get(&row)
            .copied()
            .unwrap_or(self.default_delay);
        tokio::time::sleep(delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.details.get(&row) {
            Some(Detail::Body(body)) => Ok(Self::page(DETAIL_PATH, body)),
            Some(Detail::Fail) | None => Err(SessionError::UnexpectedStatus {
                url: format!("{BASE}{DETAIL_PATH}"),
                status: 500,
            }),
        }
    }
}

#[async_trait]
impl Transport for FakePortal {
    async fn get(&self, url: &Url) -> Result<Page> {
        self.record("GET", url);
        match url.path() {
            REIMBURSEMENTS_PATH => Ok(Self::page(REIMBURSEMENTS_PATH, SEARCH_PAGE)),
            CERTIFICATE_PATH => Ok(Self::page(CERTIFICATE_PATH, CERTIFICATE_PAGE)),
            _ => Err(not_found(url)),
        }
    }

    async fn post_form(&self, url: &Url, fields: &FormFields) -> Result<Page> {
        self.record("POST", url);
        match url.path() {
            LOGIN_PATH => Ok(Self::page("/mon-espace-perso/", &self.landing)),
            SEARCH_PATH => Ok(Self::page(SEARCH_PATH, &self.results)),
            DETAIL_PATH => self.detail(fields).await,
            GENERATE_PATH => {
                self.generation_submissions
                    .lock()
                    .unwrap()
                    .push(fields.clone());
                if self.fail_generation {
                    return Err(SessionError::UnexpectedStatus {
                        url: url.to_string(),
                        status: 500,
                    });
                }
                Ok(Self::page(GENERATE_PATH, "<p>OK</p>"))
            }
            _ => Err(not_found(url)),
        }
    }

    async fn download(&self, url: &Url, _headers: &BTreeMap<String, String>) -> Result<Vec<u8>> {
        self.record("DOWNLOAD", url);
        Ok(b"%PDF-1.4".to_vec())
    }
}

fn not_found(url: &Url) -> SessionError {
    SessionError::UnexpectedStatus {
        url: url.to_string(),
        status: 404,
    }
}

pub fn credentials() -> Credentials {
    Credentials::new("123456789", "s3cret", "/tmp/mgen")
}

pub fn landing(with_certificate: bool) -> String {
    let certificate = if with_certificate {
        format!(
            r#"<div data-tag-metier-attestations-demarches="1" data-matrice="ATT42">
                <a href="{CERTIFICATE_PATH}?id=7">Attestation</a>
            </div>"#
        )
    } else {
        String::new()
    };
    format!(
        r#"<html><body><div class="tuiles">
            {certificate}
            <div data-tag-metier-remboursements="1" data-matrice="RMB99">
                <a href="{REIMBURSEMENTS_PATH}?page=1">Mes remboursements</a>
            </div>
        </div></body></html>"#
    )
}

pub const SEARCH_PAGE: &str = r#"
    <form id="formRechercheRemboursements" method="post" action="/mon-espace-perso/mes-remboursements/recherche/">
        <input type="hidden" name="__trustedProperties" value="token">
        <input type="text" name="tx_mtechremboursement_mtechremboursementsante[dateDebut]" value="01/08/2024">
        <input type="text" name="tx_mtechremboursement_mtechremboursementsante[dateFin]" value="31/08/2024">
        <button type="submit">Rechercher</button>
    </form>"#;

pub const CERTIFICATE_PAGE: &str = r#"
    <div>
        <script type="text/javascript">
            var urlGenerer = '%2Fattestation%2Fgenerer%2F';
            var urlTelecharger = '%2Fattestation%2Ftelecharger%2F';
        </script>
        <div id="panelAttestationDroitRO"></div>
    </div>"#;

pub fn results_page(rows: &[Row]) -> String {
    let mut body = String::new();
    for row in rows {
        let pdf = if row.pdf {
            format!(
                r#"<td><a class="pdf_download" href="/releves/?id={}">PDF</a></td>"#,
                row.index
            )
        } else {
            String::new()
        };
        let _ = write!(
            body,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td>{pdf}</tr>",
            row.index, row.original_date, row.beneficiary, row.amount, row.date
        );
    }

    format!(
        r#"<table id="tableDernierRemboursement"><tbody>{body}</tbody></table>
        <form id="formDetailsRemboursement" action="{DETAIL_PATH}">
            <input type="hidden" name="{PLUGIN}[indexLine]" value="">
            <input type="hidden" name="{PLUGIN}[rowIdOrder]" value="">
        </form>"#
    )
}

/// Detail panel with an itemized breakdown: `(designation, social security, member)`.
pub fn itemized_detail(care: &str, insured: &str, lines: &[(&str, &str, &str)]) -> Detail {
    let mut rows = String::new();
    for (designation, social_security, member) in lines {
        let _ = write!(
            rows,
            "<tr><td>{designation}</td><td>-</td><td>{social_security}</td><td>{member}</td></tr>"
        );
    }
    Detail::Body(format!(
        r#"<div id="ajax-details-remboursements">
            <table>
                <tr><td>Montant des soins</td><td>{care}</td></tr>
                <tr><td>Remboursement à l'assuré</td><td>{insured}</td></tr>
            </table>
            <table><tbody>{rows}</tbody></table>
        </div>"#
    ))
}

/// Detail panel with the summary table only.
pub fn flat_detail(care: &str, insured: &str, prescriber: &str) -> Detail {
    Detail::Body(format!(
        r#"<div id="ajax-details-remboursements">
            <table>
                <tr><td>Montant des soins</td><td>{care}</td></tr>
                <tr><td>Remboursement à l'assuré</td><td>{insured}</td></tr>
                <tr><td>Prescripteur</td><td>{prescriber}</td></tr>
            </table>
        </div>"#
    ))
}
