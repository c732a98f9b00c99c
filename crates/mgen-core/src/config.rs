//! Configuration management for the MGEN konnector.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides. Every CSS selector, form-field name and
//! summary label the scraper relies on lives here, so a portal variant that
//! renames one of them is a config change rather than a code change.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// Main application configuration.
///
/// This is loaded from `~/.config/mgen-konnector/config.toml` (or platform
/// equivalent). If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Portal endpoints and client identity
    pub portal: PortalConfig,
    /// Extraction behavior
    pub scraping: ScrapingConfig,
    /// CSS selectors and form-field names
    pub selectors: PortalSelectors,
    /// Labels of the detail summary table
    pub labels: DetailLabels,
    /// Delivery to the storage collaborators
    pub output: OutputConfig,
    /// Member account
    pub account: AccountConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, falling back to defaults if absent.
    pub fn load_from(config_path: &Path) -> ConfigResult<Self> {
        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `MGEN_CONFIG`: Read the config file from this path instead
    /// - `MGEN_LOGIN`: Override the account login
    /// - `MGEN_PASSWORD`: Override the account password
    /// - `MGEN_OUTPUT_DIR`: Override the output directory
    /// - `MGEN_DETAIL_CONCURRENCY`: Override the detail worker cap
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = match std::env::var_os("MGEN_CONFIG") {
            Some(path) => Self::load_from(Path::new(&path))?,
            None => Self::load()?,
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(login) = lookup("MGEN_LOGIN") {
            self.account.login = Some(login);
            tracing::debug!("Override account.login from env");
        }

        if let Some(password) = lookup("MGEN_PASSWORD") {
            self.account.password = Some(password);
            tracing::debug!("Override account.password from env");
        }

        if let Some(dir) = lookup("MGEN_OUTPUT_DIR") {
            tracing::debug!("Override account.output_directory from env: {}", dir);
            self.account.output_directory = Some(PathBuf::from(dir));
        }

        if let Some(val) = lookup("MGEN_DETAIL_CONCURRENCY") {
            let workers: usize = val.parse().map_err(|_| ConfigError::InvalidValue {
                field: "scraping.detail_concurrency".to_string(),
                reason: format!("not a positive integer: {val:?}"),
            })?;
            self.scraping.detail_concurrency = workers;
            tracing::debug!("Override scraping.detail_concurrency from env: {}", workers);
        }

        self.validate()
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.scraping.detail_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scraping.detail_concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if url::Url::parse(&self.portal.base_url).is_err() {
            return Err(ConfigError::InvalidValue {
                field: "portal.base_url".to_string(),
                reason: format!("not an absolute URL: {:?}", self.portal.base_url),
            });
        }
        Ok(())
    }

    /// Credentials for this run, taken from the `[account]` section.
    pub fn credentials(&self) -> ConfigResult<Credentials> {
        let login = self
            .account
            .login
            .clone()
            .ok_or(ConfigError::Missing("account.login"))?;
        let password = self
            .account
            .password
            .clone()
            .ok_or(ConfigError::Missing("account.password"))?;
        let output_directory = self
            .account
            .output_directory
            .clone()
            .ok_or(ConfigError::Missing("account.output_directory"))?;

        Ok(Credentials::new(login, password, output_directory))
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/mgen-konnector/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("fr", "mgen", "mgen-konnector")
            .ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// Portal endpoints and client identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Scheme and host every relative portal link is resolved against
    pub base_url: String,
    /// Login form endpoint
    pub login_path: String,
    /// Post-login redirect target sent with the credentials
    pub redirect_path: String,
    /// Path the portal redirects to during maintenance
    pub maintenance_path: String,
    /// User agent of the session client
    pub user_agent: String,
    /// Browser identification the certificate download endpoint requires
    pub download_user_agent: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.mgen.fr".to_string(),
            login_path: "/login-adherent/".to_string(),
            redirect_path: "/mon-espace-perso/".to_string(),
            maintenance_path: "/services-indisponibles/".to_string(),
            user_agent: concat!("mgen-konnector/", env!("CARGO_PKG_VERSION")).to_string(),
            download_user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}

/// How rows are aggregated from the detail panel.
///
/// The portal has served both an itemized breakdown table and a flat
/// summary over time; `Auto` picks per row based on what is present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailStrategy {
    /// Itemized when the breakdown table is present, flat otherwise
    #[default]
    Auto,
    /// Always sum the breakdown table; missing table is an error
    Itemized,
    /// Always use the summary; third-party-payer rows get a zero amount
    Flat,
}

/// Extraction behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    /// Maximum detail requests in flight (1 = sequential)
    pub detail_concurrency: usize,
    /// Search window, in months before the form's end date
    pub lookback_months: u32,
    /// Detail aggregation strategy
    pub detail_strategy: DetailStrategy,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            detail_concurrency: 5,
            lookback_months: 6,
            detail_strategy: DetailStrategy::Auto,
        }
    }
}

/// CSS selectors and form-field names observed on the portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalSelectors {
    /// Login plugin panel, only rendered when login did not go through
    pub login_panel: String,
    /// Error message inside the login panel
    pub login_error: String,
    /// Anchor to the complementary-coverage certificate
    pub attestation_link: String,
    /// Ancestor attribute scoping the certificate matrix code
    pub attestation_scope_attr: String,
    /// Anchor to the reimbursement history
    pub reimbursements_link: String,
    /// Ancestor attribute scoping the reimbursements matrix code
    pub reimbursements_scope_attr: String,
    /// Attribute holding the matrix code
    pub matrix_attr: String,
    /// Panel the certificate configuration script precedes
    pub attestation_panel: String,
    /// Reimbursement search form
    pub search_form: String,
    /// Search window start field
    pub start_date_field: String,
    /// Search window end field
    pub end_date_field: String,
    /// Result table rows
    pub result_rows: String,
    /// Statement PDF link within a row
    pub pdf_link: String,
    /// Per-row detail form
    pub detail_form: String,
    /// Detail form field selecting the row
    pub detail_row_field: String,
    /// Detail form field carrying every row index
    pub detail_order_field: String,
    /// Tables of the detail panel (summary first, breakdown second)
    pub detail_tables: String,
}

impl Default for PortalSelectors {
    fn default() -> Self {
        const PLUGIN: &str = "tx_mtechremboursement_mtechremboursementsante";
        Self {
            login_panel: ".tx-felogin-pi1".to_string(),
            login_error: ".tx-felogin-pi1 .alert-danger".to_string(),
            attestation_link: "a[href*='attestation-de-droit-regime-complementaire']"
                .to_string(),
            attestation_scope_attr: "data-tag-metier-attestations-demarches".to_string(),
            reimbursements_link: "a[href*='mes-remboursements']".to_string(),
            reimbursements_scope_attr: "data-tag-metier-remboursements".to_string(),
            matrix_attr: "data-matrice".to_string(),
            attestation_panel: "#panelAttestationDroitRO".to_string(),
            search_form: "#formRechercheRemboursements".to_string(),
            start_date_field: format!("{PLUGIN}[dateDebut]"),
            end_date_field: format!("{PLUGIN}[dateFin]"),
            result_rows: "#tableDernierRemboursement tbody tr".to_string(),
            pdf_link: ".pdf_download".to_string(),
            detail_form: "#formDetailsRemboursement".to_string(),
            detail_row_field: format!("{PLUGIN}[indexLine]"),
            detail_order_field: format!("{PLUGIN}[rowIdOrder]"),
            detail_tables: "#ajax-details-remboursements table".to_string(),
        }
    }
}

/// Labels of the detail summary table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailLabels {
    /// Total cost of care
    pub care_amount: String,
    /// Amount refunded to the insured member
    pub insured_refund: String,
    /// Prescribing practitioner
    pub prescriber: String,
}

impl Default for DetailLabels {
    fn default() -> Self {
        Self {
            care_amount: "Montant des soins".to_string(),
            insured_refund: "Remboursement à l'assuré".to_string(),
            prescriber: "Prescripteur".to_string(),
        }
    }
}

/// Delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Wall-clock budget handed to the bill sink
    pub bills_deadline_secs: u64,
    /// Bill store filename inside the output directory
    pub bills_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            bills_deadline_secs: 60,
            bills_file: "bills.json".to_string(),
        }
    }
}

/// Member account section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Portal login (member number or email)
    pub login: Option<String>,
    /// Portal password; never serialized
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Directory bills and files are stored in
    pub output_directory: Option<PathBuf>,
}

/// Credential pair plus output directory for one run.
pub struct Credentials {
    /// Portal login
    pub login: String,
    /// Portal password, wiped from memory on drop
    pub password: Zeroizing<String>,
    /// Directory bills and files are stored in
    pub output_directory: PathBuf,
}

impl Credentials {
    /// Build credentials.
    #[must_use]
    pub fn new(
        login: impl Into<String>,
        password: impl Into<String>,
        output_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            login: login.into(),
            password: Zeroizing::new(password.into()),
            output_directory: output_directory.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .field("output_directory", &self.output_directory)
            .finish()
    }
}
