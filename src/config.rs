use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

/// Application-level constants
pub const APP_NAME: &str = "ddi-screen";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default openFDA drug label endpoint.
pub const OPENFDA_LABEL_URL: &str = "https://api.fda.gov/drug/label.json";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "ddi_screen=info,warn"
}

/// Get the application data directory (~/.local/share/ddi-screen on Linux).
/// Falls back to the working directory when no data dir is known.
pub fn app_data_dir() -> PathBuf {
    let base = dirs::data_dir().unwrap_or_else(|| {
        tracing::warn!("No user data directory, using the working directory");
        PathBuf::from(".")
    });
    base.join(APP_NAME)
}

/// Default location of the structured drug product database.
pub fn drug_db_path() -> PathBuf {
    app_data_dir().join("drug_products.db")
}

/// Tunables for one screening run.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScreeningConfig {
    /// Minimum similarity (0-100) for fuzzy canonical-vocabulary matches.
    pub fuzzy_threshold: f64,
    /// Minimum similarity (0-100) for fuzzy product-name matches in the
    /// structured drug database.
    pub drug_db_fuzzy_threshold: f64,
    /// Upper bound for a single label-text fetch.
    pub label_timeout_secs: u64,
    /// How long fetched label text stays valid.
    pub label_cache_ttl_secs: u64,
    /// Characters kept on each side of a label-text match.
    pub snippet_radius: usize,
    pub label_base_url: String,
    /// When false, classification uses the knowledge base only.
    pub label_scan_enabled: bool,
    /// Structured drug database path; `None` disables the collaborator.
    pub drug_db_path: Option<PathBuf>,
    /// Input CSV column holding the prescription text.
    pub text_column: String,
    /// Input CSV column holding the prescription identifier.
    pub id_column: String,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 88.0,
            drug_db_fuzzy_threshold: 80.0,
            label_timeout_secs: 5,
            label_cache_ttl_secs: 7200,
            snippet_radius: 200,
            label_base_url: OPENFDA_LABEL_URL.to_string(),
            label_scan_enabled: true,
            drug_db_path: Some(drug_db_path()),
            text_column: "Prescription".to_string(),
            id_column: "Prescription ID".to_string(),
        }
    }
}

impl ScreeningConfig {
    /// Defaults overridden by `DDI_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Malformed values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        override_parsed(&lookup, "DDI_FUZZY_THRESHOLD", &mut config.fuzzy_threshold);
        override_parsed(
            &lookup,
            "DDI_DRUG_DB_FUZZY_THRESHOLD",
            &mut config.drug_db_fuzzy_threshold,
        );
        override_parsed(&lookup, "DDI_LABEL_TIMEOUT_SECS", &mut config.label_timeout_secs);
        override_parsed(&lookup, "DDI_LABEL_CACHE_TTL_SECS", &mut config.label_cache_ttl_secs);
        override_parsed(&lookup, "DDI_SNIPPET_RADIUS", &mut config.snippet_radius);

        if let Some(url) = lookup("DDI_LABEL_URL").filter(|u| !u.trim().is_empty()) {
            config.label_base_url = url.trim().to_string();
        }
        if let Some(column) = lookup("DDI_TEXT_COLUMN").filter(|c| !c.trim().is_empty()) {
            config.text_column = column.trim().to_string();
        }
        if let Some(column) = lookup("DDI_ID_COLUMN").filter(|c| !c.trim().is_empty()) {
            config.id_column = column.trim().to_string();
        }
        if let Some(flag) = lookup("DDI_OFFLINE") {
            config.label_scan_enabled = !is_truthy(&flag);
        }
        if let Some(path) = lookup("DDI_DRUG_DB") {
            config.drug_db_path = match path.trim() {
                "" | "none" | "off" => None,
                p => Some(PathBuf::from(p)),
            };
        }

        config
    }

    pub fn label_timeout(&self) -> Duration {
        Duration::from_secs(self.label_timeout_secs)
    }

    pub fn label_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.label_cache_ttl_secs)
    }
}

fn override_parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) {
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(value) => *target = value,
            Err(_) => tracing::warn!(key, value = %raw, "Ignoring malformed config value"),
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
