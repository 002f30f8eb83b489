//! Safety-label text: the openFDA client and a TTL memo in front of it.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabelError {
    #[error("Cannot connect to label service at {0}")]
    Connection(String),

    #[error("Label request timed out after {0}s")]
    Timeout(u64),

    #[error("Label service returned HTTP {status}")]
    Http { status: u16 },

    #[error("Label response parsing failed: {0}")]
    Parse(String),

    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Source of free-text safety label content for one drug.
pub trait LabelTextProvider {
    /// Concatenated interaction/warning text. An empty string means the
    /// provider knows no label for this drug.
    fn fetch_label_text(&self, drug: &str) -> Result<String, LabelError>;
}

/// Label sections scanned for interaction mentions, in concatenation order.
const LABEL_SECTIONS: &[&str] = &[
    "drug_interactions",
    "warnings",
    "precautions",
    "contraindications",
    "boxed_warning",
    "warnings_and_cautions",
];

/// openFDA `/drug/label.json` client.
pub struct OpenFdaLabelClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OpenFdaLabelClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, LabelError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LabelError::Client(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        })
    }
}

/// Response body from `/drug/label.json`. Each section is a list of
/// paragraphs; absent sections are common.
#[derive(Deserialize)]
struct LabelResponse {
    #[serde(default)]
    results: Vec<HashMap<String, serde_json::Value>>,
}

impl LabelTextProvider for OpenFdaLabelClient {
    fn fetch_label_text(&self, drug: &str) -> Result<String, LabelError> {
        let search = format!("openfda.substance_name:\"{}\"", drug.trim());

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("search", search.as_str()), ("limit", "1")])
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    LabelError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    LabelError::Connection(self.base_url.clone())
                } else {
                    LabelError::Client(e.to_string())
                }
            })?;

        let status = response.status();
        // openFDA answers 404 when the search matches nothing.
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(String::new());
        }
        if !status.is_success() {
            return Err(LabelError::Http {
                status: status.as_u16(),
            });
        }

        let parsed: LabelResponse = response
            .json()
            .map_err(|e| LabelError::Parse(e.to_string()))?;

        Ok(parsed
            .results
            .first()
            .map(label_sections_text)
            .unwrap_or_default())
    }
}

/// Join the scanned sections of one label record with spaces.
fn label_sections_text(record: &HashMap<String, serde_json::Value>) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for section in LABEL_SECTIONS {
        match record.get(*section) {
            Some(serde_json::Value::Array(items)) => {
                parts.extend(items.iter().filter_map(serde_json::Value::as_str));
            }
            Some(serde_json::Value::String(text)) => parts.push(text),
            _ => {}
        }
    }
    parts.join(" ")
}

// -----------------------------------------------------------------------------
// LabelCache
// -----------------------------------------------------------------------------

/// Per-drug memo of label text with TTL eviction. Failed fetches are stored
/// as empty text so an unreachable provider is asked once per TTL window.
pub struct LabelCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl LabelCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_or_fetch(&self, drug: &str, provider: &dyn LabelTextProvider) -> String {
        self.get_or_fetch_at(drug, provider, Instant::now())
    }

    pub fn get_or_fetch_at(
        &self,
        drug: &str,
        provider: &dyn LabelTextProvider,
        now: Instant,
    ) -> String {
        let key = drug.trim().to_uppercase();
        if let Some(text) = self.get_at(&key, now) {
            return text;
        }

        let text = match provider.fetch_label_text(&key) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(drug = %key, error = %e, "Label fetch failed, using empty text");
                String::new()
            }
        };
        self.insert_at(&key, text.clone(), now);
        text
    }

    /// Cached text if present and younger than the TTL.
    pub fn get_at(&self, drug: &str, now: Instant) -> Option<String> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let key = drug.trim().to_uppercase();
        match entries.get(&key) {
            Some((text, fetched)) if now.saturating_duration_since(*fetched) < self.ttl => {
                Some(text.clone())
            }
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn insert_at(&self, drug: &str, text: String, now: Instant) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(drug.trim().to_uppercase(), (text, now));
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
