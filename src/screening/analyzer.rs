//! Row orchestration: split a prescription into entries, resolve and time
//! each one, group ingredients into dosing buckets and classify every
//! co-administered pair.

use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use crate::config::ScreeningConfig;

use super::classifier::InteractionClassifier;
use super::label::{LabelCache, LabelTextProvider};
use super::normalize::normalize_entry;
use super::reference::ScreeningReferenceData;
use super::resolver::{CanonicalResolver, DrugDatabase};
use super::schedule::parse_time_slots;
use super::types::{
    Alert, BatchReport, DosingBucket, DrugEntry, InteractionFact, PairKey, PrescriptionRow,
    SeverityCounts,
};

/// Entry separators inside one prescription cell.
const ENTRY_SEPARATORS: &[&str] = &["|||", ";", "\n", "\r"];

/// Split raw prescription text into trimmed, non-blank entries.
pub fn split_entries(text: &str) -> Vec<&str> {
    let mut parts = vec![text];
    for sep in ENTRY_SEPARATORS {
        parts = parts.into_iter().flat_map(|p| p.split(*sep)).collect();
    }
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Distinct ingredient names per bucket, in `DosingBucket::ORDER`.
/// Names keep first-insertion order.
pub fn assemble_buckets(entries: &[DrugEntry]) -> Vec<(DosingBucket, Vec<String>)> {
    let mut buckets: Vec<(DosingBucket, Vec<String>)> = DosingBucket::ORDER
        .iter()
        .map(|bucket| (*bucket, Vec::new()))
        .collect();

    for entry in entries {
        for (bucket, names) in buckets.iter_mut() {
            let active = match *bucket {
                DosingBucket::Slot(slot) => entry.slots.contains(&slot),
                DosingBucket::Global => true,
            };
            if !active {
                continue;
            }
            for ingredient in &entry.resolution.ingredients {
                if !names.contains(ingredient) {
                    names.push(ingredient.clone());
                }
            }
        }
    }
    buckets
}

/// All unordered pairs of distinct names, `i < j`.
pub fn bucket_pairs(names: &[String]) -> Vec<(&str, &str)> {
    let mut pairs = Vec::with_capacity(names.len() * names.len().saturating_sub(1) / 2);
    for (i, a) in names.iter().enumerate() {
        for b in &names[i + 1..] {
            if a != b {
                pairs.push((a.as_str(), b.as_str()));
            }
        }
    }
    pairs
}

pub struct RowAnalyzer {
    resolver: CanonicalResolver,
    classifier: InteractionClassifier,
    labels: LabelCache,
}

impl RowAnalyzer {
    /// Knowledge-base-only analyzer. Attach collaborators with the
    /// `with_*` builders.
    pub fn new(reference: Arc<ScreeningReferenceData>, config: &ScreeningConfig) -> Self {
        Self {
            resolver: CanonicalResolver::new(Arc::clone(&reference), config.fuzzy_threshold),
            classifier: InteractionClassifier::new(reference, config.snippet_radius),
            labels: LabelCache::new(config.label_cache_ttl()),
        }
    }

    pub fn with_drug_database(mut self, db: Box<dyn DrugDatabase>) -> Self {
        self.resolver = self.resolver.with_drug_database(db);
        self
    }

    pub fn with_label_provider(mut self, provider: Box<dyn LabelTextProvider>) -> Self {
        self.classifier = self.classifier.with_label_provider(provider);
        self
    }

    pub fn label_cache(&self) -> &LabelCache {
        &self.labels
    }

    /// Normalize, resolve and time every entry of a row. Entries that carry
    /// no drug name are dropped.
    pub fn parse_entries(&self, text: &str) -> Vec<DrugEntry> {
        let mut entries = Vec::new();
        for raw in split_entries(text) {
            let candidate = normalize_entry(raw);
            if candidate.is_empty() {
                tracing::debug!(entry = raw, "Dropping entry without drug name");
                continue;
            }
            entries.push(DrugEntry {
                resolution: self.resolver.resolve(&candidate),
                slots: parse_time_slots(raw),
                raw: raw.to_string(),
                candidate,
            });
        }
        entries
    }

    /// Alerts for one prescription, at most one per unordered pair.
    pub fn analyze_row(&self, prescription_id: &str, text: &str) -> Vec<Alert> {
        let entries = self.parse_entries(text);
        let buckets = assemble_buckets(&entries);

        let mut verdicts: HashMap<PairKey, Option<InteractionFact>> = HashMap::new();
        let mut reported: HashSet<PairKey> = HashSet::new();
        let mut alerts = Vec::new();

        for (bucket, names) in &buckets {
            for (a, b) in bucket_pairs(names) {
                let key = PairKey::new(a, b);
                if reported.contains(&key) {
                    continue;
                }
                let verdict = verdicts
                    .entry(key.clone())
                    .or_insert_with(|| self.classifier.classify(a, b, &self.labels));

                if let Some(fact) = verdict {
                    reported.insert(key.clone());
                    alerts.push(Alert {
                        prescription_id: prescription_id.to_string(),
                        context: *bucket,
                        pair: key,
                        drug_pair: format!("{a} + {b}"),
                        warning: fact.description.clone(),
                        severity: fact.severity,
                        provenance: fact.provenance,
                    });
                }
            }
        }

        tracing::debug!(
            prescription = prescription_id,
            entries = entries.len(),
            pairs_checked = verdicts.len(),
            alerts = alerts.len(),
            "Row analyzed"
        );
        alerts
    }

    /// Screen every row. A row whose processing panics is logged, counted
    /// as failed and contributes no alerts.
    pub fn analyze_batch(&self, rows: &[PrescriptionRow]) -> BatchReport {
        let started_at = chrono::Local::now().naive_local();
        let start = Instant::now();

        let mut alerts: Vec<Alert> = Vec::new();
        let mut seen: HashSet<(String, PairKey)> = HashSet::new();
        let mut rows_failed = 0;

        for (idx, row) in rows.iter().enumerate() {
            let id = row_id(row, idx);
            let result = panic::catch_unwind(AssertUnwindSafe(|| self.analyze_row(&id, &row.text)));
            match result {
                Ok(row_alerts) => {
                    for alert in row_alerts {
                        if seen.insert((alert.prescription_id.clone(), alert.pair.clone())) {
                            alerts.push(alert);
                        }
                    }
                }
                Err(_) => {
                    rows_failed += 1;
                    tracing::error!(prescription = %id, row = idx + 1, "Row processing failed, skipping");
                }
            }
        }

        let mut counts = SeverityCounts::default();
        for alert in &alerts {
            counts.record(alert.severity);
        }

        let processing_time_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            rows = rows.len(),
            rows_failed,
            alerts = alerts.len(),
            high = counts.high,
            moderate = counts.moderate,
            low = counts.low,
            processing_ms = processing_time_ms,
            "Batch screening complete"
        );

        BatchReport {
            alerts,
            rows_processed: rows.len(),
            rows_failed,
            counts,
            started_at,
            processing_time_ms,
        }
    }
}

/// Row identifier, or `ROW-<n>` (1-based) when the row has none.
fn row_id(row: &PrescriptionRow, idx: usize) -> String {
    match row.id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => format!("ROW-{}", idx + 1),
    }
}
