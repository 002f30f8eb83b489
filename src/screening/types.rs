use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// TimeSlot & DosingBucket
// ---------------------------------------------------------------------------

/// Coarse administration period. Not a clock time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimeSlot {
    Morning,
    Noon,
    Night,
}

impl TimeSlot {
    pub const ALL: [TimeSlot; 3] = [TimeSlot::Morning, TimeSlot::Noon, TimeSlot::Night];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "Morning",
            Self::Noon => "Noon",
            Self::Night => "Night",
        }
    }
}

/// Set of active slots for one entry. Ordered Morning, Noon, Night.
pub type SlotSet = BTreeSet<TimeSlot>;

/// Grouping of co-administered drugs within one prescription.
///
/// `Global` holds every drug of the prescription regardless of timing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DosingBucket {
    Slot(TimeSlot),
    Global,
}

impl DosingBucket {
    /// Iteration order used when checking buckets. The first bucket that
    /// reports a pair owns the alert context.
    pub const ORDER: [DosingBucket; 4] = [
        DosingBucket::Slot(TimeSlot::Morning),
        DosingBucket::Slot(TimeSlot::Noon),
        DosingBucket::Slot(TimeSlot::Night),
        DosingBucket::Global,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Slot(slot) => slot.as_str(),
            Self::Global => "Entire Prescription",
        }
    }
}

impl From<TimeSlot> for DosingBucket {
    fn from(slot: TimeSlot) -> Self {
        Self::Slot(slot)
    }
}

impl fmt::Display for DosingBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Severity & Provenance
// ---------------------------------------------------------------------------

/// Ordinal interaction risk. Knowledge-base files may use the
/// Major/Minor vocabulary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    #[serde(alias = "Minor", alias = "low", alias = "minor")]
    Low,
    #[serde(alias = "moderate")]
    Moderate,
    #[serde(alias = "Major", alias = "high", alias = "major")]
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an interaction finding came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Provenance {
    /// Curated interaction table.
    KnowledgeBase,
    /// Keyword scan over safety-label text.
    LabelText,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KnowledgeBase => "knowledge-base",
            Self::LabelText => "label-text",
        }
    }
}

// ---------------------------------------------------------------------------
// PairKey
// ---------------------------------------------------------------------------

/// Unordered pair of canonical names. `PairKey::new(a, b) == PairKey::new(b, a)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PairKey {
    first: String,
    second: String,
}

impl PairKey {
    pub fn new(a: &str, b: &str) -> Self {
        let a = a.trim().to_uppercase();
        let b = b.trim().to_uppercase();
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }

    pub fn first(&self) -> &str {
        &self.first
    }

    pub fn second(&self) -> &str {
        &self.second
    }

    pub fn is_self_pair(&self) -> bool {
        self.first == self.second
    }
}

// ---------------------------------------------------------------------------
// InteractionFact
// ---------------------------------------------------------------------------

/// A positive classification for one pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractionFact {
    pub pair: PairKey,
    pub severity: Severity,
    pub description: String,
    pub provenance: Provenance,
}

// ---------------------------------------------------------------------------
// Rows, entries, alerts
// ---------------------------------------------------------------------------

/// One prescription record as handed over by ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrescriptionRow {
    pub id: Option<String>,
    pub text: String,
}

impl PrescriptionRow {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            text: text.into(),
        }
    }
}

/// Which resolution strategy produced a canonical identity.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum ResolutionTier {
    AliasExact,
    AliasSubstring,
    Vocabulary,
    Fuzzy,
    DrugDatabase,
    Unresolved,
}

/// Canonical identity for a normalized candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub canonical: String,
    /// Never empty.
    pub ingredients: Vec<String>,
    pub tier: ResolutionTier,
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        self.tier != ResolutionTier::Unresolved
    }
}

/// A resolved segment of a prescription row.
#[derive(Debug, Clone, Serialize)]
pub struct DrugEntry {
    pub raw: String,
    pub candidate: String,
    pub resolution: Resolution,
    pub slots: SlotSet,
}

/// Output unit. One per (prescription id, pair).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub prescription_id: String,
    pub context: DosingBucket,
    pub pair: PairKey,
    /// "A + B" in detection order.
    pub drug_pair: String,
    pub warning: String,
    pub severity: Severity,
    pub provenance: Provenance,
}

// ---------------------------------------------------------------------------
// BatchReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Default, PartialEq, Eq)]
pub struct SeverityCounts {
    pub high: usize,
    pub moderate: usize,
    pub low: usize,
}

impl SeverityCounts {
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::High => self.high += 1,
            Severity::Moderate => self.moderate += 1,
            Severity::Low => self.low += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.high + self.moderate + self.low
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub alerts: Vec<Alert>,
    pub rows_processed: usize,
    /// Rows whose processing failed and contributed no alerts.
    pub rows_failed: usize,
    pub counts: SeverityCounts,
    pub started_at: NaiveDateTime,
    pub processing_time_ms: u64,
}

// ---------------------------------------------------------------------------
// ReferenceError
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("Reference data load failed ({0}): {1}")]
    Load(String, String),

    #[error("Reference data parse failed ({0}): {1}")]
    Parse(String, String),

    #[error("Invalid interaction entry: {0}")]
    InvalidInteraction(String),

    #[error("Alias {0} maps to both {1} and {2}")]
    ConflictingAlias(String, String, String),
}
