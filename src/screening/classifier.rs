//! Pair classification: curated knowledge base first, then a keyword scan
//! over safety-label text.

use std::sync::Arc;

use regex::RegexBuilder;

use super::label::{LabelCache, LabelTextProvider};
use super::reference::ScreeningReferenceData;
use super::types::{InteractionFact, PairKey, Provenance, Severity};

/// Names shorter than this are never looked up or searched for in label text.
const MIN_SCAN_NAME_LEN: usize = 3;

const HIGH_SEVERITY_KEYWORDS: &[&str] = &[
    "contraindicated",
    "avoid",
    "fatal",
    "life-threatening",
    "severe",
    "serious",
    "do not use",
    "unsafe",
    "anaphylaxis",
    "hypoglycemia",
    "hospitalization",
    "death",
    "toxicity",
    "major",
];

const MODERATE_SEVERITY_KEYWORDS: &[&str] = &[
    "monitor",
    "caution",
    "risk",
    "adjust",
    "potential",
    "care",
    "consider",
    "may increase",
    "may decrease",
    "alter",
    "effect",
];

/// Severity of a label snippet by keyword presence.
pub fn severity_from_text(text: &str) -> Severity {
    let lower = text.to_lowercase();
    if HIGH_SEVERITY_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Severity::High
    } else if MODERATE_SEVERITY_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Severity::Moderate
    } else {
        Severity::Low
    }
}

/// Find `target` (as a word prefix: "warfarin" also matches "warfarins")
/// in `text` and return the surrounding window, wrapped in ellipses.
pub fn find_mention(text: &str, target: &str, radius: usize) -> Option<String> {
    let target = target.trim();
    if target.chars().count() < MIN_SCAN_NAME_LEN || text.is_empty() {
        return None;
    }

    let pattern = format!(r"\b{}[a-z]*\b", regex::escape(target));
    let re = RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .ok()?;
    let m = re.find(text)?;

    let start = match radius {
        0 => m.start(),
        _ => text[..m.start()]
            .char_indices()
            .rev()
            .nth(radius - 1)
            .map_or(0, |(i, _)| i),
    };
    let end = text[m.end()..]
        .char_indices()
        .nth(radius)
        .map_or(text.len(), |(i, _)| m.end() + i);

    Some(format!("...{}...", &text[start..end]))
}

pub struct InteractionClassifier {
    reference: Arc<ScreeningReferenceData>,
    label_provider: Option<Box<dyn LabelTextProvider>>,
    snippet_radius: usize,
}

impl InteractionClassifier {
    pub fn new(reference: Arc<ScreeningReferenceData>, snippet_radius: usize) -> Self {
        Self {
            reference,
            label_provider: None,
            snippet_radius,
        }
    }

    pub fn with_label_provider(mut self, provider: Box<dyn LabelTextProvider>) -> Self {
        self.label_provider = Some(provider);
        self
    }

    pub fn has_label_provider(&self) -> bool {
        self.label_provider.is_some()
    }

    /// Classify an unordered pair of canonical names. Returns `None` when
    /// neither tier reports an interaction. The result does not depend on
    /// argument order.
    pub fn classify(&self, a: &str, b: &str, labels: &LabelCache) -> Option<InteractionFact> {
        let pair = PairKey::new(a, b);
        if pair.is_self_pair() {
            return None;
        }

        if let Some(known) = self.reference.find_interaction(&pair) {
            return Some(InteractionFact {
                pair,
                severity: known.severity,
                description: known.description.clone(),
                provenance: Provenance::KnowledgeBase,
            });
        }

        let provider = self.label_provider.as_deref()?;
        let snippet = self
            .scan_label(pair.first(), pair.second(), provider, labels)
            .or_else(|| self.scan_label(pair.second(), pair.first(), provider, labels))?;

        tracing::debug!(
            first = pair.first(),
            second = pair.second(),
            "Label text mentions pair"
        );

        Some(InteractionFact {
            severity: severity_from_text(&snippet),
            description: snippet,
            provenance: Provenance::LabelText,
            pair,
        })
    }

    /// Search the label of `subject` for a mention of `target`.
    fn scan_label(
        &self,
        subject: &str,
        target: &str,
        provider: &dyn LabelTextProvider,
        labels: &LabelCache,
    ) -> Option<String> {
        if subject.chars().count() < MIN_SCAN_NAME_LEN || target.chars().count() < MIN_SCAN_NAME_LEN
        {
            return None;
        }
        let text = labels.get_or_fetch(subject, provider);
        find_mention(&text, target, self.snippet_radius)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;
    use crate::screening::label::LabelError;

    struct MapProvider(HashMap<&'static str, &'static str>);

    impl LabelTextProvider for MapProvider {
        fn fetch_label_text(&self, drug: &str) -> Result<String, LabelError> {
            Ok(self.0.get(drug).copied().unwrap_or_default().to_string())
        }
    }

    struct DownProvider;

    impl LabelTextProvider for DownProvider {
        fn fetch_label_text(&self, _drug: &str) -> Result<String, LabelError> {
            Err(LabelError::Timeout(5))
        }
    }

    fn reference() -> Arc<ScreeningReferenceData> {
        Arc::new(ScreeningReferenceData::bundled().unwrap())
    }

    fn cache() -> LabelCache {
        LabelCache::new(Duration::from_secs(60))
    }

    fn classifier_with(labels: &[(&'static str, &'static str)]) -> InteractionClassifier {
        InteractionClassifier::new(reference(), 200)
            .with_label_provider(Box::new(MapProvider(labels.iter().copied().collect())))
    }

    #[test]
    fn knowledge_base_hit() {
        let classifier = InteractionClassifier::new(reference(), 200);
        let fact = classifier
            .classify("AMLODIPINE", "PHENYTOIN", &cache())
            .unwrap();
        assert_eq!(fact.severity, Severity::High);
        assert_eq!(fact.provenance, Provenance::KnowledgeBase);
        assert!(fact.description.contains("CYP3A4"));
    }

    #[test]
    fn classification_is_symmetric() {
        let classifier = classifier_with(&[
            ("ALPHADRUG", "Use with caution alongside betadrug."),
            ("BETADRUG", "Avoid combining with alphadrug."),
        ]);
        let labels = cache();
        assert_eq!(
            classifier.classify("ALPHADRUG", "BETADRUG", &labels),
            classifier.classify("BETADRUG", "ALPHADRUG", &labels)
        );
        assert_eq!(
            classifier.classify("IBUPROFEN", "ASPIRIN", &labels),
            classifier.classify("ASPIRIN", "IBUPROFEN", &labels)
        );
    }

    #[test]
    fn knowledge_base_takes_precedence_over_label() {
        let classifier = classifier_with(&[("ASPIRIN", "No data on ibuprofen.")]);
        let fact = classifier
            .classify("ASPIRIN", "IBUPROFEN", &cache())
            .unwrap();
        assert_eq!(fact.provenance, Provenance::KnowledgeBase);
        assert_eq!(fact.severity, Severity::High);
    }

    #[test]
    fn label_scan_reverse_direction() {
        let classifier = classifier_with(&[("ZOLTRAN", "Monitor levels when given with quexal.")]);
        let fact = classifier.classify("QUEXAL", "ZOLTRAN", &cache()).unwrap();
        assert_eq!(fact.provenance, Provenance::LabelText);
        assert_eq!(fact.severity, Severity::Moderate);
        assert!(fact.description.starts_with("..."));
        assert!(fact.description.contains("quexal"));
    }

    #[test]
    fn label_match_allows_suffix() {
        let classifier = classifier_with(&[("ZOLTRAN", "Interacts with quexals.")]);
        let fact = classifier.classify("ZOLTRAN", "QUEXAL", &cache()).unwrap();
        assert_eq!(fact.severity, Severity::Low);
    }

    #[test]
    fn no_mention_no_fact() {
        let classifier = classifier_with(&[("ZOLTRAN", "Take with food.")]);
        assert!(classifier.classify("ZOLTRAN", "QUEXAL", &cache()).is_none());
    }

    #[test]
    fn unavailable_provider_degrades_to_knowledge_base() {
        let classifier =
            InteractionClassifier::new(reference(), 200).with_label_provider(Box::new(DownProvider));
        let labels = cache();
        assert!(classifier.classify("ZOLTRAN", "QUEXAL", &labels).is_none());
        assert!(classifier.classify("ASPIRIN", "IBUPROFEN", &labels).is_some());
    }

    #[test]
    fn self_pair_is_never_classified() {
        let classifier = InteractionClassifier::new(reference(), 200);
        assert!(classifier.classify("ASPIRIN", "aspirin", &cache()).is_none());
    }

    #[test]
    fn short_names_never_scanned() {
        let classifier = classifier_with(&[("ZOLTRAN", "S is a letter; avoid.")]);
        assert!(classifier.classify("ZOLTRAN", "S", &cache()).is_none());
    }

    #[test]
    fn severity_keywords() {
        assert_eq!(severity_from_text("...is CONTRAINDICATED..."), Severity::High);
        assert_eq!(severity_from_text("...can cause major bleeding..."), Severity::High);
        assert_eq!(severity_from_text("...a Major interaction..."), Severity::High);
        assert_eq!(severity_from_text("...may increase levels..."), Severity::Moderate);
        assert_eq!(severity_from_text("...was studied..."), Severity::Low);
    }

    #[test]
    fn mention_window_is_char_safe() {
        let text = format!("{} warfarin {}", "é".repeat(300), "ü".repeat(300));
        let snippet = find_mention(&text, "WARFARIN", 200).unwrap();
        assert_eq!(snippet.chars().count(), 3 + 200 + 8 + 200 + 3);
    }

    #[test]
    fn mention_window_clamps_at_edges() {
        let snippet = find_mention("Avoid warfarin.", "warfarin", 200).unwrap();
        assert_eq!(snippet, "...Avoid warfarin....");
    }

    #[test]
    fn mention_requires_word_start() {
        assert!(find_mention("coumawarfarin", "warfarin", 10).is_none());
    }
}
