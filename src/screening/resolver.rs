//! Canonical name resolution.
//!
//! An ordered chain of tiers, each returning `Option`; the first hit wins.
//! The final `Unresolved` tier always answers, so resolution never fails.

use std::sync::Arc;

use serde::Serialize;
use strsim::normalized_levenshtein;

use crate::db::DatabaseError;

use super::reference::ScreeningReferenceData;
use super::types::{Resolution, ResolutionTier};

/// Alias keys shorter than this never take part in substring matching.
const MIN_SUBSTRING_ALIAS_LEN: usize = 4;

/// Tiers tried before the unresolved fallback, in order.
const TIER_ORDER: [ResolutionTier; 5] = [
    ResolutionTier::AliasExact,
    ResolutionTier::AliasSubstring,
    ResolutionTier::Vocabulary,
    ResolutionTier::Fuzzy,
    ResolutionTier::DrugDatabase,
];

/// Canonical identity and composition reported by a drug database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrugComposition {
    pub canonical: String,
    pub ingredients: Vec<String>,
}

/// Optional structured drug database collaborator.
pub trait DrugDatabase {
    /// Resolve a normalized candidate. `Ok(None)` means not found.
    fn lookup(&self, candidate: &str) -> Result<Option<DrugComposition>, DatabaseError>;
}

pub struct CanonicalResolver {
    reference: Arc<ScreeningReferenceData>,
    drug_db: Option<Box<dyn DrugDatabase>>,
    fuzzy_threshold: f64,
}

impl CanonicalResolver {
    pub fn new(reference: Arc<ScreeningReferenceData>, fuzzy_threshold: f64) -> Self {
        Self {
            reference,
            drug_db: None,
            fuzzy_threshold,
        }
    }

    pub fn with_drug_database(mut self, db: Box<dyn DrugDatabase>) -> Self {
        self.drug_db = Some(db);
        self
    }

    pub fn has_drug_database(&self) -> bool {
        self.drug_db.is_some()
    }

    /// Resolve a normalized (uppercase) candidate.
    pub fn resolve(&self, candidate: &str) -> Resolution {
        let candidate = candidate.trim().to_uppercase();

        for tier in TIER_ORDER {
            if let Some(resolution) = self.try_tier(tier, &candidate) {
                tracing::debug!(
                    candidate = %candidate,
                    canonical = %resolution.canonical,
                    tier = ?tier,
                    "Resolved drug name"
                );
                return resolution;
            }
        }

        tracing::debug!(candidate = %candidate, "Drug name unresolved");
        Resolution {
            ingredients: vec![candidate.clone()],
            canonical: candidate,
            tier: ResolutionTier::Unresolved,
        }
    }

    fn try_tier(&self, tier: ResolutionTier, candidate: &str) -> Option<Resolution> {
        match tier {
            ResolutionTier::AliasExact => self
                .reference
                .resolve_alias(candidate)
                .map(|canonical| self.from_reference(canonical, tier)),
            ResolutionTier::AliasSubstring => self
                .alias_substring(candidate)
                .map(|canonical| self.from_reference(canonical, tier)),
            ResolutionTier::Vocabulary => self
                .reference
                .is_canonical(candidate)
                .then(|| self.from_reference(candidate, tier)),
            ResolutionTier::Fuzzy => self
                .fuzzy_vocabulary(candidate)
                .map(|canonical| self.from_reference(canonical, tier)),
            ResolutionTier::DrugDatabase => self.drug_database(candidate),
            ResolutionTier::Unresolved => None,
        }
    }

    fn from_reference(&self, canonical: &str, tier: ResolutionTier) -> Resolution {
        Resolution {
            canonical: canonical.to_string(),
            ingredients: self.reference.ingredients_of(canonical),
            tier,
        }
    }

    /// Longest alias key contained in the candidate; equal lengths resolve
    /// alphabetically.
    fn alias_substring(&self, candidate: &str) -> Option<&str> {
        self.reference
            .aliases_longest_first()
            .filter(|(key, _)| key.chars().count() >= MIN_SUBSTRING_ALIAS_LEN)
            .find(|(key, _)| candidate.contains(key))
            .map(|(_, canonical)| canonical)
    }

    /// Best canonical name by normalized Levenshtein similarity (0-100).
    /// Ties keep the alphabetically first name.
    fn fuzzy_vocabulary(&self, candidate: &str) -> Option<&str> {
        let mut best: Option<(&str, f64)> = None;
        for name in self.reference.vocabulary() {
            let score = normalized_levenshtein(candidate, name) * 100.0;
            if score >= self.fuzzy_threshold && best.map_or(true, |(_, s)| score > s) {
                best = Some((name.as_str(), score));
            }
        }
        best.map(|(name, _)| name)
    }

    fn drug_database(&self, candidate: &str) -> Option<Resolution> {
        let db = self.drug_db.as_ref()?;
        match db.lookup(candidate) {
            Ok(Some(composition)) => {
                let ingredients = self.canonical_ingredients(&composition.ingredients);
                let canonical = composition.canonical.trim().to_uppercase();
                Some(Resolution {
                    ingredients: if ingredients.is_empty() {
                        vec![canonical.clone()]
                    } else {
                        ingredients
                    },
                    canonical,
                    tier: ResolutionTier::DrugDatabase,
                })
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(candidate = %candidate, error = %e, "Drug database lookup failed");
                None
            }
        }
    }

    /// Map database ingredient names onto canonical names where an exact
    /// alias exists, so they meet the knowledge base under one key.
    fn canonical_ingredients(&self, ingredients: &[String]) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(ingredients.len());
        for raw in ingredients {
            let name = raw.trim().to_uppercase();
            if name.is_empty() {
                continue;
            }
            let canonical = self
                .reference
                .resolve_alias(&name)
                .map(str::to_string)
                .unwrap_or(name);
            if !out.contains(&canonical) {
                out.push(canonical);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::screening::reference::CanonicalDrug;

    fn bundled_resolver() -> CanonicalResolver {
        let reference = Arc::new(ScreeningReferenceData::bundled().unwrap());
        CanonicalResolver::new(reference, 88.0)
    }

    struct StubDatabase {
        result: Option<DrugComposition>,
        calls: Rc<Cell<usize>>,
    }

    impl DrugDatabase for StubDatabase {
        fn lookup(&self, _candidate: &str) -> Result<Option<DrugComposition>, DatabaseError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.result.clone())
        }
    }

    struct FailingDatabase;

    impl DrugDatabase for FailingDatabase {
        fn lookup(&self, _candidate: &str) -> Result<Option<DrugComposition>, DatabaseError> {
            Err(DatabaseError::SeedParse("broken".into()))
        }
    }

    #[test]
    fn exact_alias() {
        let r = bundled_resolver().resolve("AMLODIPIN");
        assert_eq!(r.canonical, "AMLODIPINE");
        assert_eq!(r.ingredients, vec!["AMLODIPINE"]);
        assert_eq!(r.tier, ResolutionTier::AliasExact);

        let r = bundled_resolver().resolve("fenitoin");
        assert_eq!(r.canonical, "PHENYTOIN");
    }

    #[test]
    fn substring_alias() {
        let r = bundled_resolver().resolve("NATRIUM DIKLOFENAK RETARD");
        assert_eq!(r.canonical, "DICLOFENAC");
        assert_eq!(r.tier, ResolutionTier::AliasSubstring);
    }

    #[test]
    fn substring_prefers_longest_key() {
        let r = bundled_resolver().resolve("PANADOL EXTRA KAPLET");
        assert_eq!(r.canonical, "ACETAMINOPHEN AND CAFFEINE");
        assert_eq!(r.ingredients, vec!["ACETAMINOPHEN", "CAFFEINE"]);
    }

    #[test]
    fn substring_tie_breaks_alphabetically() {
        let reference = ScreeningReferenceData::from_parts(
            vec![
                CanonicalDrug {
                    name: "ZETA".into(),
                    aliases: vec!["BBBB".into()],
                    ingredients: vec![],
                },
                CanonicalDrug {
                    name: "ALPHA".into(),
                    aliases: vec!["AAAA".into()],
                    ingredients: vec![],
                },
            ],
            vec![],
        )
        .unwrap();
        let resolver = CanonicalResolver::new(Arc::new(reference), 88.0);
        assert_eq!(resolver.resolve("BBBB AAAA").canonical, "ALPHA");
    }

    #[test]
    fn short_alias_keys_skip_substring_tier() {
        // "CTM" is an exact alias only.
        let resolver = bundled_resolver();
        assert_eq!(resolver.resolve("CTM").canonical, "CHLORPHENAMINE");
        assert_eq!(resolver.resolve("CTMX").tier, ResolutionTier::Unresolved);
    }

    #[test]
    fn vocabulary_match() {
        let r = bundled_resolver().resolve("IBUPROFEN");
        assert_eq!(r.canonical, "IBUPROFEN");
        assert_eq!(r.tier, ResolutionTier::Vocabulary);
        assert_eq!(bundled_resolver().resolve("ASPIRIN").canonical, "ASPIRIN");
    }

    #[test]
    fn fuzzy_match_above_threshold() {
        let r = bundled_resolver().resolve("SIMVASTATN");
        assert_eq!(r.canonical, "SIMVASTATIN");
        assert_eq!(r.tier, ResolutionTier::Fuzzy);
    }

    #[test]
    fn fuzzy_below_threshold_is_unresolved() {
        let r = bundled_resolver().resolve("SIMVA");
        assert_eq!(r.tier, ResolutionTier::Unresolved);
    }

    #[test]
    fn unresolved_returns_candidate() {
        let r = bundled_resolver().resolve("UNKNOWNBRANDXYZ");
        assert_eq!(r.canonical, "UNKNOWNBRANDXYZ");
        assert_eq!(r.ingredients, vec!["UNKNOWNBRANDXYZ"]);
        assert!(!r.is_resolved());
    }

    #[test]
    fn database_tier_used_after_reference_tiers() {
        let stub = StubDatabase {
            result: Some(DrugComposition {
                canonical: "glyburide".into(),
                ingredients: vec!["Glyburide".into(), "Pectin".into()],
            }),
            calls: Rc::default(),
        };
        let resolver = bundled_resolver().with_drug_database(Box::new(stub));
        let r = resolver.resolve("DIAGIT");
        assert_eq!(r.tier, ResolutionTier::DrugDatabase);
        assert_eq!(r.canonical, "GLYBURIDE");
        // Glyburide is a known alias of glibenclamide.
        assert_eq!(r.ingredients, vec!["GLIBENCLAMIDE", "PECTIN"]);
    }

    #[test]
    fn database_not_consulted_on_reference_hit() {
        let calls = Rc::new(Cell::new(0));
        let stub = StubDatabase {
            result: None,
            calls: Rc::clone(&calls),
        };
        let resolver = bundled_resolver().with_drug_database(Box::new(stub));

        resolver.resolve("AMLODIPIN");
        assert_eq!(calls.get(), 0);

        assert_eq!(resolver.resolve("NOTADRUG").tier, ResolutionTier::Unresolved);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn database_error_degrades_to_unresolved() {
        let resolver = bundled_resolver().with_drug_database(Box::new(FailingDatabase));
        let r = resolver.resolve("UNKNOWNBRANDXYZ");
        assert_eq!(r.tier, ResolutionTier::Unresolved);
    }

    #[test]
    fn bundled_sqlite_database_resolves_brand() {
        let db = crate::db::SqliteDrugDatabase::bundled_in_memory(80.0).unwrap();
        let resolver = bundled_resolver().with_drug_database(Box::new(db));
        let r = resolver.resolve("PROMAG");
        assert_eq!(r.tier, ResolutionTier::DrugDatabase);
        assert!(r.ingredients.contains(&"MAGNESIUM HYDROXIDE".to_string()));
    }
}
