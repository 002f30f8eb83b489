use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::types::{PairKey, ReferenceError, Severity};

const CANONICAL_DRUGS_FILE: &str = "canonical_drugs.json";
const INTERACTIONS_FILE: &str = "interactions.json";

const BUNDLED_CANONICAL_DRUGS: &str = include_str!("../../resources/canonical_drugs.json");
const BUNDLED_INTERACTIONS: &str = include_str!("../../resources/interactions.json");

/// A canonical drug identity with its aliases and composition
/// (loaded from canonical_drugs.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalDrug {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Empty for single-ingredient products whose ingredient is `name`.
    #[serde(default)]
    pub ingredients: Vec<String>,
}

/// Curated interaction between two canonical/ingredient names
/// (loaded from interactions.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnownInteraction {
    pub drugs: Vec<String>,
    pub severity: Severity,
    pub description: String,
}

/// Immutable reference data shared by every row of a run.
pub struct ScreeningReferenceData {
    drugs: Vec<CanonicalDrug>,
    /// Uppercase alias -> canonical name.
    aliases: HashMap<String, String>,
    /// Alias keys, longest first, ties alphabetical.
    alias_keys: Vec<String>,
    /// Canonical name -> index into `drugs`.
    by_name: HashMap<String, usize>,
    /// Sorted canonical names.
    vocabulary: Vec<String>,
    interactions: HashMap<PairKey, KnownInteraction>,
}

impl ScreeningReferenceData {
    /// Load reference data from JSON files in `resources_dir`.
    pub fn load(resources_dir: &Path) -> Result<Self, ReferenceError> {
        let drugs_json = read_resource(resources_dir, CANONICAL_DRUGS_FILE)?;
        let interactions_json = read_resource(resources_dir, INTERACTIONS_FILE)?;
        Self::from_json(&drugs_json, &interactions_json)
    }

    /// Reference data compiled into the binary.
    pub fn bundled() -> Result<Self, ReferenceError> {
        Self::from_json(BUNDLED_CANONICAL_DRUGS, BUNDLED_INTERACTIONS)
    }

    pub fn from_json(drugs_json: &str, interactions_json: &str) -> Result<Self, ReferenceError> {
        let drugs: Vec<CanonicalDrug> = serde_json::from_str(drugs_json).map_err(|e| {
            ReferenceError::Parse(CANONICAL_DRUGS_FILE.into(), e.to_string())
        })?;
        let interactions: Vec<KnownInteraction> =
            serde_json::from_str(interactions_json).map_err(|e| {
                ReferenceError::Parse(INTERACTIONS_FILE.into(), e.to_string())
            })?;
        Self::from_parts(drugs, interactions)
    }

    /// Build lookup tables. All names are upper-cased here so lookups never
    /// need to care about the casing used in the source files.
    pub fn from_parts(
        drugs: Vec<CanonicalDrug>,
        interactions: Vec<KnownInteraction>,
    ) -> Result<Self, ReferenceError> {
        let drugs: Vec<CanonicalDrug> = drugs
            .into_iter()
            .map(|d| CanonicalDrug {
                name: upper(&d.name),
                aliases: d.aliases.iter().map(|a| upper(a)).collect(),
                ingredients: d
                    .ingredients
                    .iter()
                    .map(|i| upper(i))
                    .filter(|i| !i.is_empty())
                    .collect(),
            })
            .filter(|d| !d.name.is_empty())
            .collect();

        let mut by_name = HashMap::new();
        for (idx, drug) in drugs.iter().enumerate() {
            by_name.insert(drug.name.clone(), idx);
        }

        let mut aliases: HashMap<String, String> = HashMap::new();
        for drug in &drugs {
            for alias in drug.aliases.iter().filter(|a| !a.is_empty()) {
                if let Some(existing) = aliases.get(alias) {
                    if existing != &drug.name {
                        return Err(ReferenceError::ConflictingAlias(
                            alias.clone(),
                            existing.clone(),
                            drug.name.clone(),
                        ));
                    }
                }
                aliases.insert(alias.clone(), drug.name.clone());
            }
        }

        let mut alias_keys: Vec<String> = aliases.keys().cloned().collect();
        alias_keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let mut vocabulary: Vec<String> = by_name.keys().cloned().collect();
        vocabulary.sort();

        let mut table = HashMap::new();
        for interaction in interactions {
            if interaction.drugs.len() != 2 {
                return Err(ReferenceError::InvalidInteraction(format!(
                    "expected 2 drugs, got {:?}",
                    interaction.drugs
                )));
            }
            let key = PairKey::new(&interaction.drugs[0], &interaction.drugs[1]);
            if key.is_self_pair() {
                return Err(ReferenceError::InvalidInteraction(format!(
                    "self pair {}",
                    key.first()
                )));
            }
            table.insert(key, interaction);
        }

        tracing::debug!(
            drugs = drugs.len(),
            aliases = aliases.len(),
            interactions = table.len(),
            "Reference data loaded"
        );

        Ok(Self {
            drugs,
            aliases,
            alias_keys,
            by_name,
            vocabulary,
            interactions: table,
        })
    }

    /// Exact alias lookup (brand/local name -> canonical name).
    pub fn resolve_alias(&self, candidate: &str) -> Option<&str> {
        self.aliases.get(candidate).map(String::as_str)
    }

    /// Alias keys with their canonical names, longest key first.
    pub fn aliases_longest_first(&self) -> impl Iterator<Item = (&str, &str)> {
        self.alias_keys.iter().filter_map(|key| {
            self.aliases
                .get(key)
                .map(|canonical| (key.as_str(), canonical.as_str()))
        })
    }

    pub fn is_canonical(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn get_drug(&self, canonical: &str) -> Option<&CanonicalDrug> {
        self.by_name.get(canonical).map(|&idx| &self.drugs[idx])
    }

    /// Ingredient names for a canonical drug; the name itself when no
    /// distinct composition is recorded.
    pub fn ingredients_of(&self, canonical: &str) -> Vec<String> {
        match self.get_drug(canonical) {
            Some(drug) if !drug.ingredients.is_empty() => drug.ingredients.clone(),
            _ => vec![canonical.to_string()],
        }
    }

    pub fn find_interaction(&self, key: &PairKey) -> Option<&KnownInteraction> {
        self.interactions.get(key)
    }

    pub fn interaction_count(&self) -> usize {
        self.interactions.len()
    }
}

fn read_resource(dir: &Path, file: &str) -> Result<String, ReferenceError> {
    let path = dir.join(file);
    std::fs::read_to_string(&path)
        .map_err(|e| ReferenceError::Load(path.display().to_string(), e.to_string()))
}

fn upper(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}
