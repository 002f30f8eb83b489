//! Structured drug product table: brand/local product name -> generic name
//! and composition. Backs the database tier of canonical resolution.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use strsim::normalized_levenshtein;

use super::sqlite::{open_database, open_memory_database};
use super::DatabaseError;
use crate::screening::resolver::{DrugComposition, DrugDatabase};

const BUNDLED_DRUG_PRODUCTS: &str = include_str!("../../resources/drug_products.json");

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DrugProduct {
    pub name: String,
    pub generic: String,
    /// Comma-separated ingredient list.
    pub contents: String,
}

impl DrugProduct {
    /// Canonical identity and ingredient list, upper-cased.
    pub fn composition(&self) -> DrugComposition {
        let canonical = self.generic.trim().to_uppercase();
        let mut ingredients: Vec<String> = Vec::new();
        for part in self.contents.split(',') {
            let ingredient = part.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
            if !ingredient.is_empty() && !ingredients.contains(&ingredient) {
                ingredients.push(ingredient);
            }
        }
        if ingredients.is_empty() {
            ingredients.push(canonical.clone());
        }
        DrugComposition {
            canonical,
            ingredients,
        }
    }
}

pub fn insert_drug_product(conn: &Connection, product: &DrugProduct) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR REPLACE INTO drug_products (name, generic, contents) VALUES (?1, ?2, ?3)",
        params![
            product.name.trim().to_lowercase(),
            product.generic.trim(),
            product.contents.trim(),
        ],
    )?;
    Ok(())
}

pub fn get_drug_product(conn: &Connection, name: &str) -> Result<Option<DrugProduct>, DatabaseError> {
    let product = conn
        .query_row(
            "SELECT name, generic, contents FROM drug_products WHERE name = ?1",
            params![name.trim().to_lowercase()],
            |row| {
                Ok(DrugProduct {
                    name: row.get(0)?,
                    generic: row.get(1)?,
                    contents: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(product)
}

pub fn list_product_names(conn: &Connection) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT name FROM drug_products ORDER BY name")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut names = Vec::new();
    for row in rows {
        names.push(row?);
    }
    Ok(names)
}

pub fn count_drug_products(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM drug_products", [], |row| row.get(0))?;
    Ok(count)
}

/// Insert the bundled product list. Returns the number of rows written.
pub fn seed_bundled_products(conn: &Connection) -> Result<usize, DatabaseError> {
    let products: Vec<DrugProduct> = serde_json::from_str(BUNDLED_DRUG_PRODUCTS)
        .map_err(|e| DatabaseError::SeedParse(e.to_string()))?;

    let tx = conn.unchecked_transaction()?;
    for product in &products {
        insert_drug_product(&tx, product)?;
    }
    tx.commit()?;

    tracing::info!(products = products.len(), "Seeded drug product table");
    Ok(products.len())
}

/// SQLite-backed drug database with exact-then-fuzzy product name lookup.
pub struct SqliteDrugDatabase {
    conn: Connection,
    /// Product names, sorted. Fuzzy matching scans this list.
    names: Vec<String>,
    fuzzy_threshold: f64,
}

impl SqliteDrugDatabase {
    pub fn new(conn: Connection, fuzzy_threshold: f64) -> Result<Self, DatabaseError> {
        let names = list_product_names(&conn)?;
        Ok(Self {
            conn,
            names,
            fuzzy_threshold,
        })
    }

    /// Open (and seed on first use) the database at `path`.
    pub fn open(path: &Path, fuzzy_threshold: f64) -> Result<Self, DatabaseError> {
        let conn = open_database(path)?;
        if count_drug_products(&conn)? == 0 {
            seed_bundled_products(&conn)?;
        }
        Self::new(conn, fuzzy_threshold)
    }

    /// In-memory database seeded with the bundled product list.
    pub fn bundled_in_memory(fuzzy_threshold: f64) -> Result<Self, DatabaseError> {
        let conn = open_memory_database()?;
        seed_bundled_products(&conn)?;
        Self::new(conn, fuzzy_threshold)
    }

    pub fn product_count(&self) -> usize {
        self.names.len()
    }

    /// Best product name scoring at least the threshold (0-100 scale).
    fn fuzzy_match(&self, query: &str) -> Option<&str> {
        let mut best: Option<(&str, f64)> = None;
        for name in &self.names {
            let score = normalized_levenshtein(query, name) * 100.0;
            if score >= self.fuzzy_threshold && best.map_or(true, |(_, s)| score > s) {
                best = Some((name.as_str(), score));
            }
        }
        best.map(|(name, _)| name)
    }
}

impl DrugDatabase for SqliteDrugDatabase {
    fn lookup(&self, candidate: &str) -> Result<Option<DrugComposition>, DatabaseError> {
        let query = candidate.trim().to_lowercase();
        if query.is_empty() {
            return Ok(None);
        }

        if let Some(product) = get_drug_product(&self.conn, &query)? {
            return Ok(Some(product.composition()));
        }

        match self.fuzzy_match(&query) {
            Some(name) => {
                tracing::debug!(candidate = %query, matched = name, "Fuzzy drug product match");
                Ok(get_drug_product(&self.conn, name)?.map(|p| p.composition()))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, generic: &str, contents: &str) -> DrugProduct {
        DrugProduct {
            name: name.into(),
            generic: generic.into(),
            contents: contents.into(),
        }
    }

    #[test]
    fn insert_and_get_case_insensitive() {
        let conn = open_memory_database().unwrap();
        insert_drug_product(&conn, &product("Promag", "Hydrotalcite", "Hydrotalcite, Simethicone"))
            .unwrap();
        let found = get_drug_product(&conn, "PROMAG").unwrap().unwrap();
        assert_eq!(found.name, "promag");
        assert!(get_drug_product(&conn, "unknown").unwrap().is_none());
    }

    #[test]
    fn composition_splits_and_uppercases() {
        let comp = product("clavic", "Amoxicillin, Clavulanate", "Amoxicillin Trihydrate,  Potassium Clavulanate")
            .composition();
        assert_eq!(comp.canonical, "AMOXICILLIN, CLAVULANATE");
        assert_eq!(
            comp.ingredients,
            vec!["AMOXICILLIN TRIHYDRATE", "POTASSIUM CLAVULANATE"]
        );
    }

    #[test]
    fn composition_without_contents_uses_generic() {
        let comp = product("x", "Ibuprofen", " ").composition();
        assert_eq!(comp.ingredients, vec!["IBUPROFEN"]);
    }

    #[test]
    fn bundled_seed_loads() {
        let db = SqliteDrugDatabase::bundled_in_memory(80.0).unwrap();
        assert!(db.product_count() > 200);
    }

    #[test]
    fn exact_lookup_returns_composition() {
        let db = SqliteDrugDatabase::bundled_in_memory(80.0).unwrap();
        let comp = db.lookup("DIAGIT").unwrap().unwrap();
        assert_eq!(comp.canonical, "GLYBURIDE");
        assert_eq!(comp.ingredients, vec!["GLYBURIDE", "ATAPULGITE", "PECTIN"]);
    }

    #[test]
    fn fuzzy_lookup_above_threshold() {
        let db = SqliteDrugDatabase::bundled_in_memory(80.0).unwrap();
        let comp = db.lookup("PANADOLL").unwrap().unwrap();
        assert_eq!(comp.ingredients, vec!["ACETAMINOPHEN"]);
    }

    #[test]
    fn unrelated_name_misses() {
        let db = SqliteDrugDatabase::bundled_in_memory(80.0).unwrap();
        assert!(db.lookup("UNKNOWNBRANDXYZ").unwrap().is_none());
        assert!(db.lookup("  ").unwrap().is_none());
    }

    #[test]
    fn open_seeds_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drugs.db");
        let first = SqliteDrugDatabase::open(&path, 80.0).unwrap();
        let count = first.product_count();
        drop(first);
        let second = SqliteDrugDatabase::open(&path, 80.0).unwrap();
        assert_eq!(second.product_count(), count);
    }
}
