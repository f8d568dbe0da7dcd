//! Product catalog: read-mostly lookup from scanned codes to products.
//!
//! The catalog is loaded at startup from a JSON file of the shape
//! `{ main_category: { subcategory: [ { "name": ..., "upc": ... } ] } }` and
//! held behind an [`arc_swap::ArcSwapOption`] in the application state, so
//! admin-triggered reloads swap the whole structure atomically without
//! interrupting readers.
//!
//! # Scanned-code matching
//!
//! Physical barcodes often embed a product UPC inside a longer code, so a
//! stored UPC matches a scanned code iff it is a substring of it. When
//! several stored UPCs match the same scan, the longest match wins (it is
//! the most specific); ties break on catalog insertion order.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub name: String,
    pub upc: String,
    pub main_category: Option<String>,
    pub subcategory: Option<String>,
}

#[derive(Debug, Default)]
pub struct Catalog {
    products: Vec<Product>,
    by_upc: HashMap<String, usize>,
}

impl Catalog {
    /// Load the catalog from a products JSON file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("read products file {}: {e}", path.display()))?;
        let tree: HashMap<String, HashMap<String, Vec<RawProduct>>> = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("parse products file {}: {e}", path.display()))?;

        let mut products = Vec::new();
        for (main_category, subcategories) in tree {
            for (subcategory, entries) in subcategories {
                for entry in entries {
                    products.push(Product {
                        name: entry.name,
                        upc: entry.upc.into_string(),
                        main_category: Some(main_category.clone()),
                        subcategory: Some(subcategory.clone()),
                    });
                }
            }
        }

        tracing::info!(count = products.len(), file = %path.display(), "product catalog loaded");
        Ok(Self::from_products(products))
    }

    pub fn from_products(products: Vec<Product>) -> Self {
        let by_upc = products
            .iter()
            .enumerate()
            .map(|(idx, p)| (p.upc.clone(), idx))
            .collect();
        Self { products, by_upc }
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Exact lookup by stored UPC.
    pub fn get(&self, upc: &str) -> Option<&Product> {
        self.by_upc.get(upc).map(|&idx| &self.products[idx])
    }

    /// Case-insensitive substring search over product names.
    pub fn search(&self, query: &str) -> Vec<&Product> {
        let query = query.to_lowercase();
        self.products
            .iter()
            .filter(|p| p.name.to_lowercase().contains(&query))
            .collect()
    }

    /// Category tree: main category -> subcategory -> product count.
    pub fn categories(&self) -> HashMap<String, HashMap<String, usize>> {
        let mut tree: HashMap<String, HashMap<String, usize>> = HashMap::new();
        for product in &self.products {
            let (Some(main), Some(sub)) = (&product.main_category, &product.subcategory) else {
                continue;
            };
            *tree.entry(main.clone()).or_default().entry(sub.clone()).or_default() += 1;
        }
        tree
    }

    /// Resolve a scanned code to a catalog product via substring matching;
    /// longest stored UPC wins, ties break on insertion order. The fold only
    /// replaces the candidate on a strictly longer match, so the
    /// first-inserted of equally long UPCs is kept.
    pub fn match_scanned_code(&self, scanned: &str) -> Option<&Product> {
        self.products
            .iter()
            .filter(|p| scanned.contains(p.upc.as_str()))
            .fold(None, |best: Option<&Product>, candidate| match best {
                Some(best) if candidate.upc.len() > best.upc.len() => Some(candidate),
                Some(best) => Some(best),
                None => Some(candidate),
            })
    }

    /// Pick, among `upcs`, the one that matches the scanned code under the
    /// same rule as [`Self::match_scanned_code`]. Used by picker sessions to
    /// match scans against the UPCs of one request without a catalog lookup.
    pub fn match_in<'a, I>(scanned: &str, upcs: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        upcs.into_iter()
            .filter(|upc| scanned.contains(*upc))
            .fold(None, |best: Option<&'a str>, candidate| match best {
                Some(best) if candidate.len() > best.len() => Some(candidate),
                Some(best) => Some(best),
                None => Some(candidate),
            })
    }
}

/// Raw catalog entry; UPCs appear both as strings and as bare numbers.
#[derive(Debug, Deserialize)]
struct RawProduct {
    name: String,
    upc: RawUpc,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawUpc {
    Text(String),
    Number(u64),
}

impl RawUpc {
    fn into_string(self) -> String {
        match self {
            RawUpc::Text(s) => s,
            RawUpc::Number(n) => n.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::from_products(vec![
            Product {
                name: "Big Mix".to_string(),
                upc: "29456086".to_string(),
                main_category: Some("ambient".to_string()),
                subcategory: Some("Snacks".to_string()),
            },
            Product {
                name: "Cookies".to_string(),
                upc: "29377107".to_string(),
                main_category: Some("ambient".to_string()),
                subcategory: Some("Biscuits".to_string()),
            },
            Product {
                name: "Cookies Family Pack".to_string(),
                upc: "2937710799".to_string(),
                main_category: Some("ambient".to_string()),
                subcategory: Some("Biscuits".to_string()),
            },
        ])
    }

    #[test]
    fn test_exact_lookup() {
        let catalog = catalog();
        assert_eq!(catalog.get("29456086").unwrap().name, "Big Mix");
        assert!(catalog.get("nope").is_none());
    }

    #[test]
    fn test_substring_match() {
        let catalog = catalog();
        let product = catalog.match_scanned_code("101529456086000").unwrap();
        assert_eq!(product.name, "Big Mix");
        assert!(catalog.match_scanned_code("0000000").is_none());
    }

    #[test]
    fn test_longest_match_wins() {
        let catalog = catalog();
        // Both "29377107" and "2937710799" are substrings; the longer wins.
        let product = catalog.match_scanned_code("00293771079900").unwrap();
        assert_eq!(product.name, "Cookies Family Pack");
    }

    #[test]
    fn test_equal_length_tie_breaks_on_insertion_order() {
        let catalog = Catalog::from_products(vec![
            Product {
                name: "First".to_string(),
                upc: "11112222".to_string(),
                main_category: None,
                subcategory: None,
            },
            Product {
                name: "Second".to_string(),
                upc: "33334444".to_string(),
                main_category: None,
                subcategory: None,
            },
        ]);

        // Both 8-char UPCs are substrings of the scan; the first-inserted wins.
        let product = catalog.match_scanned_code("1111222233334444").unwrap();
        assert_eq!(product.name, "First");
    }

    #[test]
    fn test_match_in_request_upcs() {
        let upcs = ["29456086", "29377107"];
        assert_eq!(Catalog::match_in("10152937710700", upcs), Some("29377107"));
        assert_eq!(Catalog::match_in("999", upcs), None);

        // Equal-length candidates resolve to the earliest in iteration order.
        let tied = ["11112222", "33334444"];
        assert_eq!(Catalog::match_in("1111222233334444", tied), Some("11112222"));
    }

    #[test]
    fn test_search_and_categories() {
        let catalog = catalog();
        assert_eq!(catalog.search("cook").len(), 2);
        assert_eq!(catalog.search("COOKIES").len(), 2);

        let categories = catalog.categories();
        assert_eq!(categories["ambient"]["Biscuits"], 2);
        assert_eq!(categories["ambient"]["Snacks"], 1);
    }

    #[test]
    fn test_load_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.json");
        std::fs::write(
            &path,
            r#"{ "ambient": { "Snacks": [ { "name": "Big Mix", "upc": 29456086 } ] } }"#,
        )
        .unwrap();

        let catalog = Catalog::load(&path).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("29456086").unwrap().name, "Big Mix");

        assert!(Catalog::load(&dir.path().join("missing.json")).is_err());
    }
}
