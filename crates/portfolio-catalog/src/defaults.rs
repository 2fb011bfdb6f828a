/// Bundled seed data used on first run and whenever a persisted blob is corrupt.
///
/// The catalog lives in `defaults/catalog.json` in the same shape as the export output,
/// so promoting local edits to the shipped defaults is a paste into that file.
use tracing::error;

use crate::model::CatalogEntry;

const DEFAULT_CATALOG_JSON: &str = include_str!("../defaults/catalog.json");

/// The bundled default catalog, in shipped order.
pub fn default_catalog() -> Vec<CatalogEntry> {
    serde_json::from_str(DEFAULT_CATALOG_JSON)
        .inspect_err(|e| error!(error = %e, "bundled default catalog failed to parse"))
        .unwrap_or_default()
}

/// Unique categories of the bundled catalog, in first-seen order.
pub fn default_categories() -> Vec<String> {
    let mut categories: Vec<String> = Vec::new();
    for entry in default_catalog() {
        if !categories.contains(&entry.category) {
            categories.push(entry.category);
        }
    }
    categories
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_bundled_catalog_parses() {
        let catalog = default_catalog();
        assert_eq!(catalog.len(), 8);
        let ids: HashSet<&str> = catalog.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids.len(), catalog.len(), "bundled ids must be unique");
        assert!(catalog.iter().all(|e| e.order.is_some()));
    }

    #[test]
    fn test_bundled_catalog_is_in_rank_order() {
        let orders: Vec<i64> = default_catalog().iter().map(|e| e.effective_order()).collect();
        let mut sorted = orders.clone();
        sorted.sort();
        assert_eq!(orders, sorted);
    }

    #[test]
    fn test_default_categories_first_seen_order() {
        assert_eq!(
            default_categories(),
            vec!["Restaurants", "Web Development", "Automation"]
        );
    }
}
