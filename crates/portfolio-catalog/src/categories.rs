/// Durable set of filter labels, kept in insertion order.
///
/// Labels are independent of entry content: removing one never touches the entries
/// that reference it.
///
/// Key schema:
/// - `{prefix}categories`: JSON array of unique strings
use std::sync::Arc;

use tracing::{info, warn};

use catalog_common::medium::StorageMedium;

use crate::defaults::default_categories;
use crate::error::AppError;
use crate::store::read_or_seed;

const CATEGORIES_KEY: &str = "categories";

pub struct CategoryRegistry {
    medium: Arc<dyn StorageMedium>,
    key: String,
    defaults: Vec<String>,
}

impl CategoryRegistry {
    pub fn init(medium: Arc<dyn StorageMedium>, key_prefix: &str) -> Self {
        Self::with_defaults(medium, key_prefix, default_categories())
    }

    pub fn with_defaults(
        medium: Arc<dyn StorageMedium>,
        key_prefix: &str,
        defaults: Vec<String>,
    ) -> Self {
        Self {
            medium,
            key: format!("{key_prefix}{CATEGORIES_KEY}"),
            defaults,
        }
    }

    /// Labels in insertion order, seeded on first run or after corruption. An
    /// unreadable medium answers with the defaults.
    pub fn load(&self) -> Vec<String> {
        self.read().unwrap_or_else(|e| {
            warn!(error = %e, key = %self.key, "medium read failed, serving default categories");
            self.defaults.clone()
        })
    }

    fn read(&self) -> Result<Vec<String>, AppError> {
        let labels: Vec<String> =
            read_or_seed(self.medium.as_ref(), &self.key, "categories", || {
                self.defaults.clone()
            })?;

        let mut unique: Vec<String> = Vec::with_capacity(labels.len());
        for label in &labels {
            if !unique.contains(label) {
                unique.push(label.clone());
            }
        }
        if unique.len() != labels.len() {
            warn!(key = %self.key, "persisted categories held duplicates, collapsing");
            if let Err(e) = self.write(&unique) {
                warn!(error = %e, key = %self.key, "failed to rewrite deduplicated categories");
            }
        }
        Ok(unique)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.load().iter().any(|l| l == label)
    }

    /// Append `label` unless an identical one exists. Returns whether it was added.
    pub fn add(&self, label: &str) -> Result<bool, AppError> {
        if label.trim().is_empty() {
            return Err(AppError::Validation("category must not be empty".to_string()));
        }
        let mut labels = self.read()?;
        if labels.iter().any(|l| l == label) {
            return Ok(false);
        }
        labels.push(label.to_string());
        self.write(&labels)?;
        info!(label, "category added");
        Ok(true)
    }

    /// Remove `label` if present. Returns whether it was removed.
    pub fn remove(&self, label: &str) -> Result<bool, AppError> {
        let mut labels = self.read()?;
        let before = labels.len();
        labels.retain(|l| l != label);
        if labels.len() == before {
            return Ok(false);
        }
        self.write(&labels)?;
        info!(label, "category removed");
        Ok(true)
    }

    fn write(&self, labels: &[String]) -> Result<(), AppError> {
        let json = serde_json::to_string(labels)?;
        self.medium.set(&self.key, &json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::FlakyMedium;
    use catalog_common::medium::MemoryMedium;

    fn registry() -> (CategoryRegistry, Arc<MemoryMedium>) {
        let medium = Arc::new(MemoryMedium::new());
        let registry = CategoryRegistry::with_defaults(
            medium.clone(),
            "test:",
            vec!["Web".to_string(), "Automation".to_string()],
        );
        (registry, medium)
    }

    #[test]
    fn test_first_load_seeds() {
        let (registry, medium) = registry();
        assert_eq!(registry.load(), vec!["Web", "Automation"]);
        assert_eq!(
            medium.get("test:categories").unwrap().as_deref(),
            Some(r#"["Web","Automation"]"#)
        );
    }

    #[test]
    fn test_init_derives_from_bundled_catalog() {
        let registry = CategoryRegistry::init(Arc::new(MemoryMedium::new()), "p:");
        assert_eq!(registry.load(), default_categories());
    }

    #[test]
    fn test_add_is_case_sensitive_and_unique() {
        let (registry, _) = registry();
        assert!(registry.add("Mobile").unwrap());
        assert!(!registry.add("Mobile").unwrap());
        assert!(registry.add("web").unwrap());
        assert_eq!(registry.load(), vec!["Web", "Automation", "Mobile", "web"]);
    }

    #[test]
    fn test_add_rejects_blank() {
        let (registry, _) = registry();
        assert!(matches!(registry.add("  "), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_remove() {
        let (registry, _) = registry();
        assert!(registry.remove("Web").unwrap());
        assert!(!registry.remove("Web").unwrap());
        assert!(!registry.contains("Web"));
        assert_eq!(registry.load(), vec!["Automation"]);
    }

    #[test]
    fn test_corrupt_blob_reseeds() {
        let (registry, medium) = registry();
        medium.set("test:categories", "oops").unwrap();
        assert_eq!(registry.load(), vec!["Web", "Automation"]);
        assert_eq!(
            medium.get("test:categories").unwrap().as_deref(),
            Some(r#"["Web","Automation"]"#)
        );
    }

    #[test]
    fn test_duplicate_labels_collapse_on_load() {
        let (registry, medium) = registry();
        medium.set("test:categories", r#"["A","B","A"]"#).unwrap();
        assert_eq!(registry.load(), vec!["A", "B"]);
        assert_eq!(
            medium.get("test:categories").unwrap().as_deref(),
            Some(r#"["A","B"]"#)
        );
    }

    #[test]
    fn test_failed_read_never_overwrites_labels() {
        let medium = Arc::new(FlakyMedium::default());
        let registry = CategoryRegistry::with_defaults(medium.clone(), "p:", vec!["Web".to_string()]);
        registry.add("Mine").unwrap();
        assert_eq!(registry.load(), vec!["Web", "Mine"]);

        medium.fail_next_gets(1);
        assert!(matches!(registry.add("Other"), Err(AppError::Common(_))));
        medium.fail_next_gets(1);
        assert!(registry.remove("Mine").is_err());
        assert_eq!(registry.load(), vec!["Web", "Mine"]);
    }
}
