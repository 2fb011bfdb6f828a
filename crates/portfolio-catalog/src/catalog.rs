/// The catalog as the admin surface sees it: entries plus filter labels over one medium.
///
/// Operations that span both stores (filter bar, category deletion under a strict
/// policy) live here so `CategoryRegistry::remove` itself never cascades.
use std::str::FromStr;
use std::sync::Arc;

use tracing::{info, warn};

use catalog_common::medium::StorageMedium;

use crate::categories::CategoryRegistry;
use crate::error::AppError;
use crate::model::{ranked, CatalogEntry, CategoryFilter, EntryDraft, ALL_CATEGORIES};
use crate::store::{CatalogStore, Direction};

/// What happens to entries when their category is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Leave entries untouched; their `category` may dangle.
    #[default]
    Keep,
    /// Refuse to delete a category that any entry still uses.
    Block,
    /// Delete the entries that use the category along with it.
    Cascade,
}

impl FromStr for DeletePolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep" => Ok(Self::Keep),
            "block" => Ok(Self::Block),
            "cascade" => Ok(Self::Cascade),
            other => Err(AppError::Config(format!(
                "unknown category delete policy '{other}' (expected keep, block or cascade)"
            ))),
        }
    }
}

/// Result of removing a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRemoval {
    pub removed: bool,
    /// Ids of entries deleted by a cascading policy.
    pub deleted_entries: Vec<String>,
}

pub struct Catalog {
    store: CatalogStore,
    categories: CategoryRegistry,
    policy: DeletePolicy,
}

impl Catalog {
    pub fn init(medium: Arc<dyn StorageMedium>, key_prefix: &str, policy: DeletePolicy) -> Self {
        Self::new(
            CatalogStore::init(Arc::clone(&medium), key_prefix),
            CategoryRegistry::init(medium, key_prefix),
            policy,
        )
    }

    pub fn new(store: CatalogStore, categories: CategoryRegistry, policy: DeletePolicy) -> Self {
        Self {
            store,
            categories,
            policy,
        }
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    pub fn categories(&self) -> &CategoryRegistry {
        &self.categories
    }

    pub fn policy(&self) -> DeletePolicy {
        self.policy
    }

    /// Entries for display: ranked, then filtered.
    pub fn gallery(&self, filter: &CategoryFilter) -> Vec<CatalogEntry> {
        ranked(self.store.load())
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect()
    }

    /// Filter bar labels: `All` followed by the registry in insertion order.
    pub fn filter_labels(&self) -> Vec<String> {
        std::iter::once(ALL_CATEGORIES.to_string())
            .chain(self.categories.load())
            .collect()
    }

    /// Validate a draft and upsert it. Invalid drafts never reach the store.
    pub fn submit(&self, draft: EntryDraft) -> Result<CatalogEntry, AppError> {
        let entry = draft.into_entry()?;
        self.store.save(entry.clone())?;
        Ok(entry)
    }

    pub fn move_entry(&self, position: usize, direction: Direction) -> Result<bool, AppError> {
        self.store.move_entry(position, direction)
    }

    /// Remove a category under the configured policy.
    ///
    /// The label is removed before any cascading entry delete. If that delete then
    /// fails, the entries are left in place with a dangling category, the same state
    /// the `Keep` policy produces, and the write error is returned.
    pub fn remove_category(&self, label: &str) -> Result<CategoryRemoval, AppError> {
        let (users, remaining): (Vec<CatalogEntry>, Vec<CatalogEntry>) = self
            .store
            .read()?
            .into_iter()
            .partition(|e| e.category == label);

        if self.policy == DeletePolicy::Block && !users.is_empty() {
            return Err(AppError::CategoryInUse {
                label: label.to_string(),
                count: users.len(),
            });
        }

        let removed = self.categories.remove(label)?;

        let mut deleted_entries = Vec::new();
        if self.policy == DeletePolicy::Cascade && !users.is_empty() {
            self.store.save_all(&remaining).inspect_err(|e| {
                warn!(error = %e, label, "category removed but its entries were kept");
            })?;
            deleted_entries = users.into_iter().map(|e| e.id).collect();
            info!(label, deleted = deleted_entries.len(), "cascaded category delete");
        }

        Ok(CategoryRemoval {
            removed,
            deleted_entries,
        })
    }
}
