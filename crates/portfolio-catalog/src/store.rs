/// Durable ownership of the ordered catalog entry list.
///
/// The medium is the single source of truth: every operation reads the persisted blob,
/// applies its change in memory and writes the full list back in one `set`. There is no
/// in-process cache, so two stores over the same medium see each other's writes
/// (last write wins).
///
/// Key schema:
/// - `{prefix}projects`: JSON array of `CatalogEntry`
use std::collections::HashSet;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use catalog_common::medium::StorageMedium;

use crate::defaults::default_catalog;
use crate::error::AppError;
use crate::model::{ranked, CatalogEntry};

const CATALOG_KEY: &str = "projects";

/// Direction of a single-step reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Previous,
    Next,
}

pub struct CatalogStore {
    medium: Arc<dyn StorageMedium>,
    key: String,
    defaults: Vec<CatalogEntry>,
}

impl CatalogStore {
    /// Build a store over `medium`, seeded from the bundled default catalog.
    pub fn init(medium: Arc<dyn StorageMedium>, key_prefix: &str) -> Self {
        Self::with_defaults(medium, key_prefix, default_catalog())
    }

    pub fn with_defaults(
        medium: Arc<dyn StorageMedium>,
        key_prefix: &str,
        defaults: Vec<CatalogEntry>,
    ) -> Self {
        Self {
            medium,
            key: format!("{key_prefix}{CATALOG_KEY}"),
            defaults,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the catalog in stored order. Never fails: a missing blob is seeded, an
    /// unparsable one is replaced with the defaults, and an unreadable medium answers
    /// with the defaults without touching what it holds.
    pub fn load(&self) -> Vec<CatalogEntry> {
        self.read().unwrap_or_else(|e| {
            warn!(error = %e, key = %self.key, "medium read failed, serving default catalog");
            self.defaults.clone()
        })
    }

    /// Strict read used before every mutation, so an unreadable medium fails the
    /// mutation instead of overwriting persisted entries with the defaults.
    pub(crate) fn read(&self) -> Result<Vec<CatalogEntry>, AppError> {
        let entries: Vec<CatalogEntry> =
            read_or_seed(self.medium.as_ref(), &self.key, "catalog", || self.defaults.clone())?;

        let mut seen = HashSet::new();
        let unique: Vec<CatalogEntry> = entries
            .iter()
            .filter(|e| seen.insert(e.id.as_str()))
            .cloned()
            .collect();
        if unique.len() != entries.len() {
            warn!(
                key = %self.key,
                dropped = entries.len() - unique.len(),
                "persisted catalog held duplicate ids, keeping first occurrences"
            );
            if let Err(e) = self.write(&unique) {
                warn!(error = %e, key = %self.key, "failed to rewrite deduplicated catalog");
            }
        }
        Ok(unique)
    }

    /// Look up one entry by id.
    pub fn get(&self, id: &str) -> Option<CatalogEntry> {
        self.load().into_iter().find(|e| e.id == id)
    }

    /// Upsert by id: replace in place when the id exists, otherwise append.
    pub fn save(&self, entry: CatalogEntry) -> Result<(), AppError> {
        let mut entries = self.read()?;
        match entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => {
                debug!(id = %entry.id, "replacing catalog entry");
                *existing = entry;
            }
            None => {
                debug!(id = %entry.id, "appending catalog entry");
                entries.push(entry);
            }
        }
        self.write(&entries)
    }

    /// Replace the whole persisted list with `entries`, in the given order.
    pub fn save_all(&self, entries: &[CatalogEntry]) -> Result<(), AppError> {
        let mut seen = HashSet::new();
        if let Some(dup) = entries.iter().find(|e| !seen.insert(e.id.as_str())) {
            return Err(AppError::DuplicateId(dup.id.clone()));
        }
        self.write(entries)
    }

    /// Remove the entry with `id`. Returns whether anything was removed; the list is
    /// rewritten either way.
    pub fn delete(&self, id: &str) -> Result<bool, AppError> {
        let mut entries = self.read()?;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        let removed = entries.len() != before;
        self.write(&entries)?;
        if removed {
            info!(id, "catalog entry deleted");
        }
        Ok(removed)
    }

    /// Swap the entry at `position` in the ranked view with its neighbour in
    /// `direction`.
    ///
    /// The list is committed in ranked order with every `order` renumbered from its
    /// position (1-based), so the stored order and the displayed order agree after any
    /// move. Moving past either end is a no-op and returns `false`.
    pub fn move_entry(&self, position: usize, direction: Direction) -> Result<bool, AppError> {
        let mut entries = ranked(self.read()?);
        let target = match direction {
            Direction::Previous => position.checked_sub(1),
            Direction::Next => position.checked_add(1).filter(|&t| t < entries.len()),
        };
        let Some(target) = target.filter(|_| position < entries.len()) else {
            debug!(position, ?direction, "move out of bounds, ignoring");
            return Ok(false);
        };

        entries.swap(position, target);
        for (rank, entry) in (1..).zip(entries.iter_mut()) {
            entry.order = Some(rank);
        }

        self.save_all(&entries)?;
        Ok(true)
    }

    fn write(&self, entries: &[CatalogEntry]) -> Result<(), AppError> {
        let json = serde_json::to_string(entries)?;
        self.medium.set(&self.key, &json)?;
        Ok(())
    }
}

/// Shared read policy for the persisted blobs.
///
/// - read error: returned to the caller, the medium is left untouched
/// - absent key: seed the medium with the defaults
/// - unparsable blob: log the corruption, overwrite with the defaults
pub(crate) fn read_or_seed<T, F>(
    medium: &dyn StorageMedium,
    key: &str,
    what: &str,
    defaults: F,
) -> Result<T, AppError>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> T,
{
    let value = match medium.get(key)? {
        None => {
            info!(key, what, "no persisted data, seeding defaults");
            seed(medium, key, what, defaults())
        }
        Some(raw) => match serde_json::from_str::<T>(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, key, what, "persisted data is corrupt, restoring defaults");
                seed(medium, key, what, defaults())
            }
        },
    };
    Ok(value)
}

fn seed<T: Serialize>(medium: &dyn StorageMedium, key: &str, what: &str, value: T) -> T {
    let written = serde_json::to_string(&value)
        .map_err(AppError::from)
        .and_then(|json| medium.set(key, &json).map_err(AppError::from));
    if let Err(e) = written {
        warn!(error = %e, key, what, "failed to persist defaults");
    }
    value
}
