use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AppError;

/// Rank given to entries without an explicit `order`, sorting them after ranked ones.
pub const UNRANKED_ORDER: i64 = 99;

/// Label of the pseudo-category that matches every entry.
pub const ALL_CATEGORIES: &str = "All";

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// One portfolio item.
///
/// Field names and layout are the persisted JSON shape, so the bundled default catalog,
/// the stored blob and the export output are interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Opaque identity, assigned at creation and never changed.
    pub id: String,
    pub title: String,
    pub description: String,
    /// Filter label. Expected to exist in the category registry but not enforced.
    pub category: String,
    /// Insertion order preserved, duplicates allowed.
    pub technologies: Vec<String>,
    /// Primary candidate location for the entry's image.
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<String>>,
}

impl CatalogEntry {
    /// Display rank; entries without one sort to the end.
    pub fn effective_order(&self) -> i64 {
        self.order.unwrap_or(UNRANKED_ORDER)
    }

    /// Live demo link, if one is available. Blank strings mean "not available".
    pub fn live_link(&self) -> Option<&str> {
        available(self.live_url.as_deref())
    }

    /// Source repository link, if one is available.
    pub fn repo_link(&self) -> Option<&str> {
        available(self.repo_url.as_deref())
    }
}

fn available(link: Option<&str>) -> Option<&str> {
    link.map(str::trim).filter(|l| !l.is_empty())
}

/// An entry as submitted by the editing workflow, before validation.
///
/// A draft without an `id` creates a new entry; a draft with one replaces it.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntryDraft {
    pub id: Option<String>,
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub technologies: Vec<String>,
    pub image_url: String,
    pub live_url: Option<String>,
    pub repo_url: Option<String>,
    #[serde(default)]
    pub featured: bool,
    pub order: Option<i64>,
    pub problem: Option<String>,
    pub solution: Option<String>,
    pub results: Option<Vec<String>>,
}

impl EntryDraft {
    /// Validate the draft and turn it into a storable entry.
    ///
    /// Required text fields must be non-blank. Technology tags are trimmed and blank
    /// tags dropped; a missing id is replaced by a fresh one.
    pub fn into_entry(self) -> Result<CatalogEntry, AppError> {
        let title = required("title", self.title)?;
        let description = required("description", self.description)?;
        let category = required("category", self.category)?;
        let image_url = required("imageUrl", self.image_url)?;

        let id = match self.id.map(|id| id.trim().to_string()) {
            Some(id) if !id.is_empty() => id,
            _ => new_entry_id(),
        };

        let technologies = self
            .technologies
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        Ok(CatalogEntry {
            id,
            title,
            description,
            category,
            technologies,
            image_url,
            live_url: self.live_url,
            repo_url: self.repo_url,
            featured: self.featured,
            order: self.order,
            problem: self.problem,
            solution: self.solution,
            results: self.results,
        })
    }
}

fn required(field: &str, value: String) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Which entries the gallery shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryFilter {
    All,
    Label(String),
}

impl CategoryFilter {
    /// `None`, blank and `"All"` select everything; anything else is an exact label.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") | Some(ALL_CATEGORIES) => Self::All,
            Some(label) => Self::Label(label.to_string()),
        }
    }

    pub fn matches(&self, entry: &CatalogEntry) -> bool {
        match self {
            Self::All => true,
            Self::Label(label) => entry.category == *label,
        }
    }
}

/// Sort entries for display by effective rank. The sort is stable, so entries sharing a
/// rank keep their stored order.
pub fn ranked(mut entries: Vec<CatalogEntry>) -> Vec<CatalogEntry> {
    entries.sort_by_key(CatalogEntry::effective_order);
    entries
}

/// Generate an opaque entry id from the clock, the process id and a counter.
pub fn new_entry_id() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0));
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id();

    let mut h = Sha256::new();
    h.update(now.as_nanos().to_le_bytes());
    h.update(pid.to_le_bytes());
    h.update(counter.to_le_bytes());
    let digest = h.finalize();
    hex_lower(&digest[..8])
}

fn hex_lower(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0f) as usize] as char);
    }
    out
}
