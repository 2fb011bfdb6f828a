/// MCP server exposing the portfolio catalog to an admin client.
///
/// Exposes ten tools:
/// - `list_entries`, `get_entry`: read the ranked gallery
/// - `save_entry`, `delete_entry`, `move_entry`: edit entries
/// - `list_categories`, `add_category`, `remove_category`: edit filter labels
/// - `export_catalog`: pretty JSON for promotion into the bundled defaults
/// - `resolve_image`: run the image resolver for one entry
///
/// Destructive tools act immediately; asking the user for confirmation is the client's job.
use std::sync::Arc;

use rmcp::{
    Json, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::catalog::Catalog;
use crate::error::AppError;
use crate::export::export_json;
use crate::model::{CatalogEntry, CategoryFilter, EntryDraft, ALL_CATEGORIES};
use crate::probe::AssetProbe;
use crate::render::{render, Rendering};
use crate::resolver::{candidates, AssetResolver, AssetState};
use crate::store::Direction;

#[derive(Clone)]
pub struct PortfolioServer {
    catalog: Arc<RwLock<Catalog>>,
    probe: Arc<dyn AssetProbe>,
    tool_router: ToolRouter<PortfolioServer>,
}

impl PortfolioServer {
    pub fn new(catalog: Catalog, probe: Arc<dyn AssetProbe>) -> Self {
        Self {
            catalog: Arc::new(RwLock::new(catalog)),
            probe,
            tool_router: Self::tool_router(),
        }
    }

    /// Run `f` against the catalog on the blocking pool under a read lock. Every catalog
    /// operation touches the storage medium synchronously.
    async fn with_catalog<T, F>(&self, f: F) -> Result<T, String>
    where
        T: Send + 'static,
        F: FnOnce(&Catalog) -> Result<T, String> + Send + 'static,
    {
        let catalog = Arc::clone(&self.catalog);
        tokio::task::spawn_blocking(move || f(&*catalog.blocking_read()))
            .await
            .map_err(|e| format!("catalog task failed: {e}"))?
    }

    /// Same as `with_catalog` under the write lock, so mutations never interleave.
    async fn with_catalog_mut<T, F>(&self, f: F) -> Result<T, String>
    where
        T: Send + 'static,
        F: FnOnce(&Catalog) -> Result<T, String> + Send + 'static,
    {
        let catalog = Arc::clone(&self.catalog);
        tokio::task::spawn_blocking(move || f(&*catalog.blocking_write()))
            .await
            .map_err(|e| format!("catalog task failed: {e}"))?
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ListEntriesParams {
    /// Category label to filter by. Omit or pass "All" for every entry.
    category: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct EntryIdParams {
    /// Entry id.
    id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ResolveImageParams {
    /// Entry id.
    id: String,
    /// Image reference to try instead of the entry's stored `imageUrl`, for previewing an edit.
    image_url: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SaveEntryParams {
    /// Entry fields. Omit `id` to create a new entry; pass an existing id to replace it.
    entry: EntryDraft,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct MoveEntryParams {
    /// Zero-based position of the entry in the ranked list, as returned by `list_entries`
    /// without a filter.
    position: u32,
    /// "previous" or "next".
    direction: Direction,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct CategoryParams {
    /// Category label, matched case-sensitively.
    label: String,
}

#[derive(Debug, Serialize, JsonSchema)]
struct EntryListResponse {
    filter: String,
    entries: Vec<CatalogEntry>,
}

#[derive(Debug, Serialize, JsonSchema)]
struct EntryResponse {
    entry: CatalogEntry,
    /// Live demo link, present only when the entry has a non-blank `liveUrl`.
    live_link: Option<String>,
    /// Source link, present only when the entry has a non-blank `repoUrl`.
    repo_link: Option<String>,
}

impl EntryResponse {
    fn new(entry: CatalogEntry) -> Self {
        Self {
            live_link: entry.live_link().map(str::to_string),
            repo_link: entry.repo_link().map(str::to_string),
            entry,
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
struct DeleteEntryResponse {
    deleted: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
struct MoveEntryResponse {
    moved: bool,
    /// Entry ids in stored order after the move.
    order: Vec<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
struct CategoryListResponse {
    /// Filter bar labels, starting with "All".
    filters: Vec<String>,
    categories: Vec<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
struct CategoryChangeResponse {
    changed: bool,
    categories: Vec<String>,
    /// Entries removed along with the category (cascade policy only).
    deleted_entries: Vec<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
struct ExportResponse {
    entry_count: usize,
    json: String,
}

#[derive(Debug, Serialize, JsonSchema)]
struct ResolveImageResponse {
    id: String,
    /// The image reference that was resolved.
    subject: String,
    candidates: Vec<String>,
    state: AssetState,
    rendering: Rendering,
}

#[tool_router]
impl PortfolioServer {
    #[tool(description = "List portfolio entries ranked for display, optionally filtered by category.")]
    async fn list_entries(
        &self,
        Parameters(params): Parameters<ListEntriesParams>,
    ) -> Result<Json<EntryListResponse>, String> {
        let filter = CategoryFilter::parse(params.category.as_deref());
        let label = match &filter {
            CategoryFilter::All => ALL_CATEGORIES.to_string(),
            CategoryFilter::Label(label) => label.clone(),
        };
        let entries = self.with_catalog(move |catalog| Ok(catalog.gallery(&filter))).await?;
        Ok(Json(EntryListResponse {
            filter: label,
            entries,
        }))
    }

    #[tool(description = "Get one portfolio entry by id.")]
    async fn get_entry(
        &self,
        Parameters(params): Parameters<EntryIdParams>,
    ) -> Result<Json<EntryResponse>, String> {
        let id = params.id.trim().to_string();
        let entry = self
            .with_catalog(move |catalog| {
                catalog
                    .store()
                    .get(&id)
                    .ok_or_else(|| AppError::NotFound(id.clone()).to_string())
            })
            .await?;
        Ok(Json(EntryResponse::new(entry)))
    }

    #[tool(description = "Create or replace a portfolio entry. Title, description, category and imageUrl are required.")]
    async fn save_entry(
        &self,
        Parameters(params): Parameters<SaveEntryParams>,
    ) -> Result<Json<EntryResponse>, String> {
        let entry = self
            .with_catalog_mut(move |catalog| {
                catalog
                    .submit(params.entry)
                    .map_err(|e| format!("save failed: {e}"))
            })
            .await?;
        info!(id = %entry.id, "entry saved");
        Ok(Json(EntryResponse::new(entry)))
    }

    #[tool(description = "Delete a portfolio entry by id. Deleting an unknown id is a no-op.")]
    async fn delete_entry(
        &self,
        Parameters(params): Parameters<EntryIdParams>,
    ) -> Result<Json<DeleteEntryResponse>, String> {
        let id = params.id.trim().to_string();
        let deleted = self
            .with_catalog_mut(move |catalog| {
                catalog
                    .store()
                    .delete(&id)
                    .map_err(|e| format!("delete failed: {e}"))
            })
            .await?;
        Ok(Json(DeleteEntryResponse { deleted }))
    }

    #[tool(description = "Swap the entry at a position in the ranked list with its previous or next neighbour, then renumber ranks from list position. Moving past either end is a no-op.")]
    async fn move_entry(
        &self,
        Parameters(params): Parameters<MoveEntryParams>,
    ) -> Result<Json<MoveEntryResponse>, String> {
        let (moved, order) = self
            .with_catalog_mut(move |catalog| {
                let moved = catalog
                    .move_entry(params.position as usize, params.direction)
                    .map_err(|e| format!("move failed: {e}"))?;
                let order: Vec<String> = catalog.store().load().into_iter().map(|e| e.id).collect();
                Ok((moved, order))
            })
            .await?;
        Ok(Json(MoveEntryResponse { moved, order }))
    }

    #[tool(description = "List category labels in insertion order, plus the filter bar labels.")]
    async fn list_categories(&self) -> Result<Json<CategoryListResponse>, String> {
        let response = self
            .with_catalog(|catalog| {
                Ok(CategoryListResponse {
                    filters: catalog.filter_labels(),
                    categories: catalog.categories().load(),
                })
            })
            .await?;
        Ok(Json(response))
    }

    #[tool(description = "Add a category label. Adding an existing label is a no-op.")]
    async fn add_category(
        &self,
        Parameters(params): Parameters<CategoryParams>,
    ) -> Result<Json<CategoryChangeResponse>, String> {
        let response = self
            .with_catalog_mut(move |catalog| {
                let changed = catalog
                    .categories()
                    .add(&params.label)
                    .map_err(|e| format!("add category failed: {e}"))?;
                Ok(CategoryChangeResponse {
                    changed,
                    categories: catalog.categories().load(),
                    deleted_entries: Vec::new(),
                })
            })
            .await?;
        Ok(Json(response))
    }

    #[tool(description = "Remove a category label. Entries using it are handled by the configured delete policy (keep, block or cascade).")]
    async fn remove_category(
        &self,
        Parameters(params): Parameters<CategoryParams>,
    ) -> Result<Json<CategoryChangeResponse>, String> {
        let response = self
            .with_catalog_mut(move |catalog| {
                let removal = catalog
                    .remove_category(&params.label)
                    .map_err(|e| format!("remove category failed: {e}"))?;
                Ok(CategoryChangeResponse {
                    changed: removal.removed,
                    categories: catalog.categories().load(),
                    deleted_entries: removal.deleted_entries,
                })
            })
            .await?;
        Ok(Json(response))
    }

    #[tool(description = "Export the catalog as pretty-printed JSON in the persisted shape, for pasting into the bundled defaults.")]
    async fn export_catalog(&self) -> Result<Json<ExportResponse>, String> {
        let response = self
            .with_catalog(|catalog| {
                let entries = catalog.store().load();
                let json = export_json(&entries).map_err(|e| format!("export failed: {e}"))?;
                Ok(ExportResponse {
                    entry_count: entries.len(),
                    json,
                })
            })
            .await?;
        Ok(Json(response))
    }

    #[tool(description = "Resolve a working image for an entry by probing its imageUrl (or a replacement image_url) and extension variants, and return what the gallery would render.")]
    async fn resolve_image(
        &self,
        Parameters(params): Parameters<ResolveImageParams>,
    ) -> Result<Json<ResolveImageResponse>, String> {
        let id = params.id.trim().to_string();
        let lookup = id.clone();
        let (position, entry) = self
            .with_catalog(move |catalog| {
                catalog
                    .gallery(&CategoryFilter::All)
                    .into_iter()
                    .enumerate()
                    .find(|(_, e)| e.id == lookup)
                    .ok_or_else(|| AppError::NotFound(lookup.clone()).to_string())
            })
            .await?;

        let mut resolver = AssetResolver::start(Arc::clone(&self.probe), entry.image_url.clone());
        if let Some(image_url) = params.image_url.filter(|u| !u.trim().is_empty()) {
            resolver.set_subject(image_url.trim());
        }
        let state = resolver.settled().await;
        let subject = resolver.subject().to_string();
        info!(id = %id, subject = %subject, ?state, "image resolved");

        Ok(Json(ResolveImageResponse {
            id: entry.id.clone(),
            candidates: candidates(&subject),
            subject,
            rendering: render(&state, &entry, position),
            state,
        }))
    }
}

#[tool_handler]
impl ServerHandler for PortfolioServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "portfolio-catalog".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Portfolio catalog MCP server. Use list_entries and get_entry to read the \
                 ranked gallery, save_entry/delete_entry/move_entry to edit it, and the \
                 category tools to manage filter labels. export_catalog returns JSON ready \
                 to become the new bundled defaults; resolve_image reports which image \
                 candidate loads for an entry."
                    .to_string(),
            ),
        }
    }
}
