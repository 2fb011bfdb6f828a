/// What the gallery draws for an entry's image slot.
///
/// `Loading` shows a placeholder, `Loaded` the resolved URL. `Failed` is never blank:
/// it shows one of three background treatments keyed by the entry's position, with the
/// entry's category and title on top, so a broken image stays legible and stable.
use schemars::JsonSchema;
use serde::Serialize;

use crate::model::CatalogEntry;
use crate::resolver::AssetState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FallbackTreatment {
    Gradient,
    Grid,
    Noise,
}

impl FallbackTreatment {
    pub fn for_position(position: usize) -> Self {
        match position % 3 {
            0 => Self::Gradient,
            1 => Self::Grid,
            _ => Self::Noise,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rendering {
    Placeholder,
    Image {
        url: String,
        alt: String,
    },
    Fallback {
        treatment: FallbackTreatment,
        category: String,
        title: String,
    },
}

pub fn render(state: &AssetState, entry: &CatalogEntry, position: usize) -> Rendering {
    match state {
        AssetState::Loading => Rendering::Placeholder,
        AssetState::Loaded { url } => Rendering::Image {
            url: url.clone(),
            alt: entry.title.clone(),
        },
        AssetState::Failed => Rendering::Fallback {
            treatment: FallbackTreatment::for_position(position),
            category: entry.category.clone(),
            title: entry.title.clone(),
        },
    }
}
