use catalog_common::error::CommonError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid entry: {0}")]
    Validation(String),

    #[error("entry not found: {0}")]
    NotFound(String),

    #[error("duplicate entry id: {0}")]
    DuplicateId(String),

    #[error("category '{label}' is still used by {count} entries")]
    CategoryInUse { label: String, count: usize },

    #[error("config error: {0}")]
    Config(String),
}
