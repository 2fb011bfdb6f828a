/// Error types shared by catalog front ends.
///
/// These represent failures of the storage medium itself (filesystem, Redis, lock state).
/// Domain errors are defined in each consuming crate and wrap `CommonError` via `#[from]`.

#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("medium io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid medium key: {0}")]
    InvalidKey(String),

    #[error("medium unavailable: {0}")]
    Unavailable(String),
}
