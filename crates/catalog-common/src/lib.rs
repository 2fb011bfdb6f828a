pub mod error;
pub mod medium;
pub mod redis;
