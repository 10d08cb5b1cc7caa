//! Common error types for EmoFuse

use thiserror::Error;

/// Common result type for EmoFuse operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across EmoFuse crates
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
