//! # EmoFuse Common Library
//!
//! Shared code for the EmoFuse service crates:
//! - Common error type
//! - Bootstrap configuration loading (TOML + environment)
//! - Analysis lifecycle events and the broadcast EventBus

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
