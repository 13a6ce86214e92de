// Core modules
pub mod api;
pub mod config;
pub mod execution;
pub mod indicators;
pub mod logging;
pub mod models;
pub mod persistence;
pub mod scheduler;
pub mod strategy;
pub mod wallet;

// Re-export commonly used types
pub use crate::config::{BotConfig, ConfigError};
pub use models::*;
pub use strategy::Strategy;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
