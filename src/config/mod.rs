//! Configuration management for the paddock service
//!
//! This module handles all configuration loading from environment variables
//! and TOML files, validation, and default values for the session-formation
//! engine.

pub mod app;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, MatchmakingSettings, ServiceSettings};
