//! Paddock - session-formation engine for multiplayer race lobbies
//!
//! This crate provides matchmaking queues with car-class and ignore-list
//! semantics, lobby creation and admission with countdown scheduling, a
//! background queue monitor, and an atomic Race Again coordinator for
//! successor lobbies.

pub mod config;
pub mod error;
pub mod lobby;
pub mod matchmaking;
pub mod metrics;
pub mod monitor;
pub mod notify;
pub mod reference;
pub mod service;
pub mod session;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use lobby::{CountdownScheduler, LobbyInstance, LobbyLauncher, LobbyManager, LobbyStore};
pub use matchmaking::MatchmakingQueue;
pub use monitor::QueueMonitor;
pub use notify::Notifier;
pub use reference::ReferenceDataProvider;
pub use session::{RaceAgainCoordinator, SessionLauncher, SessionRegistry};
pub use store::QueueStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
