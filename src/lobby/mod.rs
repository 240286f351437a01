//! Lobby formation: instances, admission rules, countdowns, and the manager

pub mod countdown;
pub mod eligibility;
pub mod instance;
pub mod manager;
pub mod store;

pub use countdown::{CountdownScheduler, LobbyLauncher};
pub use instance::LobbyInstance;
pub use manager::LobbyManager;
pub use store::LobbyStore;
