//! Event sessions: the registry of running races, the launcher that
//! turns full or expired lobbies into sessions, and the Race Again
//! coordinator.

pub mod launcher;
pub mod race_again;
pub mod registry;

pub use launcher::SessionLauncher;
pub use race_again::RaceAgainCoordinator;
pub use registry::{EventSession, SessionRegistry};
