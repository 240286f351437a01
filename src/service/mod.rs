//! Service layer for the paddock session-formation engine
//!
//! This module contains the main application state that wires the queue,
//! lobby, session, and monitor components together and manages the
//! background task lifecycle.

pub mod app;

pub use app::AppState;
