//! Error types for the session-formation engine
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Persona not found: {persona_id}")]
    UnknownPersona { persona_id: i64 },

    #[error("Event not found: {event_id}")]
    UnknownEvent { event_id: i64 },

    #[error("Lobby not found: {lobby_id}")]
    UnknownLobby { lobby_id: String },

    #[error("Session not found: {session_id}")]
    UnknownSession { session_id: String },

    #[error("Level {level} is outside event range {min_level}..={max_level}")]
    LevelOutOfRange {
        level: i32,
        min_level: i32,
        max_level: i32,
    },

    #[error("Car class {actual} does not match required class {required}")]
    CarClassMismatch { required: i32, actual: i32 },

    #[error("Active car is not on the event's allowed list: {restriction}")]
    CarRestricted { restriction: String },

    #[error("Lobby is locked to car class {locked}, candidate has {actual}")]
    ClassLockMismatch { locked: i32, actual: i32 },

    #[error("Lobby is full: {lobby_id}")]
    LobbyFull { lobby_id: String },

    #[error("Lobby countdown too short to admit entrants: {remaining_ms}ms remaining")]
    CountdownTooShort { remaining_ms: u64 },

    #[error("No eligible successor event for mode {previous_mode_id}")]
    NoEligibleEvent { previous_mode_id: i32 },

    #[error("Queue store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl MatchmakingError {
    /// True for errors meaning "this persona cannot enter this event",
    /// as opposed to lobby-capacity or infrastructure failures.
    pub fn is_ineligible(&self) -> bool {
        matches!(
            self,
            MatchmakingError::LevelOutOfRange { .. }
                | MatchmakingError::CarClassMismatch { .. }
                | MatchmakingError::CarRestricted { .. }
                | MatchmakingError::ClassLockMismatch { .. }
        )
    }

    /// True when the lobby itself had no room or no admissible window
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            MatchmakingError::LobbyFull { .. } | MatchmakingError::CountdownTooShort { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err = MatchmakingError::CarClassMismatch {
            required: 123,
            actual: 456,
        };
        assert!(err.is_ineligible());
        assert!(!err.is_capacity());

        let err = MatchmakingError::LobbyFull {
            lobby_id: "abc".to_string(),
        };
        assert!(err.is_capacity());
        assert!(!err.is_ineligible());
    }

    #[test]
    fn test_error_display() {
        let err = MatchmakingError::LevelOutOfRange {
            level: 60,
            min_level: 1,
            max_level: 50,
        };
        assert_eq!(
            err.to_string(),
            "Level 60 is outside event range 1..=50"
        );
    }
}
