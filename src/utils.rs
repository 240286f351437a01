//! Utility functions for the session-formation engine

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique lobby ID
pub fn generate_lobby_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate a new unique session ID
pub fn generate_session_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Current timestamp in whole seconds since the epoch, the format
/// queue entries are stored in
pub fn current_epoch_seconds() -> i64 {
    Utc::now().timestamp()
}

/// Seconds elapsed since the given epoch timestamp, clamped at zero
pub fn seconds_since(epoch_seconds: i64) -> u64 {
    (current_epoch_seconds() - epoch_seconds).max(0) as u64
}
