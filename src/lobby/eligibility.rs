//! Event admission rules
//!
//! Every admission path (direct join, invite acceptance, queue fill,
//! monitor placement) runs the same checks in the same order: level
//! range, car class, car-name restriction, then lobby class lock.

use crate::error::MatchmakingError;
use crate::types::{Car, CarClassHash, Event, Persona};

/// Check whether a persona with the given active car may enter the
/// event, optionally against a lobby's car-class lock. The first
/// failing check wins.
pub fn check_event_eligibility(
    persona: &Persona,
    car: &Car,
    event: &Event,
    locked_car_class_hash: Option<CarClassHash>,
) -> Result<(), MatchmakingError> {
    if !event.level_in_range(persona.level) {
        return Err(MatchmakingError::LevelOutOfRange {
            level: persona.level,
            min_level: event.min_level,
            max_level: event.max_level,
        });
    }

    if !event.accepts_class(car.car_class_hash) {
        return Err(MatchmakingError::CarClassMismatch {
            required: event.car_class_hash,
            actual: car.car_class_hash,
        });
    }

    if let Some(restriction) = &event.car_restriction {
        if !car_satisfies_restriction(&car.name, restriction) {
            return Err(MatchmakingError::CarRestricted {
                restriction: restriction.clone(),
            });
        }
    }

    if let Some(locked) = locked_car_class_hash {
        if car.car_class_hash != locked {
            return Err(MatchmakingError::ClassLockMismatch {
                locked,
                actual: car.car_class_hash,
            });
        }
    }

    Ok(())
}

/// Comma-separated allow-list match: trimmed, case-insensitive,
/// whole-name comparison against the active car's name
pub fn car_satisfies_restriction(car_name: &str, restriction: &str) -> bool {
    restriction
        .split(',')
        .map(str::trim)
        .any(|allowed| allowed.eq_ignore_ascii_case(car_name))
}
