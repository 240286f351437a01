//! Reference data provider traits and implementations
//!
//! Personas, cars, and event definitions are read-only reference data
//! owned by another system. This module defines the lookup interface the
//! engine needs, along with a static implementation backed by in-memory
//! tables for tests and single-node deployments.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::types::{
    modes_compatible, Car, CarClassHash, Event, EventId, Persona, PersonaId, CIRCUIT_MODE_ID,
};

/// Trait for looking up personas, cars, and candidate events
pub trait ReferenceDataProvider: Send + Sync {
    /// Look up a persona by id
    fn find_persona(&self, persona_id: PersonaId) -> Option<Persona>;

    /// Look up an event definition by id
    fn find_event(&self, event_id: EventId) -> Option<Event>;

    /// The persona's currently-selected car, if any
    fn active_car(&self, persona_id: PersonaId) -> Option<Car>;

    /// Enabled circuit/sprint events the persona could enter, used when
    /// the monitor creates a lobby for a long-waiting queue member
    fn events_for_auto_lobby(&self, level: i32, car_class_hash: CarClassHash) -> Vec<Event>;

    /// Enabled events eligible as a successor to a finished race: same
    /// or interchangeable mode, race-again enabled, level and class fit
    fn events_for_race_again(
        &self,
        level: i32,
        car_class_hash: CarClassHash,
        previous_mode_id: i32,
    ) -> Vec<Event>;
}

/// Static reference data provider backed by in-memory tables
#[derive(Default)]
pub struct StaticReferenceProvider {
    personas: RwLock<HashMap<PersonaId, Persona>>,
    cars: RwLock<HashMap<PersonaId, Car>>,
    events: RwLock<HashMap<EventId, Event>>,
}

impl StaticReferenceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_persona(&self, persona: Persona) {
        self.personas.write().unwrap().insert(persona.id, persona);
    }

    pub fn set_active_car(&self, persona_id: PersonaId, car: Car) {
        self.cars.write().unwrap().insert(persona_id, car);
    }

    pub fn add_event(&self, event: Event) {
        self.events.write().unwrap().insert(event.id, event);
    }

    fn events_matching<F>(&self, predicate: F) -> Vec<Event>
    where
        F: Fn(&Event) -> bool,
    {
        let mut events: Vec<Event> = self
            .events
            .read()
            .unwrap()
            .values()
            .filter(|event| predicate(event))
            .cloned()
            .collect();
        // Stable order so callers that pick randomly stay reproducible
        // under a seeded generator
        events.sort_by_key(|event| event.id);
        events
    }
}

impl ReferenceDataProvider for StaticReferenceProvider {
    fn find_persona(&self, persona_id: PersonaId) -> Option<Persona> {
        self.personas.read().unwrap().get(&persona_id).cloned()
    }

    fn find_event(&self, event_id: EventId) -> Option<Event> {
        self.events.read().unwrap().get(&event_id).cloned()
    }

    fn active_car(&self, persona_id: PersonaId) -> Option<Car> {
        self.cars.read().unwrap().get(&persona_id).cloned()
    }

    fn events_for_auto_lobby(&self, level: i32, car_class_hash: CarClassHash) -> Vec<Event> {
        self.events_matching(|event| {
            event.is_enabled
                && modes_compatible(CIRCUIT_MODE_ID, event.event_mode_id)
                && event.level_in_range(level)
                && event.accepts_class(car_class_hash)
        })
    }

    fn events_for_race_again(
        &self,
        level: i32,
        car_class_hash: CarClassHash,
        previous_mode_id: i32,
    ) -> Vec<Event> {
        self.events_matching(|event| {
            event.is_enabled
                && event.is_race_again_enabled
                && modes_compatible(previous_mode_id, event.event_mode_id)
                && event.level_in_range(level)
                && event.accepts_class(car_class_hash)
        })
    }
}
