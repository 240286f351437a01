//! Matchmaking queue state and operations
//!
//! Two queues share the backing store: the traditional queue, a single
//! hash of persona id to the car class they queued with, filled when a
//! lobby is created for a specific event; and the instant queue, a
//! membership set plus one hash per persona (class, level, enqueue
//! timestamp) scanned periodically by the queue monitor. Per-persona
//! ignore sets and the immediate-scan set live here too.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::Result;
use crate::notify::Notifier;
use crate::store::QueueStore;
use crate::types::{CarClassHash, Event, EventId, EventIgnored, PersonaId, OPEN_CLASS_HASH};
use crate::utils::current_epoch_seconds;

const TRADITIONAL_QUEUE_KEY: &str = "matchmaking_queue";
const INSTANT_MEMBERS_KEY: &str = "instant_queue_members";
const IMMEDIATE_SCAN_KEY: &str = "immediate_scan";

fn instant_entry_key(persona_id: &str) -> String {
    format!("instant_queue:{}", persona_id)
}

fn ignored_events_key(persona_id: PersonaId) -> String {
    format!("ignored_events:{}", persona_id)
}

/// Parsed instant-queue entry for one persona
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstantEntry {
    pub car_class_hash: CarClassHash,
    pub level: i32,
    /// Epoch seconds at enqueue time
    pub enqueued_at: i64,
}

/// Queue operations shared by the lobby manager and the queue monitor
pub struct MatchmakingQueue {
    store: Arc<dyn QueueStore>,
    notifier: Arc<dyn Notifier>,
}

impl MatchmakingQueue {
    pub fn new(store: Arc<dyn QueueStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    // Traditional queue

    /// Place a persona in the traditional queue with their current car
    /// class. Re-enqueueing overwrites the stored class.
    pub fn enqueue(&self, persona_id: PersonaId, car_class_hash: CarClassHash) -> Result<()> {
        self.store.hash_set(
            TRADITIONAL_QUEUE_KEY,
            &persona_id.to_string(),
            &car_class_hash.to_string(),
        )?;
        info!(persona_id, car_class_hash, "Persona entered traditional queue");
        Ok(())
    }

    /// Remove a persona from the traditional queue, a no-op if absent
    pub fn dequeue(&self, persona_id: PersonaId) -> Result<()> {
        self.store
            .hash_del(TRADITIONAL_QUEUE_KEY, &persona_id.to_string())
    }

    pub fn is_queued(&self, persona_id: PersonaId) -> Result<bool> {
        self.store
            .hash_contains(TRADITIONAL_QUEUE_KEY, &persona_id.to_string())
    }

    /// All traditional-queue entries that parse cleanly. Malformed
    /// entries are purged from the store and logged.
    pub fn traditional_entries(&self) -> Result<Vec<(PersonaId, CarClassHash)>> {
        let mut entries = Vec::new();
        for (field, value) in self.store.hash_entries(TRADITIONAL_QUEUE_KEY)? {
            match (field.parse::<PersonaId>(), value.parse::<CarClassHash>()) {
                (Ok(persona_id), Ok(car_class_hash)) => {
                    entries.push((persona_id, car_class_hash));
                }
                _ => {
                    warn!(field, value, "Purging malformed traditional queue entry");
                    self.store.hash_del(TRADITIONAL_QUEUE_KEY, &field)?;
                }
            }
        }
        Ok(entries)
    }

    /// Pick a live traditional-queue member whose stored class equals the
    /// requested one. Requesting the open-class sentinel matches any
    /// member. Selection order is unspecified; the entry stays queued.
    pub fn take_match(&self, car_class_hash: CarClassHash) -> Result<Option<PersonaId>> {
        for (persona_id, stored_class) in self.traditional_entries()? {
            if car_class_hash == OPEN_CLASS_HASH || stored_class == car_class_hash {
                return Ok(Some(persona_id));
            }
        }
        Ok(None)
    }

    // Ignore sets

    /// Add an event to the persona's ignore set and confirm it to them.
    /// Queue membership is not required.
    pub async fn ignore_event(&self, persona_id: PersonaId, event: &Event) -> Result<()> {
        self.store
            .set_add(&ignored_events_key(persona_id), &event.id.to_string())?;
        info!(persona_id, event_id = event.id, "Event added to ignore set");
        self.notifier
            .send_event_ignored(
                persona_id,
                EventIgnored {
                    event_id: event.id,
                    event_name: event.name.clone(),
                },
            )
            .await
    }

    pub fn is_ignored(&self, persona_id: PersonaId, event_id: EventId) -> Result<bool> {
        self.store
            .set_contains(&ignored_events_key(persona_id), &event_id.to_string())
    }

    /// Clear the persona's ignore set. Runs on any fresh matchmaking
    /// activity so declines never blacklist an event permanently.
    pub fn reset_ignored(&self, persona_id: PersonaId) -> Result<()> {
        self.store.delete_key(&ignored_events_key(persona_id))
    }

    // Instant queue

    /// Place a persona in the instant queue, stamping the entry with
    /// the current time. Re-enqueueing refreshes class, level, and
    /// timestamp.
    pub fn enqueue_instant(
        &self,
        persona_id: PersonaId,
        car_class_hash: CarClassHash,
        level: i32,
    ) -> Result<()> {
        let member = persona_id.to_string();
        let key = instant_entry_key(&member);
        self.store.hash_set(&key, "carClass", &car_class_hash.to_string())?;
        self.store.hash_set(&key, "level", &level.to_string())?;
        self.store
            .hash_set(&key, "timestamp", &current_epoch_seconds().to_string())?;
        self.store.set_add(INSTANT_MEMBERS_KEY, &member)?;
        info!(persona_id, car_class_hash, level, "Persona entered instant queue");
        Ok(())
    }

    /// Remove a persona from the instant queue and the immediate-scan
    /// set, a no-op if absent
    pub fn dequeue_instant(&self, persona_id: PersonaId) -> Result<()> {
        self.purge_instant_member(&persona_id.to_string())
    }

    /// Raw removal by member string, also used to drop entries whose
    /// member never parses as a persona id
    pub fn purge_instant_member(&self, member: &str) -> Result<()> {
        self.store.set_remove(INSTANT_MEMBERS_KEY, member)?;
        self.store.delete_key(&instant_entry_key(member))?;
        self.store.set_remove(IMMEDIATE_SCAN_KEY, member)
    }

    pub fn is_in_instant_queue(&self, persona_id: PersonaId) -> Result<bool> {
        self.store
            .set_contains(INSTANT_MEMBERS_KEY, &persona_id.to_string())
    }

    /// Raw member list of the instant queue
    pub fn list_instant(&self) -> Result<Vec<String>> {
        self.store.set_members(INSTANT_MEMBERS_KEY)
    }

    /// Parse a persona's instant-queue entry. Returns `None` when any
    /// field is missing or malformed; callers drop such entries.
    pub fn instant_entry(&self, persona_id: PersonaId) -> Result<Option<InstantEntry>> {
        let key = instant_entry_key(&persona_id.to_string());
        let car_class = self.store.hash_get(&key, "carClass")?;
        let level = self.store.hash_get(&key, "level")?;
        let timestamp = self.store.hash_get(&key, "timestamp")?;

        let entry = match (car_class, level, timestamp) {
            (Some(car_class), Some(level), Some(timestamp)) => {
                match (
                    car_class.parse::<CarClassHash>(),
                    level.parse::<i32>(),
                    timestamp.parse::<i64>(),
                ) {
                    (Ok(car_class_hash), Ok(level), Ok(enqueued_at)) => Some(InstantEntry {
                        car_class_hash,
                        level,
                        enqueued_at,
                    }),
                    _ => {
                        warn!(persona_id, "Malformed instant queue entry");
                        None
                    }
                }
            }
            _ => None,
        };
        Ok(entry)
    }

    // Immediate scan

    /// Flag a persona for the monitor's next pass without waiting a
    /// full interval
    pub fn mark_immediate_scan(&self, persona_id: PersonaId) -> Result<()> {
        self.store
            .set_add(IMMEDIATE_SCAN_KEY, &persona_id.to_string())
    }

    /// Take and clear the immediate-scan set
    pub fn drain_immediate_scan(&self) -> Result<Vec<String>> {
        let members = self.store.set_members(IMMEDIATE_SCAN_KEY)?;
        self.store.delete_key(IMMEDIATE_SCAN_KEY)?;
        Ok(members)
    }

    /// Presence loss (disconnect, menu exit) clears every trace of the
    /// persona from matchmaking state
    pub fn handle_presence_changed(&self, persona_id: PersonaId) -> Result<()> {
        self.dequeue(persona_id)?;
        self.dequeue_instant(persona_id)?;
        self.reset_ignored(persona_id)?;
        info!(persona_id, "Cleared matchmaking state on presence change");
        Ok(())
    }
}
