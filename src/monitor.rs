//! Background instant-queue monitor
//!
//! A periodic task that scans the instant queue: places waiting
//! personas into open lobbies, drops entries that waited past the
//! maximum, and once a persona has waited long enough, creates a fresh
//! lobby for a randomly chosen eligible event. Personas flagged for an
//! immediate scan are picked up on the next pass without waiting a
//! full interval.

use std::sync::Arc;

use rand::seq::IndexedRandom;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep};
use tracing::{debug, error, info, warn};

use crate::config::MatchmakingSettings;
use crate::error::Result;
use crate::lobby::eligibility::car_satisfies_restriction;
use crate::lobby::manager::LobbyManager;
use crate::matchmaking::{InstantEntry, MatchmakingQueue};
use crate::metrics::MetricsCollector;
use crate::reference::ReferenceDataProvider;
use crate::types::{Event, PersonaId};
use crate::utils::seconds_since;

/// Periodic scanner over the instant queue
pub struct QueueMonitor {
    queue: Arc<MatchmakingQueue>,
    manager: Arc<LobbyManager>,
    reference: Arc<dyn ReferenceDataProvider>,
    settings: MatchmakingSettings,
    metrics: Arc<MetricsCollector>,
}

impl QueueMonitor {
    pub fn new(
        queue: Arc<MatchmakingQueue>,
        manager: Arc<LobbyManager>,
        reference: Arc<dyn ReferenceDataProvider>,
        settings: MatchmakingSettings,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            queue,
            manager,
            reference,
            settings,
            metrics,
        }
    }

    /// Spawn the scan loop: one initial delay, then a fixed interval.
    /// Scan failures are logged and the loop keeps running.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        let initial_delay = std::time::Duration::from_secs(self.settings.monitor_initial_delay_seconds);
        let scan_interval = std::time::Duration::from_secs(self.settings.monitor_interval_seconds);

        tokio::spawn(async move {
            sleep(initial_delay).await;
            info!(
                interval_seconds = self.settings.monitor_interval_seconds,
                "Queue monitor started"
            );
            let mut ticker = interval(scan_interval);
            loop {
                ticker.tick().await;
                if let Err(e) = self.tick().await {
                    error!(error = %e, "Queue monitor scan failed");
                }
            }
        })
    }

    /// One scan pass over the instant queue plus anyone flagged for an
    /// immediate scan. Public so callers can drive scans directly.
    pub async fn tick(&self) -> Result<()> {
        let mut members = self.queue.list_instant()?;
        for flagged in self.queue.drain_immediate_scan()? {
            if !members.contains(&flagged) {
                members.push(flagged);
            }
        }

        for member in members {
            let persona_id = match member.parse::<PersonaId>() {
                Ok(persona_id) => persona_id,
                Err(_) => {
                    warn!(member, "Purging unparsable instant queue member");
                    self.queue.purge_instant_member(&member)?;
                    continue;
                }
            };
            if let Err(e) = self.scan_persona(persona_id).await {
                error!(persona_id, error = %e, "Failed to scan queued persona");
            }
        }

        self.metrics.queue().monitor_ticks_total.inc();
        self.metrics
            .queue()
            .instant_queue_depth
            .set(self.queue.list_instant()?.len() as i64);
        Ok(())
    }

    async fn scan_persona(&self, persona_id: PersonaId) -> Result<()> {
        let entry = match self.queue.instant_entry(persona_id)? {
            Some(entry) => entry,
            None => {
                // Entry hash vanished or went bad; drop the membership
                self.queue.dequeue_instant(persona_id)?;
                return Ok(());
            }
        };

        let waited_seconds = seconds_since(entry.enqueued_at);
        if waited_seconds > self.settings.instant_max_wait_seconds {
            info!(persona_id, waited_seconds, "Instant queue entry timed out");
            self.queue.dequeue_instant(persona_id)?;
            self.metrics.queue().instant_timeouts_total.inc();
            return Ok(());
        }

        let (persona, car) = match (
            self.reference.find_persona(persona_id),
            self.reference.active_car(persona_id),
        ) {
            (Some(persona), Some(car)) => (persona, car),
            _ => {
                warn!(persona_id, "Queued persona missing reference data, dropping");
                self.queue.dequeue_instant(persona_id)?;
                return Ok(());
            }
        };

        // Try open lobbies first
        let candidates = self
            .manager
            .open_lobbies_for(car.car_class_hash, persona.level)?;
        for (lobby, event) in candidates {
            if self.queue.is_ignored(persona_id, event.id)? {
                continue;
            }
            match self.manager.try_admit(lobby.id, &persona, &car, &event).await {
                Ok(_) => {
                    self.queue.dequeue_instant(persona_id)?;
                    info!(persona_id, lobby_id = %lobby.id, "Monitor placed persona into open lobby");
                    return Ok(());
                }
                Err(e) => {
                    debug!(persona_id, lobby_id = %lobby.id, error = %e, "Open lobby not admissible");
                }
            }
        }

        if waited_seconds < self.settings.auto_create_delay_seconds {
            return Ok(());
        }

        // Waited long enough: create a lobby for a random eligible event
        let events = self.eligible_auto_events(persona_id, &entry, &car.name)?;
        if events.is_empty() {
            warn!(persona_id, "No eligible event for auto-created lobby");
            return Ok(());
        }
        let event = events
            .choose(&mut rand::rng())
            .cloned()
            .unwrap_or_else(|| events[0].clone());

        let outcome = self
            .manager
            .create_lobby(&persona, &car, &event, false, "auto")
            .await;
        // The entry leaves the queue whether or not creation succeeded,
        // so a poisoned entry cannot wedge the scan forever
        self.queue.dequeue_instant(persona_id)?;
        match outcome {
            Ok(lobby_id) => {
                info!(persona_id, lobby_id = %lobby_id, event_id = event.id, "Auto-created lobby");
            }
            Err(e) => {
                error!(persona_id, event_id = event.id, error = %e, "Failed to auto-create lobby");
            }
        }
        Ok(())
    }

    /// Candidate events for an auto-created lobby, re-filtered against
    /// the queue entry's own level and class in case the provider's
    /// query is looser than the admission rules
    fn eligible_auto_events(
        &self,
        persona_id: PersonaId,
        entry: &InstantEntry,
        car_name: &str,
    ) -> Result<Vec<Event>> {
        let mut eligible = Vec::new();
        for event in self
            .reference
            .events_for_auto_lobby(entry.level, entry.car_class_hash)
        {
            if !event.level_in_range(entry.level) || !event.accepts_class(entry.car_class_hash) {
                continue;
            }
            if let Some(restriction) = &event.car_restriction {
                if !car_satisfies_restriction(car_name, restriction) {
                    continue;
                }
            }
            if self.queue.is_ignored(persona_id, event.id)? {
                continue;
            }
            eligible.push(event);
        }
        Ok(eligible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::lobby::countdown::testing::MockLauncher;
    use crate::lobby::countdown::CountdownScheduler;
    use crate::lobby::store::LobbyStore;
    use crate::notify::MockNotifier;
    use crate::reference::StaticReferenceProvider;
    use crate::store::InMemoryQueueStore;
    use crate::types::{Car, CarClassHash, EventId, Persona, CIRCUIT_MODE_ID, OPEN_CLASS_HASH};

    struct Fixture {
        monitor: QueueMonitor,
        manager: Arc<LobbyManager>,
        queue: Arc<MatchmakingQueue>,
        reference: Arc<StaticReferenceProvider>,
        store: Arc<InMemoryQueueStore>,
    }

    fn fixture(settings: MatchmakingSettings) -> Fixture {
        let notifier = Arc::new(MockNotifier::new());
        let store = Arc::new(InMemoryQueueStore::new());
        let queue = Arc::new(MatchmakingQueue::new(store.clone(), notifier.clone()));
        let reference = Arc::new(StaticReferenceProvider::new());
        let scheduler = Arc::new(CountdownScheduler::new(Arc::new(MockLauncher::default())));
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let manager = Arc::new(LobbyManager::new(
            LobbyStore::new(),
            queue.clone(),
            reference.clone(),
            notifier,
            scheduler,
            settings.clone(),
            metrics.clone(),
        ));
        let monitor = QueueMonitor::new(
            queue.clone(),
            manager.clone(),
            reference.clone(),
            settings,
            metrics,
        );
        Fixture {
            monitor,
            manager,
            queue,
            reference,
            store,
        }
    }

    fn instant_settings() -> MatchmakingSettings {
        let mut settings = AppConfig::default().matchmaking;
        // Queue entries qualify for auto-creation immediately
        settings.auto_create_delay_seconds = 0;
        settings
    }

    fn add_driver(fixture: &Fixture, persona_id: i64, level: i32, class: CarClassHash) {
        fixture.reference.add_persona(Persona {
            id: persona_id,
            name: format!("Driver {}", persona_id),
            level,
        });
        fixture.reference.set_active_car(
            persona_id,
            Car {
                name: format!("Car {}", persona_id),
                car_class_hash: class,
            },
        );
    }

    fn event(id: EventId, class: CarClassHash) -> crate::types::Event {
        crate::types::Event {
            id,
            name: format!("Event {}", id),
            min_level: 1,
            max_level: 50,
            car_class_hash: class,
            car_restriction: None,
            max_players: 2,
            lobby_countdown_ms: 60_000,
            event_mode_id: CIRCUIT_MODE_ID,
            is_race_again_enabled: true,
            is_ranked_mode: false,
            is_enabled: true,
        }
    }

    #[tokio::test]
    async fn test_auto_create_after_delay_elapsed() {
        let fixture = fixture(instant_settings());
        fixture.reference.add_event(event(42, OPEN_CLASS_HASH));
        add_driver(&fixture, 100, 10, 7);

        fixture.queue.enqueue_instant(100, 7, 10).unwrap();
        fixture.monitor.tick().await.unwrap();

        let lobbies = fixture.manager.lobbies().all();
        assert_eq!(lobbies.len(), 1);
        assert!(lobbies[0].contains(100));
        assert!(!fixture.queue.is_in_instant_queue(100).unwrap());
    }

    #[tokio::test]
    async fn test_no_auto_create_before_delay() {
        let mut settings = AppConfig::default().matchmaking;
        settings.auto_create_delay_seconds = 3600;
        let fixture = fixture(settings);
        fixture.reference.add_event(event(42, OPEN_CLASS_HASH));
        add_driver(&fixture, 100, 10, 7);

        fixture.queue.enqueue_instant(100, 7, 10).unwrap();
        fixture.monitor.tick().await.unwrap();

        assert!(fixture.manager.lobbies().all().is_empty());
        assert!(fixture.queue.is_in_instant_queue(100).unwrap());
    }

    #[tokio::test]
    async fn test_entry_dropped_after_max_wait() {
        let mut settings = instant_settings();
        settings.instant_max_wait_seconds = 0;
        // An entry enqueued one second ago has already overstayed
        let fixture = fixture(settings);
        fixture.reference.add_event(event(42, OPEN_CLASS_HASH));
        add_driver(&fixture, 100, 10, 7);

        fixture.queue.enqueue_instant(100, 7, 10).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        fixture.monitor.tick().await.unwrap();

        assert!(!fixture.queue.is_in_instant_queue(100).unwrap());
        assert!(fixture.manager.lobbies().all().is_empty());
    }

    #[tokio::test]
    async fn test_monitor_places_into_existing_lobby() {
        let mut settings = AppConfig::default().matchmaking;
        settings.auto_create_delay_seconds = 3600;
        let fixture = fixture(settings);
        fixture.reference.add_event(event(42, OPEN_CLASS_HASH));
        add_driver(&fixture, 100, 10, 7);
        add_driver(&fixture, 200, 20, 9);

        let lobby_id = fixture.manager.join_queue_for_event(100, 42).await.unwrap();
        fixture.queue.enqueue_instant(200, 9, 20).unwrap();
        fixture.monitor.tick().await.unwrap();

        assert!(fixture.manager.lobbies().get(lobby_id).unwrap().contains(200));
        assert!(!fixture.queue.is_in_instant_queue(200).unwrap());
    }

    #[tokio::test]
    async fn test_auto_create_skips_incompatible_modes() {
        let fixture = fixture(instant_settings());
        let mut drag = event(99, OPEN_CLASS_HASH);
        drag.event_mode_id = 22;
        fixture.reference.add_event(drag);
        add_driver(&fixture, 100, 10, 7);

        fixture.queue.enqueue_instant(100, 7, 10).unwrap();
        fixture.monitor.tick().await.unwrap();

        // The only event is neither circuit nor sprint; nothing to create
        assert!(fixture.manager.lobbies().all().is_empty());
        assert!(fixture.queue.is_in_instant_queue(100).unwrap());
    }

    #[tokio::test]
    async fn test_ignored_event_never_auto_selected() {
        let fixture = fixture(instant_settings());
        let only_event = event(42, OPEN_CLASS_HASH);
        fixture.reference.add_event(only_event.clone());
        add_driver(&fixture, 100, 10, 7);

        fixture.queue.enqueue_instant(100, 7, 10).unwrap();
        fixture.queue.ignore_event(100, &only_event).await.unwrap();
        fixture.monitor.tick().await.unwrap();

        // Nothing eligible; the persona stays queued
        assert!(fixture.manager.lobbies().all().is_empty());
        assert!(fixture.queue.is_in_instant_queue(100).unwrap());
    }

    #[tokio::test]
    async fn test_unparsable_member_purged() {
        use crate::store::QueueStore;

        let fixture = fixture(instant_settings());
        // Seed garbage directly into the membership set
        fixture
            .store
            .set_add("instant_queue_members", "garbage")
            .unwrap();

        fixture.monitor.tick().await.unwrap();
        assert!(fixture.queue.list_instant().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_reference_data_drops_entry() {
        let fixture = fixture(instant_settings());
        fixture.reference.add_event(event(42, OPEN_CLASS_HASH));

        // No persona or car registered for id 100
        fixture.queue.enqueue_instant(100, 7, 10).unwrap();
        fixture.monitor.tick().await.unwrap();

        assert!(!fixture.queue.is_in_instant_queue(100).unwrap());
        assert!(fixture.manager.lobbies().all().is_empty());
    }
}
