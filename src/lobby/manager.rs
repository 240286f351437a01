//! Lobby manager: creation, admission, and queue placement
//!
//! This module orchestrates lobby lifecycle: direct event joins, instant
//! queue placement into open lobbies, filling fresh lobbies from both
//! queues, invite acceptance and decline, and private lobbies. Every
//! admission runs the shared eligibility checks against a roster held
//! under the lobby store's write lock, so capacity is never oversold.

use std::sync::Arc;

use rand::seq::SliceRandom;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::config::MatchmakingSettings;
use crate::error::{MatchmakingError, Result};
use crate::lobby::countdown::CountdownScheduler;
use crate::lobby::eligibility::check_event_eligibility;
use crate::lobby::instance::LobbyInstance;
use crate::lobby::store::LobbyStore;
use crate::matchmaking::MatchmakingQueue;
use crate::metrics::MetricsCollector;
use crate::notify::Notifier;
use crate::reference::ReferenceDataProvider;
use crate::types::{
    Car, CarClassHash, EntrantJoined, EntrantLeft, Event, EventId, FinalCountdown, LobbyId,
    LobbyInvite, Persona, PersonaId,
};

/// The main lobby manager
pub struct LobbyManager {
    lobbies: LobbyStore,
    queue: Arc<MatchmakingQueue>,
    reference: Arc<dyn ReferenceDataProvider>,
    notifier: Arc<dyn Notifier>,
    scheduler: Arc<CountdownScheduler>,
    settings: MatchmakingSettings,
    metrics: Arc<MetricsCollector>,
}

impl LobbyManager {
    pub fn new(
        lobbies: LobbyStore,
        queue: Arc<MatchmakingQueue>,
        reference: Arc<dyn ReferenceDataProvider>,
        notifier: Arc<dyn Notifier>,
        scheduler: Arc<CountdownScheduler>,
        settings: MatchmakingSettings,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            lobbies,
            queue,
            reference,
            notifier,
            scheduler,
            settings,
            metrics,
        }
    }

    pub fn lobbies(&self) -> &LobbyStore {
        &self.lobbies
    }

    fn persona(&self, persona_id: PersonaId) -> Result<Persona> {
        self.reference
            .find_persona(persona_id)
            .ok_or_else(|| MatchmakingError::UnknownPersona { persona_id }.into())
    }

    fn active_car(&self, persona_id: PersonaId) -> Result<Car> {
        self.reference
            .active_car(persona_id)
            .ok_or_else(|| MatchmakingError::UnknownPersona { persona_id }.into())
    }

    fn event(&self, event_id: EventId) -> Result<Event> {
        self.reference
            .find_event(event_id)
            .ok_or_else(|| MatchmakingError::UnknownEvent { event_id }.into())
    }

    /// Instant matchmaking entry point. Tries to place the persona into
    /// any open lobby they are eligible for; otherwise parks them in
    /// the instant queue and flags them for the monitor's next pass.
    /// Returns the lobby joined, or `None` when queued.
    pub async fn join_instant_queue_or_lobby(
        &self,
        persona_id: PersonaId,
    ) -> Result<Option<LobbyId>> {
        let persona = self.persona(persona_id)?;
        let car = self.active_car(persona_id)?;

        let mut candidates = self.open_lobbies_for(car.car_class_hash, persona.level)?;
        candidates.shuffle(&mut rand::rng());

        for (lobby, event) in candidates {
            if self.queue.is_ignored(persona_id, event.id)? {
                continue;
            }
            match self.try_admit(lobby.id, &persona, &car, &event).await {
                Ok(_) => {
                    self.queue.dequeue(persona_id)?;
                    self.queue.dequeue_instant(persona_id)?;
                    self.send_invite(persona_id, lobby.id, event.id).await;
                    info!(persona_id, lobby_id = %lobby.id, "Placed into open lobby");
                    return Ok(Some(lobby.id));
                }
                Err(e) => {
                    debug!(persona_id, lobby_id = %lobby.id, error = %e, "Open lobby not admissible");
                }
            }
        }

        self.queue
            .enqueue_instant(persona_id, car.car_class_hash, persona.level)?;
        self.queue.mark_immediate_scan(persona_id)?;
        self.metrics.queue().instant_joins_total.inc();
        info!(persona_id, "No open lobby, persona parked in instant queue");
        Ok(None)
    }

    /// Open (non-private, non-launched, non-full) lobbies whose event a
    /// persona of the given level and class could enter, paired with
    /// their event definitions. Per-lobby class locks are checked at
    /// admission, not here.
    pub(crate) fn open_lobbies_for(
        &self,
        car_class_hash: CarClassHash,
        level: i32,
    ) -> Result<Vec<(LobbyInstance, Event)>> {
        let mut candidates = Vec::new();
        for lobby in self.lobbies.all() {
            if lobby.is_private || lobby.launched || lobby.is_full() {
                continue;
            }
            let event = match self.reference.find_event(lobby.event_id) {
                Some(event) if event.is_enabled => event,
                _ => continue,
            };
            if !event.level_in_range(level) || !event.accepts_class(car_class_hash) {
                continue;
            }
            candidates.push((lobby, event));
        }
        Ok(candidates)
    }

    /// Direct join against a specific event: enters an existing forming
    /// lobby for that event, or creates one. Eligibility failures are
    /// returned to the caller eagerly.
    pub async fn join_queue_for_event(
        &self,
        persona_id: PersonaId,
        event_id: EventId,
    ) -> Result<LobbyId> {
        let persona = self.persona(persona_id)?;
        let car = self.active_car(persona_id)?;
        let event = self.event(event_id)?;

        check_event_eligibility(&persona, &car, &event, None)?;
        self.metrics.queue().traditional_joins_total.inc();

        let mut forming: Vec<LobbyInstance> = self
            .lobbies
            .all()
            .into_iter()
            .filter(|lobby| {
                lobby.event_id == event_id
                    && !lobby.is_private
                    && !lobby.launched
                    && !lobby.is_full()
            })
            .collect();
        forming.sort_by_key(|lobby| lobby.started_time);

        if forming.is_empty() {
            return self.create_lobby(&persona, &car, &event, false, "join").await;
        }

        let mut last_error: Option<anyhow::Error> = None;
        for lobby in forming {
            match self.try_admit(lobby.id, &persona, &car, &event).await {
                Ok(_) => {
                    self.queue.dequeue(persona_id)?;
                    self.queue.dequeue_instant(persona_id)?;
                    self.send_invite(persona_id, lobby.id, event.id).await;
                    return Ok(lobby.id);
                }
                Err(e) => last_error = Some(e),
            }
        }
        // Lobbies exist for this event but none would take the persona
        Err(last_error.unwrap_or_else(|| {
            MatchmakingError::InternalError {
                message: "No admissible lobby".to_string(),
            }
            .into()
        }))
    }

    /// Create a lobby for the event with the persona as creator. Public
    /// lobbies are immediately topped up from both queues, then (unless
    /// the event is ranked) a countdown is scheduled.
    pub async fn create_lobby(
        &self,
        creator: &Persona,
        car: &Car,
        event: &Event,
        is_private: bool,
        origin: &str,
    ) -> Result<LobbyId> {
        let locked_car_class_hash = if self.settings.lock_lobby_to_creator_class
            && event.event_mode_id != self.settings.class_unlocked_mode_id
        {
            Some(car.car_class_hash)
        } else {
            None
        };

        check_event_eligibility(creator, car, event, locked_car_class_hash)?;

        let mut lobby = LobbyInstance::new(
            event.id,
            creator.id,
            is_private,
            locked_car_class_hash,
            event.max_players,
        );
        lobby.add_entrant(creator.id, creator.level)?;
        let lobby_id = lobby.id;
        self.lobbies.insert(lobby);

        self.queue.dequeue(creator.id)?;
        self.queue.dequeue_instant(creator.id)?;
        self.send_invite(creator.id, lobby_id, event.id).await;

        if !is_private {
            // Fill is opportunistic: a store failure here leaves the
            // lobby with whoever made it in, it never fails the create
            if let Err(e) = self.fill_from_queues(lobby_id, event).await {
                warn!(lobby_id = %lobby_id, error = %e, "Queue fill aborted");
            }
        }

        if !event.is_ranked_mode {
            self.scheduler
                .schedule(lobby_id, Duration::from_millis(event.lobby_countdown_ms));
        }

        self.metrics
            .lobby()
            .lobbies_created_total
            .with_label_values(&[origin])
            .inc();
        self.metrics
            .lobby()
            .active_lobbies
            .set(self.lobbies.active_count() as i64);
        info!(
            lobby_id = %lobby_id,
            event_id = event.id,
            creator = creator.id,
            is_private,
            origin,
            "Lobby created"
        );
        Ok(lobby_id)
    }

    /// Top up a fresh public lobby from the traditional queue first,
    /// then the instant queue. Candidates failing any check are skipped
    /// without dequeueing them.
    async fn fill_from_queues(&self, lobby_id: LobbyId, event: &Event) -> Result<()> {
        for (persona_id, _car_class_hash) in self.queue.traditional_entries()? {
            if self
                .lobbies
                .get(lobby_id)
                .map(|lobby| lobby.is_full())
                .unwrap_or(true)
            {
                break;
            }
            if self.queue.is_ignored(persona_id, event.id)? {
                continue;
            }
            if self.admit_queued(lobby_id, persona_id, event).await? {
                self.queue.dequeue(persona_id)?;
                self.queue.dequeue_instant(persona_id)?;
            }
        }

        for member in self.queue.list_instant()? {
            if self
                .lobbies
                .get(lobby_id)
                .map(|lobby| lobby.is_full())
                .unwrap_or(true)
            {
                break;
            }
            let persona_id = match member.parse::<PersonaId>() {
                Ok(persona_id) => persona_id,
                Err(_) => {
                    warn!(member, "Purging unparsable instant queue member");
                    self.queue.purge_instant_member(&member)?;
                    continue;
                }
            };
            let entry = match self.queue.instant_entry(persona_id)? {
                Some(entry) => entry,
                None => {
                    self.queue.dequeue_instant(persona_id)?;
                    continue;
                }
            };
            if !event.level_in_range(entry.level)
                || !event.accepts_class(entry.car_class_hash)
                || self.queue.is_ignored(persona_id, event.id)?
            {
                continue;
            }
            if self.admit_queued(lobby_id, persona_id, event).await? {
                self.queue.dequeue_instant(persona_id)?;
            }
        }
        Ok(())
    }

    /// Admit one queued persona, treating their failures as skips
    async fn admit_queued(
        &self,
        lobby_id: LobbyId,
        persona_id: PersonaId,
        event: &Event,
    ) -> Result<bool> {
        let (persona, car) = match (
            self.reference.find_persona(persona_id),
            self.reference.active_car(persona_id),
        ) {
            (Some(persona), Some(car)) => (persona, car),
            _ => {
                debug!(persona_id, "Queued persona missing reference data, skipping");
                return Ok(false);
            }
        };
        match self.try_admit(lobby_id, &persona, &car, event).await {
            Ok(_) => {
                self.send_invite(persona_id, lobby_id, event.id).await;
                Ok(true)
            }
            Err(e) => {
                debug!(persona_id, lobby_id = %lobby_id, error = %e, "Queued persona not admitted");
                Ok(false)
            }
        }
    }

    /// Admit a persona under the lobby write lock: eligibility (with
    /// the lobby's class lock) and capacity are decided atomically with
    /// the roster insert. Notifies existing entrants on success.
    pub(crate) async fn try_admit(
        &self,
        lobby_id: LobbyId,
        persona: &Persona,
        car: &Car,
        event: &Event,
    ) -> Result<usize> {
        let (grid_index, others) = self.lobbies.with_mut(lobby_id, |lobby| {
            if lobby.launched {
                return Err(MatchmakingError::CountdownTooShort { remaining_ms: 0 }.into());
            }
            check_event_eligibility(persona, car, event, lobby.locked_car_class_hash)?;
            let grid_index = lobby.add_entrant(persona.id, persona.level)?;
            Ok((grid_index, lobby.other_entrants(persona.id)))
        })?;

        self.metrics.lobby().entrants_admitted_total.inc();
        for other in others {
            let notice = EntrantJoined {
                lobby_id,
                persona_id: persona.id,
            };
            if let Err(e) = self.notifier.send_join_notice(other, notice).await {
                warn!(persona_id = other, error = %e, "Failed to deliver join notice");
            }
        }
        Ok(grid_index)
    }

    /// Accept a pending invite. Rejected when the lobby is full, has
    /// launched, or (for non-ranked events) its countdown no longer
    /// leaves enough time to admit anyone. Acceptance counts as fresh
    /// matchmaking activity: both queues and the ignore set are cleared.
    pub async fn accept_invite(&self, persona_id: PersonaId, lobby_id: LobbyId) -> Result<usize> {
        let persona = self.persona(persona_id)?;
        let car = self.active_car(persona_id)?;
        let snapshot = self
            .lobbies
            .get(lobby_id)
            .ok_or(MatchmakingError::UnknownLobby {
                lobby_id: lobby_id.to_string(),
            })?;
        let event = self.event(snapshot.event_id)?;

        if snapshot.contains(persona_id) {
            // Re-accept keeps the original grid slot
            return self.try_admit(lobby_id, &persona, &car, &event).await;
        }

        if !event.is_ranked_mode {
            let remaining_ms = self.scheduler.remaining_ms(lobby_id).unwrap_or(0);
            if remaining_ms <= self.settings.min_countdown_remaining_ms {
                self.metrics
                    .lobby()
                    .admissions_rejected_total
                    .with_label_values(&["countdown"])
                    .inc();
                return Err(MatchmakingError::CountdownTooShort { remaining_ms }.into());
            }
        }

        let grid_index = match self.try_admit(lobby_id, &persona, &car, &event).await {
            Ok(grid_index) => grid_index,
            Err(e) => {
                if let Some(err) = e.downcast_ref::<MatchmakingError>() {
                    if err.is_capacity() {
                        self.metrics
                            .lobby()
                            .admissions_rejected_total
                            .with_label_values(&["full"])
                            .inc();
                    }
                }
                return Err(e);
            }
        };

        self.queue.dequeue(persona_id)?;
        self.queue.dequeue_instant(persona_id)?;
        self.queue.reset_ignored(persona_id)?;

        let now_full = self
            .lobbies
            .get(lobby_id)
            .map(|lobby| lobby.is_full())
            .unwrap_or(false);
        if now_full {
            self.begin_final_countdown(lobby_id).await;
        }

        info!(persona_id, lobby_id = %lobby_id, grid_index, "Invite accepted");
        Ok(grid_index)
    }

    /// Broadcast the shortened countdown to every entrant and reschedule
    /// the launch. Runs once, on the accept that fills the lobby.
    async fn begin_final_countdown(&self, lobby_id: LobbyId) {
        let duration_ms = self.settings.final_countdown_ms;
        self.scheduler
            .schedule(lobby_id, Duration::from_millis(duration_ms));
        if let Some(lobby) = self.lobbies.get(lobby_id) {
            for entrant in &lobby.entrants {
                let notice = FinalCountdown {
                    lobby_id,
                    duration_ms,
                };
                if let Err(e) = self
                    .notifier
                    .send_final_countdown(entrant.persona_id, notice)
                    .await
                {
                    warn!(persona_id = entrant.persona_id, error = %e, "Failed to deliver final countdown");
                }
            }
        }
        info!(lobby_id = %lobby_id, duration_ms, "Lobby full, final countdown started");
    }

    /// Decline a pending invite: the event joins the persona's ignore
    /// set so it is never re-offered until their next fresh activity.
    /// A lobby that already launched or vanished declines quietly.
    pub async fn decline_invite(&self, persona_id: PersonaId, lobby_id: LobbyId) -> Result<()> {
        let lobby = match self.lobbies.get(lobby_id) {
            Some(lobby) => lobby,
            None => {
                debug!(persona_id, lobby_id = %lobby_id, "Declined invite for unknown lobby");
                return Ok(());
            }
        };

        if let Some(event) = self.reference.find_event(lobby.event_id) {
            self.queue.ignore_event(persona_id, &event).await?;
        }

        if lobby.contains(persona_id) {
            self.remove_entrant(persona_id, lobby_id).await?;
        }
        Ok(())
    }

    /// Remove an entrant from a lobby and tell the remaining entrants.
    /// The persona's queue state is untouched.
    pub async fn remove_entrant(&self, persona_id: PersonaId, lobby_id: LobbyId) -> Result<()> {
        let removed = self
            .lobbies
            .with_mut(lobby_id, |lobby| Ok(lobby.remove_entrant(persona_id)))?;
        if !removed {
            return Ok(());
        }

        if let Some(lobby) = self.lobbies.get(lobby_id) {
            for entrant in &lobby.entrants {
                let notice = EntrantLeft {
                    lobby_id,
                    persona_id,
                };
                if let Err(e) = self
                    .notifier
                    .send_leave_notice(entrant.persona_id, notice)
                    .await
                {
                    warn!(persona_id = entrant.persona_id, error = %e, "Failed to deliver leave notice");
                }
            }
        }
        info!(persona_id, lobby_id = %lobby_id, "Entrant left lobby");
        Ok(())
    }

    /// Create a private lobby and invite a hand-picked set of personas.
    /// Invitees failing eligibility are skipped, not errors; they just
    /// never receive the invite.
    pub async fn create_private_lobby(
        &self,
        creator_persona_id: PersonaId,
        event_id: EventId,
        invitees: &[PersonaId],
    ) -> Result<LobbyId> {
        let creator = self.persona(creator_persona_id)?;
        let car = self.active_car(creator_persona_id)?;
        let event = self.event(event_id)?;

        let lobby_id = self
            .create_lobby(&creator, &car, &event, true, "private")
            .await?;
        let locked = self
            .lobbies
            .get(lobby_id)
            .and_then(|lobby| lobby.locked_car_class_hash);

        for &invitee in invitees {
            if invitee == creator_persona_id {
                continue;
            }
            let (persona, invitee_car) = match (
                self.reference.find_persona(invitee),
                self.reference.active_car(invitee),
            ) {
                (Some(persona), Some(invitee_car)) => (persona, invitee_car),
                _ => {
                    debug!(persona_id = invitee, "Invitee missing reference data, skipping");
                    continue;
                }
            };
            if let Err(e) = check_event_eligibility(&persona, &invitee_car, &event, locked) {
                debug!(persona_id = invitee, error = %e, "Invitee not eligible, skipping");
                continue;
            }
            self.send_invite(invitee, lobby_id, event_id).await;
        }
        Ok(lobby_id)
    }

    async fn send_invite(&self, persona_id: PersonaId, lobby_id: LobbyId, event_id: EventId) {
        let invite = LobbyInvite {
            lobby_id,
            event_id,
            countdown_ms: self.settings.invite_countdown_ms,
        };
        if let Err(e) = self.notifier.send_lobby_invite(persona_id, invite).await {
            warn!(persona_id, error = %e, "Failed to deliver lobby invite");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::lobby::countdown::testing::MockLauncher;
    use crate::notify::MockNotifier;
    use crate::reference::StaticReferenceProvider;
    use crate::store::InMemoryQueueStore;
    use crate::types::{CIRCUIT_MODE_ID, OPEN_CLASS_HASH};

    struct Fixture {
        manager: LobbyManager,
        queue: Arc<MatchmakingQueue>,
        reference: Arc<StaticReferenceProvider>,
        notifier: Arc<MockNotifier>,
    }

    fn fixture() -> Fixture {
        fixture_with(AppConfig::default().matchmaking)
    }

    fn fixture_with(settings: MatchmakingSettings) -> Fixture {
        let notifier = Arc::new(MockNotifier::new());
        let store = Arc::new(InMemoryQueueStore::new());
        let queue = Arc::new(MatchmakingQueue::new(store, notifier.clone()));
        let reference = Arc::new(StaticReferenceProvider::new());
        let scheduler = Arc::new(CountdownScheduler::new(Arc::new(MockLauncher::default())));
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let manager = LobbyManager::new(
            LobbyStore::new(),
            queue.clone(),
            reference.clone(),
            notifier.clone(),
            scheduler,
            settings,
            metrics,
        );
        Fixture {
            manager,
            queue,
            reference,
            notifier,
        }
    }

    fn add_driver(fixture: &Fixture, persona_id: PersonaId, level: i32, class: CarClassHash) {
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

    fn event(id: EventId, class: CarClassHash) -> Event {
        Event {
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
    async fn test_direct_join_creates_then_reuses_lobby() {
        let fixture = fixture();
        fixture.reference.add_event(event(42, OPEN_CLASS_HASH));
        add_driver(&fixture, 100, 10, 7);
        add_driver(&fixture, 200, 20, 9);

        let lobby_id = fixture.manager.join_queue_for_event(100, 42).await.unwrap();
        let joined = fixture.manager.join_queue_for_event(200, 42).await.unwrap();
        assert_eq!(lobby_id, joined);

        let lobby = fixture.manager.lobbies().get(lobby_id).unwrap();
        assert_eq!(lobby.entrants.len(), 2);
        assert_eq!(lobby.entrants[0].grid_index, 0);
        assert_eq!(lobby.entrants[1].grid_index, 1);
    }

    #[tokio::test]
    async fn test_direct_join_rejects_ineligible_level() {
        let fixture = fixture();
        let mut restricted = event(42, OPEN_CLASS_HASH);
        restricted.min_level = 20;
        fixture.reference.add_event(restricted);
        add_driver(&fixture, 100, 10, 7);

        let err = fixture
            .manager
            .join_queue_for_event(100, 42)
            .await
            .unwrap_err();
        let err = err.downcast::<MatchmakingError>().unwrap();
        assert!(matches!(err, MatchmakingError::LevelOutOfRange { .. }));
        assert!(fixture.manager.lobbies().all().is_empty());
    }

    #[tokio::test]
    async fn test_instant_join_queues_when_no_lobby_matches() {
        let fixture = fixture();
        add_driver(&fixture, 100, 10, 7);

        let placed = fixture
            .manager
            .join_instant_queue_or_lobby(100)
            .await
            .unwrap();
        assert_eq!(placed, None);
        assert!(fixture.queue.is_in_instant_queue(100).unwrap());
        // Flagged for the monitor's next pass
        assert_eq!(fixture.queue.drain_immediate_scan().unwrap(), vec!["100"]);
    }

    #[tokio::test]
    async fn test_instant_join_places_into_open_lobby() {
        let fixture = fixture();
        fixture.reference.add_event(event(42, OPEN_CLASS_HASH));
        add_driver(&fixture, 100, 10, 7);
        add_driver(&fixture, 200, 20, 9);

        let lobby_id = fixture.manager.join_queue_for_event(100, 42).await.unwrap();
        let placed = fixture
            .manager
            .join_instant_queue_or_lobby(200)
            .await
            .unwrap();
        assert_eq!(placed, Some(lobby_id));
        assert!(!fixture.queue.is_in_instant_queue(200).unwrap());
    }

    #[tokio::test]
    async fn test_instant_join_skips_ignored_events() {
        let fixture = fixture();
        let ignored_event = event(42, OPEN_CLASS_HASH);
        fixture.reference.add_event(ignored_event.clone());
        add_driver(&fixture, 100, 10, 7);
        add_driver(&fixture, 200, 20, 9);

        fixture.manager.join_queue_for_event(100, 42).await.unwrap();
        fixture
            .queue
            .ignore_event(200, &ignored_event)
            .await
            .unwrap();

        let placed = fixture
            .manager
            .join_instant_queue_or_lobby(200)
            .await
            .unwrap();
        assert_eq!(placed, None);
        assert!(fixture.queue.is_in_instant_queue(200).unwrap());
    }

    #[tokio::test]
    async fn test_create_lobby_fills_from_traditional_queue() {
        let fixture = fixture();
        fixture.reference.add_event(event(42, OPEN_CLASS_HASH));
        add_driver(&fixture, 100, 10, 7);
        add_driver(&fixture, 200, 20, 9);

        fixture.queue.enqueue(200, 9).unwrap();
        let lobby_id = fixture.manager.join_queue_for_event(100, 42).await.unwrap();

        let lobby = fixture.manager.lobbies().get(lobby_id).unwrap();
        assert!(lobby.contains(200));
        assert!(!fixture.queue.is_queued(200).unwrap());
        assert_eq!(fixture.notifier.invites_for(200).len(), 1);
    }

    #[tokio::test]
    async fn test_create_lobby_fills_from_instant_queue() {
        let fixture = fixture();
        fixture.reference.add_event(event(42, OPEN_CLASS_HASH));
        add_driver(&fixture, 100, 10, 7);
        add_driver(&fixture, 200, 20, 9);

        fixture.queue.enqueue_instant(200, 9, 20).unwrap();
        let lobby_id = fixture.manager.join_queue_for_event(100, 42).await.unwrap();

        let lobby = fixture.manager.lobbies().get(lobby_id).unwrap();
        assert!(lobby.contains(200));
        assert!(!fixture.queue.is_in_instant_queue(200).unwrap());
    }

    #[tokio::test]
    async fn test_queue_fill_skips_ignoring_personas() {
        let fixture = fixture();
        let the_event = event(42, OPEN_CLASS_HASH);
        fixture.reference.add_event(the_event.clone());
        add_driver(&fixture, 100, 10, 7);
        add_driver(&fixture, 200, 20, 9);

        fixture.queue.enqueue(200, 9).unwrap();
        fixture.queue.ignore_event(200, &the_event).await.unwrap();

        let lobby_id = fixture.manager.join_queue_for_event(100, 42).await.unwrap();
        let lobby = fixture.manager.lobbies().get(lobby_id).unwrap();
        assert!(!lobby.contains(200));
        // Still queued for other events
        assert!(fixture.queue.is_queued(200).unwrap());
    }

    #[tokio::test]
    async fn test_accept_invite_full_lobby_rejected() {
        let fixture = fixture();
        fixture.reference.add_event(event(42, OPEN_CLASS_HASH));
        add_driver(&fixture, 100, 10, 7);
        add_driver(&fixture, 200, 20, 9);
        add_driver(&fixture, 300, 30, 8);

        let lobby_id = fixture.manager.join_queue_for_event(100, 42).await.unwrap();
        fixture.manager.accept_invite(200, lobby_id).await.unwrap();

        let err = fixture
            .manager
            .accept_invite(300, lobby_id)
            .await
            .unwrap_err();
        let err = err.downcast::<MatchmakingError>().unwrap();
        assert!(matches!(err, MatchmakingError::LobbyFull { .. }));
    }

    #[tokio::test]
    async fn test_accept_invite_countdown_floor() {
        // No countdown scheduled at all reads as zero remaining
        let mut settings = AppConfig::default().matchmaking;
        settings.min_countdown_remaining_ms = 6000;
        let fixture = fixture_with(settings);
        let mut ranked_off = event(42, OPEN_CLASS_HASH);
        ranked_off.max_players = 3;
        fixture.reference.add_event(ranked_off);
        add_driver(&fixture, 100, 10, 7);
        add_driver(&fixture, 200, 20, 9);

        let lobby_id = fixture.manager.join_queue_for_event(100, 42).await.unwrap();
        // Countdown was scheduled for 60s, plenty remaining
        fixture.manager.accept_invite(200, lobby_id).await.unwrap();

        // Cancel to simulate an expiring countdown
        add_driver(&fixture, 300, 30, 8);
        fixture.manager.scheduler.cancel(lobby_id);
        let err = fixture
            .manager
            .accept_invite(300, lobby_id)
            .await
            .unwrap_err();
        let err = err.downcast::<MatchmakingError>().unwrap();
        assert!(matches!(err, MatchmakingError::CountdownTooShort { .. }));
    }

    #[tokio::test]
    async fn test_accept_invite_clears_queues_and_ignores() {
        let fixture = fixture();
        let other_event = event(43, OPEN_CLASS_HASH);
        fixture.reference.add_event(event(42, OPEN_CLASS_HASH));
        fixture.reference.add_event(other_event.clone());
        add_driver(&fixture, 100, 10, 7);
        add_driver(&fixture, 200, 20, 9);

        let lobby_id = fixture.manager.join_queue_for_event(100, 42).await.unwrap();
        fixture.queue.enqueue(200, 9).unwrap();
        fixture.queue.enqueue_instant(200, 9, 20).unwrap();
        fixture.queue.ignore_event(200, &other_event).await.unwrap();

        fixture.manager.accept_invite(200, lobby_id).await.unwrap();

        assert!(!fixture.queue.is_queued(200).unwrap());
        assert!(!fixture.queue.is_in_instant_queue(200).unwrap());
        // Fresh activity resets the ignore set
        assert!(!fixture.queue.is_ignored(200, 43).unwrap());
    }

    #[tokio::test]
    async fn test_fill_broadcasts_final_countdown() {
        let fixture = fixture();
        fixture.reference.add_event(event(42, OPEN_CLASS_HASH));
        add_driver(&fixture, 100, 10, 7);
        add_driver(&fixture, 200, 20, 9);

        let lobby_id = fixture.manager.join_queue_for_event(100, 42).await.unwrap();
        fixture.manager.accept_invite(200, lobby_id).await.unwrap();

        assert_eq!(fixture.notifier.countdowns_for(100).len(), 1);
        assert_eq!(fixture.notifier.countdowns_for(200).len(), 1);
    }

    #[tokio::test]
    async fn test_decline_adds_ignore_and_removes_entrant() {
        let fixture = fixture();
        fixture.reference.add_event(event(42, OPEN_CLASS_HASH));
        add_driver(&fixture, 100, 10, 7);
        add_driver(&fixture, 200, 20, 9);

        let lobby_id = fixture.manager.join_queue_for_event(100, 42).await.unwrap();
        fixture.manager.accept_invite(200, lobby_id).await.unwrap();
        fixture.manager.decline_invite(200, lobby_id).await.unwrap();

        assert!(fixture.queue.is_ignored(200, 42).unwrap());
        let lobby = fixture.manager.lobbies().get(lobby_id).unwrap();
        assert!(!lobby.contains(200));
    }

    #[tokio::test]
    async fn test_decline_without_membership_still_ignores() {
        let fixture = fixture();
        fixture.reference.add_event(event(42, OPEN_CLASS_HASH));
        add_driver(&fixture, 100, 10, 7);

        let lobby_id = fixture.manager.join_queue_for_event(100, 42).await.unwrap();
        fixture.manager.decline_invite(999, lobby_id).await.unwrap();
        assert!(fixture.queue.is_ignored(999, 42).unwrap());
    }

    #[tokio::test]
    async fn test_class_lock_applied_to_later_entrants() {
        let mut settings = AppConfig::default().matchmaking;
        settings.lock_lobby_to_creator_class = true;
        let fixture = fixture_with(settings);
        fixture.reference.add_event(event(42, OPEN_CLASS_HASH));
        add_driver(&fixture, 100, 10, 7);
        add_driver(&fixture, 200, 20, 9);

        let lobby_id = fixture.manager.join_queue_for_event(100, 42).await.unwrap();
        assert_eq!(
            fixture.manager.lobbies().get(lobby_id).unwrap().locked_car_class_hash,
            Some(7)
        );

        let err = fixture
            .manager
            .accept_invite(200, lobby_id)
            .await
            .unwrap_err();
        let err = err.downcast::<MatchmakingError>().unwrap();
        assert!(matches!(
            err,
            MatchmakingError::ClassLockMismatch { locked: 7, actual: 9 }
        ));
    }

    #[tokio::test]
    async fn test_private_lobby_invites_eligible_only() {
        let fixture = fixture();
        let mut restricted = event(42, 7);
        restricted.max_players = 4;
        fixture.reference.add_event(restricted);
        add_driver(&fixture, 100, 10, 7);
        add_driver(&fixture, 200, 20, 7);
        add_driver(&fixture, 300, 30, 9); // wrong class

        let lobby_id = fixture
            .manager
            .create_private_lobby(100, 42, &[200, 300])
            .await
            .unwrap();

        assert!(fixture.manager.lobbies().get(lobby_id).unwrap().is_private);
        assert_eq!(fixture.notifier.invites_for(200).len(), 1);
        assert!(fixture.notifier.invites_for(300).is_empty());
    }

    #[tokio::test]
    async fn test_private_lobby_ignores_queue_traffic() {
        let fixture = fixture();
        fixture.reference.add_event(event(42, OPEN_CLASS_HASH));
        add_driver(&fixture, 100, 10, 7);
        add_driver(&fixture, 200, 20, 9);

        fixture.queue.enqueue(200, 9).unwrap();
        let lobby_id = fixture
            .manager
            .create_private_lobby(100, 42, &[])
            .await
            .unwrap();

        let lobby = fixture.manager.lobbies().get(lobby_id).unwrap();
        assert!(!lobby.contains(200));
        assert!(fixture.queue.is_queued(200).unwrap());

        // Instant matchmaking never lands in private lobbies
        let placed = fixture
            .manager
            .join_instant_queue_or_lobby(200)
            .await
            .unwrap();
        assert_eq!(placed, None);
    }
}
