//! Race Again: atomic create-or-join of a successor lobby
//!
//! After a race ends, every entrant can ask to race again. Exactly one
//! caller creates the successor lobby; everyone else gets the same
//! lobby/event pair back. The session row's async mutex serializes
//! callers: the first holds it across lobby creation and writes both
//! successor pointers before releasing, so later callers re-read the
//! pointers under the same lock and never race.

use std::sync::Arc;

use rand::seq::IndexedRandom;
use tracing::{info, warn};

use crate::error::{MatchmakingError, Result};
use crate::lobby::eligibility::car_satisfies_restriction;
use crate::lobby::manager::LobbyManager;
use crate::metrics::MetricsCollector;
use crate::reference::ReferenceDataProvider;
use crate::session::registry::SessionRegistry;
use crate::types::{Event, EventId, LobbyId, PersonaId, SessionId};

/// Coordinates successor-lobby creation across concurrent callers
pub struct RaceAgainCoordinator {
    registry: Arc<SessionRegistry>,
    manager: Arc<LobbyManager>,
    reference: Arc<dyn ReferenceDataProvider>,
    metrics: Arc<MetricsCollector>,
}

impl RaceAgainCoordinator {
    pub fn new(
        registry: Arc<SessionRegistry>,
        manager: Arc<LobbyManager>,
        reference: Arc<dyn ReferenceDataProvider>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            registry,
            manager,
            reference,
            metrics,
        }
    }

    /// Return the session's successor lobby and event, creating them if
    /// this is the first caller. On any failure nothing is written, so
    /// the next caller retries from a clean slate.
    pub async fn get_or_create_successor(
        &self,
        session_id: SessionId,
        persona_id: PersonaId,
    ) -> Result<(LobbyId, EventId)> {
        let row = self.registry.row(session_id).await?;
        let mut session = row.lock().await;

        if let (Some(lobby_id), Some(event_id)) = (session.next_lobby_id, session.next_event_id) {
            self.metrics
                .session()
                .race_again_total
                .with_label_values(&["reused"])
                .inc();
            info!(session_id = %session_id, persona_id, lobby_id = %lobby_id, "Returning existing successor");
            return Ok((lobby_id, event_id));
        }

        let persona = self
            .reference
            .find_persona(persona_id)
            .ok_or(MatchmakingError::UnknownPersona { persona_id })?;
        let car = self
            .reference
            .active_car(persona_id)
            .ok_or(MatchmakingError::UnknownPersona { persona_id })?;
        let previous_event = self
            .reference
            .find_event(session.event_id)
            .ok_or(MatchmakingError::UnknownEvent {
                event_id: session.event_id,
            })?;

        let candidates: Vec<Event> = self
            .reference
            .events_for_race_again(
                persona.level,
                car.car_class_hash,
                previous_event.event_mode_id,
            )
            .into_iter()
            .filter(|event| match &event.car_restriction {
                Some(restriction) => car_satisfies_restriction(&car.name, restriction),
                None => true,
            })
            .collect();

        let event = match candidates.choose(&mut rand::rng()) {
            Some(event) => event.clone(),
            None => {
                self.metrics
                    .session()
                    .race_again_total
                    .with_label_values(&["no_event"])
                    .inc();
                return Err(MatchmakingError::NoEligibleEvent {
                    previous_mode_id: previous_event.event_mode_id,
                }
                .into());
            }
        };

        // Create while holding the row lock; a failure here propagates
        // with both pointers still unset
        let lobby_id = match self
            .manager
            .create_lobby(&persona, &car, &event, false, "race_again")
            .await
        {
            Ok(lobby_id) => lobby_id,
            Err(e) => {
                self.metrics
                    .session()
                    .race_again_total
                    .with_label_values(&["error"])
                    .inc();
                return Err(e);
            }
        };

        session.next_lobby_id = Some(lobby_id);
        session.next_event_id = Some(event.id);
        drop(session);

        self.metrics
            .session()
            .race_again_total
            .with_label_values(&["created"])
            .inc();
        info!(session_id = %session_id, persona_id, lobby_id = %lobby_id, event_id = event.id, "Successor lobby created");

        // Verification read, best effort only
        match self.registry.get(session_id).await {
            Some(reread)
                if reread.next_lobby_id == Some(lobby_id)
                    && reread.next_event_id == Some(event.id) => {}
            _ => {
                warn!(session_id = %session_id, "Successor pointers did not read back as written");
            }
        }

        Ok((lobby_id, event.id))
    }
}
