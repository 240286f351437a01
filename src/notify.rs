//! Notification delivery traits and implementations
//!
//! The engine reports lobby invites, join/leave notices, final
//! countdowns, and ignore confirmations through this seam. Production
//! deployments plug in their transport; tests and single-node runs use
//! the recording and logging implementations here.

use async_trait::async_trait;
use std::sync::Mutex;
use tracing::info;

use crate::error::Result;
use crate::types::{
    EntrantJoined, EntrantLeft, EventIgnored, FinalCountdown, LobbyInvite, PersonaId,
};

/// Trait for pushing matchmaking notices to personas
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Invite a persona into a lobby slot
    async fn send_lobby_invite(&self, persona_id: PersonaId, invite: LobbyInvite) -> Result<()>;

    /// Tell an existing entrant that someone joined their lobby
    async fn send_join_notice(&self, persona_id: PersonaId, notice: EntrantJoined) -> Result<()>;

    /// Tell a remaining entrant that someone left their lobby
    async fn send_leave_notice(&self, persona_id: PersonaId, notice: EntrantLeft) -> Result<()>;

    /// Announce the shortened countdown when a lobby fills
    async fn send_final_countdown(
        &self,
        persona_id: PersonaId,
        notice: FinalCountdown,
    ) -> Result<()>;

    /// Confirm that an event was added to the persona's ignore set
    async fn send_event_ignored(&self, persona_id: PersonaId, notice: EventIgnored) -> Result<()>;
}

/// Notices recorded by [`MockNotifier`]
#[derive(Debug, Clone)]
pub enum RecordedNotice {
    Invite(PersonaId, LobbyInvite),
    Joined(PersonaId, EntrantJoined),
    Left(PersonaId, EntrantLeft),
    Countdown(PersonaId, FinalCountdown),
    Ignored(PersonaId, EventIgnored),
}

/// Recording notifier for tests
#[derive(Default)]
pub struct MockNotifier {
    notices: Mutex<Vec<RecordedNotice>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<RecordedNotice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn invites_for(&self, persona_id: PersonaId) -> Vec<LobbyInvite> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .filter_map(|notice| match notice {
                RecordedNotice::Invite(target, invite) if *target == persona_id => {
                    Some(invite.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub fn countdowns_for(&self, persona_id: PersonaId) -> Vec<FinalCountdown> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .filter_map(|notice| match notice {
                RecordedNotice::Countdown(target, countdown) if *target == persona_id => {
                    Some(countdown.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.notices.lock().unwrap().clear();
    }

    fn record(&self, notice: RecordedNotice) {
        self.notices.lock().unwrap().push(notice);
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send_lobby_invite(&self, persona_id: PersonaId, invite: LobbyInvite) -> Result<()> {
        self.record(RecordedNotice::Invite(persona_id, invite));
        Ok(())
    }

    async fn send_join_notice(&self, persona_id: PersonaId, notice: EntrantJoined) -> Result<()> {
        self.record(RecordedNotice::Joined(persona_id, notice));
        Ok(())
    }

    async fn send_leave_notice(&self, persona_id: PersonaId, notice: EntrantLeft) -> Result<()> {
        self.record(RecordedNotice::Left(persona_id, notice));
        Ok(())
    }

    async fn send_final_countdown(
        &self,
        persona_id: PersonaId,
        notice: FinalCountdown,
    ) -> Result<()> {
        self.record(RecordedNotice::Countdown(persona_id, notice));
        Ok(())
    }

    async fn send_event_ignored(&self, persona_id: PersonaId, notice: EventIgnored) -> Result<()> {
        self.record(RecordedNotice::Ignored(persona_id, notice));
        Ok(())
    }
}

/// Notifier that writes notices to the structured log, the default for
/// deployments without a push transport configured
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_lobby_invite(&self, persona_id: PersonaId, invite: LobbyInvite) -> Result<()> {
        info!(
            persona_id,
            lobby_id = %invite.lobby_id,
            event_id = invite.event_id,
            countdown_ms = invite.countdown_ms,
            "Lobby invite"
        );
        Ok(())
    }

    async fn send_join_notice(&self, persona_id: PersonaId, notice: EntrantJoined) -> Result<()> {
        info!(
            persona_id,
            lobby_id = %notice.lobby_id,
            joined = notice.persona_id,
            "Entrant joined"
        );
        Ok(())
    }

    async fn send_leave_notice(&self, persona_id: PersonaId, notice: EntrantLeft) -> Result<()> {
        info!(
            persona_id,
            lobby_id = %notice.lobby_id,
            left = notice.persona_id,
            "Entrant left"
        );
        Ok(())
    }

    async fn send_final_countdown(
        &self,
        persona_id: PersonaId,
        notice: FinalCountdown,
    ) -> Result<()> {
        info!(
            persona_id,
            lobby_id = %notice.lobby_id,
            duration_ms = notice.duration_ms,
            "Final countdown"
        );
        Ok(())
    }

    async fn send_event_ignored(&self, persona_id: PersonaId, notice: EventIgnored) -> Result<()> {
        info!(persona_id, event_id = notice.event_id, "Event ignored");
        Ok(())
    }
}
