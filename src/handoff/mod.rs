//! Hand-off of an accepted invitation from the call screen to the main view.
//!
//! The call screen gives up its bundle as a `PendingInvitation` when the
//! user accepts. The main view keeps it in an `InvitationSlot` until the
//! session socket is open, then joins. Join progress events flush whatever
//! is still pending so a stale invitation is never joined twice.

use crate::bundle::IncomingCallBundle;
use crate::events::{ConferenceEvent, ConferenceStatus};
use crate::screen::ConferenceJoiner;

/// Single-use token carrying an accepted bundle.
#[derive(Debug, PartialEq, Eq)]
pub struct PendingInvitation {
    bundle: IncomingCallBundle,
}

impl PendingInvitation {
    pub fn new(bundle: IncomingCallBundle) -> Self {
        Self { bundle }
    }

    pub fn bundle(&self) -> &IncomingCallBundle {
        &self.bundle
    }

    pub fn into_bundle(self) -> IncomingCallBundle {
        self.bundle
    }
}

/// Main view side holder for at most one pending invitation.
#[derive(Debug, Default)]
pub struct InvitationSlot {
    pending: Option<PendingInvitation>,
}

impl InvitationSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a freshly accepted invitation. An older one, if any,
    /// is discarded.
    pub fn deliver(&mut self, invitation: PendingInvitation) {
        if let Some(old) = self.pending.replace(invitation) {
            tracing::debug!(
                "Replacing pending invitation for {:?}",
                old.bundle().conference_id()
            );
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Main view came to the foreground. Joins the pending conference when
    /// the session socket is open, consuming the invitation.
    ///
    /// Returns the joined conference ID.
    pub fn on_resumed(
        &mut self,
        session_open: bool,
        joiner: &dyn ConferenceJoiner,
    ) -> Option<String> {
        if !session_open {
            if self.pending.is_some() {
                tracing::debug!("Session not open yet, keeping pending invitation");
            }
            return None;
        }

        let invitation = self.pending.take()?;
        let bundle = invitation.into_bundle();
        let conference_id = bundle.conference_id()?.to_owned();

        if let Err(e) = joiner.join(&bundle) {
            tracing::warn!("Failed to join conference {}: {}", conference_id, e);
            return None;
        }
        tracing::info!("Joining accepted conference {}", conference_id);
        Some(conference_id)
    }

    /// Flush on events that mean a join is under way or over.
    pub fn on_event(&mut self, event: &ConferenceEvent) {
        let flush = match event {
            ConferenceEvent::ConferenceStatusUpdated { state, .. } => matches!(
                state,
                ConferenceStatus::Joining | ConferenceStatus::Joined | ConferenceStatus::Error
            ),
            ConferenceEvent::ConferenceDestroyed { .. }
            | ConferenceEvent::ConferencePreJoined { .. }
            | ConferenceEvent::ConferenceJoined { .. }
            | ConferenceEvent::ConferenceJoinFailed { .. } => true,
            ConferenceEvent::ConferenceEnded { .. } => false,
        };
        if flush {
            self.flush();
        }
    }

    /// Discard the pending invitation, if any.
    pub fn flush(&mut self) {
        if let Some(invitation) = self.pending.take() {
            tracing::debug!(
                "Flushed pending invitation for {:?}",
                invitation.bundle().conference_id()
            );
        }
    }
}
