//! Incoming call screen controller.
//!
//! A `CallScreen` owns the presentation of one ringing conference. It is a
//! small state machine:
//!
//! ```text
//! Idle --start(valid)--> Active --accept/decline/timeout/event--> Terminating --> Terminated
//!   \--start(invalid)--------------------------------------------------------> Terminated
//! ```
//!
//! Every input (bus events, the dismissal timer, user actions, decline
//! completion) is serialized through `next_wake`/`dispatch`, so the
//! controller itself needs no locking.

pub mod collaborators;
mod dispatch;
mod error;
#[cfg(test)]
pub mod testing;

pub use collaborators::{
    CallScreenView, Collaborators, ConferenceDirectory, ConferenceHandle, ConferenceJoiner,
    DeclineFuture, IncomingNotifications, InvitationService, MediaPermissions, Notice, Permission,
    PERMISSION_REQUEST_CODE,
};
pub use dispatch::{run_call_screen, UserAction};
pub use error::{CallScreenError, ServiceError};

use std::time::Duration;

use tokio::time::Instant;

use crate::bundle::IncomingCallBundle;
use crate::events::{ConferenceEvent, ConferenceStatus, EventBus, Subscription};
use crate::handoff::PendingInvitation;

/// How long an unanswered call screen stays up.
pub const DEFAULT_INCOMING_CALL_DURATION: Duration = Duration::from_millis(40_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallScreenSettings {
    pub incoming_call_duration: Duration,
}

impl Default for CallScreenSettings {
    fn default() -> Self {
        Self {
            incoming_call_duration: DEFAULT_INCOMING_CALL_DURATION,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallScreenState {
    /// Constructed, not started.
    Idle,
    Active,
    /// Teardown in progress (a decline call may still be in flight).
    Terminating,
    Terminated,
}

/// Why a call screen went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    InvalidBundle,
    TimedOut,
    ConferenceDestroyed,
    ConferenceEnded,
    ConferenceJoining,
    Accepted,
    Declined,
    /// Explicit `stop` or the host went away.
    Stopped,
}

/// Result of a user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Accepted,
    Declined,
    /// Decline call sent, screen waits for its completion.
    DeclinePending,
    /// Screen was not active; nothing happened.
    Ignored,
}

/// Narrow lifecycle surface the host drives.
pub trait Lifecycle {
    fn start(&mut self) -> Result<(), CallScreenError>;
    fn stop(&mut self);
    fn on_event(&mut self, event: &ConferenceEvent);
}

pub struct CallScreen {
    id: String,
    bundle: IncomingCallBundle,
    collaborators: Collaborators,
    settings: CallScreenSettings,
    bus: EventBus,
    state: CallScreenState,
    subscription: Option<Subscription>,
    deadline: Option<Instant>,
    pending_decline: Option<DeclineFuture>,
    reason: Option<TerminationReason>,
}

impl CallScreen {
    pub fn new(
        bundle: IncomingCallBundle,
        collaborators: Collaborators,
        settings: CallScreenSettings,
        bus: EventBus,
    ) -> Self {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(8);
        Self {
            id,
            bundle,
            collaborators,
            settings,
            bus,
            state: CallScreenState::Idle,
            subscription: None,
            deadline: None,
            pending_decline: None,
            reason: None,
        }
    }

    pub fn state(&self) -> CallScreenState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state == CallScreenState::Terminated
    }

    pub fn termination_reason(&self) -> Option<TerminationReason> {
        self.reason
    }

    /// When the dismissal timer fires, if armed.
    #[cfg(test)]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    fn conference_id(&self) -> &str {
        self.bundle.conference_id().unwrap_or_default()
    }

    /// Dismissal timer expired.
    pub fn on_timeout(&mut self) {
        if self.state != CallScreenState::Active {
            return;
        }
        self.terminate(TerminationReason::TimedOut);
    }

    /// User pressed Accept.
    ///
    /// Without microphone permission a permission prompt is requested and
    /// the screen stays active; the host retries through
    /// `on_permission_result`.
    pub fn accept(&mut self) -> Result<ActionOutcome, CallScreenError> {
        if self.state != CallScreenState::Active {
            tracing::debug!("[{}] accept ignored in state {:?}", self.id, self.state);
            return Ok(ActionOutcome::Ignored);
        }

        let conference_id = self.conference_id().to_owned();
        self.collaborators.notifications.stop(&conference_id);

        if !self.collaborators.permissions.has_microphone() {
            if let Err(e) = self.collaborators.permissions.request(
                &[Permission::Microphone, Permission::Camera],
                PERMISSION_REQUEST_CODE,
            ) {
                tracing::warn!("[{}] Permission request failed: {}", self.id, e);
            }
            tracing::info!(
                "[{}] Microphone permission missing, waiting for the user",
                self.id
            );
            return Err(CallScreenError::PermissionDenied {
                request_code: PERMISSION_REQUEST_CODE,
            });
        }

        let invitation = PendingInvitation::new(self.bundle.clone());
        if let Err(e) = self.collaborators.invitations.accepted(invitation) {
            tracing::warn!(
                "[{}] Accept call for {} failed: {}",
                self.id,
                conference_id,
                CallScreenError::from(e)
            );
        }

        self.terminate(TerminationReason::Accepted);
        Ok(ActionOutcome::Accepted)
    }

    /// Host permission callback. A grant for our request code retries
    /// accept; anything else leaves the screen as it is.
    pub fn on_permission_result(
        &mut self,
        request_code: i32,
        granted: bool,
    ) -> Result<ActionOutcome, CallScreenError> {
        if request_code != PERMISSION_REQUEST_CODE || self.state != CallScreenState::Active {
            return Ok(ActionOutcome::Ignored);
        }
        if !granted {
            tracing::info!("[{}] Permission denied, call screen stays up", self.id);
            return Ok(ActionOutcome::Ignored);
        }
        self.accept()
    }

    /// User pressed Decline.
    pub fn decline(&mut self) -> ActionOutcome {
        if self.state != CallScreenState::Active {
            tracing::debug!("[{}] decline ignored in state {:?}", self.id, self.state);
            return ActionOutcome::Ignored;
        }

        let conference_id = self.conference_id().to_owned();
        self.collaborators.notifications.stop(&conference_id);

        match self.collaborators.directory.find(&conference_id) {
            Some(conference) => {
                tracing::info!("[{}] Declining conference {}", self.id, conference_id);
                self.pending_decline = Some(self.collaborators.invitations.decline(conference));
                self.reason = Some(TerminationReason::Declined);
                self.deadline = None;
                self.state = CallScreenState::Terminating;
                ActionOutcome::DeclinePending
            }
            None => {
                tracing::info!(
                    "[{}] Conference {} unknown, dismissing without decline call",
                    self.id,
                    conference_id
                );
                self.terminate(TerminationReason::Declined);
                ActionOutcome::Declined
            }
        }
    }

    /// Completion of the decline call. Either outcome ends the screen.
    pub fn on_decline_completed(&mut self, result: Result<(), ServiceError>) {
        self.pending_decline = None;
        if self.state != CallScreenState::Terminating {
            return;
        }
        if let Err(e) = result {
            tracing::warn!("[{}] {}", self.id, CallScreenError::ServiceCall(e));
        }
        self.terminate(TerminationReason::Declined);
    }

    fn terminate(&mut self, reason: TerminationReason) {
        if self.state == CallScreenState::Terminated {
            return;
        }
        self.state = CallScreenState::Terminating;
        self.deadline = None;
        let reason = *self.reason.get_or_insert(reason);
        tracing::info!("[{}] Call screen terminating: {:?}", self.id, reason);
        self.stop();
    }
}

impl Lifecycle for CallScreen {
    fn start(&mut self) -> Result<(), CallScreenError> {
        if self.state != CallScreenState::Idle {
            return Err(CallScreenError::NotIdle(self.state));
        }

        if !self.bundle.is_valid() {
            tracing::warn!("[{}] Incoming bundle has no conference id", self.id);
            self.reason = Some(TerminationReason::InvalidBundle);
            self.collaborators.view.show_notice(Notice::InvalidBundle);
            self.stop();
            return Err(CallScreenError::InvalidBundle);
        }

        self.subscription = Some(self.bus.subscribe());

        let caller = self.bundle.caller_display_name().unwrap_or_default();
        self.collaborators.view.show_caller(caller);
        if let Some(url) = self.bundle.avatar_url() {
            if let Err(e) = self.collaborators.view.load_avatar(url) {
                tracing::debug!("[{}] Avatar load failed: {}", self.id, e);
            }
        }

        self.deadline = Some(Instant::now() + self.settings.incoming_call_duration);
        self.state = CallScreenState::Active;
        tracing::info!(
            "[{}] Incoming call for {} ({}), dismissing in {}ms",
            self.id,
            self.conference_id(),
            if caller.is_empty() { "unknown caller" } else { caller },
            self.settings.incoming_call_duration.as_millis()
        );
        Ok(())
    }

    /// Idempotent teardown.
    fn stop(&mut self) {
        if self.state == CallScreenState::Terminated {
            return;
        }
        if let Some(mut subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.deadline = None;
        self.pending_decline = None;
        self.reason.get_or_insert(TerminationReason::Stopped);
        self.state = CallScreenState::Terminated;
        self.collaborators.view.close();
        tracing::debug!("[{}] Call screen terminated", self.id);
    }

    fn on_event(&mut self, event: &ConferenceEvent) {
        if self.state != CallScreenState::Active {
            return;
        }

        let reason = match event {
            ConferenceEvent::ConferenceDestroyed { .. } => TerminationReason::ConferenceDestroyed,
            ConferenceEvent::ConferenceEnded { .. } => TerminationReason::ConferenceEnded,
            ConferenceEvent::ConferenceStatusUpdated {
                state: ConferenceStatus::Joining,
                ..
            } => TerminationReason::ConferenceJoining,
            _ => return,
        };

        if !self.bundle.is_same_conference(Some(event.conference_id())) {
            tracing::debug!(
                "[{}] Ignoring {} for conference {}",
                self.id,
                event.kind(),
                event.conference_id()
            );
            return;
        }

        self.terminate(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::testing::Fakes;
    use super::*;
    use std::sync::atomic::Ordering;

    const CONF: &str = "conf-1";

    fn bundle() -> IncomingCallBundle {
        IncomingCallBundle::for_conference(CONF)
            .with_caller("Ada")
            .with_avatar_url("https://example.com/ada.png")
    }

    fn screen(fakes: &Fakes, bundle: IncomingCallBundle, bus: &EventBus) -> CallScreen {
        CallScreen::new(
            bundle,
            fakes.collaborators(),
            CallScreenSettings::default(),
            bus.clone(),
        )
    }

    fn started(fakes: &Fakes, bus: &EventBus) -> CallScreen {
        let mut screen = screen(fakes, bundle(), bus);
        screen.start().unwrap();
        screen
    }

    #[tokio::test]
    async fn test_start_valid_bundle() {
        let fakes = Fakes::new(CONF);
        let bus = EventBus::new();
        let screen = started(&fakes, &bus);

        assert_eq!(screen.state(), CallScreenState::Active);
        assert_eq!(bus.observer_count(), 1);
        assert!(screen.deadline().is_some());
        assert_eq!(fakes.view.callers(), vec!["Ada".to_string()]);
        assert_eq!(fakes.view.avatars(), vec!["https://example.com/ada.png".to_string()]);
    }

    #[tokio::test]
    async fn test_start_invalid_bundle_never_subscribes() {
        let fakes = Fakes::new(CONF);
        let bus = EventBus::new();
        let mut screen = screen(&fakes, IncomingCallBundle::default().with_caller("Ada"), &bus);

        assert_eq!(screen.start(), Err(CallScreenError::InvalidBundle));
        assert_eq!(screen.state(), CallScreenState::Terminated);
        assert_eq!(
            screen.termination_reason(),
            Some(TerminationReason::InvalidBundle)
        );
        assert_eq!(bus.observer_count(), 0);
        assert_eq!(fakes.view.notices(), vec![Notice::InvalidBundle]);
        assert_eq!(fakes.view.close_count(), 1);
        assert!(fakes.view.callers().is_empty());
    }

    #[tokio::test]
    async fn test_start_twice_rejected() {
        let fakes = Fakes::new(CONF);
        let bus = EventBus::new();
        let mut screen = started(&fakes, &bus);

        assert_eq!(
            screen.start(),
            Err(CallScreenError::NotIdle(CallScreenState::Active))
        );
        assert_eq!(bus.observer_count(), 1);
    }

    #[tokio::test]
    async fn test_avatar_failure_does_not_block() {
        let fakes = Fakes::new(CONF);
        fakes.view.fail_avatar.store(true, Ordering::SeqCst);
        let bus = EventBus::new();
        let screen = started(&fakes, &bus);

        assert_eq!(screen.state(), CallScreenState::Active);
    }

    #[tokio::test]
    async fn test_other_conference_events_ignored() {
        let fakes = Fakes::new(CONF);
        let bus = EventBus::new();
        let mut screen = started(&fakes, &bus);

        for event in [
            ConferenceEvent::ConferenceDestroyed {
                conference_id: "other".to_string(),
            },
            ConferenceEvent::ConferenceEnded {
                conference_id: "other".to_string(),
            },
            ConferenceEvent::ConferenceStatusUpdated {
                conference_id: "other".to_string(),
                state: ConferenceStatus::Joining,
            },
        ] {
            screen.on_event(&event);
            assert_eq!(screen.state(), CallScreenState::Active);
        }
        assert_eq!(fakes.view.close_count(), 0);
    }

    #[tokio::test]
    async fn test_non_joining_status_ignored() {
        let fakes = Fakes::new(CONF);
        let bus = EventBus::new();
        let mut screen = started(&fakes, &bus);

        for state in [
            ConferenceStatus::Creating,
            ConferenceStatus::Joined,
            ConferenceStatus::Left,
            ConferenceStatus::Error,
        ] {
            screen.on_event(&ConferenceEvent::ConferenceStatusUpdated {
                conference_id: CONF.to_string(),
                state,
            });
        }
        screen.on_event(&ConferenceEvent::ConferenceJoined {
            conference_id: CONF.to_string(),
        });
        assert_eq!(screen.state(), CallScreenState::Active);
    }

    #[tokio::test]
    async fn test_destroyed_terminates_once() {
        let fakes = Fakes::new(CONF);
        let bus = EventBus::new();
        let mut screen = started(&fakes, &bus);
        let event = ConferenceEvent::ConferenceDestroyed {
            conference_id: CONF.to_string(),
        };

        screen.on_event(&event);
        screen.on_event(&event);
        screen.on_event(&event);

        assert_eq!(screen.state(), CallScreenState::Terminated);
        assert_eq!(
            screen.termination_reason(),
            Some(TerminationReason::ConferenceDestroyed)
        );
        assert_eq!(fakes.view.close_count(), 1);
        assert_eq!(bus.observer_count(), 0);
        assert!(screen.deadline().is_none());
    }

    #[tokio::test]
    async fn test_ended_and_joining_terminate() {
        let fakes = Fakes::new(CONF);
        let bus = EventBus::new();

        let mut screen = started(&fakes, &bus);
        screen.on_event(&ConferenceEvent::ConferenceEnded {
            conference_id: CONF.to_string(),
        });
        assert_eq!(
            screen.termination_reason(),
            Some(TerminationReason::ConferenceEnded)
        );

        let mut screen = started(&fakes, &bus);
        screen.on_event(&ConferenceEvent::ConferenceStatusUpdated {
            conference_id: CONF.to_string(),
            state: ConferenceStatus::Joining,
        });
        assert_eq!(
            screen.termination_reason(),
            Some(TerminationReason::ConferenceJoining)
        );
    }

    #[tokio::test]
    async fn test_accept_once() {
        let fakes = Fakes::new(CONF);
        let bus = EventBus::new();
        let mut screen = started(&fakes, &bus);

        assert_eq!(screen.accept(), Ok(ActionOutcome::Accepted));
        assert_eq!(screen.accept(), Ok(ActionOutcome::Ignored));

        assert_eq!(fakes.notifications.stopped(), vec![CONF.to_string()]);
        assert_eq!(fakes.invitations.accepted_ids(), vec![CONF.to_string()]);
        assert_eq!(fakes.view.close_count(), 1);
        assert_eq!(screen.termination_reason(), Some(TerminationReason::Accepted));
        assert_eq!(bus.observer_count(), 0);
    }

    #[tokio::test]
    async fn test_accept_hands_over_bundle() {
        let fakes = Fakes::new(CONF);
        let bus = EventBus::new();
        let mut screen = started(&fakes, &bus);
        screen.accept().unwrap();

        let invitation = fakes.invitations.take_accepted().unwrap();
        assert_eq!(invitation.into_bundle(), bundle());
    }

    #[tokio::test]
    async fn test_accept_service_failure_still_terminates() {
        let fakes = Fakes::new(CONF);
        fakes.invitations.fail_accept.store(true, Ordering::SeqCst);
        let bus = EventBus::new();
        let mut screen = started(&fakes, &bus);

        assert_eq!(screen.accept(), Ok(ActionOutcome::Accepted));
        assert_eq!(screen.state(), CallScreenState::Terminated);
    }

    #[tokio::test]
    async fn test_accept_without_permission_stays_active() {
        let fakes = Fakes::new(CONF);
        fakes.permissions.granted.store(false, Ordering::SeqCst);
        let bus = EventBus::new();
        let mut screen = started(&fakes, &bus);

        assert_eq!(
            screen.accept(),
            Err(CallScreenError::PermissionDenied {
                request_code: PERMISSION_REQUEST_CODE
            })
        );
        assert_eq!(screen.state(), CallScreenState::Active);
        assert_eq!(
            fakes.permissions.requests(),
            vec![(
                vec![Permission::Microphone, Permission::Camera],
                PERMISSION_REQUEST_CODE
            )]
        );
        assert!(fakes.invitations.accepted_ids().is_empty());
        assert_eq!(fakes.view.close_count(), 0);
        assert_eq!(bus.observer_count(), 1);
    }

    #[tokio::test]
    async fn test_permission_request_failure_swallowed() {
        let fakes = Fakes::new(CONF);
        fakes.permissions.granted.store(false, Ordering::SeqCst);
        fakes.permissions.fail_request.store(true, Ordering::SeqCst);
        let bus = EventBus::new();
        let mut screen = started(&fakes, &bus);

        assert!(matches!(
            screen.accept(),
            Err(CallScreenError::PermissionDenied { .. })
        ));
        assert_eq!(screen.state(), CallScreenState::Active);
    }

    #[tokio::test]
    async fn test_permission_grant_retries_accept() {
        let fakes = Fakes::new(CONF);
        fakes.permissions.granted.store(false, Ordering::SeqCst);
        let bus = EventBus::new();
        let mut screen = started(&fakes, &bus);
        let _ = screen.accept();

        assert_eq!(screen.on_permission_result(7, true), Ok(ActionOutcome::Ignored));
        assert_eq!(
            screen.on_permission_result(PERMISSION_REQUEST_CODE, false),
            Ok(ActionOutcome::Ignored)
        );
        assert_eq!(screen.state(), CallScreenState::Active);

        fakes.permissions.granted.store(true, Ordering::SeqCst);
        assert_eq!(
            screen.on_permission_result(PERMISSION_REQUEST_CODE, true),
            Ok(ActionOutcome::Accepted)
        );
        assert_eq!(screen.state(), CallScreenState::Terminated);
        assert_eq!(fakes.invitations.accepted_ids(), vec![CONF.to_string()]);
    }

    #[tokio::test]
    async fn test_decline_unknown_conference_terminates_immediately() {
        let fakes = Fakes::new("someone-else");
        let bus = EventBus::new();
        let mut screen = started(&fakes, &bus);

        assert_eq!(screen.decline(), ActionOutcome::Declined);
        assert_eq!(screen.state(), CallScreenState::Terminated);
        assert!(fakes.invitations.declined().is_empty());
        assert_eq!(fakes.notifications.stopped(), vec![CONF.to_string()]);
    }

    #[tokio::test]
    async fn test_decline_known_conference_waits_for_completion() {
        let fakes = Fakes::new(CONF);
        let bus = EventBus::new();
        let mut screen = started(&fakes, &bus);

        assert_eq!(screen.decline(), ActionOutcome::DeclinePending);
        assert_eq!(screen.state(), CallScreenState::Terminating);
        assert_eq!(fakes.invitations.declined(), vec![CONF.to_string()]);
        assert!(screen.deadline().is_none());

        // Late events and actions are absorbed while terminating.
        screen.on_event(&ConferenceEvent::ConferenceEnded {
            conference_id: CONF.to_string(),
        });
        assert_eq!(screen.accept(), Ok(ActionOutcome::Ignored));
        assert_eq!(screen.decline(), ActionOutcome::Ignored);
        assert_eq!(fakes.view.close_count(), 0);

        screen.on_decline_completed(Err(ServiceError::new("invitations", "timeout")));
        assert_eq!(screen.state(), CallScreenState::Terminated);
        assert_eq!(screen.termination_reason(), Some(TerminationReason::Declined));
        assert_eq!(fakes.view.close_count(), 1);
    }

    #[tokio::test]
    async fn test_stop_while_decline_in_flight() {
        let fakes = Fakes::new(CONF);
        let bus = EventBus::new();
        let mut screen = started(&fakes, &bus);

        assert_eq!(screen.decline(), ActionOutcome::DeclinePending);
        screen.stop();

        assert_eq!(screen.state(), CallScreenState::Terminated);
        assert_eq!(screen.termination_reason(), Some(TerminationReason::Declined));
        assert_eq!(fakes.view.close_count(), 1);
        assert_eq!(bus.observer_count(), 0);

        // The dropped call completing later changes nothing.
        screen.on_decline_completed(Ok(()));
        assert_eq!(screen.state(), CallScreenState::Terminated);
        assert_eq!(screen.termination_reason(), Some(TerminationReason::Declined));
        assert_eq!(fakes.view.close_count(), 1);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let fakes = Fakes::new(CONF);
        let bus = EventBus::new();
        let mut screen = started(&fakes, &bus);

        screen.stop();
        screen.stop();

        assert_eq!(screen.state(), CallScreenState::Terminated);
        assert_eq!(screen.termination_reason(), Some(TerminationReason::Stopped));
        assert_eq!(fakes.view.close_count(), 1);
        assert_eq!(bus.observer_count(), 0);

        screen.on_timeout();
        assert_eq!(screen.termination_reason(), Some(TerminationReason::Stopped));
    }
}
