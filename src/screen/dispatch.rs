//! Serialized dispatch loop for a call screen.
//!
//! Bus events, the dismissal timer, decline completion and host actions all
//! funnel through `CallScreen::next_wake`, one at a time.

use std::future;

use tokio::sync::mpsc;
use tokio::time::{self, Instant};

use super::{
    ActionOutcome, CallScreen, CallScreenError, DeclineFuture, Lifecycle, ServiceError,
    TerminationReason,
};
use crate::events::{ConferenceEvent, Subscription};

/// Input from the host UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    Accept,
    Decline,
    /// Result of the permission prompt.
    PermissionResult { request_code: i32, granted: bool },
}

/// The next thing that happened to a screen.
#[derive(Debug)]
pub enum Wake {
    Event(ConferenceEvent),
    Timeout,
    DeclineCompleted(Result<(), ServiceError>),
    Action(UserAction),
    /// The host's action channel closed.
    HostGone,
}

impl CallScreen {
    /// Wait for the next input.
    pub async fn next_wake(&mut self, actions: &mut mpsc::UnboundedReceiver<UserAction>) -> Wake {
        let deadline = self.deadline;
        let subscription = self.subscription.as_mut();
        let decline = self.pending_decline.as_mut();

        tokio::select! {
            Some(event) = next_event(subscription) => Wake::Event(event),
            _ = wait_until(deadline) => Wake::Timeout,
            result = wait_decline(decline) => Wake::DeclineCompleted(result),
            action = actions.recv() => match action {
                Some(action) => Wake::Action(action),
                None => Wake::HostGone,
            },
        }
    }

    /// Apply one input.
    pub fn dispatch(&mut self, wake: Wake) {
        match wake {
            Wake::Event(event) => self.on_event(&event),
            Wake::Timeout => self.on_timeout(),
            Wake::DeclineCompleted(result) => self.on_decline_completed(result),
            Wake::Action(UserAction::Accept) => {
                let result = self.accept();
                log_outcome(&self.id, "accept", result);
            }
            Wake::Action(UserAction::Decline) => {
                let outcome = self.decline();
                log_outcome(&self.id, "decline", Ok(outcome));
            }
            Wake::Action(UserAction::PermissionResult {
                request_code,
                granted,
            }) => {
                let result = self.on_permission_result(request_code, granted);
                log_outcome(&self.id, "permission result", result);
            }
            Wake::HostGone => {
                tracing::debug!(
                    "[{}] Host action channel closed in state {:?}",
                    self.id,
                    self.state()
                );
                self.stop();
            }
        }
    }
}

fn log_outcome(id: &str, action: &str, result: Result<ActionOutcome, CallScreenError>) {
    match result {
        Ok(outcome) => tracing::debug!("[{}] {} -> {:?}", id, action, outcome),
        Err(e) => tracing::info!("[{}] {}: {}", id, action, e),
    }
}

async fn next_event(subscription: Option<&mut Subscription>) -> Option<ConferenceEvent> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}

async fn wait_decline(decline: Option<&mut DeclineFuture>) -> Result<(), ServiceError> {
    match decline {
        Some(decline) => decline.await,
        None => future::pending().await,
    }
}

/// Start `screen` and drive it until it terminates.
pub async fn run_call_screen(
    screen: &mut CallScreen,
    actions: &mut mpsc::UnboundedReceiver<UserAction>,
) -> Result<TerminationReason, CallScreenError> {
    screen.start()?;

    while !screen.is_terminated() {
        let wake = screen.next_wake(actions).await;
        screen.dispatch(wake);
    }

    Ok(screen
        .termination_reason()
        .unwrap_or(TerminationReason::Stopped))
}
