//! Terminal host for the incoming call screen.
//!
//! Plays the part of the platform: it owns the event bus, feeds stdin
//! commands and JSON events into the screen, and acts as the main view that
//! receives the accepted invitation.

pub mod console;

use std::io::BufRead;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use crate::bundle::IncomingCallBundle;
use crate::events::{self, ConferenceEvent, EventBus, Subscription};
use crate::handoff::InvitationSlot;
use crate::screen::{
    run_call_screen, CallScreen, CallScreenSettings, Collaborators, ConferenceJoiner,
    TerminationReason, UserAction, PERMISSION_REQUEST_CODE,
};
use console::{
    ConsoleDirectory, ConsoleInvitations, ConsoleJoiner, ConsoleNotifications,
    ConsolePermissions, ConsoleView,
};

/// Knobs for the simulated platform.
#[derive(Debug, Clone, Copy)]
pub struct RingOptions {
    pub microphone_granted: bool,
    pub conference_known: bool,
    pub session_open: bool,
}

/// One line of host input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostInput {
    Action(UserAction),
    /// The user granted the permission prompt.
    GrantPermission,
    /// The main view came back to the foreground with the session open.
    Resume,
    Event(ConferenceEvent),
}

/// Parse a stdin line: `accept`, `decline`, `grant`, `deny`, `resume`, or a
/// JSON conference event.
pub fn parse_input(line: &str) -> Option<HostInput> {
    let line = line.trim();
    match line.to_ascii_lowercase().as_str() {
        "accept" | "a" => Some(HostInput::Action(UserAction::Accept)),
        "decline" | "d" => Some(HostInput::Action(UserAction::Decline)),
        "grant" => Some(HostInput::GrantPermission),
        "resume" => Some(HostInput::Resume),
        "deny" => Some(HostInput::Action(UserAction::PermissionResult {
            request_code: PERMISSION_REQUEST_CODE,
            granted: false,
        })),
        _ if line.starts_with('{') => events::parse_event(line).map(HostInput::Event),
        _ => None,
    }
}

/// Show an incoming call screen for `bundle` and run it to completion.
pub async fn ring(
    bundle: IncomingCallBundle,
    settings: CallScreenSettings,
    options: RingOptions,
) -> Result<TerminationReason> {
    let bus = EventBus::new();
    let permissions = Arc::new(ConsolePermissions::new(options.microphone_granted));
    let (accepted_tx, mut accepted_rx) = mpsc::unbounded_channel();
    let known = options
        .conference_known
        .then(|| bundle.conference_id().map(str::to_owned))
        .flatten();

    let collaborators = Collaborators {
        notifications: Arc::new(ConsoleNotifications),
        permissions: permissions.clone(),
        directory: Arc::new(ConsoleDirectory::new(known)),
        invitations: Arc::new(ConsoleInvitations::new(accepted_tx)),
        view: Arc::new(ConsoleView),
    };

    let (action_tx, mut action_rx) = mpsc::unbounded_channel();
    let (resume_tx, mut resume_rx) = mpsc::unbounded_channel();
    spawn_input_reader(bus.clone(), action_tx, resume_tx, permissions);

    let mut screen = CallScreen::new(bundle, collaborators, settings, bus.clone());
    let reason = run_call_screen(&mut screen, &mut action_rx).await?;
    drop(action_rx);
    println!("Call screen ended: {:?}", reason);
    tracing::debug!("{} event observer(s) left on the bus", bus.observer_count());

    // Main view side: pick up the accepted invitation, if any.
    let mut slot = InvitationSlot::new();
    while let Ok(invitation) = accepted_rx.try_recv() {
        slot.deliver(invitation);
    }
    if !slot.is_pending() {
        return Ok(reason);
    }

    let mut main_view_events = bus.subscribe();
    if slot.on_resumed(options.session_open, &ConsoleJoiner).is_none() && slot.is_pending() {
        println!(
            "Session not open; type `resume` to join, or wait for a join event to flush the invitation (Ctrl-C to stop)"
        );
        // Resumes typed while the call screen was up do not count.
        while resume_rx.try_recv().is_ok() {}
        tokio::select! {
            joined = await_handoff(&mut slot, &mut main_view_events, &mut resume_rx, &ConsoleJoiner) => {
                if joined.is_none() {
                    println!("Pending invitation flushed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Shutting down...");
            }
        }
    }

    Ok(reason)
}

/// Main view loop while an accepted invitation waits for the session.
///
/// Each resume retries the join with the session open. Join progress events
/// flush the invitation. Returns the joined conference ID, or `None` once the
/// invitation is gone without a join.
async fn await_handoff(
    slot: &mut InvitationSlot,
    events: &mut Subscription,
    resumes: &mut mpsc::UnboundedReceiver<()>,
    joiner: &dyn ConferenceJoiner,
) -> Option<String> {
    let mut resumes_open = true;
    while slot.is_pending() {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    slot.on_event(&event);
                    if !slot.is_pending() {
                        tracing::info!("Pending invitation flushed by {}", event.kind());
                    }
                }
                None => return None,
            },
            resume = resumes.recv(), if resumes_open => match resume {
                Some(()) => {
                    if let Some(conference_id) = slot.on_resumed(true, joiner) {
                        return Some(conference_id);
                    }
                }
                None => resumes_open = false,
            },
        }
    }
    None
}

/// Read host input until stdin closes. Closing stdin drops the action
/// sender, which the screen treats as the host going away.
///
/// Runs on a plain thread: a blocking stdin read cannot be cancelled.
fn spawn_input_reader(
    bus: EventBus,
    actions: mpsc::UnboundedSender<UserAction>,
    resumes: mpsc::UnboundedSender<()>,
    permissions: Arc<ConsolePermissions>,
) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!("Failed to read stdin: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            let action = match parse_input(&line) {
                Some(HostInput::Action(action)) => action,
                Some(HostInput::GrantPermission) => {
                    permissions.grant();
                    UserAction::PermissionResult {
                        request_code: PERMISSION_REQUEST_CODE,
                        granted: true,
                    }
                }
                Some(HostInput::Event(event)) => {
                    bus.publish(event);
                    continue;
                }
                Some(HostInput::Resume) => {
                    if resumes.send(()).is_err() {
                        tracing::debug!("Main view gone, dropping resume");
                    }
                    continue;
                }
                None => {
                    println!("Unrecognized input: {}", line.trim());
                    continue;
                }
            };

            if actions.send(action).is_err() {
                tracing::debug!("Call screen gone, dropping input");
            }
        }
    });
}
