//! Console implementations of the call screen collaborators.
//!
//! These stand in for the conferencing SDK and the UI toolkit when the
//! screen is driven from a terminal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::bundle::IncomingCallBundle;
use crate::handoff::PendingInvitation;
use crate::screen::{
    CallScreenView, ConferenceDirectory, ConferenceHandle, ConferenceJoiner, DeclineFuture,
    IncomingNotifications, InvitationService, MediaPermissions, Notice, Permission, ServiceError,
};

/// Simulated round trip of the decline request.
const DECLINE_LATENCY: Duration = Duration::from_millis(200);

pub struct ConsoleNotifications;

impl IncomingNotifications for ConsoleNotifications {
    fn stop(&self, conference_id: &str) {
        println!("  Ringing stopped for {}", conference_id);
    }
}

/// Microphone permission state, flipped by the `grant` command.
pub struct ConsolePermissions {
    microphone: AtomicBool,
}

impl ConsolePermissions {
    pub fn new(microphone: bool) -> Self {
        Self {
            microphone: AtomicBool::new(microphone),
        }
    }

    pub fn grant(&self) {
        self.microphone.store(true, Ordering::SeqCst);
    }
}

impl MediaPermissions for ConsolePermissions {
    fn has_microphone(&self) -> bool {
        self.microphone.load(Ordering::SeqCst)
    }

    fn request(&self, permissions: &[Permission], request_code: i32) -> Result<(), ServiceError> {
        println!(
            "  Permission prompt (code {}): {:?}. Type `grant` or `deny`.",
            request_code, permissions
        );
        Ok(())
    }
}

/// Knows a single conference, or none.
pub struct ConsoleDirectory {
    known: Option<String>,
}

impl ConsoleDirectory {
    pub fn new(known: Option<String>) -> Self {
        Self { known }
    }
}

impl ConferenceDirectory for ConsoleDirectory {
    fn find(&self, conference_id: &str) -> Option<ConferenceHandle> {
        self.known
            .as_deref()
            .filter(|known| *known == conference_id)
            .map(|known| ConferenceHandle {
                conference_id: known.to_string(),
            })
    }
}

/// Forwards accepted invitations to the main view over a channel.
pub struct ConsoleInvitations {
    accepted_tx: mpsc::UnboundedSender<PendingInvitation>,
}

impl ConsoleInvitations {
    pub fn new(accepted_tx: mpsc::UnboundedSender<PendingInvitation>) -> Self {
        Self { accepted_tx }
    }
}

impl InvitationService for ConsoleInvitations {
    fn accepted(&self, invitation: PendingInvitation) -> Result<(), ServiceError> {
        println!(
            "  Invitation accepted for {}",
            invitation.bundle().conference_id().unwrap_or("?")
        );
        self.accepted_tx
            .send(invitation)
            .map_err(|_| ServiceError::new("invitations", "main view is gone"))
    }

    fn decline(&self, conference: ConferenceHandle) -> DeclineFuture {
        Box::pin(async move {
            tokio::time::sleep(DECLINE_LATENCY).await;
            println!("  Declined conference {}", conference.conference_id);
            Ok(())
        })
    }
}

pub struct ConsoleView;

impl CallScreenView for ConsoleView {
    fn show_caller(&self, display_name: &str) {
        let name = if display_name.is_empty() {
            "unknown caller"
        } else {
            display_name
        };
        println!("Incoming call from {}", name);
    }

    fn load_avatar(&self, url: &str) -> Result<(), ServiceError> {
        let parsed =
            url::Url::parse(url).map_err(|e| ServiceError::new("avatar", e.to_string()))?;
        match parsed.scheme() {
            "http" | "https" => {
                println!("  Avatar: {}", parsed);
                Ok(())
            }
            other => Err(ServiceError::new(
                "avatar",
                format!("unsupported scheme {}", other),
            )),
        }
    }

    fn show_notice(&self, notice: Notice) {
        match notice {
            Notice::InvalidBundle => eprintln!("Invalid incoming call bundle"),
        }
    }

    fn close(&self) {
        println!("Call screen closed");
    }
}

pub struct ConsoleJoiner;

impl ConferenceJoiner for ConsoleJoiner {
    fn join(&self, bundle: &IncomingCallBundle) -> Result<(), ServiceError> {
        let conference_id = bundle
            .conference_id()
            .ok_or_else(|| ServiceError::new("joiner", "no conference id"))?;
        println!("Joining conference {}", conference_id);
        Ok(())
    }
}
