//! External collaborators of the call screen.
//!
//! Each trait is a seam to something the screen does not own: the push
//! notification service, the OS permission prompt, the conferencing SDK and
//! the view layer.

use std::sync::Arc;

use futures::future::BoxFuture;

use super::ServiceError;
use crate::bundle::IncomingCallBundle;
use crate::handoff::PendingInvitation;

/// Request code used for the microphone/camera permission prompt.
pub const PERMISSION_REQUEST_CODE: i32 = 42;

/// Future returned by the asynchronous decline call.
pub type DeclineFuture = BoxFuture<'static, Result<(), ServiceError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Microphone,
    Camera,
}

/// User-visible notices the view can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    InvalidBundle,
}

/// Conference object resolved by the SDK from its ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConferenceHandle {
    pub conference_id: String,
}

/// Ringing notification owned by the push service.
pub trait IncomingNotifications: Send + Sync {
    /// Stop ringing for `conference_id`.
    fn stop(&self, conference_id: &str);
}

pub trait MediaPermissions: Send + Sync {
    fn has_microphone(&self) -> bool;

    fn request(&self, permissions: &[Permission], request_code: i32) -> Result<(), ServiceError>;
}

/// Conference lookup in the SDK.
pub trait ConferenceDirectory: Send + Sync {
    fn find(&self, conference_id: &str) -> Option<ConferenceHandle>;
}

pub trait InvitationService: Send + Sync {
    /// The user accepted; ownership of the invitation moves to the host.
    fn accepted(&self, invitation: PendingInvitation) -> Result<(), ServiceError>;

    /// Decline the invitation. Completion is reported through the returned
    /// future, which the screen polls from its own dispatch loop.
    fn decline(&self, conference: ConferenceHandle) -> DeclineFuture;
}

/// The screen's presentation surface.
pub trait CallScreenView: Send + Sync {
    fn show_caller(&self, display_name: &str);

    /// Cosmetic; failures are logged and ignored.
    fn load_avatar(&self, url: &str) -> Result<(), ServiceError>;

    fn show_notice(&self, notice: Notice);

    /// Dismiss the screen.
    fn close(&self);
}

/// Everything a call screen talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub notifications: Arc<dyn IncomingNotifications>,
    pub permissions: Arc<dyn MediaPermissions>,
    pub directory: Arc<dyn ConferenceDirectory>,
    pub invitations: Arc<dyn InvitationService>,
    pub view: Arc<dyn CallScreenView>,
}

/// Joins the conference of an accepted invitation (main view side).
pub trait ConferenceJoiner: Send + Sync {
    fn join(&self, bundle: &IncomingCallBundle) -> Result<(), ServiceError>;
}
