//! Recording fakes of the call screen collaborators.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::collaborators::*;
use super::ServiceError;
use crate::bundle::IncomingCallBundle;
use crate::handoff::PendingInvitation;

#[derive(Default)]
pub struct FakeNotifications {
    stopped: Mutex<Vec<String>>,
}

impl FakeNotifications {
    pub fn stopped(&self) -> Vec<String> {
        self.stopped.lock().unwrap().clone()
    }
}

impl IncomingNotifications for FakeNotifications {
    fn stop(&self, conference_id: &str) {
        self.stopped.lock().unwrap().push(conference_id.to_string());
    }
}

#[derive(Default)]
pub struct FakePermissions {
    pub granted: AtomicBool,
    pub fail_request: AtomicBool,
    requests: Mutex<Vec<(Vec<Permission>, i32)>>,
}

impl FakePermissions {
    pub fn requests(&self) -> Vec<(Vec<Permission>, i32)> {
        self.requests.lock().unwrap().clone()
    }
}

impl MediaPermissions for FakePermissions {
    fn has_microphone(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn request(&self, permissions: &[Permission], request_code: i32) -> Result<(), ServiceError> {
        self.requests
            .lock()
            .unwrap()
            .push((permissions.to_vec(), request_code));
        if self.fail_request.load(Ordering::SeqCst) {
            return Err(ServiceError::new("permissions", "prompt unavailable"));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeDirectory {
    pub known: Mutex<Vec<String>>,
}

impl ConferenceDirectory for FakeDirectory {
    fn find(&self, conference_id: &str) -> Option<ConferenceHandle> {
        self.known
            .lock()
            .unwrap()
            .iter()
            .any(|id| id == conference_id)
            .then(|| ConferenceHandle {
                conference_id: conference_id.to_string(),
            })
    }
}

#[derive(Default)]
pub struct FakeInvitations {
    pub fail_accept: AtomicBool,
    pub fail_decline: AtomicBool,
    accepted: Mutex<Vec<PendingInvitation>>,
    declined: Mutex<Vec<String>>,
}

impl FakeInvitations {
    pub fn accepted_ids(&self) -> Vec<String> {
        self.accepted
            .lock()
            .unwrap()
            .iter()
            .filter_map(|inv| inv.bundle().conference_id().map(str::to_owned))
            .collect()
    }

    pub fn take_accepted(&self) -> Option<PendingInvitation> {
        self.accepted.lock().unwrap().pop()
    }

    pub fn declined(&self) -> Vec<String> {
        self.declined.lock().unwrap().clone()
    }
}

impl InvitationService for FakeInvitations {
    fn accepted(&self, invitation: PendingInvitation) -> Result<(), ServiceError> {
        self.accepted.lock().unwrap().push(invitation);
        if self.fail_accept.load(Ordering::SeqCst) {
            return Err(ServiceError::new("invitations", "accept rejected"));
        }
        Ok(())
    }

    fn decline(&self, conference: ConferenceHandle) -> DeclineFuture {
        self.declined
            .lock()
            .unwrap()
            .push(conference.conference_id.clone());
        let result = if self.fail_decline.load(Ordering::SeqCst) {
            Err(ServiceError::new("invitations", "decline rejected"))
        } else {
            Ok(())
        };
        Box::pin(futures::future::ready(result))
    }
}

#[derive(Default)]
pub struct FakeView {
    pub fail_avatar: AtomicBool,
    callers: Mutex<Vec<String>>,
    avatars: Mutex<Vec<String>>,
    notices: Mutex<Vec<Notice>>,
    closes: AtomicUsize,
}

impl FakeView {
    pub fn callers(&self) -> Vec<String> {
        self.callers.lock().unwrap().clone()
    }

    pub fn avatars(&self) -> Vec<String> {
        self.avatars.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl CallScreenView for FakeView {
    fn show_caller(&self, display_name: &str) {
        self.callers.lock().unwrap().push(display_name.to_string());
    }

    fn load_avatar(&self, url: &str) -> Result<(), ServiceError> {
        self.avatars.lock().unwrap().push(url.to_string());
        if self.fail_avatar.load(Ordering::SeqCst) {
            return Err(ServiceError::new("avatar", "decode failed"));
        }
        Ok(())
    }

    fn show_notice(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingJoiner {
    fail: bool,
    joined: Mutex<Vec<String>>,
}

impl RecordingJoiner {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn joined(&self) -> Vec<String> {
        self.joined.lock().unwrap().clone()
    }
}

impl ConferenceJoiner for RecordingJoiner {
    fn join(&self, bundle: &IncomingCallBundle) -> Result<(), ServiceError> {
        if self.fail {
            return Err(ServiceError::new("joiner", "socket closed"));
        }
        if let Some(id) = bundle.conference_id() {
            self.joined.lock().unwrap().push(id.to_string());
        }
        Ok(())
    }
}

/// All fakes, with microphone permission granted and the conference known.
pub struct Fakes {
    pub notifications: Arc<FakeNotifications>,
    pub permissions: Arc<FakePermissions>,
    pub directory: Arc<FakeDirectory>,
    pub invitations: Arc<FakeInvitations>,
    pub view: Arc<FakeView>,
}

impl Fakes {
    pub fn new(known_conference: &str) -> Self {
        let permissions = FakePermissions::default();
        permissions.granted.store(true, Ordering::SeqCst);
        let directory = FakeDirectory::default();
        directory
            .known
            .lock()
            .unwrap()
            .push(known_conference.to_string());

        Self {
            notifications: Arc::new(FakeNotifications::default()),
            permissions: Arc::new(permissions),
            directory: Arc::new(directory),
            invitations: Arc::new(FakeInvitations::default()),
            view: Arc::new(FakeView::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            notifications: self.notifications.clone(),
            permissions: self.permissions.clone(),
            directory: self.directory.clone(),
            invitations: self.invitations.clone(),
            view: self.view.clone(),
        }
    }
}
