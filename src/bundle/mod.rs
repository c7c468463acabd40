//! Incoming call bundle: the key-value payload a push notification carries
//! to describe a ringing conference.
//!
//! Parsing is best effort. Missing or wrong-typed fields become absent and
//! nothing here ever fails; whether the result is usable is answered by
//! `IncomingCallBundle::is_valid`.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Conference identifier key.
pub const KEY_CONFERENCE_ID: &str = "ConfId";
/// Caller display name key.
pub const KEY_USER_NAME: &str = "UserName";
/// Caller avatar URL key.
pub const KEY_AVATAR_URL: &str = "AvatarUrl";
/// Caller user ID key.
pub const KEY_USER_ID: &str = "UserId";
/// Caller external (application side) user ID key.
pub const KEY_EXTERNAL_ID: &str = "ExternalId";

const KNOWN_KEYS: [&str; 5] = [
    KEY_CONFERENCE_ID,
    KEY_USER_NAME,
    KEY_AVATAR_URL,
    KEY_USER_ID,
    KEY_EXTERNAL_ID,
];

/// Immutable snapshot of an incoming call notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncomingCallBundle {
    conference_id: Option<String>,
    caller_display_name: Option<String>,
    avatar_url: Option<String>,
    user_id: Option<String>,
    external_user_id: Option<String>,
    custom_payload: BTreeMap<String, String>,
}

impl IncomingCallBundle {
    /// Parse an untyped carrier. Anything other than a JSON object yields an
    /// empty, invalid bundle.
    pub fn parse(raw: &Value) -> Self {
        match raw.as_object() {
            Some(map) => Self::from_map(map),
            None => {
                tracing::debug!("Incoming bundle is not an object, ignoring its content");
                Self::default()
            }
        }
    }

    /// Parse from an already decoded key-value map.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let custom_payload = map
            .iter()
            .filter(|(key, _)| !KNOWN_KEYS.contains(&key.as_str()))
            .filter_map(|(key, value)| scalar_to_string(value).map(|v| (key.clone(), v)))
            .collect();

        Self {
            conference_id: non_empty_str(map, KEY_CONFERENCE_ID),
            caller_display_name: non_empty_str(map, KEY_USER_NAME),
            avatar_url: non_empty_str(map, KEY_AVATAR_URL),
            user_id: non_empty_str(map, KEY_USER_ID),
            external_user_id: non_empty_str(map, KEY_EXTERNAL_ID),
            custom_payload,
        }
    }

    /// A bundle is usable only when it names a conference.
    pub fn is_valid(&self) -> bool {
        self.conference_id.is_some()
    }

    /// True when this bundle is valid and refers to `conference_id`.
    pub fn is_same_conference(&self, conference_id: Option<&str>) -> bool {
        match (self.conference_id.as_deref(), conference_id) {
            (Some(ours), Some(theirs)) => ours == theirs,
            _ => false,
        }
    }

    pub fn conference_id(&self) -> Option<&str> {
        self.conference_id.as_deref()
    }

    pub fn caller_display_name(&self) -> Option<&str> {
        self.caller_display_name.as_deref()
    }

    pub fn avatar_url(&self) -> Option<&str> {
        self.avatar_url.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn external_user_id(&self) -> Option<&str> {
        self.external_user_id.as_deref()
    }

    /// Extra application keys that rode along with the notification.
    pub fn custom_payload(&self) -> &BTreeMap<String, String> {
        &self.custom_payload
    }
}

#[cfg(test)]
impl IncomingCallBundle {
    /// Build a bundle for a known conference.
    pub fn for_conference(conference_id: impl Into<String>) -> Self {
        let conference_id: String = conference_id.into();
        Self {
            conference_id: (!conference_id.is_empty()).then_some(conference_id),
            ..Self::default()
        }
    }

    pub fn with_caller(mut self, name: impl Into<String>) -> Self {
        self.caller_display_name = Some(name.into());
        self
    }

    pub fn with_avatar_url(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }
}

fn non_empty_str(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
