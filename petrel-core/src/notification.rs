// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Notification
//!
//! Outbound notification model: a device token, a key-ordered custom
//! payload, typed display overrides merged under the reserved `aps` sub-key
//! at encode time, and the sequence number assigned by the channel at send.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::codec::MAX_PAYLOAD_SIZE;
use crate::error::PushError;
use crate::token::DeviceToken;

/// Reserved payload sub-key the typed overrides are merged under.
pub const APS_KEY: &str = "aps";

/// Localized alert dictionary rendered into `aps.alert`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct LocalizedAlert {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_loc_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loc_key: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub loc_args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_image: Option<String>,
}

/// Alert content for the `aps.alert` entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    /// Plain alert text, rendered as a JSON string.
    Body(String),
    /// Localized alert, rendered as a dictionary.
    Localized(LocalizedAlert),
}

impl Alert {
    fn to_value(&self) -> Value {
        match self {
            Alert::Body(text) => Value::String(text.clone()),
            Alert::Localized(alert) => serde_json::to_value(alert)
                .expect("localized alert serializes to an object"),
        }
    }
}

/// An outbound notification.
///
/// Mutable by the caller until sent; the sequence number is assigned by the
/// channel at send time and identifies the delivery attempt from then on.
///
/// # Example
///
/// ```ignore
/// use petrel_core::{Alert, DeviceToken, Notification};
///
/// let token = DeviceToken::from_hex("a1b2c3d4...")?;
/// let mut notification = Notification::new(token);
/// notification.alert = Some(Alert::Body("You have mail".into()));
/// notification.badge = Some(3);
/// assert!(notification.is_valid());
/// ```
#[derive(Debug, Clone)]
pub struct Notification {
    device: DeviceToken,
    /// Custom payload entries; key-ordered, merged with `aps` at encode time.
    pub payload: Map<String, Value>,
    /// Alert shown to the user.
    pub alert: Option<Alert>,
    /// Badge count set on the application icon.
    pub badge: Option<u32>,
    /// Sound file played on delivery.
    pub sound: Option<String>,
    /// Marks the notification as content-available (background fetch).
    pub content_available: bool,
    /// Seconds since epoch after which the gateway discards the
    /// notification; 0 asks the gateway not to store it at all.
    pub expiry: u32,
    /// Charset tag for the payload text. The encoder always emits UTF-8;
    /// the tag documents the caller's intent only.
    pub encoding: String,
    sequence: Option<u32>,
}

impl Notification {
    /// Creates an empty notification for a device.
    pub fn new(device: DeviceToken) -> Self {
        Notification {
            device,
            payload: Map::new(),
            alert: None,
            badge: None,
            sound: None,
            content_available: false,
            expiry: 0,
            encoding: "utf8".into(),
            sequence: None,
        }
    }

    /// The target device.
    pub fn device(&self) -> &DeviceToken {
        &self.device
    }

    /// Sequence number assigned at send time; `None` until then.
    pub fn sequence(&self) -> Option<u32> {
        self.sequence
    }

    pub(crate) fn set_sequence(&mut self, sequence: u32) {
        self.sequence = Some(sequence);
    }

    /// Custom payload with the typed overrides merged under `aps`.
    ///
    /// An `aps` dictionary already present in the custom payload is kept and
    /// the typed fields are merged over it.
    pub fn merged_payload(&self) -> Map<String, Value> {
        let mut merged = self.payload.clone();
        let mut aps = match merged.get(APS_KEY) {
            Some(Value::Object(existing)) => existing.clone(),
            _ => Map::new(),
        };

        if let Some(alert) = &self.alert {
            aps.insert("alert".into(), alert.to_value());
        }
        if let Some(badge) = self.badge {
            aps.insert("badge".into(), Value::from(badge));
        }
        if let Some(sound) = &self.sound {
            aps.insert("sound".into(), Value::String(sound.clone()));
        }
        if self.content_available {
            aps.insert("content-available".into(), Value::from(1u32));
        }

        merged.insert(APS_KEY.into(), Value::Object(aps));
        merged
    }

    /// Serialized merged payload, as written into the frame.
    pub fn payload_bytes(&self) -> Result<Vec<u8>, PushError> {
        serde_json::to_vec(&Value::Object(self.merged_payload()))
            .map_err(|e| PushError::InvalidNotification(e.to_string()))
    }

    fn has_content(&self) -> bool {
        self.alert.is_some()
            || self.badge.is_some()
            || self.sound.is_some()
            || self.content_available
            || !self.payload.is_empty()
    }

    /// Checks the invariants the gateway enforces: something to display and
    /// a merged payload of at most [`MAX_PAYLOAD_SIZE`] bytes.
    pub fn validate(&self) -> Result<(), PushError> {
        if !self.has_content() {
            return Err(PushError::InvalidNotification(
                "no alert, badge, sound or custom payload".into(),
            ));
        }
        let bytes = self.payload_bytes()?;
        if bytes.len() > MAX_PAYLOAD_SIZE {
            return Err(PushError::InvalidNotification(format!(
                "payload is {} bytes (max {})",
                bytes.len(),
                MAX_PAYLOAD_SIZE
            )));
        }
        Ok(())
    }

    /// True when [`validate`](Self::validate) passes.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
