//! Push notification payload.
//!
//! Only the payload shape lives here; delivering it is the host's job.

use serde::{Deserialize, Serialize};

pub const DEFAULT_BODY: &str = "New update available!";
pub const DEFAULT_ICON: &str = "/icon-192.png";
pub const DEFAULT_BADGE: &str = "/icon-96.png";
pub const DEFAULT_VIBRATION: [u32; 3] = [100, 50, 100];

/// A notification ready to be shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    /// Alternating vibrate/pause durations in milliseconds.
    pub vibrate: Vec<u32>,
    /// Arbitrary metadata handed back when the notification is clicked.
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl Notification {
    /// Build the notification for a push event.
    ///
    /// The push payload, if any, becomes the body text.
    pub fn from_push(title: &str, payload: Option<&str>) -> Self {
        let body = payload.filter(|p| !p.is_empty()).unwrap_or(DEFAULT_BODY);

        let mut data = serde_json::Map::new();
        data.insert("dateOfArrival".into(), chrono::Utc::now().timestamp_millis().into());
        data.insert("primaryKey".into(), 1.into());

        Self {
            title: title.to_string(),
            body: body.to_string(),
            icon: DEFAULT_ICON.to_string(),
            badge: DEFAULT_BADGE.to_string(),
            vibrate: DEFAULT_VIBRATION.to_vec(),
            data,
        }
    }
}
