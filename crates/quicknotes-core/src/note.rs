use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::iso_instant_serde;

/// A user-authored note. Stored field names follow the on-disk layout
/// (`createdAt`, `notificationTime`), which the UI layer also reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: Uuid,

    pub title: String,

    pub content: String,

    #[serde(with = "iso_instant_serde")]
    pub created_at: DateTime<Utc>,

    #[serde(default, with = "iso_instant_serde::option")]
    pub notification_time: Option<DateTime<Utc>>,
}

impl Note {
    pub fn new(title: String, content: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            content,
            created_at: now,
            notification_time: None,
        }
    }

    pub fn has_pending_reminder(&self, now: DateTime<Utc>) -> bool {
        self.notification_time.map(|t| t > now).unwrap_or(false)
    }
}
