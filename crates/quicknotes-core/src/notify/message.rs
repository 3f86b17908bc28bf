use serde::{Deserialize, Serialize};

/// Message protocol from the scheduling client to the background notifier.
///
/// The notification time travels as an absolute ISO-8601 timestamp rather
/// than a relative delay, so a gap between send and receipt cannot shift
/// the fire time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerMessage {
    #[serde(rename = "SCHEDULE_NOTIFICATION", rename_all = "camelCase")]
    Schedule {
        note_id: String,
        title: String,
        /// Full note content; truncation happens at display time.
        content: String,
        notification_time: String,
    },

    #[serde(rename = "CANCEL_NOTIFICATION", rename_all = "camelCase")]
    Cancel { note_id: String },
}
