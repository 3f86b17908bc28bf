//! The notification scheduling path.
//!
//! Two components collaborate over one-way message channels:
//!
//! - [`client::SchedulingClient`] runs on the caller's task. It registers
//!   the background notifier, negotiates notification permission, and turns
//!   "remind me at time T" into a [`message::WorkerMessage`].
//! - [`worker::BackgroundNotifier`] is an independently scheduled task that
//!   owns every pending reminder timer and asks the platform to display
//!   notifications when they elapse.
//!
//! The notifier is created once per session through
//! [`SchedulingClient::initialize`] and torn down with the runtime; callers
//! reach it only through the handle held by the client, never through
//! process-global state. Pending reminders live in the notifier's memory
//! only: they do not survive a restart.

pub mod client;
pub mod message;
pub mod platform;
pub mod worker;

pub use client::SchedulingClient;
pub use worker::{BackgroundNotifier, WorkerHandle};

/// Maximum rendered body length, in characters, before truncation.
const NOTIFICATION_BODY_LIMIT: usize = 100;

pub(crate) fn reminder_title(title: &str) -> String {
    format!("Reminder: {title}")
}

/// Renders a notification body from untruncated note content. Content
/// longer than the display limit is cut at 100 characters with a trailing
/// ellipsis marker.
pub(crate) fn reminder_body(content: &str) -> String {
    let mut chars = content.chars();
    let truncated: String = chars.by_ref().take(NOTIFICATION_BODY_LIMIT).collect();
    if chars.next().is_some() {
        format!("{truncated}...")
    } else {
        truncated
    }
}
