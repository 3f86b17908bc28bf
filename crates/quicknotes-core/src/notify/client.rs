use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, error, info, warn};

use super::message::WorkerMessage;
use super::platform::{NotificationPlatform, NotificationRequest, Permission};
use super::worker::{BackgroundNotifier, WorkerHandle};
use super::{reminder_body, reminder_title};

/// Bridges user intent to worker-side scheduling and owns permission
/// negotiation. Failures never propagate: a request that cannot proceed is
/// logged and dropped, and callers observe only the absent side effect.
pub struct SchedulingClient {
    platform: Arc<dyn NotificationPlatform>,
    worker: Option<WorkerHandle>,
}

impl SchedulingClient {
    pub fn new(platform: Arc<dyn NotificationPlatform>) -> Self {
        Self {
            platform,
            worker: None,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.worker
            .as_ref()
            .map(WorkerHandle::is_active)
            .unwrap_or(false)
    }

    /// Registers the background notifier and resolves an undetermined
    /// permission state. Idempotent; a registration failure leaves the
    /// client in a degraded mode where scheduled reminders silently do
    /// nothing but immediate notifications may still work.
    #[tracing::instrument(skip(self))]
    pub async fn initialize(&mut self) {
        if self.worker.is_none() {
            match BackgroundNotifier::spawn(Arc::clone(&self.platform)) {
                Ok(handle) => {
                    info!("background notifier registered");
                    self.worker = Some(handle);
                }
                Err(err) => {
                    error!(
                        error = %err,
                        "background notifier registration failed; scheduled reminders disabled"
                    );
                }
            }
        }

        if self.platform.permission() == Permission::Default {
            let state = self.platform.request_permission().await;
            debug!(?state, "notification permission resolved at initialization");
        }
    }

    /// Sends a schedule message for `note_id`. Content travels untruncated;
    /// display-time truncation belongs to the notifier. The time is sent as
    /// an absolute ISO-8601 timestamp.
    #[tracing::instrument(skip(self, title, content, notification_time), fields(note_id = %note_id))]
    pub async fn schedule_notification(
        &self,
        note_id: &str,
        title: &str,
        content: &str,
        notification_time: DateTime<Utc>,
    ) {
        let Some(worker) = &self.worker else {
            warn!("background notifier not registered; dropping schedule request");
            return;
        };
        if !worker.is_active() {
            warn!("background notifier no longer active; dropping schedule request");
            return;
        }

        let permission = match self.platform.permission() {
            Permission::Default => self.platform.request_permission().await,
            state => state,
        };
        if permission != Permission::Granted {
            warn!(?permission, "notification permission not granted; dropping schedule request");
            return;
        }

        worker.send(WorkerMessage::Schedule {
            note_id: note_id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            notification_time: notification_time.to_rfc3339_opts(SecondsFormat::Millis, true),
        });
    }

    /// Sends a cancel message if the notifier is active. A missing notifier
    /// or an unknown identifier is a no-op, not an error.
    #[tracing::instrument(skip(self), fields(note_id = %note_id))]
    pub fn cancel_notification(&self, note_id: &str) {
        let Some(worker) = &self.worker else {
            debug!("background notifier not registered; cancel is a no-op");
            return;
        };

        worker.send(WorkerMessage::Cancel {
            note_id: note_id.to_string(),
        });
    }

    /// Shows a notification right away, bypassing the notifier. No-op
    /// unless permission is granted.
    #[tracing::instrument(skip(self, title, content))]
    pub fn show_immediate_notification(&self, title: &str, content: &str) {
        if self.platform.permission() != Permission::Granted {
            debug!("notification permission not granted; skipping immediate notification");
            return;
        }

        let request = NotificationRequest {
            tag: None,
            title: reminder_title(title),
            body: reminder_body(content),
            require_interaction: false,
            actions: vec![],
        };

        if let Err(err) = self.platform.show(request) {
            warn!(error = %err, "failed to display immediate notification");
        }
    }

    /// Tears the notifier down, waiting for its task to finish.
    pub async fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.shutdown().await;
        }
    }
}
