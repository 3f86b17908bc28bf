use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::message::WorkerMessage;
use super::platform::{
    ClickEvent, NotificationAction, NotificationPlatform, NotificationRequest, note_tag,
};
use super::{reminder_body, reminder_title};

/// Handle to a running background notifier. Dropping the handle closes the
/// message channel and lets the notifier task wind down.
pub struct WorkerHandle {
    tx: UnboundedSender<WorkerMessage>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Fire-and-forget send. A notifier that is already gone swallows the
    /// message with a warning; the caller observes nothing.
    pub fn send(&self, message: WorkerMessage) {
        if self.tx.send(message).is_err() {
            warn!("background notifier is gone; dropping message");
        }
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(err) = self.task.await
            && !err.is_cancelled()
        {
            warn!(error = %err, "background notifier task failed");
        }
    }
}

struct PendingReminder {
    seq: u64,
    title: String,
    content: String,
    timer: JoinHandle<()>,
}

struct TimerElapsed {
    note_id: String,
    seq: u64,
}

/// Owns all scheduled reminders and their eventual display.
///
/// Reminders are in-memory only; they live exactly as long as this task.
/// Per-identifier state is mutated only on this task's message loop, so a
/// schedule and a cancel for the same identifier arriving back-to-back are
/// handled atomically in arrival order. A timer that has already elapsed
/// when its cancel arrives may still have a fire message in flight; the
/// per-entry sequence number discards such late fires.
pub struct BackgroundNotifier {
    platform: Arc<dyn NotificationPlatform>,
    elapsed_tx: UnboundedSender<TimerElapsed>,
    reminders: HashMap<String, PendingReminder>,
    next_seq: u64,
}

impl BackgroundNotifier {
    /// Spawns the notifier on the current runtime and returns its handle.
    /// Fails when no runtime is available, which callers treat as a
    /// registration failure (degraded mode), not a crash.
    pub fn spawn(platform: Arc<dyn NotificationPlatform>) -> anyhow::Result<WorkerHandle> {
        let runtime = tokio::runtime::Handle::try_current()
            .context("no async runtime available for the background notifier")?;

        let (tx, messages) = mpsc::unbounded_channel();
        let (elapsed_tx, elapsed_rx) = mpsc::unbounded_channel();
        let clicks = platform.take_click_events();

        let notifier = Self {
            platform,
            elapsed_tx,
            reminders: HashMap::new(),
            next_seq: 0,
        };

        let task = runtime.spawn(notifier.run(messages, elapsed_rx, clicks));
        Ok(WorkerHandle { tx, task })
    }

    async fn run(
        mut self,
        mut messages: UnboundedReceiver<WorkerMessage>,
        mut elapsed_rx: UnboundedReceiver<TimerElapsed>,
        mut clicks: Option<UnboundedReceiver<ClickEvent>>,
    ) {
        info!("background notifier started");

        loop {
            tokio::select! {
                message = messages.recv() => match message {
                    Some(message) => self.handle_message(message),
                    None => break,
                },
                Some(elapsed) = elapsed_rx.recv() => {
                    self.handle_elapsed(elapsed);
                }
                click = recv_click(&mut clicks) => match click {
                    Some(click) => self.handle_click(click),
                    None => clicks = None,
                },
            }
        }

        info!(
            pending = self.reminders.len(),
            "background notifier stopped"
        );
    }

    fn handle_message(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::Schedule {
                note_id,
                title,
                content,
                notification_time,
            } => self.handle_schedule(note_id, title, content, &notification_time),
            WorkerMessage::Cancel { note_id } => self.handle_cancel(&note_id),
        }
    }

    #[tracing::instrument(skip(self, title, content), fields(note_id = %note_id))]
    fn handle_schedule(
        &mut self,
        note_id: String,
        title: String,
        content: String,
        notification_time: &str,
    ) {
        let target = match DateTime::parse_from_rfc3339(notification_time) {
            Ok(dt) => dt.with_timezone(&Utc),
            Err(err) => {
                warn!(
                    raw = notification_time,
                    error = %err,
                    "unparseable notification time; dropping schedule"
                );
                return;
            }
        };

        let now = Utc::now();
        if target <= now {
            // Overdue reminders are dropped, never fired retroactively.
            debug!(target = %target, "notification time is not in the future; dropping");
            return;
        }
        let delay = (target - now).to_std().unwrap_or(Duration::ZERO);

        if let Some(previous) = self.reminders.remove(&note_id) {
            previous.timer.abort();
            debug!("replacing pending reminder");
        }

        self.next_seq += 1;
        let seq = self.next_seq;
        let elapsed_tx = self.elapsed_tx.clone();
        let timer_note_id = note_id.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = elapsed_tx.send(TimerElapsed {
                note_id: timer_note_id,
                seq,
            });
        });

        debug!(delay_ms = delay.as_millis() as u64, "reminder pending");
        self.reminders.insert(
            note_id,
            PendingReminder {
                seq,
                title,
                content,
                timer,
            },
        );
    }

    fn handle_elapsed(&mut self, elapsed: TimerElapsed) {
        let TimerElapsed { note_id, seq } = elapsed;

        let current = self
            .reminders
            .get(&note_id)
            .map(|pending| pending.seq == seq)
            .unwrap_or(false);
        if !current {
            debug!(
                note_id = %note_id,
                "elapsed timer belongs to a cancelled or replaced reminder"
            );
            return;
        }

        let Some(pending) = self.reminders.remove(&note_id) else {
            return;
        };

        info!(note_id = %note_id, "reminder fired");
        let request = NotificationRequest {
            tag: Some(note_tag(&note_id)),
            title: reminder_title(&pending.title),
            body: reminder_body(&pending.content),
            require_interaction: true,
            actions: vec![
                NotificationAction {
                    id: "view".to_string(),
                    label: "View Note".to_string(),
                },
                NotificationAction {
                    id: "dismiss".to_string(),
                    label: "Dismiss".to_string(),
                },
            ],
        };

        if let Err(err) = self.platform.show(request) {
            warn!(note_id = %note_id, error = %err, "failed to display reminder notification");
        }
    }

    #[tracing::instrument(skip(self), fields(note_id = %note_id))]
    fn handle_cancel(&mut self, note_id: &str) {
        if let Some(pending) = self.reminders.remove(note_id) {
            pending.timer.abort();
            debug!("cancelled pending reminder");
        } else {
            debug!("cancel for an unknown reminder; nothing to do");
        }

        // Close anything already displayed under this tag, whatever the
        // pending state was.
        self.platform.close(&note_tag(note_id));
    }

    fn handle_click(&mut self, click: ClickEvent) {
        debug!(tag = %click.tag, action = ?click.action, "notification clicked");
        self.platform.close(&click.tag);

        if click.action.as_deref() == Some("view") {
            self.platform.focus_or_open();
        }
    }
}

/// Resolves to the next click event, or never once the click channel is
/// gone. Returning `None` exactly once lets the loop drop the receiver.
async fn recv_click(clicks: &mut Option<UnboundedReceiver<ClickEvent>>) -> Option<ClickEvent> {
    match clicks {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
