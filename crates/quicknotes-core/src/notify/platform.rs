use std::process::{Command, Stdio};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::config::Config;

pub const NOTE_TAG_PREFIX: &str = "note-";

/// Tag carried by every scheduled notification so the platform keeps at
/// most one visible notification per note.
pub fn note_tag(note_id: &str) -> String {
    format!("{NOTE_TAG_PREFIX}{note_id}")
}

/// Notification permission state, `Default` meaning not yet determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Default,
    Granted,
    Denied,
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationAction {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    /// Replacement key; a request whose tag matches a visible notification
    /// replaces it instead of stacking a duplicate.
    pub tag: Option<String>,
    pub title: String,
    pub body: String,
    pub require_interaction: bool,
    pub actions: Vec<NotificationAction>,
}

/// Click callback payload delivered back from the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickEvent {
    pub tag: String,
    /// Invoked action id, or `None` for a click outside a defined action.
    pub action: Option<String>,
}

/// The platform-facing notification seam. Every capability is optional:
/// implementations degrade by reporting `Unsupported` or logging, never by
/// panicking or surfacing errors past [`show`](Self::show).
#[async_trait]
pub trait NotificationPlatform: Send + Sync {
    fn permission(&self) -> Permission;

    /// Resolves an undetermined permission state. Idempotent once a
    /// terminal state is reached.
    async fn request_permission(&self) -> Permission;

    fn show(&self, request: NotificationRequest) -> anyhow::Result<()>;

    /// Closes any displayed notification carrying `tag`. Best-effort; a
    /// platform without a close call logs and ignores the request.
    fn close(&self, tag: &str);

    /// Focuses a running application instance, or opens a new one at the
    /// application root.
    fn focus_or_open(&self);

    /// Click events for displayed notifications. Yields the receiver once;
    /// the background notifier takes it at spawn time.
    fn take_click_events(&self) -> Option<UnboundedReceiver<ClickEvent>>;
}

/// Desktop implementation backed by the OS notification helper
/// (`notify-send` on Linux, `osascript` on macOS).
///
/// The browser permission prompt maps onto probing the helper once:
/// `Default` until probed, then `Granted` or `Unsupported` for the rest of
/// the session. `notify.enabled=off` in the config is a standing denial.
pub struct DesktopPlatform {
    enabled: bool,
    open_target: Option<String>,
    probed: Mutex<Option<Permission>>,
    click_tx: UnboundedSender<ClickEvent>,
    clicks: Mutex<Option<UnboundedReceiver<ClickEvent>>>,
}

impl DesktopPlatform {
    pub fn from_config(cfg: &Config) -> Self {
        let enabled = cfg.get_bool("notify.enabled").unwrap_or(true);
        let open_target = cfg.get("notify.open").filter(|target| !target.is_empty());
        let (click_tx, click_rx) = mpsc::unbounded_channel();

        Self {
            enabled,
            open_target,
            probed: Mutex::new(None),
            click_tx,
            clicks: Mutex::new(Some(click_rx)),
        }
    }

    fn show_linux(&self, request: NotificationRequest) -> anyhow::Result<()> {
        let mut command = Command::new("notify-send");
        command.arg("--app-name=Quicknotes");
        if request.require_interaction {
            command.args(["--urgency", "critical"]);
        }
        for action in &request.actions {
            command.arg(format!("--action={}={}", action.id, action.label));
        }
        command.arg(&request.title).arg(&request.body);

        if request.actions.is_empty() {
            let output = command
                .stdin(Stdio::null())
                .output()
                .context("failed to run notify-send")?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                return Err(anyhow!("notify-send failed: {stderr}"));
            }
            return Ok(());
        }

        // With --action, notify-send stays alive until the notification is
        // resolved and prints the invoked action id on stdout.
        let child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("failed to spawn notify-send")?;

        let tag = request.tag.clone().unwrap_or_default();
        let click_tx = self.click_tx.clone();
        std::thread::spawn(move || match child.wait_with_output() {
            Ok(output) => {
                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                    warn!(stderr = %stderr, "notify-send exited with failure");
                    return;
                }
                let raw = String::from_utf8_lossy(&output.stdout).trim().to_string();
                let action = if raw.is_empty() { None } else { Some(raw) };
                let _ = click_tx.send(ClickEvent { tag, action });
            }
            Err(err) => {
                warn!(error = %err, "failed waiting for notify-send");
            }
        });

        Ok(())
    }

    fn show_macos(&self, request: &NotificationRequest) -> anyhow::Result<()> {
        let script = format!(
            "display notification {} with title {}",
            applescript_quote(&request.body),
            applescript_quote(&request.title)
        );
        let output = Command::new("osascript")
            .args(["-e", &script])
            .stdin(Stdio::null())
            .output()
            .context("failed to run osascript")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(anyhow!("osascript failed: {stderr}"));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationPlatform for DesktopPlatform {
    fn permission(&self) -> Permission {
        if !self.enabled {
            return Permission::Denied;
        }
        (*lock(&self.probed)).unwrap_or(Permission::Default)
    }

    async fn request_permission(&self) -> Permission {
        if !self.enabled {
            return Permission::Denied;
        }
        if let Some(state) = *lock(&self.probed) {
            return state;
        }

        let probed = tokio::task::spawn_blocking(notifier_probe)
            .await
            .unwrap_or(Permission::Unsupported);
        *lock(&self.probed) = Some(probed);
        info!(state = ?probed, "notification permission resolved");
        probed
    }

    fn show(&self, request: NotificationRequest) -> anyhow::Result<()> {
        debug!(tag = ?request.tag, title = %request.title, "displaying notification");
        if cfg!(target_os = "macos") {
            self.show_macos(&request)
        } else if cfg!(target_os = "linux") {
            self.show_linux(request)
        } else {
            Err(anyhow!("no notification helper for this platform"))
        }
    }

    fn close(&self, tag: &str) {
        // The desktop helpers expose no close-by-tag call; replacement and
        // closing happen only through the helper's own lifetime.
        debug!(tag, "close requested; not supported by the desktop helper");
    }

    fn focus_or_open(&self) {
        let Some(target) = &self.open_target else {
            debug!("no notify.open target configured; nothing to focus");
            return;
        };
        open_location(target);
    }

    fn take_click_events(&self) -> Option<UnboundedReceiver<ClickEvent>> {
        lock(&self.clicks).take()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!("platform state mutex poisoned; recovering inner state");
        poisoned.into_inner()
    })
}

fn notifier_probe() -> Permission {
    let result = if cfg!(target_os = "macos") {
        Command::new("osascript")
            .args(["-e", "return"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
    } else if cfg!(target_os = "linux") {
        Command::new("notify-send")
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
    } else {
        return Permission::Unsupported;
    };

    match result {
        Ok(status) if status.success() => Permission::Granted,
        Ok(status) => {
            warn!(?status, "notification helper probe failed");
            Permission::Unsupported
        }
        Err(err) => {
            warn!(error = %err, "notification helper not available");
            Permission::Unsupported
        }
    }
}

fn open_location(target: &str) {
    let status = if cfg!(target_os = "macos") {
        Command::new("open").arg(target).status()
    } else if cfg!(target_os = "windows") {
        Command::new("cmd").args(["/C", "start", "", target]).status()
    } else {
        Command::new("xdg-open").arg(target).status()
    };

    match status {
        Ok(status) if status.success() => {}
        Ok(status) => warn!(?status, target, "open helper exited with failure"),
        Err(err) => warn!(error = %err, target, "failed to run open helper"),
    }
}

fn applescript_quote(text: &str) -> String {
    let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}
