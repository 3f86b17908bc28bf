use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use quicknotes_core::notify::SchedulingClient;
use quicknotes_core::notify::platform::{
    ClickEvent, NotificationPlatform, NotificationRequest, Permission,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Default)]
struct MockState {
    shown: Vec<NotificationRequest>,
    visible: Vec<NotificationRequest>,
    closed: Vec<String>,
    permission_requests: usize,
    instances: usize,
    opened: usize,
    focused: usize,
}

/// Recording platform double: tracks every show/close/focus call and models
/// tag replacement the way the real display surface does.
struct MockPlatform {
    permission: Mutex<Permission>,
    prompt_result: Permission,
    state: Mutex<MockState>,
    click_tx: UnboundedSender<ClickEvent>,
    clicks: Mutex<Option<UnboundedReceiver<ClickEvent>>>,
}

impl MockPlatform {
    fn with_permission(initial: Permission, prompt_result: Permission) -> Arc<Self> {
        let (click_tx, click_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            permission: Mutex::new(initial),
            prompt_result,
            state: Mutex::new(MockState::default()),
            click_tx,
            clicks: Mutex::new(Some(click_rx)),
        })
    }

    fn granted() -> Arc<Self> {
        Self::with_permission(Permission::Granted, Permission::Granted)
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state")
    }

    fn shown(&self) -> Vec<NotificationRequest> {
        self.state().shown.clone()
    }

    fn set_permission(&self, permission: Permission) {
        *self.permission.lock().expect("mock permission") = permission;
    }

    fn click(&self, tag: &str, action: Option<&str>) {
        self.click_tx
            .send(ClickEvent {
                tag: tag.to_string(),
                action: action.map(str::to_string),
            })
            .expect("send click event");
    }
}

#[async_trait]
impl NotificationPlatform for MockPlatform {
    fn permission(&self) -> Permission {
        *self.permission.lock().expect("mock permission")
    }

    async fn request_permission(&self) -> Permission {
        self.state().permission_requests += 1;
        *self.permission.lock().expect("mock permission") = self.prompt_result;
        self.prompt_result
    }

    fn show(&self, request: NotificationRequest) -> anyhow::Result<()> {
        let mut state = self.state();
        if let Some(tag) = &request.tag {
            state
                .visible
                .retain(|visible| visible.tag.as_deref() != Some(tag));
        }
        state.visible.push(request.clone());
        state.shown.push(request);
        Ok(())
    }

    fn close(&self, tag: &str) {
        let mut state = self.state();
        state.closed.push(tag.to_string());
        state
            .visible
            .retain(|visible| visible.tag.as_deref() != Some(tag));
    }

    fn focus_or_open(&self) {
        let mut state = self.state();
        if state.instances > 0 {
            state.focused += 1;
        } else {
            state.instances = 1;
            state.opened += 1;
        }
    }

    fn take_click_events(&self) -> Option<UnboundedReceiver<ClickEvent>> {
        self.clicks.lock().expect("mock clicks").take()
    }
}

/// Lets the notifier loop and its timer tasks drain their channels.
async fn settle() {
    for _ in 0..25 {
        tokio::task::yield_now().await;
    }
}

async fn registered_client(platform: &Arc<MockPlatform>) -> SchedulingClient {
    let mut client = SchedulingClient::new(Arc::clone(platform) as Arc<dyn NotificationPlatform>);
    client.initialize().await;
    assert!(client.is_registered());
    client
}

#[tokio::test(start_paused = true)]
async fn schedule_then_elapse_displays_one_tagged_notification() {
    let platform = MockPlatform::granted();
    let client = registered_client(&platform).await;

    let content = "x".repeat(150);
    let time = Utc::now() + chrono::Duration::seconds(1);
    client
        .schedule_notification("42", "Buy milk", &content, time)
        .await;
    settle().await;

    tokio::time::sleep(Duration::from_secs(2)).await;
    settle().await;

    let shown = platform.shown();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].tag.as_deref(), Some("note-42"));
    assert_eq!(shown[0].title, "Reminder: Buy milk");
    assert_eq!(shown[0].body, format!("{}...", "x".repeat(100)));
    assert!(shown[0].require_interaction);
    assert_eq!(shown[0].actions.len(), 2);
    assert_eq!(shown[0].actions[0].id, "view");
    assert_eq!(shown[0].actions[0].label, "View Note");
    assert_eq!(shown[0].actions[1].id, "dismiss");
    assert_eq!(shown[0].actions[1].label, "Dismiss");

    // A fired reminder does not fire again.
    tokio::time::sleep(Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(platform.shown().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn short_content_is_not_truncated() {
    let platform = MockPlatform::granted();
    let client = registered_client(&platform).await;

    let time = Utc::now() + chrono::Duration::seconds(1);
    client
        .schedule_notification("9", "Short", "tiny body", time)
        .await;
    settle().await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    settle().await;

    let shown = platform.shown();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].body, "tiny body");
}

#[tokio::test(start_paused = true)]
async fn stale_schedule_never_fires() {
    let platform = MockPlatform::granted();
    let client = registered_client(&platform).await;

    let time = Utc::now() - chrono::Duration::seconds(1);
    client
        .schedule_notification("1", "Too late", "body", time)
        .await;
    settle().await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    settle().await;
    assert!(platform.shown().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancel_before_fire_suppresses_the_notification() {
    let platform = MockPlatform::granted();
    let client = registered_client(&platform).await;

    let time = Utc::now() + chrono::Duration::minutes(5);
    client
        .schedule_notification("7", "Stand-up", "daily", time)
        .await;
    settle().await;

    client.cancel_notification("7");
    settle().await;
    assert!(platform.state().closed.contains(&"note-7".to_string()));

    tokio::time::sleep(Duration::from_secs(6 * 60)).await;
    settle().await;
    assert!(platform.shown().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancel_without_pending_reminder_is_a_noop() {
    let platform = MockPlatform::granted();
    let client = registered_client(&platform).await;

    client.cancel_notification("missing");
    settle().await;

    assert!(platform.shown().is_empty());
    assert!(client.is_registered());
}

#[tokio::test(start_paused = true)]
async fn rescheduling_replaces_the_pending_timer() {
    let platform = MockPlatform::granted();
    let client = registered_client(&platform).await;

    let now = Utc::now();
    client
        .schedule_notification("5", "First", "old content", now + chrono::Duration::seconds(60))
        .await;
    settle().await;

    client
        .schedule_notification("5", "Second", "new content", now + chrono::Duration::seconds(120))
        .await;
    settle().await;

    // The first timer was replaced, so nothing fires at its deadline.
    tokio::time::sleep(Duration::from_secs(61)).await;
    settle().await;
    assert!(platform.shown().is_empty());

    tokio::time::sleep(Duration::from_secs(60)).await;
    settle().await;

    let shown = platform.shown();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].title, "Reminder: Second");
    assert_eq!(shown[0].body, "new content");

    let state = platform.state();
    let visible: Vec<_> = state
        .visible
        .iter()
        .filter(|request| request.tag.as_deref() == Some("note-5"))
        .collect();
    assert_eq!(visible.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn denied_permission_aborts_scheduling() {
    let platform = MockPlatform::with_permission(Permission::Denied, Permission::Denied);
    let client = registered_client(&platform).await;

    let time = Utc::now() + chrono::Duration::seconds(1);
    client
        .schedule_notification("3", "Nope", "body", time)
        .await;
    settle().await;

    tokio::time::sleep(Duration::from_secs(5)).await;
    settle().await;

    assert!(platform.shown().is_empty());
    // A previously denied permission is never re-prompted.
    assert_eq!(platform.state().permission_requests, 0);
}

#[tokio::test(start_paused = true)]
async fn initialization_requests_permission_exactly_when_undetermined() {
    let platform = MockPlatform::with_permission(Permission::Default, Permission::Granted);
    let client = registered_client(&platform).await;
    assert_eq!(platform.state().permission_requests, 1);

    // Granted now; scheduling does not prompt again.
    let time = Utc::now() + chrono::Duration::seconds(1);
    client
        .schedule_notification("8", "Once", "body", time)
        .await;
    settle().await;
    assert_eq!(platform.state().permission_requests, 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    settle().await;
    assert_eq!(platform.shown().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn schedule_requests_permission_inline_when_undetermined() {
    let platform = MockPlatform::granted();
    let client = registered_client(&platform).await;
    assert_eq!(platform.state().permission_requests, 0);

    platform.set_permission(Permission::Default);
    let time = Utc::now() + chrono::Duration::seconds(1);
    client
        .schedule_notification("6", "Inline", "body", time)
        .await;
    settle().await;
    assert_eq!(platform.state().permission_requests, 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    settle().await;
    assert_eq!(platform.shown().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn unregistered_client_drops_schedule_silently() {
    let platform = MockPlatform::granted();
    let client = SchedulingClient::new(Arc::clone(&platform) as Arc<dyn NotificationPlatform>);
    assert!(!client.is_registered());

    let time = Utc::now() + chrono::Duration::seconds(1);
    client
        .schedule_notification("2", "Ghost", "body", time)
        .await;
    client.cancel_notification("2");

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(platform.shown().is_empty());
}

#[tokio::test(start_paused = true)]
async fn view_click_opens_then_focuses_the_application() {
    let platform = MockPlatform::granted();
    let client = registered_client(&platform).await;

    let time = Utc::now() + chrono::Duration::seconds(1);
    client
        .schedule_notification("11", "Open me", "body", time)
        .await;
    settle().await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    settle().await;
    assert_eq!(platform.shown().len(), 1);

    // No instance open yet: the click opens one.
    platform.click("note-11", Some("view"));
    settle().await;
    {
        let state = platform.state();
        assert_eq!(state.opened, 1);
        assert_eq!(state.focused, 0);
        assert!(state.closed.contains(&"note-11".to_string()));
    }

    // An instance is open now: the next view click focuses it.
    platform.click("note-11", Some("view"));
    settle().await;
    let state = platform.state();
    assert_eq!(state.opened, 1);
    assert_eq!(state.focused, 1);
}

#[tokio::test(start_paused = true)]
async fn dismiss_click_only_closes() {
    let platform = MockPlatform::granted();
    let client = registered_client(&platform).await;

    let time = Utc::now() + chrono::Duration::seconds(1);
    client
        .schedule_notification("12", "Dismiss me", "body", time)
        .await;
    settle().await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    settle().await;

    platform.click("note-12", Some("dismiss"));
    platform.click("note-12", None);
    settle().await;

    let state = platform.state();
    assert_eq!(state.closed, vec!["note-12".to_string(), "note-12".to_string()]);
    assert_eq!(state.opened, 0);
    assert_eq!(state.focused, 0);
    assert!(state.visible.is_empty());
}

#[tokio::test(start_paused = true)]
async fn immediate_notification_bypasses_the_worker() {
    let platform = MockPlatform::granted();
    let client = SchedulingClient::new(Arc::clone(&platform) as Arc<dyn NotificationPlatform>);

    let content = "y".repeat(120);
    client.show_immediate_notification("Right now", &content);

    let shown = platform.shown();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].tag, None);
    assert_eq!(shown[0].title, "Reminder: Right now");
    assert_eq!(shown[0].body, format!("{}...", "y".repeat(100)));
    assert!(!shown[0].require_interaction);
    assert!(shown[0].actions.is_empty());
}

#[tokio::test(start_paused = true)]
async fn immediate_notification_requires_granted_permission() {
    let platform = MockPlatform::with_permission(Permission::Denied, Permission::Denied);
    let client = SchedulingClient::new(Arc::clone(&platform) as Arc<dyn NotificationPlatform>);

    client.show_immediate_notification("Quiet", "nothing to see");
    assert!(platform.shown().is_empty());
}
