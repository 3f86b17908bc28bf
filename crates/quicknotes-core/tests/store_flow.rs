use chrono::{Duration, TimeZone, Utc};
use quicknotes_core::note::Note;
use quicknotes_core::store::NoteStore;
use tempfile::tempdir;

#[test]
fn roundtrip_preserves_notes_to_millisecond_precision() {
    let temp = tempdir().expect("tempdir");
    let store = NoteStore::open(temp.path()).expect("open store");

    let created = Utc
        .with_ymd_and_hms(2026, 8, 7, 9, 30, 12)
        .single()
        .expect("valid instant")
        + Duration::milliseconds(345);
    let mut note = Note::new("Buy milk".to_string(), "2% and oat".to_string(), created);
    note.notification_time = Some(created + Duration::minutes(90));

    store.add_note(note.clone()).expect("add note");

    let loaded = store.load().expect("load notes");
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].id, note.id);
    assert_eq!(loaded[0].title, note.title);
    assert_eq!(loaded[0].content, note.content);
    assert_eq!(loaded[0].created_at, note.created_at);
    assert_eq!(
        loaded[0].notification_time.map(|t| t.timestamp_millis()),
        note.notification_time.map(|t| t.timestamp_millis())
    );
}

#[test]
fn malformed_store_resets_to_empty_collection() {
    let temp = tempdir().expect("tempdir");
    let store = NoteStore::open(temp.path()).expect("open store");

    let note = Note::new("keep".to_string(), String::new(), Utc::now());
    store.add_note(note).expect("add note");

    std::fs::write(&store.notes_path, "{definitely not an array").expect("write garbage");

    let loaded = store.load().expect("load survives malformed data");
    assert!(loaded.is_empty());

    let raw = std::fs::read_to_string(&store.notes_path).expect("read notes file");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("store was reinitialized");
    assert_eq!(value, serde_json::json!([]));
}

#[test]
fn delete_removes_exactly_the_requested_note() {
    let temp = tempdir().expect("tempdir");
    let store = NoteStore::open(temp.path()).expect("open store");

    let now = Utc::now();
    let first = store
        .add_note(Note::new("first".to_string(), String::new(), now))
        .expect("add first");
    let second = store
        .add_note(Note::new("second".to_string(), String::new(), now))
        .expect("add second");

    let removed = store.delete_note(first.id).expect("delete first");
    assert_eq!(removed.map(|n| n.id), Some(first.id));

    let remaining = store.load().expect("load notes");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, second.id);

    let again = store.delete_note(first.id).expect("delete again");
    assert!(again.is_none());
}

#[test]
fn reminder_time_can_be_set_and_cleared() {
    let temp = tempdir().expect("tempdir");
    let store = NoteStore::open(temp.path()).expect("open store");

    let now = Utc::now();
    let note = store
        .add_note(Note::new("note".to_string(), String::new(), now))
        .expect("add note");

    let time = now + Duration::minutes(5);
    let updated = store
        .set_notification_time(note.id, Some(time))
        .expect("set reminder");
    assert_eq!(
        updated.notification_time.map(|t| t.timestamp_millis()),
        Some(time.timestamp_millis())
    );

    let cleared = store
        .set_notification_time(note.id, None)
        .expect("clear reminder");
    assert!(cleared.notification_time.is_none());

    let loaded = store.load().expect("load notes");
    assert!(loaded[0].notification_time.is_none());
}
