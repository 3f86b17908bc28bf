use std::sync::Arc;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::cli::CliCommand;
use crate::config::Config;
use crate::datetime::{format_local, parse_date_expr};
use crate::note::Note;
use crate::notify::SchedulingClient;
use crate::notify::platform::DesktopPlatform;
use crate::render::{Renderer, short_id};
use crate::store::NoteStore;

#[instrument(skip(store, cfg, renderer, command))]
pub fn dispatch(
    store: &NoteStore,
    cfg: &Config,
    renderer: &mut Renderer,
    command: CliCommand,
) -> anyhow::Result<()> {
    let now = Utc::now();
    debug!(?command, "dispatching command");

    match command {
        CliCommand::Add {
            title,
            content,
            remind,
        } => cmd_add(store, title, content, remind, now),
        CliCommand::List => cmd_list(store, renderer, now),
        CliCommand::Show { id } => cmd_show(store, renderer, &id),
        CliCommand::Delete { id } => cmd_delete(store, &id),
        CliCommand::Remind { id, time } => cmd_remind(store, &id, &time, now),
        CliCommand::Cancel { id } => cmd_cancel(store, &id),
        CliCommand::Notify { id } => cmd_notify(store, cfg, &id),
        CliCommand::Watch => cmd_watch(store, cfg),
    }
}

#[instrument(skip(store, title, content, remind, now))]
fn cmd_add(
    store: &NoteStore,
    title: String,
    content: String,
    remind: Option<String>,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let mut note = Note::new(title, content, now);

    if let Some(expr) = remind {
        let time = parse_date_expr(&expr, now)?;
        note.notification_time = Some(time);
    }

    let note = store.add_note(note)?;

    match note.notification_time {
        Some(time) if time <= now => {
            println!(
                "Created note {} (reminder {} is already past and will never fire)",
                short_id(&note),
                format_local(time)
            );
        }
        Some(time) => {
            println!(
                "Created note {} (reminder {})",
                short_id(&note),
                format_local(time)
            );
        }
        None => println!("Created note {}", short_id(&note)),
    }

    Ok(())
}

fn cmd_list(store: &NoteStore, renderer: &mut Renderer, now: DateTime<Utc>) -> anyhow::Result<()> {
    let notes = store.load()?;
    renderer.print_note_table(&notes, now)
}

fn cmd_show(store: &NoteStore, renderer: &mut Renderer, raw_id: &str) -> anyhow::Result<()> {
    let notes = store.load()?;
    let note = resolve_note(&notes, raw_id)?;
    renderer.print_note_info(&note)
}

#[instrument(skip(store))]
fn cmd_delete(store: &NoteStore, raw_id: &str) -> anyhow::Result<()> {
    let notes = store.load()?;
    let note = resolve_note(&notes, raw_id)?;

    store.delete_note(note.id)?;
    println!("Deleted note {}", short_id(&note));
    Ok(())
}

#[instrument(skip(store, now))]
fn cmd_remind(
    store: &NoteStore,
    raw_id: &str,
    time_expr: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let notes = store.load()?;
    let note = resolve_note(&notes, raw_id)?;

    let time = parse_date_expr(time_expr, now)?;
    store.set_notification_time(note.id, Some(time))?;

    if time <= now {
        println!(
            "Reminder for {} set to {} (already past; it will never fire)",
            short_id(&note),
            format_local(time)
        );
    } else {
        println!(
            "Reminder for {} set to {}",
            short_id(&note),
            format_local(time)
        );
    }
    Ok(())
}

#[instrument(skip(store))]
fn cmd_cancel(store: &NoteStore, raw_id: &str) -> anyhow::Result<()> {
    let notes = store.load()?;
    let note = resolve_note(&notes, raw_id)?;

    store.set_notification_time(note.id, None)?;
    println!("Cleared reminder for {}", short_id(&note));
    Ok(())
}

#[instrument(skip(store, cfg))]
fn cmd_notify(store: &NoteStore, cfg: &Config, raw_id: &str) -> anyhow::Result<()> {
    let notes = store.load()?;
    let note = resolve_note(&notes, raw_id)?;

    let runtime = build_runtime()?;
    runtime.block_on(async {
        let platform = Arc::new(DesktopPlatform::from_config(cfg));
        let mut client = SchedulingClient::new(platform);
        client.initialize().await;
        client.show_immediate_notification(&note.title, &note.content);
        client.shutdown().await;
    });

    Ok(())
}

/// Runs the reminder session: every stored future reminder is handed to the
/// background notifier, then the session waits for Ctrl-C. Reminders are
/// not durable; whatever has not fired when the session ends is gone until
/// the next session schedules it again.
#[instrument(skip(store, cfg))]
fn cmd_watch(store: &NoteStore, cfg: &Config) -> anyhow::Result<()> {
    let runtime = build_runtime()?;
    runtime.block_on(async {
        let platform = Arc::new(DesktopPlatform::from_config(cfg));
        let mut client = SchedulingClient::new(platform);
        client.initialize().await;

        let now = Utc::now();
        let notes = store.load()?;
        let mut scheduled = 0usize;

        for note in &notes {
            let Some(time) = note.notification_time else {
                continue;
            };
            if !note.has_pending_reminder(now) {
                debug!(id = %note.id, "stored reminder already overdue; skipping");
                continue;
            }

            client
                .schedule_notification(&note.id.to_string(), &note.title, &note.content, time)
                .await;
            scheduled += 1;
        }

        println!("Holding {scheduled} reminder(s). Press Ctrl-C to exit.");
        tokio::signal::ctrl_c()
            .await
            .context("failed waiting for interrupt")?;

        info!("interrupt received; shutting down");
        client.shutdown().await;
        Ok(())
    })
}

fn build_runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}

/// Looks a note up by full UUID or by unambiguous hyphenless prefix, the
/// form listings display.
fn resolve_note(notes: &[Note], raw: &str) -> anyhow::Result<Note> {
    if let Ok(id) = Uuid::parse_str(raw) {
        return notes
            .iter()
            .find(|note| note.id == id)
            .cloned()
            .ok_or_else(|| anyhow!("note not found: {raw}"));
    }

    let needle = raw.replace('-', "").to_ascii_lowercase();
    if needle.is_empty() {
        return Err(anyhow!("empty note id"));
    }

    let matches: Vec<&Note> = notes
        .iter()
        .filter(|note| note.id.simple().to_string().starts_with(&needle))
        .collect();

    match matches.as_slice() {
        [] => Err(anyhow!("note not found: {raw}")),
        [single] => Ok((*single).clone()),
        _ => Err(anyhow!(
            "ambiguous note id prefix: {raw} ({} matches)",
            matches.len()
        )),
    }
}
