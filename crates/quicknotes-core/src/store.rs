use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::note::Note;

/// Filename of the serialized note collection inside the data directory.
/// The UI layer reads and writes the same file.
const NOTES_FILE: &str = "notes.json";

#[derive(Debug)]
pub struct NoteStore {
    pub data_dir: PathBuf,
    pub notes_path: PathBuf,
}

impl NoteStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let notes_path = data_dir.join(NOTES_FILE);
        if !notes_path.exists() {
            fs::write(&notes_path, "[]")?;
        }

        info!(
            data_dir = %data_dir.display(),
            notes = %notes_path.display(),
            "opened note store"
        );

        Ok(Self {
            data_dir,
            notes_path,
        })
    }

    /// Loads the full note collection. A malformed file is discarded and
    /// replaced with an empty collection rather than surfaced as an error.
    #[tracing::instrument(skip(self))]
    pub fn load(&self) -> anyhow::Result<Vec<Note>> {
        let raw = fs::read_to_string(&self.notes_path)
            .with_context(|| format!("failed reading {}", self.notes_path.display()))?;

        match serde_json::from_str::<Vec<Note>>(&raw) {
            Ok(notes) => {
                debug!(count = notes.len(), "loaded notes");
                Ok(notes)
            }
            Err(err) => {
                warn!(
                    file = %self.notes_path.display(),
                    error = %err,
                    "stored notes are malformed; resetting to empty collection"
                );
                self.save(&[])?;
                Ok(Vec::new())
            }
        }
    }

    #[tracing::instrument(skip(self, notes))]
    pub fn save(&self, notes: &[Note]) -> anyhow::Result<()> {
        debug!(
            file = %self.notes_path.display(),
            count = notes.len(),
            "saving notes atomically"
        );

        let dir = self
            .notes_path
            .parent()
            .unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)?;
        let serialized = serde_json::to_string_pretty(notes)?;
        temp.write_all(serialized.as_bytes())?;
        temp.flush()?;

        temp.persist(&self.notes_path)
            .map_err(|err| anyhow!("failed to persist {}: {}", self.notes_path.display(), err))?;

        Ok(())
    }

    #[tracing::instrument(skip(self, note), fields(id = %note.id, title = %note.title))]
    pub fn add_note(&self, note: Note) -> anyhow::Result<Note> {
        let mut notes = self.load()?;
        notes.push(note.clone());
        self.save(&notes)?;
        Ok(note)
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn get_note(&self, id: Uuid) -> anyhow::Result<Option<Note>> {
        let notes = self.load()?;
        Ok(notes.into_iter().find(|note| note.id == id))
    }

    /// Removes a note. Returns the removed note so the caller can cancel a
    /// pending reminder for it.
    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn delete_note(&self, id: Uuid) -> anyhow::Result<Option<Note>> {
        let mut notes = self.load()?;
        let idx = notes.iter().position(|note| note.id == id);

        let Some(idx) = idx else {
            return Ok(None);
        };

        let removed = notes.remove(idx);
        self.save(&notes)?;
        Ok(Some(removed))
    }

    /// Sets or clears a note's reminder time.
    #[tracing::instrument(skip(self, notification_time), fields(id = %id))]
    pub fn set_notification_time(
        &self,
        id: Uuid,
        notification_time: Option<chrono::DateTime<chrono::Utc>>,
    ) -> anyhow::Result<Note> {
        let mut notes = self.load()?;
        let note = notes
            .iter_mut()
            .find(|note| note.id == id)
            .ok_or_else(|| anyhow!("note not found: {id}"))?;

        note.notification_time = notification_time;
        let updated = note.clone();
        self.save(&notes)?;
        Ok(updated)
    }
}
