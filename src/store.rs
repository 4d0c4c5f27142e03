use crate::classify::{ClipboardSnapshot, classify};
use crate::clipboard::ClipboardSink;
use crate::entry::{ClipboardEntry, EntryId};
use crate::storage::HistoryFile;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// Owns the clipboard history, newest first, and is the only thing that
/// writes to the system clipboard on the history's behalf.
pub struct ClipboardStore {
    history: VecDeque<ClipboardEntry>,
    file: HistoryFile,
    sink: Box<dyn ClipboardSink>,
    limit: usize,
    last_written: Option<String>,
    writable: bool,
}

impl ClipboardStore {
    /// `limit` of zero keeps every entry.
    pub fn new(file: HistoryFile, sink: Box<dyn ClipboardSink>, limit: usize) -> Self {
        Self {
            history: VecDeque::new(),
            file,
            sink,
            limit,
            last_written: None,
            writable: true,
        }
    }

    /// Replaces the in-memory history with what is on disk. Never fails:
    /// an unreadable file leaves the history empty and is moved aside. If
    /// it cannot be moved, nothing is saved until a later load succeeds.
    pub fn load_history(&mut self) {
        match self.file.load() {
            Ok(entries) => {
                self.writable = true;
                self.history = entries.into();
                self.apply_limit();
                tracing::info!(
                    entries = self.history.len(),
                    path = %self.file.path().display(),
                    "history loaded"
                );
            }
            Err(err) => {
                tracing::warn!(error = %err, "history unreadable, starting empty");
                self.history.clear();
                match self.file.set_aside() {
                    Ok(backup) => {
                        tracing::warn!(backup = %backup.display(), "unreadable history moved aside");
                        self.writable = true;
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "unreadable history left in place, saving disabled");
                        self.writable = false;
                    }
                }
            }
        }
    }

    pub fn entries(&self) -> impl ExactSizeIterator<Item = &ClipboardEntry> + '_ {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn get(&self, id: EntryId) -> Option<&ClipboardEntry> {
        self.history.iter().find(|entry| entry.id() == id)
    }

    pub fn get_index(&self, index: usize) -> Option<&ClipboardEntry> {
        self.history.get(index)
    }

    /// Puts the entry's payload on the system clipboard. History order is
    /// left untouched.
    pub fn copy_to_clipboard(&mut self, entry: &ClipboardEntry) -> Result<()> {
        self.sink
            .write(entry.content())
            .with_context(|| format!("copy {} entry {}", entry.data_type(), entry.id()))?;
        self.last_written = Some(entry.content().fingerprint());
        tracing::info!(id = %entry.id(), kind = %entry.data_type(), "copied to clipboard");
        Ok(())
    }

    pub fn copy_entry(&mut self, id: EntryId) -> Result<()> {
        let entry = self
            .get(id)
            .cloned()
            .with_context(|| format!("no history entry {id}"))?;
        self.copy_to_clipboard(&entry)
    }

    /// Empties the history and deletes the persisted copy.
    pub fn clear_history(&mut self) -> Result<()> {
        let dropped = self.history.len();
        self.history.clear();
        self.last_written = None;
        self.file.clear()?;
        self.writable = true;
        tracing::info!(dropped, "history cleared");
        Ok(())
    }

    /// Classifies new clipboard content and prepends it as an entry.
    /// Returns `None` when there was nothing to record, when the content
    /// repeats the newest entry, or when it is the echo of our own copy.
    /// Only the first change after a copy can be its echo.
    pub fn record_new_clipboard_content(
        &mut self,
        snapshot: &ClipboardSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Option<EntryId>> {
        let Some(content) = classify(snapshot)? else {
            return Ok(None);
        };
        let echo = self.last_written.take();
        if echo.is_some_and(|written| written == content.fingerprint()) {
            tracing::debug!(kind = %content.data_type(), "ignoring our own clipboard write");
            return Ok(None);
        }
        if self.history.front().map(|head| head.content()) == Some(&content) {
            tracing::debug!(kind = %content.data_type(), "ignoring repeat of newest entry");
            return Ok(None);
        }

        let entry = ClipboardEntry::new(content, now);
        let id = entry.id();
        tracing::info!(id = %id, kind = %entry.data_type(), "recorded clipboard entry");
        self.history.push_front(entry);
        self.apply_limit();
        self.persist()?;
        Ok(Some(id))
    }

    fn persist(&self) -> Result<()> {
        if !self.writable {
            tracing::warn!(path = %self.file.path().display(), "history not saved");
            return Ok(());
        }
        self.file.save(&self.history)
    }

    fn apply_limit(&mut self) {
        if self.limit > 0 && self.history.len() > self.limit {
            self.history.truncate(self.limit);
        }
    }
}
