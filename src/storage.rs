use crate::entry::ClipboardEntry;
use anyhow::{Context, Result};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create dir {}", path.display()))?;
    Ok(())
}

pub fn default_history_path() -> Result<PathBuf> {
    let proj = directories::ProjectDirs::from("com", "clipshelf", "clipshelf")
        .context("resolve data dir")?;
    Ok(proj.data_dir().join("history.jsonl"))
}

/// Released when dropped or when the process exits.
#[derive(Debug)]
pub struct HistoryLock {
    _file: fs::File,
}

/// Clipboard history persisted as JSON Lines, newest entry first.
#[derive(Debug, Clone)]
pub struct HistoryFile {
    path: PathBuf,
}

impl HistoryFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file is an empty history. Lines that fail to parse, including
    /// lines that are not valid UTF-8, or that parse into an entry with an
    /// empty payload, are skipped one by one.
    pub fn load(&self) -> Result<Vec<ClipboardEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let bytes =
            fs::read(&self.path).with_context(|| format!("read history {}", self.path.display()))?;
        let mut entries = Vec::new();
        for (idx, line) in bytes.split(|byte| *byte == b'\n').enumerate() {
            let line = line.trim_ascii();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_slice::<ClipboardEntry>(line) {
                Ok(entry) if entry.content().is_well_formed() => entries.push(entry),
                Ok(entry) => {
                    tracing::warn!(line = idx + 1, id = %entry.id(), "skipping empty history record");
                }
                Err(err) => {
                    tracing::warn!(line = idx + 1, error = %err, "skipping malformed history record");
                }
            }
        }
        Ok(entries)
    }

    /// Moves an unreadable history out of the way so the next save cannot
    /// overwrite it. Returns where it went.
    pub fn set_aside(&self) -> Result<PathBuf> {
        let backup = self.sibling(".bak");
        fs::rename(&self.path, &backup).with_context(|| {
            format!("move {} to {}", self.path.display(), backup.display())
        })?;
        Ok(backup)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.sibling(".lock")
    }

    /// Takes the lock held by the tray process for as long as it runs.
    pub fn lock(&self) -> Result<HistoryLock> {
        let file = self.open_lock_file()?;
        match file.try_lock() {
            Ok(()) => Ok(HistoryLock { _file: file }),
            Err(fs::TryLockError::WouldBlock) => anyhow::bail!(
                "history {} is in use by another clipshelf process",
                self.path.display()
            ),
            Err(fs::TryLockError::Error(err)) => {
                Err(err).with_context(|| format!("lock {}", self.lock_path().display()))
            }
        }
    }

    fn open_lock_file(&self) -> Result<fs::File> {
        if let Some(parent) = self.path.parent() {
            ensure_dir(parent)?;
        }
        let path = self.lock_path();
        fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("open lock {}", path.display()))
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }

    pub fn save<'a, I>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a ClipboardEntry>,
    {
        if let Some(parent) = self.path.parent() {
            ensure_dir(parent)?;
        }
        let tmp = self.path.with_extension("partial");
        let file = fs::File::create(&tmp)
            .with_context(|| format!("create history file {}", tmp.display()))?;
        let mut writer = BufWriter::new(file);
        for entry in entries {
            serde_json::to_writer(&mut writer, entry).context("serialize history entry")?;
            writer.write_all(b"\n")?;
        }
        writer
            .flush()
            .with_context(|| format!("write history file {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("finalize history {}", self.path.display()))?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("remove history {}", self.path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryContent;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn text_entry(text: &str, minute: u32) -> ClipboardEntry {
        let at = Utc
            .with_ymd_and_hms(2024, 5, 1, 10, minute, 0)
            .single()
            .expect("valid time");
        ClipboardEntry::new(
            EntryContent::Text {
                text: text.to_string(),
            },
            at,
        )
    }

    #[test]
    fn missing_file_is_empty_history() -> Result<()> {
        let dir = tempdir()?;
        let file = HistoryFile::new(dir.path().join("history.jsonl"));
        assert!(file.load()?.is_empty());
        Ok(())
    }

    #[test]
    fn save_creates_parent_dir_and_preserves_order() -> Result<()> {
        let dir = tempdir()?;
        let file = HistoryFile::new(dir.path().join("nested").join("history.jsonl"));
        let entries = vec![text_entry("newest", 2), text_entry("older", 1)];
        file.save(&entries)?;
        assert!(!file.path().with_extension("partial").exists());
        assert_eq!(file.load()?, entries);
        assert_eq!(file.load()?, file.load()?);
        Ok(())
    }

    #[test]
    fn malformed_lines_are_skipped() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("history.jsonl");
        let good = text_entry("keep me", 0);
        let empty = text_entry("   ", 0);
        let contents = format!(
            "{}\n{{not json\n\n{}\n{{\"id\":\"x\"}}\n",
            serde_json::to_string(&good)?,
            serde_json::to_string(&empty)?
        );
        fs::write(&path, contents)?;
        let loaded = HistoryFile::new(path).load()?;
        assert_eq!(loaded, vec![good]);
        Ok(())
    }

    #[test]
    fn invalid_utf8_line_only_loses_that_line() -> Result<()> {
        let dir = tempdir()?;
        let file = HistoryFile::new(dir.path().join("history.jsonl"));
        let kept = vec![text_entry("newest", 3), text_entry("middle", 2), text_entry("oldest", 1)];
        file.save(&kept)?;
        let mut bytes = fs::read(file.path())?;
        bytes.extend_from_slice(b"\xff\xfe garbage\n");
        fs::write(file.path(), bytes)?;
        assert_eq!(file.load()?, kept);
        Ok(())
    }

    #[test]
    fn set_aside_keeps_unreadable_history() -> Result<()> {
        let dir = tempdir()?;
        let file = HistoryFile::new(dir.path().join("history.jsonl"));
        fs::write(file.path(), b"old bytes")?;
        let backup = file.set_aside()?;
        assert_eq!(backup, dir.path().join("history.jsonl.bak"));
        assert!(!file.path().exists());
        assert_eq!(fs::read(backup)?, b"old bytes");
        Ok(())
    }

    #[test]
    fn lock_is_exclusive_until_dropped() -> Result<()> {
        let dir = tempdir()?;
        let file = HistoryFile::new(dir.path().join("data").join("history.jsonl"));
        let lock = file.lock()?;
        assert!(file.lock().is_err());
        assert!(HistoryFile::new(file.path().to_path_buf()).lock().is_err());
        drop(lock);
        let again = file.lock()?;
        assert!(file.lock_path().exists());
        drop(again);
        Ok(())
    }

    #[test]
    fn clear_removes_file_and_is_repeatable() -> Result<()> {
        let dir = tempdir()?;
        let file = HistoryFile::new(dir.path().join("history.jsonl"));
        file.save(&[text_entry("a", 0)])?;
        file.clear()?;
        assert!(!file.path().exists());
        file.clear()?;
        assert!(file.load()?.is_empty());
        Ok(())
    }
}
