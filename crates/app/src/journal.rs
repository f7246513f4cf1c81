//! Conversation journal: completed turns appended as JSON lines.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use shared::events::{ConversationLog, LogEntry};

/// Rotate the journal once it passes 10 MB.
const MAX_JOURNAL_SIZE: u64 = 10 * 1024 * 1024;

/// Rotated journals kept next to the live one.
const MAX_ROTATED_FILES: usize = 3;

pub struct JsonlLog {
    dir: PathBuf,
    current: PathBuf,
    /// Serializes rotation and writes across concurrent turns.
    write_lock: Mutex<()>,
}

impl JsonlLog {
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create journal directory {:?}", dir))?;
        let current = dir.join("conversations.jsonl");
        Ok(Self {
            dir,
            current,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.current
    }

    fn rotated(&self, n: usize) -> PathBuf {
        self.dir.join(format!("conversations.{}.jsonl", n))
    }

    fn maybe_rotate(&self) -> Result<()> {
        let size = match fs::metadata(&self.current) {
            Ok(meta) => meta.len(),
            Err(_) => return Ok(()),
        };
        if size < MAX_JOURNAL_SIZE {
            return Ok(());
        }

        let oldest = self.rotated(MAX_ROTATED_FILES);
        if oldest.exists() {
            fs::remove_file(&oldest).with_context(|| format!("Failed to remove {:?}", oldest))?;
        }
        for n in (1..MAX_ROTATED_FILES).rev() {
            let from = self.rotated(n);
            if from.exists() {
                fs::rename(&from, self.rotated(n + 1))
                    .with_context(|| format!("Failed to rotate {:?}", from))?;
            }
        }
        fs::rename(&self.current, self.rotated(1))
            .with_context(|| format!("Failed to rotate {:?}", self.current))?;
        tracing::info!(path = ?self.current, "rotated conversation journal");
        Ok(())
    }
}

impl ConversationLog for JsonlLog {
    fn append(&self, entry: LogEntry) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.maybe_rotate()?;

        let json = serde_json::to_string(&entry).context("Failed to serialize journal entry")?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.current)
            .with_context(|| format!("Failed to open journal {:?}", self.current))?;
        writeln!(file, "{}", json).context("Failed to write journal entry")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_appends_one_line_per_turn() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlLog::new(dir.path().join("journal")).unwrap();

        log.append(LogEntry::completed(Uuid::new_v4(), "q1", "a1", 0, None))
            .unwrap();
        log.append(LogEntry::completed(
            Uuid::new_v4(),
            "q2",
            "a2",
            3,
            Some("docs".into()),
        ))
        .unwrap();

        let text = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: LogEntry = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.question, "q2");
        assert_eq!(second.matches, 3);
    }

    #[test]
    fn test_rotates_oversized_journal() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlLog::new(dir.path().to_path_buf()).unwrap();
        let file = fs::File::create(log.path()).unwrap();
        file.set_len(MAX_JOURNAL_SIZE).unwrap();

        log.append(LogEntry::completed(Uuid::new_v4(), "q", "a", 0, None))
            .unwrap();

        assert!(log.rotated(1).exists());
        assert_eq!(fs::read_to_string(log.path()).unwrap().lines().count(), 1);
    }
}
