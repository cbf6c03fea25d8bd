//! Durable consume log: append-only, fsynced, single-writer.
//!
//! The in-memory consumed set is authoritative for the running process;
//! this file backing makes consumption survive a restart. Each consumed
//! confirmation id is written as one line and fsynced before the caller
//! proceeds. An exclusive advisory lock held for the lifetime of the
//! handle keeps a second process from interleaving writes.
//!
//! On open, the log is replayed line-by-line. A torn final line (a crash
//! mid-write, before fsync returned) is truncated away and startup
//! continues: if the fsync never completed, the consume was never
//! acknowledged, so dropping the record cannot enable a replay.
//! Corruption anywhere else fails closed.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;

use super::ConfirmError;
use crate::validate::{IdKind, validate_uuid_v4};

/// Append-only file-backed record of consumed confirmation ids.
pub struct FileBackedConsumeLog {
    path: PathBuf,
    replayed: HashSet<String>,
    file: Mutex<File>,
}

impl std::fmt::Debug for FileBackedConsumeLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBackedConsumeLog")
            .field("path", &self.path)
            .field("replayed", &self.replayed.len())
            .finish_non_exhaustive()
    }
}

impl FileBackedConsumeLog {
    /// Opens or creates the consume log at `path`, replaying existing
    /// entries and taking the exclusive writer lock.
    ///
    /// # Errors
    ///
    /// [`ConfirmError::Durable`] if the file cannot be opened or is
    /// locked by another process; [`ConfirmError::CorruptConsumeLog`]
    /// on mid-file corruption.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ConfirmError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .truncate(false)
            .append(true)
            .open(&path)?;
        file.try_lock_exclusive().map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                format!(
                    "consume log is locked by another process ({}): {e}",
                    path.display()
                ),
            )
        })?;

        let mut replayed = HashSet::new();
        let mut truncate_to: Option<u64> = None;
        {
            let mut reader_handle = file.try_clone()?;
            reader_handle.seek(SeekFrom::Start(0))?;
            let reader = BufReader::new(&mut reader_handle);
            let lines: Vec<String> = reader.lines().collect::<Result<_, _>>()?;
            let count = lines.len();

            let mut offset: u64 = 0;
            for (idx, line) in lines.iter().enumerate() {
                let trimmed = line.trim();
                let line_len = (line.len() + 1) as u64;
                if trimmed.is_empty() {
                    offset += line_len;
                    continue;
                }
                match validate_uuid_v4(trimmed, IdKind::Confirmation) {
                    Ok(_) => {
                        replayed.insert(trimmed.to_string());
                    },
                    Err(e) if idx == count - 1 => {
                        tracing::warn!(
                            line = idx + 1,
                            path = %path.display(),
                            reason = %e,
                            "truncating torn tail record from consume log"
                        );
                        truncate_to = Some(offset);
                    },
                    Err(e) => {
                        return Err(ConfirmError::CorruptConsumeLog {
                            line: idx + 1,
                            reason: e.to_string(),
                        });
                    },
                }
                offset += line_len;
            }
        }

        if let Some(pos) = truncate_to {
            let truncating = OpenOptions::new().write(true).open(&path)?;
            truncating.set_len(pos)?;
            truncating.sync_all()?;
        }

        Ok(Self {
            path,
            replayed,
            file: Mutex::new(file),
        })
    }

    /// The ids replayed from disk at open time.
    #[must_use]
    pub const fn replayed(&self) -> &HashSet<String> {
        &self.replayed
    }

    /// The log's path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durably records `confirmation_id` as consumed.
    ///
    /// Returns only after the record is fsynced.
    ///
    /// # Errors
    ///
    /// [`ConfirmError::Durable`] on any write or sync failure; the
    /// caller must treat that as consumption-denied (fail closed).
    pub fn record(&self, confirmation_id: &str) -> Result<(), ConfirmError> {
        let mut file = self.file.lock().expect("consume log lock poisoned");
        writeln!(file, "{confirmation_id}")?;
        file.sync_all()?;
        Ok(())
    }
}
