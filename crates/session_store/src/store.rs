use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use time::OffsetDateTime;

use crate::envfile::EnvFile;
use crate::error::SessionStoreError;
use crate::paths::{backup_path, backup_timestamp, local_now, parent_dir};

/// Store key holding the active thread id.
pub const THREAD_KEY: &str = "GPT_THREAD";
/// Store key holding the default assistant id.
pub const ASSISTANT_KEY: &str = "ASSISTANT_ID";

/// Upper bound on `-N` suffixes tried when backup names collide.
const MAX_BACKUP_ATTEMPTS: u32 = 1000;

/// Thread and assistant ids persisted between invocations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionRecord {
    pub thread_id: Option<String>,
    pub assistant_id: Option<String>,
}

/// Handle to the `KEY=value` file that remembers the active session.
///
/// Opening performs no I/O. A missing file reads as empty; every write
/// replaces the whole file atomically and keeps unrelated lines intact.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Parses the current file contents, or an empty file when absent.
    pub fn load(&self) -> Result<EnvFile, SessionStoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => EnvFile::parse(&self.path, &contents),
            Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(EnvFile::default()),
            Err(source) => Err(SessionStoreError::io("reading store", &self.path, source)),
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, SessionStoreError> {
        Ok(self.load()?.get(key).map(str::to_string))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), SessionStoreError> {
        self.set_many(&[(key, value)])
    }

    /// Applies every assignment and writes the file once.
    pub fn set_many(&self, assignments: &[(&str, &str)]) -> Result<(), SessionStoreError> {
        let mut file = self.load()?;
        for (key, value) in assignments {
            file.set(key, value)?;
        }
        self.write_atomic(&file.render())?;
        tracing::debug!(
            path = %self.path.display(),
            keys = ?assignments.iter().map(|(key, _)| *key).collect::<Vec<_>>(),
            "store updated"
        );
        Ok(())
    }

    pub fn session(&self) -> Result<SessionRecord, SessionStoreError> {
        let file = self.load()?;
        Ok(SessionRecord {
            thread_id: non_empty(file.get(THREAD_KEY)),
            assistant_id: non_empty(file.get(ASSISTANT_KEY)),
        })
    }

    /// Persists the active thread, and the assistant when one is given.
    pub fn record_session(
        &self,
        thread_id: &str,
        assistant_id: Option<&str>,
    ) -> Result<(), SessionStoreError> {
        match assistant_id {
            Some(assistant_id) => {
                self.set_many(&[(THREAD_KEY, thread_id), (ASSISTANT_KEY, assistant_id)])
            }
            None => self.set(THREAD_KEY, thread_id),
        }
    }

    /// Creates an empty store file when none exists. Returns whether it was created.
    pub fn ensure_exists(&self) -> Result<bool, SessionStoreError> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(_) => {
                tracing::info!(path = %self.path.display(), "created empty store");
                Ok(true)
            }
            Err(source) if source.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(source) => Err(SessionStoreError::io("creating store", &self.path, source)),
        }
    }

    /// Copies the store to a timestamped sibling using the local clock.
    pub fn backup(&self) -> Result<Option<PathBuf>, SessionStoreError> {
        self.backup_at(local_now())
    }

    /// Copies the store byte-for-byte to `<file>.<stamp>`, never overwriting
    /// an earlier backup. A missing store is created empty and `None` returned.
    pub fn backup_at(&self, now: OffsetDateTime) -> Result<Option<PathBuf>, SessionStoreError> {
        if self.ensure_exists()? {
            return Ok(None);
        }

        let bytes = fs::read(&self.path)
            .map_err(|source| SessionStoreError::io("reading store", &self.path, source))?;
        let stamp = backup_timestamp(now)?;

        for attempt in 0..MAX_BACKUP_ATTEMPTS {
            let target = backup_path(&self.path, &stamp, attempt);
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&target) {
                Ok(file) => file,
                Err(source) if source.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(source) => {
                    return Err(SessionStoreError::io("creating backup", &target, source))
                }
            };
            write_all_synced(&mut file, &bytes)
                .map_err(|source| SessionStoreError::io("writing backup", &target, source))?;
            tracing::info!(backup = %target.display(), "store backed up");
            return Ok(Some(target));
        }

        Err(SessionStoreError::io(
            "creating backup",
            backup_path(&self.path, &stamp, MAX_BACKUP_ATTEMPTS),
            io::Error::new(
                io::ErrorKind::AlreadyExists,
                "every backup name for this timestamp is taken",
            ),
        ))
    }

    fn write_atomic(&self, contents: &str) -> Result<(), SessionStoreError> {
        let dir = parent_dir(&self.path);
        let mut temp = NamedTempFile::new_in(dir)
            .map_err(|source| SessionStoreError::io("creating temp file", dir, source))?;
        write_all_synced(temp.as_file_mut(), contents.as_bytes())
            .map_err(|source| SessionStoreError::io("writing temp file", temp.path(), source))?;
        temp.persist(&self.path)
            .map_err(|error| SessionStoreError::io("replacing store", &self.path, error.error))?;
        Ok(())
    }
}

fn write_all_synced(file: &mut File, bytes: &[u8]) -> io::Result<()> {
    file.write_all(bytes)?;
    file.sync_all()
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
