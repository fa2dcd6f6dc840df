use crate::error::PersistError;
use crate::workorder::config::StoreConfig;
use crate::workorder::model::Store;
use fs2::FileExt;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct GuardOptions {
    pub wipe_threshold: usize,
    pub seed_last_number: u32,
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self::from(&StoreConfig::default())
    }
}

impl From<&StoreConfig> for GuardOptions {
    fn from(cfg: &StoreConfig) -> Self {
        Self {
            wipe_threshold: cfg.wipe_threshold,
            seed_last_number: cfg.seed_last_number,
        }
    }
}

#[derive(Debug, Clone)]
pub enum LoadState {
    Missing,
    Unreadable(String),
    Loaded(Store),
}

/// Owns every read and write of the store file.
#[derive(Debug, Clone)]
pub struct PersistenceGuard {
    db_path: PathBuf,
    options: GuardOptions,
}

/// A fully written temporary sibling of the store file, not yet renamed
/// into place. Dropping it removes the temporary file.
pub(crate) struct StagedWrite {
    temp: NamedTempFile,
}

struct StoreLock {
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn lock_path_for(db_path: &Path) -> PathBuf {
    let mut name = db_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    db_path.with_file_name(name)
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

pub fn to_pretty_json(store: &Store) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    store.serialize(&mut ser)?;
    out.push(b'\n');
    Ok(out)
}

impl PersistenceGuard {
    pub fn new(db_path: impl Into<PathBuf>, options: GuardOptions) -> Self {
        Self {
            db_path: db_path.into(),
            options,
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn inspect(&self) -> LoadState {
        let raw = match fs::read_to_string(&self.db_path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return LoadState::Missing,
            Err(err) => return LoadState::Unreadable(format!("read failed: {err}")),
        };
        match serde_json::from_str::<Store>(&raw) {
            Ok(store) => LoadState::Loaded(store),
            Err(err) => LoadState::Unreadable(format!("parse failed: {err}")),
        }
    }

    /// Missing and unreadable files both start a fresh store. An unreadable
    /// file is still protected from `save`.
    pub fn load(&self) -> Store {
        match self.inspect() {
            LoadState::Loaded(store) => store,
            LoadState::Missing => {
                debug!(path = %self.db_path.display(), "store file missing, starting empty");
                Store::empty(self.options.seed_last_number)
            }
            LoadState::Unreadable(reason) => {
                warn!(path = %self.db_path.display(), %reason, "store file unreadable, starting empty");
                Store::empty(self.options.seed_last_number)
            }
        }
    }

    /// Refuses to replace a store file that exists but cannot be parsed.
    pub fn save(&self, store: &Store) -> Result<PathBuf, PersistError> {
        self.save_with(store, false)
    }

    /// Like [`save`](Self::save), but an unparseable store file on disk is
    /// overwritten.
    pub fn save_replacing_unreadable(&self, store: &Store) -> Result<PathBuf, PersistError> {
        self.save_with(store, true)
    }

    fn save_with(&self, store: &Store, replace_unreadable: bool) -> Result<PathBuf, PersistError> {
        let _lock = self.lock()?;
        self.check(store, replace_unreadable)?;
        let staged = self.stage(store)?;
        let path = self.commit(staged)?;
        info!(
            path = %path.display(),
            records = store.records.len(),
            last_number = store.last_number,
            "store saved"
        );
        Ok(path)
    }

    fn io_error(&self, source: std::io::Error) -> PersistError {
        PersistError::Io {
            path: self.db_path.clone(),
            source,
        }
    }

    fn lock(&self) -> Result<StoreLock, PersistError> {
        let dir = parent_dir(&self.db_path);
        fs::create_dir_all(&dir).map_err(|e| self.io_error(e))?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(lock_path_for(&self.db_path))
            .map_err(|e| self.io_error(e))?;
        FileExt::lock_exclusive(&file).map_err(|e| self.io_error(e))?;
        Ok(StoreLock { file })
    }

    fn check(&self, store: &Store, replace_unreadable: bool) -> Result<(), PersistError> {
        let issues = store.validate();
        if !issues.is_empty() {
            let reason = issues
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            warn!(path = %self.db_path.display(), %reason, "refusing to save invalid store");
            return Err(PersistError::Invalid(reason));
        }

        match self.inspect() {
            LoadState::Unreadable(reason) if !replace_unreadable => {
                warn!(
                    path = %self.db_path.display(),
                    %reason,
                    "refusing to overwrite unreadable store file"
                );
                Err(PersistError::UnreadableExisting {
                    path: self.db_path.clone(),
                    reason,
                })
            }
            LoadState::Loaded(existing)
                if store.records.is_empty()
                    && existing.records.len() > self.options.wipe_threshold =>
            {
                let existing = existing.records.len();
                warn!(
                    path = %self.db_path.display(),
                    existing,
                    threshold = self.options.wipe_threshold,
                    "anti-wipe guard blocked an empty save"
                );
                Err(PersistError::AntiWipe {
                    existing,
                    threshold: self.options.wipe_threshold,
                })
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn stage(&self, store: &Store) -> Result<StagedWrite, PersistError> {
        let bytes = to_pretty_json(store)?;
        let dir = parent_dir(&self.db_path);
        fs::create_dir_all(&dir).map_err(|e| self.io_error(e))?;
        let mut temp = NamedTempFile::new_in(&dir).map_err(|e| self.io_error(e))?;
        temp.write_all(&bytes).map_err(|e| self.io_error(e))?;
        temp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        Ok(StagedWrite { temp })
    }

    pub(crate) fn commit(&self, staged: StagedWrite) -> Result<PathBuf, PersistError> {
        staged
            .temp
            .persist(&self.db_path)
            .map_err(|e| self.io_error(e.error))?;
        Ok(self.db_path.clone())
    }
}
