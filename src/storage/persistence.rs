//! Save, backup, load and permission handling for the primary file.

use crate::core::{Format, KvError, MapConfig, Result, WriteStrategy};
use crate::storage::codec;
use crate::storage::fs::{FileSystem, OsFileSystem};
use crate::storage::paths::PathResolver;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of a successful save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The primary file now holds `bytes` bytes of serialized state.
    Written { bytes: usize },
    /// The map was empty; nothing on disk was touched.
    SkippedEmpty,
}

impl SaveOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, SaveOutcome::Written { .. })
    }
}

// ============================================================================
// File Store
// ============================================================================

/// Owns the primary/backup file pair for one map.
///
/// Each operation is synchronous and self-contained; there is no open handle
/// kept between calls and no locking against other writers.
#[derive(Debug)]
pub struct FileStore<F = OsFileSystem> {
    paths: PathResolver,
    backup: bool,
    mode: Option<u32>,
    format: Format,
    write_strategy: WriteStrategy,
    fs: F,
}

impl FileStore<OsFileSystem> {
    pub fn new(config: &MapConfig) -> Self {
        Self::with_fs(config, OsFileSystem)
    }
}

impl<F: FileSystem> FileStore<F> {
    pub fn with_fs(config: &MapConfig, fs: F) -> Self {
        Self {
            paths: PathResolver::new(config.file.clone()),
            backup: config.backup,
            mode: config.mode,
            format: config.effective_format(),
            write_strategy: config.write_strategy,
            fs,
        }
    }

    pub fn paths(&self) -> &PathResolver {
        &self.paths
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn backup_enabled(&self) -> bool {
        self.backup
    }

    pub fn mode(&self) -> Option<u32> {
        self.mode
    }

    /// Write `entries` to the primary file.
    ///
    /// An empty map is never written: the call succeeds without touching the
    /// disk, so an empty in-memory state cannot clobber a saved one.
    pub fn save<V: Serialize>(&self, entries: &BTreeMap<String, V>) -> Result<SaveOutcome> {
        if entries.is_empty() {
            debug!("map is empty, skipping save");
            return Ok(SaveOutcome::SkippedEmpty);
        }
        let file = self.require_file("save")?;

        self.ensure_base_dir()?;

        if self.backup {
            self.backup_before_write(file)?;
        }

        let bytes = codec::encode(self.format, entries)?;

        let written = match self.write_strategy {
            WriteStrategy::Truncate => self.fs.write_synced(file, &bytes),
            WriteStrategy::Replace => self.fs.replace_synced(file, &bytes),
        };
        written.map_err(|e| KvError::Write(format!("{}: {}", file.display(), e)))?;

        info!(
            path = %file.display(),
            bytes = bytes.len(),
            keys = entries.len(),
            "saved map"
        );

        if self.mode.is_some() {
            self.set_mode()?;
        }

        Ok(SaveOutcome::Written { bytes: bytes.len() })
    }

    /// Delete the primary file, then [`save`](Self::save).
    ///
    /// An empty map leaves the existing file in place, same as `save`.
    pub fn overwrite_save<V: Serialize>(&self, entries: &BTreeMap<String, V>) -> Result<SaveOutcome> {
        if entries.is_empty() {
            debug!("map is empty, skipping overwrite");
            return Ok(SaveOutcome::SkippedEmpty);
        }
        self.delete_file()?;
        self.save(entries)
    }

    /// Copy the primary file to the backup path.
    ///
    /// Returns `Ok(false)` when there is no primary file to copy.
    pub fn backup(&self) -> Result<bool> {
        let file = self.require_file("backup")?;
        let backup = self.backup_path_for("backup")?;

        if !self.fs.is_file(file) {
            debug!(path = %file.display(), "no primary file, nothing to back up");
            return Ok(false);
        }

        self.fs.copy(file, &backup).map_err(|e| {
            KvError::Backup(format!("{} -> {}: {}", file.display(), backup.display(), e))
        })?;

        info!(from = %file.display(), to = %backup.display(), "backed up primary file");
        Ok(true)
    }

    /// Read the primary file into key/value pairs.
    ///
    /// `Ok(None)` means there was nothing to load: no file configured, the
    /// file is missing or zero-length, or the document is null.
    pub fn load<V: DeserializeOwned>(&self) -> Result<Option<Vec<(String, V)>>> {
        let Some(file) = self.paths.file() else {
            debug!("no file configured, nothing to load");
            return Ok(None);
        };

        match self.fs.metadata(file) {
            Ok(meta) if meta.is_file && meta.len > 0 => {}
            Ok(meta) if meta.is_file => {
                debug!(path = %file.display(), "file is empty, nothing to load");
                return Ok(None);
            }
            Ok(_) => {
                return Err(KvError::Read(format!("{} is not a regular file", file.display())));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %file.display(), "file does not exist, nothing to load");
                return Ok(None);
            }
            Err(e) => return Err(KvError::Read(format!("{}: {}", file.display(), e))),
        }

        let bytes = self
            .fs
            .read(file)
            .map_err(|e| KvError::Read(format!("{}: {}", file.display(), e)))?;

        let pairs = codec::decode(self.format, &bytes).map_err(|e| match e {
            KvError::Deserialize(msg) => KvError::Deserialize(format!("{}: {}", file.display(), msg)),
            other => other,
        })?;

        if let Some(pairs) = &pairs {
            info!(path = %file.display(), keys = pairs.len(), "loaded map");
        }
        Ok(pairs)
    }

    /// Apply the configured mode to the primary and backup files.
    ///
    /// A missing backup file is fine; a failure on an existing file is not.
    pub fn set_mode(&self) -> Result<()> {
        let (Some(file), Some(mode)) = (self.paths.file(), self.mode) else {
            return Ok(());
        };

        if self.fs.exists(file) {
            self.chmod(file, mode)?;
        }

        if let Some(backup) = self.paths.backup_path() {
            if self.fs.exists(&backup) {
                self.chmod(&backup, mode)?;
            }
        }
        Ok(())
    }

    fn chmod(&self, path: &Path, mode: u32) -> Result<()> {
        self.fs
            .set_mode(path, mode)
            .map_err(|e| KvError::Permission(format!("{} to {:o}: {}", path.display(), mode, e)))?;
        debug!(path = %path.display(), mode = %format!("{:o}", mode), "applied file mode");
        Ok(())
    }

    fn backup_before_write(&self, file: &Path) -> Result<()> {
        match self.backup() {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(path = %file.display(), error = %e, "backup failed, refusing to overwrite");
                Err(e)
            }
        }
    }

    fn ensure_base_dir(&self) -> Result<()> {
        let Some(dir) = self.paths.base_dir() else {
            return Ok(());
        };
        match self.fs.metadata(&dir) {
            Ok(meta) if meta.is_dir => return Ok(()),
            Ok(_) => {
                return Err(KvError::DirectoryCreate(format!(
                    "{} exists and is not a directory",
                    dir.display()
                )));
            }
            Err(_) => {}
        }
        self.fs
            .create_dir_all(&dir)
            .map_err(|e| KvError::DirectoryCreate(format!("{}: {}", dir.display(), e)))?;
        debug!(path = %dir.display(), "created storage directory");
        Ok(())
    }

    fn delete_file(&self) -> Result<()> {
        let file = self.require_file("delete")?;
        match self.fs.remove_file(file) {
            Ok(()) => {
                debug!(path = %file.display(), "deleted primary file");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(KvError::Delete(format!("{}: {}", file.display(), e))),
        }
    }

    fn require_file(&self, operation: &str) -> Result<&Path> {
        self.paths
            .file()
            .ok_or_else(|| KvError::NotConfigured(format!("cannot {} without a file path", operation)))
    }

    fn backup_path_for(&self, operation: &str) -> Result<PathBuf> {
        self.paths
            .backup_path()
            .ok_or_else(|| KvError::NotConfigured(format!("cannot {} without a backup path", operation)))
    }
}
