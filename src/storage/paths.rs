use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const BACKUP_EXTENSION: &str = "bak";

/// Derives the storage directory and backup path from the primary file path.
///
/// Pure path computation; nothing here touches the filesystem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathResolver {
    file: Option<PathBuf>,
}

impl PathResolver {
    pub fn new(file: Option<PathBuf>) -> Self {
        Self { file }
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn is_configured(&self) -> bool {
        self.file.is_some()
    }

    /// Absolute parent directory of the primary file, `None` when no file is
    /// configured.
    pub fn base_dir(&self) -> Option<PathBuf> {
        let file = self.file.as_deref()?;
        let absolute = absolutize(file);
        Some(match absolute.parent() {
            Some(parent) => parent.to_path_buf(),
            None => absolute,
        })
    }

    /// `<file>.bak`, `None` when no file is configured.
    pub fn backup_path(&self) -> Option<PathBuf> {
        let file = self.file.as_deref()?;
        let mut name = OsString::from(file.as_os_str());
        name.push(".");
        name.push(BACKUP_EXTENSION);
        Some(PathBuf::from(name))
    }
}

/// Lexical absolute path. Falls back to the path as given if the current
/// directory cannot be determined.
fn absolutize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
