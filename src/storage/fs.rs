//! Filesystem seam for the persistence layer.
//!
//! Every disk access made by [`FileStore`](crate::storage::FileStore) goes
//! through [`FileSystem`], so the save/backup/load logic can run against
//! [`MemoryFileSystem`](crate::storage::MemoryFileSystem) in tests.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Minimal metadata the persistence layer needs about a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMeta {
    pub len: u64,
    pub is_file: bool,
    pub is_dir: bool,
}

pub trait FileSystem {
    /// Metadata for `path`; `ErrorKind::NotFound` when it does not exist.
    fn metadata(&self, path: &Path) -> io::Result<FileMeta>;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Truncating write that returns only after the bytes reached stable storage.
    fn write_synced(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;

    /// Write a synced sibling temp file and rename it over `path`.
    fn replace_synced(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool {
        self.metadata(path).is_ok()
    }

    fn is_file(&self, path: &Path) -> bool {
        self.metadata(path).map(|meta| meta.is_file).unwrap_or(false)
    }
}

impl<T: FileSystem + ?Sized> FileSystem for &T {
    fn metadata(&self, path: &Path) -> io::Result<FileMeta> {
        (**self).metadata(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        (**self).create_dir_all(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        (**self).read(path)
    }

    fn write_synced(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        (**self).write_synced(path, bytes)
    }

    fn replace_synced(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        (**self).replace_synced(path, bytes)
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        (**self).copy(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        (**self).remove_file(path)
    }

    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        (**self).set_mode(path, mode)
    }
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn metadata(&self, path: &Path) -> io::Result<FileMeta> {
        let meta = fs::metadata(path)?;
        Ok(FileMeta {
            len: meta.len(),
            is_file: meta.is_file(),
            is_dir: meta.is_dir(),
        })
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write_synced(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.write_all(bytes)?;
        file.flush()?;
        file.sync_all()
    }

    fn replace_synced(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        // Temp files are created 0600; keep the primary's existing permissions.
        match fs::metadata(path) {
            Ok(meta) => temp.as_file().set_permissions(meta.permissions())?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        temp.write_all(bytes)?;
        temp.flush()?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| e.error)?;

        #[cfg(unix)]
        fs::File::open(dir)?.sync_all()?;

        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::copy(from, to).map(|_| ())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(mode))
        }

        #[cfg(windows)]
        {
            let mut perms = fs::metadata(path)?.permissions();
            perms.set_readonly((mode & 0o200) == 0);
            fs::set_permissions(path, perms)
        }

        #[cfg(not(any(unix, windows)))]
        {
            let _ = path;
            let _ = mode;
            Ok(())
        }
    }
}
