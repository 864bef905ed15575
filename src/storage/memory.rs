//! In-process [`FileSystem`] with failure injection.

use crate::storage::fs::{FileMeta, FileSystem};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Filesystem operation that can be forced to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsOp {
    CreateDir,
    Read,
    Write,
    Copy,
    Remove,
    SetMode,
}

#[derive(Debug, Clone)]
struct MemFile {
    bytes: Vec<u8>,
    mode: u32,
}

#[derive(Debug, Default)]
struct MemState {
    files: BTreeMap<PathBuf, MemFile>,
    dirs: BTreeSet<PathBuf>,
    failures: Vec<(FsOp, PathBuf)>,
    mutations: Vec<(FsOp, PathBuf)>,
}

/// Files live in a map keyed by path; directories are tracked explicitly so
/// writes into a missing directory fail the way they do on disk.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    state: Mutex<MemState>,
}

const DEFAULT_FILE_MODE: u32 = 0o644;

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file (and its parent directories) without recording a mutation.
    pub fn with_file(self, path: impl AsRef<Path>, bytes: impl Into<Vec<u8>>) -> Self {
        {
            let mut state = self.lock();
            let path = path.as_ref().to_path_buf();
            if let Some(parent) = path.parent() {
                add_dir_chain(&mut state.dirs, parent);
            }
            state.files.insert(
                path,
                MemFile {
                    bytes: bytes.into(),
                    mode: DEFAULT_FILE_MODE,
                },
            );
        }
        self
    }

    /// Make every `op` touching `path` fail with `PermissionDenied`.
    pub fn fail(&self, op: FsOp, path: impl AsRef<Path>) {
        self.lock().failures.push((op, path.as_ref().to_path_buf()));
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.lock()
            .files
            .get(path.as_ref())
            .map(|file| file.bytes.clone())
    }

    pub fn mode_of(&self, path: impl AsRef<Path>) -> Option<u32> {
        self.lock().files.get(path.as_ref()).map(|file| file.mode)
    }

    pub fn has_dir(&self, path: impl AsRef<Path>) -> bool {
        self.lock().dirs.contains(path.as_ref())
    }

    /// Every mutating operation performed so far, in order.
    pub fn mutations(&self) -> Vec<(FsOp, PathBuf)> {
        self.lock().mutations.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MemState {
    fn check(&self, op: FsOp, paths: &[&Path]) -> io::Result<()> {
        let denied = self
            .failures
            .iter()
            .any(|(failing, target)| *failing == op && paths.contains(&target.as_path()));
        if denied {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("injected {:?} failure", op),
            ));
        }
        Ok(())
    }

    fn require_parent(&self, path: &Path) -> io::Result<()> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !self.dirs.contains(parent) => {
                Err(not_found(parent))
            }
            _ => Ok(()),
        }
    }

    fn store(&mut self, path: &Path, bytes: Vec<u8>) {
        let mode = self
            .files
            .get(path)
            .map(|file| file.mode)
            .unwrap_or(DEFAULT_FILE_MODE);
        self.files.insert(path.to_path_buf(), MemFile { bytes, mode });
        self.mutations.push((FsOp::Write, path.to_path_buf()));
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} does not exist", path.display()),
    )
}

fn add_dir_chain(dirs: &mut BTreeSet<PathBuf>, path: &Path) {
    let mut current = PathBuf::new();
    for component in path.components() {
        current.push(component);
        if !matches!(component, Component::Prefix(_)) {
            dirs.insert(current.clone());
        }
    }
}

impl FileSystem for MemoryFileSystem {
    fn metadata(&self, path: &Path) -> io::Result<FileMeta> {
        let state = self.lock();
        if let Some(file) = state.files.get(path) {
            return Ok(FileMeta {
                len: file.bytes.len() as u64,
                is_file: true,
                is_dir: false,
            });
        }
        if state.dirs.contains(path) {
            return Ok(FileMeta {
                len: 0,
                is_file: false,
                is_dir: true,
            });
        }
        Err(not_found(path))
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut state = self.lock();
        state.check(FsOp::CreateDir, &[path])?;
        if state.files.contains_key(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} is a file", path.display()),
            ));
        }
        add_dir_chain(&mut state.dirs, path);
        state.mutations.push((FsOp::CreateDir, path.to_path_buf()));
        Ok(())
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let state = self.lock();
        state.check(FsOp::Read, &[path])?;
        state
            .files
            .get(path)
            .map(|file| file.bytes.clone())
            .ok_or_else(|| not_found(path))
    }

    fn write_synced(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut state = self.lock();
        state.check(FsOp::Write, &[path])?;
        state.require_parent(path)?;
        state.store(path, bytes.to_vec());
        Ok(())
    }

    fn replace_synced(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut state = self.lock();
        state.check(FsOp::Write, &[path])?;
        state.require_parent(path)?;
        state.store(path, bytes.to_vec());
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut state = self.lock();
        state.check(FsOp::Copy, &[from, to])?;
        state.require_parent(to)?;
        let source = state.files.get(from).cloned().ok_or_else(|| not_found(from))?;
        state.files.insert(to.to_path_buf(), source);
        state.mutations.push((FsOp::Copy, to.to_path_buf()));
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        let mut state = self.lock();
        state.check(FsOp::Remove, &[path])?;
        state.files.remove(path).ok_or_else(|| not_found(path))?;
        state.mutations.push((FsOp::Remove, path.to_path_buf()));
        Ok(())
    }

    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        let mut state = self.lock();
        state.check(FsOp::SetMode, &[path])?;
        let file = state.files.get_mut(path).ok_or_else(|| not_found(path))?;
        file.mode = mode;
        state.mutations.push((FsOp::SetMode, path.to_path_buf()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_requires_parent_dir() {
        let fs = MemoryFileSystem::new();
        let err = fs
            .write_synced(Path::new("/data/state.yml"), b"a: 1\n")
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        fs.create_dir_all(Path::new("/data")).unwrap();
        fs.write_synced(Path::new("/data/state.yml"), b"a: 1\n").unwrap();
        assert_eq!(fs.contents("/data/state.yml").unwrap(), b"a: 1\n");
        assert!(fs.has_dir("/"));
    }

    #[test]
    fn test_injected_failure() {
        let fs = MemoryFileSystem::new().with_file("/data/state.yml", "a: 1\n");
        fs.fail(FsOp::Copy, "/data/state.yml.bak");

        let err = fs
            .copy(Path::new("/data/state.yml"), Path::new("/data/state.yml.bak"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert!(fs.contents("/data/state.yml.bak").is_none());
        assert!(fs.mutations().is_empty());
    }

    #[test]
    fn test_copy_keeps_mode_and_write_keeps_existing_mode() {
        let fs = MemoryFileSystem::new().with_file("/d/a", "x");
        fs.set_mode(Path::new("/d/a"), 0o600).unwrap();
        fs.copy(Path::new("/d/a"), Path::new("/d/b")).unwrap();
        fs.write_synced(Path::new("/d/a"), b"y").unwrap();

        assert_eq!(fs.mode_of("/d/a"), Some(0o600));
        assert_eq!(fs.mode_of("/d/b"), Some(0o600));

        fs.replace_synced(Path::new("/d/a"), b"z").unwrap();
        assert_eq!(fs.mode_of("/d/a"), Some(0o600));

        fs.replace_synced(Path::new("/d/c"), b"fresh").unwrap();
        assert_eq!(fs.mode_of("/d/c"), Some(DEFAULT_FILE_MODE));
    }
}
