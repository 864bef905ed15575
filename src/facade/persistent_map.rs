use crate::core::{MapConfig, Result};
use crate::storage::{FileStore, FileSystem, OsFileSystem, SaveOutcome};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::path::PathBuf;

/// An ordered string-keyed map that can be saved to and loaded from a file.
///
/// Mutate it like a map, then call [`save`](Self::save). Nothing is written
/// implicitly and dirtiness is not tracked.
///
/// # Examples
///
/// ```no_run
/// use memokv::{MapConfig, PersistentMap};
///
/// # fn main() -> memokv::Result<()> {
/// let config = MapConfig::new()
///     .file("/var/lib/myapp/state.yml")
///     .backup(true)
///     .mode(0o600)
///     .load_on_init(true);
///
/// let mut map: PersistentMap = PersistentMap::open(config)?;
/// map.insert("last_run", "2024-05-01".into());
/// map.save()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PersistentMap<V = Value, F = OsFileSystem> {
    entries: BTreeMap<String, V>,
    store: FileStore<F>,
    config: MapConfig,
}

impl<V> PersistentMap<V, OsFileSystem> {
    /// Create an empty map backed by the real filesystem.
    ///
    /// Never touches the disk, even when `load_on_init` is set; use
    /// [`open`](Self::open) for that.
    pub fn new(config: MapConfig) -> Self {
        Self::with_fs(config, OsFileSystem)
    }
}

impl<V: DeserializeOwned> PersistentMap<V, OsFileSystem> {
    /// Create a map and, if `load_on_init` is set, populate it from its file.
    pub fn open(config: MapConfig) -> Result<Self> {
        Self::open_with_fs(config, OsFileSystem)
    }
}

impl<V> Default for PersistentMap<V, OsFileSystem> {
    fn default() -> Self {
        Self::new(MapConfig::new())
    }
}

impl<V, F: FileSystem> PersistentMap<V, F> {
    pub fn with_fs(config: MapConfig, fs: F) -> Self {
        let store = FileStore::with_fs(&config, fs);
        Self {
            entries: BTreeMap::new(),
            store,
            config,
        }
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn store(&self) -> &FileStore<F> {
        &self.store
    }

    /// Absolute directory holding the primary file.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.store.paths().base_dir()
    }

    /// `<file>.bak`
    pub fn backup_path(&self) -> Option<PathBuf> {
        self.store.paths().backup_path()
    }

    /// Copy the current primary file to the backup path.
    pub fn backup(&self) -> Result<bool> {
        self.store.backup()
    }

    /// Apply the configured mode to the primary and backup files.
    pub fn set_mode(&self) -> Result<()> {
        self.store.set_mode()
    }

    // ------------------------------------------------------------------------
    // Map access
    // ------------------------------------------------------------------------

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    /// Returns the previous value for `key`, if any.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        self.entries.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clears memory only; the file on disk is left alone.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, V> {
        self.entries.iter()
    }

    pub fn keys(&self) -> btree_map::Keys<'_, String, V> {
        self.entries.keys()
    }

    pub fn values(&self) -> btree_map::Values<'_, String, V> {
        self.entries.values()
    }

    pub fn entries(&self) -> &BTreeMap<String, V> {
        &self.entries
    }
}

impl<V: DeserializeOwned, F: FileSystem> PersistentMap<V, F> {
    pub fn open_with_fs(config: MapConfig, fs: F) -> Result<Self> {
        let mut map = Self::with_fs(config, fs);
        if map.config.load_on_init {
            map.load()?;
        }
        Ok(map)
    }

    /// Merge the file's contents into the map.
    ///
    /// Keys in the file overwrite in-memory values; keys only in memory are
    /// kept. Returns `false` when there was nothing to load.
    pub fn load(&mut self) -> Result<bool> {
        match self.store.load::<V>()? {
            Some(pairs) => {
                self.entries.extend(pairs);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl<V: Serialize, F: FileSystem> PersistentMap<V, F> {
    /// Write the current entries to the file. An empty map is not written.
    pub fn save(&self) -> Result<SaveOutcome> {
        self.store.save(&self.entries)
    }

    /// Delete the file and write it fresh. An empty map is not written.
    pub fn overwrite_save(&self) -> Result<SaveOutcome> {
        self.store.overwrite_save(&self.entries)
    }
}

impl<K: Into<String>, V, F: FileSystem> Extend<(K, V)> for PersistentMap<V, F> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.entries
            .extend(iter.into_iter().map(|(key, value)| (key.into(), value)));
    }
}

impl<'a, V, F> IntoIterator for &'a PersistentMap<V, F> {
    type Item = (&'a String, &'a V);
    type IntoIter = btree_map::Iter<'a, String, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
