// ============================================================================
// memokv Library
// ============================================================================

//! A key-value map that persists to a single human-readable file.
//!
//! Mutate a [`PersistentMap`] in memory, then [`save`](PersistentMap::save)
//! it. Saves can back up the previous file to `<file>.bak` first and apply a
//! file mode to both files afterwards. [`load`](PersistentMap::load) merges
//! the file back into memory.

pub mod core;
pub mod facade;
pub mod storage;

// Re-export main types for convenience
pub use crate::core::{ErrorKind, Format, KvError, MapConfig, Result, WriteStrategy, load_config};
pub use crate::facade::PersistentMap;
pub use crate::storage::{FileSystem, MemoryFileSystem, OsFileSystem, SaveOutcome};

/// Default value type stored in a [`PersistentMap`].
pub use serde_yaml::Value;
