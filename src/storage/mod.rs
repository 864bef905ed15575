pub mod codec;
pub mod fs;
pub mod memory;
pub mod paths;
pub mod persistence;

pub use fs::{FileMeta, FileSystem, OsFileSystem};
pub use memory::{FsOp, MemoryFileSystem};
pub use paths::{BACKUP_EXTENSION, PathResolver};
pub use persistence::{FileStore, SaveOutcome};
