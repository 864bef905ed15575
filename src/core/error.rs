use thiserror::Error;

#[derive(Error, Debug)]
pub enum KvError {
    #[error("No file configured: {0}")]
    NotConfigured(String),

    #[error("Failed to create directory: {0}")]
    DirectoryCreate(String),

    #[error("Backup failed: {0}")]
    Backup(String),

    #[error("Failed to delete file: {0}")]
    Delete(String),

    #[error("Failed to serialize entries: {0}")]
    Serialize(String),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Read failed: {0}")]
    Read(String),

    #[error("Malformed data: {0}")]
    Deserialize(String),

    #[error("Failed to set permissions: {0}")]
    Permission(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Fieldless discriminant of [`KvError`], handy for matching in callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotConfigured,
    DirectoryCreate,
    Backup,
    Delete,
    Serialize,
    Write,
    Read,
    Deserialize,
    Permission,
    Config,
}

impl KvError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotConfigured(_) => ErrorKind::NotConfigured,
            Self::DirectoryCreate(_) => ErrorKind::DirectoryCreate,
            Self::Backup(_) => ErrorKind::Backup,
            Self::Delete(_) => ErrorKind::Delete,
            Self::Serialize(_) => ErrorKind::Serialize,
            Self::Write(_) => ErrorKind::Write,
            Self::Read(_) => ErrorKind::Read,
            Self::Deserialize(_) => ErrorKind::Deserialize,
            Self::Permission(_) => ErrorKind::Permission,
            Self::Config(_) => ErrorKind::Config,
        }
    }
}

pub type Result<T> = std::result::Result<T, KvError>;
