pub mod config;
pub mod error;

pub use config::{Format, MapConfig, WriteStrategy, load_config};
pub use error::{ErrorKind, KvError, Result};
