use crate::core::{KvError, Result};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

/// Text format used for the primary file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Yaml,
    Json,
}

impl Format {
    /// `.json` files are JSON, everything else is YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Yaml,
        }
    }
}

/// How the primary file is replaced on save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteStrategy {
    /// Truncate the existing file in place, write, then fsync.
    #[default]
    Truncate,
    /// Write a synced temp file next to the primary and rename it over.
    Replace,
}

/// Persistent map configuration
///
/// Built either through the builder methods or read from a YAML file
/// with [`load_config`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapConfig {
    /// Primary storage file
    pub file: Option<PathBuf>,

    /// Copy the existing primary file to `<file>.bak` before overwriting
    pub backup: bool,

    /// Permission bits applied to primary and backup files after a save
    #[serde(deserialize_with = "deserialize_mode")]
    pub mode: Option<u32>,

    /// Populate the map from `file` when it is opened
    pub load_on_init: bool,

    /// Storage format; inferred from the file extension when unset
    pub format: Option<Format>,

    pub write_strategy: WriteStrategy,
}

impl MapConfig {
    /// Create an empty configuration (no file, no backup, no mode)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the primary file path
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Enable or disable backup-before-overwrite
    pub fn backup(mut self, enabled: bool) -> Self {
        self.backup = enabled;
        self
    }

    /// Set the file mode, e.g. `0o600`
    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Load the file when the map is opened
    pub fn load_on_init(mut self, enabled: bool) -> Self {
        self.load_on_init = enabled;
        self
    }

    /// Force a storage format
    pub fn format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    /// Set the write strategy
    pub fn write_strategy(mut self, strategy: WriteStrategy) -> Self {
        self.write_strategy = strategy;
        self
    }

    /// The format actually used: explicit setting, else inferred from `file`.
    pub fn effective_format(&self) -> Format {
        self.format.unwrap_or_else(|| {
            self.file
                .as_deref()
                .map(Format::from_path)
                .unwrap_or_default()
        })
    }
}

/// Parse a permission mode written in octal, with or without a `0`/`0o` prefix.
///
/// ```
/// # use memokv::core::config::parse_mode;
/// assert_eq!(parse_mode("0600").unwrap(), 0o600);
/// assert_eq!(parse_mode("0o644").unwrap(), 0o644);
/// assert_eq!(parse_mode("755").unwrap(), 0o755);
/// ```
pub fn parse_mode(text: &str) -> Result<u32> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0o")
        .or_else(|| trimmed.strip_prefix("0O"))
        .unwrap_or(trimmed);
    let mode = u32::from_str_radix(digits, 8)
        .map_err(|e| KvError::Config(format!("invalid file mode '{}': {}", text, e)))?;
    check_mode_range(mode, text)
}

fn check_mode_range(mode: u32, text: &str) -> Result<u32> {
    if mode > 0o7777 {
        return Err(KvError::Config(format!(
            "file mode '{}' is out of range",
            text
        )));
    }
    Ok(mode)
}

fn deserialize_mode<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ModeRepr {
        Bits(u32),
        Octal(String),
    }

    match Option::<ModeRepr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(ModeRepr::Bits(bits)) => check_mode_range(bits, &bits.to_string())
            .map(Some)
            .map_err(serde::de::Error::custom),
        Some(ModeRepr::Octal(text)) => parse_mode(&text)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Load and parse a YAML config file.
pub fn load_config(path: &Path) -> Result<MapConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| KvError::Config(format!("cannot read '{}': {e}", path.display())))?;
    let config: MapConfig = serde_yaml::from_str(&contents)
        .map_err(|e| KvError::Config(format!("invalid config '{}': {e}", path.display())))?;
    Ok(config)
}
