use crate::cli::{Cli, Command};
use anyhow::{Context, Result, anyhow, bail};
use memokv::{MapConfig, PersistentMap, SaveOutcome, Value, load_config};
use std::io::Write;
use tracing::{debug, warn};

pub fn run(cli: Cli) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(cli, &mut out)
}

/// Resolve settings: config file first, then command-line overrides.
fn build_config(cli: &Cli) -> Result<MapConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => MapConfig::new(),
    };

    if let Some(file) = &cli.file {
        config = config.file(file.clone());
    }
    if cli.backup {
        config = config.backup(true);
    }
    if let Some(mode) = cli.mode {
        config = config.mode(mode);
    }
    if let Some(format) = cli.format {
        config = config.format(format.into());
    }
    if config.file.is_none() {
        bail!("no storage file given; pass --file or set `file` in the config");
    }

    // Commands always operate on the stored state.
    Ok(config.load_on_init(true))
}

pub fn execute<W: Write>(cli: Cli, out: &mut W) -> Result<()> {
    let config = build_config(&cli)?;
    debug!(?config, "resolved map configuration");

    let mut map: PersistentMap = PersistentMap::open(config).context("failed to load map")?;

    match &cli.command {
        Command::Get { key } => {
            let value = map
                .get(key)
                .ok_or_else(|| anyhow!("key '{}' not found", key))?;
            writeln!(out, "{}", render(value)?)?;
        }
        Command::Set { key, value } => {
            map.insert(key.clone(), parse_value(value));
            persist(&map, cli.overwrite)?;
        }
        Command::Delete { key } => {
            if map.remove(key).is_none() {
                bail!("key '{}' not found", key);
            }
            if persist(&map, cli.overwrite)? == SaveOutcome::SkippedEmpty {
                warn!("map is now empty; the stored file was left unchanged");
            }
        }
        Command::List => {
            for key in map.keys() {
                writeln!(out, "{}", key)?;
            }
        }
        Command::Dump => {
            let bytes = memokv::storage::codec::encode(map.store().format(), map.entries())?;
            out.write_all(&bytes)?;
        }
    }
    Ok(())
}

fn persist(map: &PersistentMap, overwrite: bool) -> Result<SaveOutcome> {
    let outcome = if overwrite {
        map.overwrite_save()
    } else {
        map.save()
    };
    outcome.context("failed to save map")
}

/// YAML if it parses, otherwise the raw text as a string.
fn parse_value(text: &str) -> Value {
    serde_yaml::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

fn render(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Ok(serde_yaml::to_string(other)?.trim_end().to_string()),
    }
}
