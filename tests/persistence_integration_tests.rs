//! Integration tests for saving, backing up and loading against the real filesystem

use memokv::{ErrorKind, Format, MapConfig, PersistentMap, SaveOutcome, Value, WriteStrategy};
use serde::{Deserialize, Serialize};
use std::fs;
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Session {
    user: String,
    expires: u64,
    scopes: Vec<String>,
}

#[test]
fn test_round_trip_into_fresh_map() {
    let temp_dir = TempDir::new().unwrap();
    let config = MapConfig::new().file(temp_dir.path().join("state.yml"));

    let mut map: PersistentMap = PersistentMap::new(config.clone());
    map.insert("name", Value::from("cache"));
    map.insert("size", Value::from(128));
    map.insert("ratio", Value::from(0.5));
    map.insert("enabled", Value::from(true));
    map.insert("nothing", Value::Null);
    map.insert(
        "nested",
        serde_yaml::from_str("{ hosts: [a, b], limits: { cpu: 2 } }").unwrap(),
    );
    assert!(map.save().unwrap().is_written());

    let mut fresh: PersistentMap = PersistentMap::new(config);
    assert!(fresh.load().unwrap());
    assert_eq!(fresh.entries(), map.entries());
}

#[test]
fn test_round_trip_typed_values() {
    let temp_dir = TempDir::new().unwrap();
    let config = MapConfig::new()
        .file(temp_dir.path().join("sessions.yml"))
        .load_on_init(true);

    let mut map: PersistentMap<Session> = PersistentMap::open(config.clone()).unwrap();
    assert!(map.is_empty());
    map.insert(
        "abc123",
        Session {
            user: "alice".to_string(),
            expires: 1_700_000_000,
            scopes: vec!["read".to_string(), "write".to_string()],
        },
    );
    map.save().unwrap();

    let reopened: PersistentMap<Session> = PersistentMap::open(config).unwrap();
    assert_eq!(reopened.get("abc123"), map.get("abc123"));
}

#[test]
fn test_save_creates_missing_directories() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("a").join("b").join("state.yml");
    let mut map: PersistentMap = PersistentMap::new(MapConfig::new().file(&file));
    map.insert("k", Value::from("v"));

    map.save().unwrap();

    assert_eq!(map.base_dir(), Some(temp_dir.path().join("a").join("b")));
    assert_eq!(fs::read_to_string(&file).unwrap(), "k: v\n");
}

#[test]
fn test_empty_save_leaves_file_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("state.yml");
    fs::write(&file, "previous: state\n").unwrap();
    let before = fs::metadata(&file).unwrap().modified().unwrap();

    let map: PersistentMap = PersistentMap::new(MapConfig::new().file(&file).backup(true).mode(0o600));
    assert_eq!(map.save().unwrap(), SaveOutcome::SkippedEmpty);
    assert_eq!(map.overwrite_save().unwrap(), SaveOutcome::SkippedEmpty);

    assert_eq!(fs::read_to_string(&file).unwrap(), "previous: state\n");
    assert_eq!(fs::metadata(&file).unwrap().modified().unwrap(), before);
    assert!(!map.backup_path().unwrap().exists());
}

#[test]
fn test_backup_before_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("state.yml");
    let config = MapConfig::new().file(&file).backup(true).load_on_init(true);

    let mut first: PersistentMap = PersistentMap::open(config.clone()).unwrap();
    first.insert("version", Value::from(1));
    first.save().unwrap();
    let content_a = fs::read(&file).unwrap();

    let mut second: PersistentMap = PersistentMap::open(config).unwrap();
    second.insert("version", Value::from(2));
    second.save().unwrap();

    let backup = temp_dir.path().join("state.yml.bak");
    assert_eq!(second.backup_path(), Some(backup.clone()));
    assert_eq!(fs::read(&backup).unwrap(), content_a);
    assert_eq!(fs::read_to_string(&file).unwrap(), "version: 2\n");
}

#[test]
fn test_explicit_backup() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("state.yml");
    let map: PersistentMap = PersistentMap::new(MapConfig::new().file(&file));

    assert!(!map.backup().unwrap());

    fs::write(&file, b"raw: \"bytes\"\n").unwrap();
    assert!(map.backup().unwrap());
    assert_eq!(
        fs::read(temp_dir.path().join("state.yml.bak")).unwrap(),
        b"raw: \"bytes\"\n"
    );
}

#[test]
fn test_merge_on_load() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("state.yml");
    fs::write(&file, "y: 2\n").unwrap();

    let mut map: PersistentMap<i64> = PersistentMap::new(MapConfig::new().file(&file));
    map.insert("x", 1);
    assert!(map.load().unwrap());

    assert_eq!(map.get("x"), Some(&1));
    assert_eq!(map.get("y"), Some(&2));
}

#[test]
fn test_missing_or_empty_file_load() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("state.yml");

    let mut map: PersistentMap<i64> = PersistentMap::new(MapConfig::new().file(&file));
    map.insert("x", 1);
    assert!(!map.load().unwrap());

    fs::write(&file, "").unwrap();
    assert!(!map.load().unwrap());
    assert_eq!(map.len(), 1);
    assert_eq!(map.get("x"), Some(&1));
}

#[test]
fn test_corrupt_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("state.yml");
    fs::write(&file, "key: {unclosed\n").unwrap();

    let mut map: PersistentMap = PersistentMap::new(MapConfig::new().file(&file));
    let err = map.load().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Deserialize);
    assert!(map.is_empty());
}

#[test]
fn test_unconfigured_map() {
    let mut map: PersistentMap = PersistentMap::default();
    assert!(!map.load().unwrap());
    assert_eq!(map.save().unwrap(), SaveOutcome::SkippedEmpty);

    map.insert("x", Value::from(1));
    assert_eq!(map.save().unwrap_err().kind(), ErrorKind::NotConfigured);
    assert_eq!(map.overwrite_save().unwrap_err().kind(), ErrorKind::NotConfigured);
    assert_eq!(map.backup().unwrap_err().kind(), ErrorKind::NotConfigured);
    map.set_mode().unwrap();
}

#[test]
fn test_save_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("state.yml");
    let mut map: PersistentMap = PersistentMap::new(MapConfig::new().file(&file));
    map.extend([
        ("zeta", Value::from(1)),
        ("alpha", Value::from("a")),
        ("mid", Value::Sequence(vec![Value::from(1), Value::from(2)])),
    ]);

    map.save().unwrap();
    let first = fs::read(&file).unwrap();
    map.save().unwrap();
    assert_eq!(fs::read(&file).unwrap(), first);
}

#[test]
fn test_overwrite_save_and_replace_strategy() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("state.yml");
    fs::write(&file, "old: 1\nstale: 2\n").unwrap();

    let mut map: PersistentMap = PersistentMap::new(MapConfig::new().file(&file));
    map.insert("new", Value::from(1));
    map.overwrite_save().unwrap();
    assert_eq!(fs::read_to_string(&file).unwrap(), "new: 1\n");

    let mut replaced: PersistentMap =
        PersistentMap::new(MapConfig::new().file(&file).write_strategy(WriteStrategy::Replace));
    replaced.insert("swapped", Value::from(true));
    replaced.save().unwrap();
    assert_eq!(fs::read_to_string(&file).unwrap(), "swapped: true\n");
}

#[test]
fn test_json_file() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("state.json");

    let mut map: PersistentMap = PersistentMap::new(MapConfig::new().file(&file));
    map.insert("port", Value::from(8080));
    map.save().unwrap();
    assert_eq!(fs::read_to_string(&file).unwrap(), "{\n  \"port\": 8080\n}\n");

    let forced = temp_dir.path().join("state.txt");
    let mut forced_json: PersistentMap =
        PersistentMap::new(MapConfig::new().file(&forced).format(Format::Json));
    forced_json.insert("port", Value::from(8080));
    forced_json.save().unwrap();

    let mut reloaded: PersistentMap =
        PersistentMap::new(MapConfig::new().file(&forced).format(Format::Json));
    assert!(reloaded.load().unwrap());
    assert_eq!(reloaded.get("port"), Some(&Value::from(8080)));
}

#[test]
fn test_config_file_drives_map() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("state.yml");
    fs::write(&file, "seeded: yes\n").unwrap();
    let config_path = temp_dir.path().join("memokv.yaml");
    fs::write(
        &config_path,
        format!("file: {}\nbackup: true\nload_on_init: true\n", file.display()),
    )
    .unwrap();

    let config = memokv::load_config(&config_path).unwrap();
    let map: PersistentMap = PersistentMap::open(config).unwrap();
    assert_eq!(map.get("seeded"), Some(&Value::from("yes")));

    let bad = temp_dir.path().join("bad.yaml");
    fs::write(&bad, "mode: \"0999\"\n").unwrap();
    assert_eq!(memokv::load_config(&bad).unwrap_err().kind(), ErrorKind::Config);
}

#[cfg(unix)]
mod permissions {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn mode_of(path: &std::path::Path) -> u32 {
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[test]
    fn test_mode_applied_to_primary_and_backup() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("state.yml");
        fs::write(&file, "a: 1\n").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o644)).unwrap();

        let mut map: PersistentMap =
            PersistentMap::new(MapConfig::new().file(&file).backup(true).mode(0o600));
        map.insert("a", Value::from(2));
        map.save().unwrap();

        assert_eq!(mode_of(&file), 0o600);
        assert_eq!(mode_of(&temp_dir.path().join("state.yml.bak")), 0o600);
    }

    #[test]
    fn test_mode_without_backup_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("state.yml");

        let mut map: PersistentMap =
            PersistentMap::new(MapConfig::new().file(&file).backup(true).mode(0o600));
        map.insert("a", Value::from(1));
        map.save().unwrap();

        assert_eq!(mode_of(&file), 0o600);
        assert!(!temp_dir.path().join("state.yml.bak").exists());
    }

    #[test]
    fn test_replace_strategy_keeps_existing_mode() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("state.yml");
        fs::write(&file, "a: 1\n").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o644)).unwrap();

        let mut map: PersistentMap = PersistentMap::new(
            MapConfig::new()
                .file(&file)
                .write_strategy(WriteStrategy::Replace),
        );
        map.insert("a", Value::from(2));
        map.save().unwrap();

        assert_eq!(fs::read_to_string(&file).unwrap(), "a: 2\n");
        assert_eq!(mode_of(&file), 0o644);
    }

    #[test]
    fn test_set_mode_directly() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("state.yml");
        fs::write(&file, "a: 1\n").unwrap();

        let map: PersistentMap = PersistentMap::new(MapConfig::new().file(&file).mode(0o640));
        map.set_mode().unwrap();
        assert_eq!(mode_of(&file), 0o640);
    }
}
