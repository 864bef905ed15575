//! Text encoding of the map for the primary file.

use crate::core::{Format, KvError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Encode the whole map as one document.
pub fn encode<V: Serialize>(format: Format, entries: &BTreeMap<String, V>) -> Result<Vec<u8>> {
    match format {
        Format::Yaml => serde_yaml::to_string(entries)
            .map(String::into_bytes)
            .map_err(|e| KvError::Serialize(e.to_string())),
        Format::Json => {
            let mut bytes = serde_json::to_vec_pretty(entries)
                .map_err(|e| KvError::Serialize(e.to_string()))?;
            bytes.push(b'\n');
            Ok(bytes)
        }
    }
}

/// Decode a document into key/value pairs.
///
/// Returns `Ok(None)` for a null document (e.g. a bare `---`). Keys that are
/// scalars are normalized to their string form.
pub fn decode<V: DeserializeOwned>(format: Format, bytes: &[u8]) -> Result<Option<Vec<(String, V)>>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| KvError::Deserialize(format!("file is not valid UTF-8: {}", e)))?;

    let document: Value = match format {
        Format::Yaml => serde_yaml::from_str(text).map_err(|e| KvError::Deserialize(e.to_string()))?,
        Format::Json => serde_json::from_str(text).map_err(|e| KvError::Deserialize(e.to_string()))?,
    };

    let mapping = match document {
        Value::Null => return Ok(None),
        Value::Mapping(mapping) => mapping,
        other => {
            return Err(KvError::Deserialize(format!(
                "expected a mapping at the top level, found {}",
                describe(&other)
            )));
        }
    };

    let mut pairs = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let key = normalize_key(key)?;
        let value = serde_yaml::from_value(value)
            .map_err(|e| KvError::Deserialize(format!("value for key '{}': {}", key, e)))?;
        pairs.push((key, value));
    }
    Ok(Some(pairs))
}

fn normalize_key(key: Value) -> Result<String> {
    match key {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(KvError::Deserialize(format!(
            "unsupported key type: {}",
            describe(&other)
        ))),
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
