use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{MetadataError, Result};
use crate::utils::constants::PATH_SEPARATOR;
use crate::utils::naming::normalize_path;

/// A metadata mapping keyed by dotted path.
pub type FlatMap = BTreeMap<String, Value>;

/// Collapse a nested JSON object into dotted paths.
///
/// Arrays are leaves; empty objects vanish. Keys may already be dotted or use
/// `/` as the separator.
///
/// # Examples
/// ```
/// use serde_json::json;
/// use mth5_metadata::utils::flatten::flatten;
///
/// let flat = flatten(&json!({"location": {"latitude": 40.0}, "id": "MT001"})).unwrap();
/// assert_eq!(flat["location.latitude"], json!(40.0));
/// ```
pub fn flatten(value: &Value) -> Result<FlatMap> {
    let object = value.as_object().ok_or_else(|| {
        MetadataError::InvalidFormat(format!(
            "Metadata must be a JSON object, found {}",
            json_kind(value)
        ))
    })?;

    let mut flat = FlatMap::new();
    flatten_into(object, None, &mut flat)?;
    Ok(flat)
}

fn flatten_into(object: &Map<String, Value>, prefix: Option<&str>, flat: &mut FlatMap) -> Result<()> {
    for (key, value) in object {
        let key = normalize_path(key);
        let path = match prefix {
            Some(prefix) => format!("{}{}{}", prefix, PATH_SEPARATOR, key),
            None => key,
        };

        match value {
            Value::Object(child) => flatten_into(child, Some(&path), flat)?,
            leaf => {
                if flat.insert(path.clone(), leaf.clone()).is_some() {
                    return Err(MetadataError::InvalidFormat(format!(
                        "Duplicate metadata key after flattening: '{}'",
                        path
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Expand dotted paths back into nested JSON objects.
pub fn expand(flat: &FlatMap) -> Result<Value> {
    let mut root = Map::new();

    for (path, value) in flat {
        let segments: Vec<&str> = path.split(PATH_SEPARATOR).collect();
        let (leaf, parents) = match segments.split_last() {
            Some(split) => split,
            None => continue,
        };

        let mut current = &mut root;
        for segment in parents {
            let entry = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            current = match entry {
                Value::Object(map) => map,
                _ => {
                    return Err(MetadataError::InvalidFormat(format!(
                        "'{}' is both a value and a namespace",
                        path
                    )))
                }
            };
        }

        if current.contains_key(*leaf) {
            return Err(MetadataError::InvalidFormat(format!(
                "'{}' is both a value and a namespace",
                path
            )));
        }
        current.insert(leaf.to_string(), value.clone());
    }

    Ok(Value::Object(root))
}

pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
