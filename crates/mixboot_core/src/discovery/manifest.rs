//! Embedded `mcmod.info` identifier search.

use serde_json::Value;

/// Archive entry holding the JSON unit manifest.
pub const MANIFEST_ENTRY: &str = "mcmod.info";
const IDENTIFIER_KEY: &str = "modid";

/// Parses manifest text and returns every identifier found, lower-cased.
///
/// Producers nest the manifest inconsistently (bare array, `modList`
/// wrapper, duplicates), so the search walks the whole document. An object
/// holding the key contributes its value and is not descended further.
pub fn manifest_identifiers(raw: &str) -> Result<Vec<String>, serde_json::Error> {
    let root: Value = serde_json::from_str(raw)?;
    let mut found = Vec::new();
    collect_identifiers(&root, &mut found);
    Ok(found)
}

fn collect_identifiers(value: &Value, found: &mut Vec<String>) {
    match value {
        Value::Object(map) => match map.get(IDENTIFIER_KEY) {
            Some(Value::String(id)) => found.push(id.to_lowercase()),
            Some(Value::Number(id)) => found.push(id.to_string()),
            Some(_) => {}
            None => map.values().for_each(|child| collect_identifiers(child, found)),
        },
        Value::Array(items) => items
            .iter()
            .for_each(|child| collect_identifiers(child, found)),
        _ => {}
    }
}
