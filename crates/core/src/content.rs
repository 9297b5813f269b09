#![forbid(unsafe_code)]

//! Block content model.
//!
//! Content is a JSON object whose inline nodes carry a `"type"` tag. Two tags
//! matter to the engine:
//!
//! - `{"type":"text","text":"..."}` is a literal text run;
//! - `{"type":"ref","objectId":"...","blockId":"..."}` is a reference, with
//!   `blockId` absent or null for an object-level reference.
//!
//! Everything else (link children, table rows and cells, footnote bodies) is
//! treated as a container and walked recursively.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub const NODE_TYPE_KEY: &str = "type";
pub const TEXT_NODE: &str = "text";
pub const REF_NODE: &str = "ref";
pub const TEXT_KEY: &str = "text";
pub const REF_OBJECT_KEY: &str = "objectId";
pub const REF_BLOCK_KEY: &str = "blockId";

/// Deepest container nesting accepted in stored JSON. Stays under the
/// 128-level limit `serde_json` applies when reading columns back.
pub const MAX_JSON_DEPTH: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefTarget {
    pub object_id: String,
    pub block_id: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentShapeError {
    NotAnObject,
    RefWithoutObject,
    TooDeep,
}

impl ContentShapeError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::NotAnObject => "content must be a JSON object",
            Self::RefWithoutObject => "ref node requires a string objectId",
            Self::TooDeep => "content nests deeper than 64 levels",
        }
    }
}

pub fn validate_content_shape(content: &Value) -> Result<(), ContentShapeError> {
    if !content.is_object() {
        return Err(ContentShapeError::NotAnObject);
    }
    let mut stack = vec![(content, 1)];
    while let Some((value, depth)) = stack.pop() {
        match value {
            Value::Object(map) => {
                if is_node(value, REF_NODE) && ref_target(value).is_none() {
                    return Err(ContentShapeError::RefWithoutObject);
                }
                if depth > MAX_JSON_DEPTH {
                    return Err(ContentShapeError::TooDeep);
                }
                stack.extend(map.values().map(|child| (child, depth + 1)));
            }
            Value::Array(items) => {
                if depth > MAX_JSON_DEPTH {
                    return Err(ContentShapeError::TooDeep);
                }
                stack.extend(items.iter().map(|child| (child, depth + 1)));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Container nesting of `value`: 0 for scalars, 1 for a flat object or array.
pub fn json_depth(value: &Value) -> usize {
    let mut deepest = 0;
    let mut stack = vec![(value, 1)];
    while let Some((value, depth)) = stack.pop() {
        match value {
            Value::Object(map) => {
                deepest = deepest.max(depth);
                stack.extend(map.values().map(|child| (child, depth + 1)));
            }
            Value::Array(items) => {
                deepest = deepest.max(depth);
                stack.extend(items.iter().map(|child| (child, depth + 1)));
            }
            _ => {}
        }
    }
    deepest
}

/// Every reference node in document order; duplicates are kept.
pub fn extract_refs(content: &Value) -> Vec<RefTarget> {
    let mut out = Vec::new();
    collect_refs(content, &mut out);
    out
}

fn collect_refs(value: &Value, out: &mut Vec<RefTarget>) {
    match value {
        Value::Object(map) => {
            if is_node(value, REF_NODE) {
                if let Some(target) = ref_target(value) {
                    out.push(target);
                }
            }
            for child in map.values() {
                collect_refs(child, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_refs(item, out);
            }
        }
        _ => {}
    }
}

/// Literal text runs joined by single spaces.
pub fn extract_text(content: &Value) -> String {
    let mut runs = Vec::new();
    collect_text(content, &mut runs);
    runs.join(" ")
}

fn collect_text<'a>(value: &'a Value, runs: &mut Vec<&'a str>) {
    match value {
        Value::Object(map) => {
            if is_node(value, TEXT_NODE) {
                if let Some(text) = map.get(TEXT_KEY).and_then(Value::as_str) {
                    let text = text.trim();
                    if !text.is_empty() {
                        runs.push(text);
                    }
                }
            }
            for (key, child) in map {
                if key != TEXT_KEY {
                    collect_text(child, runs);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_text(item, runs);
            }
        }
        _ => {}
    }
}

/// Copy of `content` with references into `from_object` rewritten to
/// `to_object`. Block-scoped targets go through `block_map`; ids missing from
/// the map are kept as they were.
pub fn remap_refs(
    content: &Value,
    from_object: &str,
    to_object: &str,
    block_map: &HashMap<String, String>,
) -> Value {
    let mut out = content.clone();
    remap_in_place(&mut out, from_object, to_object, block_map);
    out
}

fn remap_in_place(
    value: &mut Value,
    from_object: &str,
    to_object: &str,
    block_map: &HashMap<String, String>,
) {
    match value {
        Value::Object(map) => {
            let is_ref = map.get(NODE_TYPE_KEY).and_then(Value::as_str) == Some(REF_NODE);
            let points_at_source =
                map.get(REF_OBJECT_KEY).and_then(Value::as_str) == Some(from_object);
            if is_ref && points_at_source {
                map.insert(REF_OBJECT_KEY.to_string(), Value::String(to_object.to_string()));
                let mapped = map
                    .get(REF_BLOCK_KEY)
                    .and_then(Value::as_str)
                    .and_then(|block_id| block_map.get(block_id))
                    .cloned();
                if let Some(new_block_id) = mapped {
                    map.insert(REF_BLOCK_KEY.to_string(), Value::String(new_block_id));
                }
            }
            for child in map.values_mut() {
                remap_in_place(child, from_object, to_object, block_map);
            }
        }
        Value::Array(items) => {
            for item in items {
                remap_in_place(item, from_object, to_object, block_map);
            }
        }
        _ => {}
    }
}

fn is_node(value: &Value, tag: &str) -> bool {
    value.get(NODE_TYPE_KEY).and_then(Value::as_str) == Some(tag)
}

fn ref_target(value: &Value) -> Option<RefTarget> {
    let object_id = value.get(REF_OBJECT_KEY)?.as_str()?;
    if object_id.trim().is_empty() {
        return None;
    }
    let block_id = value
        .get(REF_BLOCK_KEY)
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
        .map(str::to_string);
    Some(RefTarget {
        object_id: object_id.to_string(),
        block_id,
    })
}
