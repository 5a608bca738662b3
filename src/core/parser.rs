//! RC-003: YAML document parsing into a `ConfigTree`.
//!
//! Structural constraints checked here:
//! - The document root must be a mapping (an empty document is an empty tree)
//! - Keys are unique per mapping, also after rendering non-string keys
//! - `!ref` applies to strings only; no other tags are accepted
//! - Placeholders must be terminated
//! - A `!ref` names at least one placeholder and leaves no `<name` open
//!
//! Strings containing placeholders become reference nodes with their
//! template parsed once, here. In plain strings, speech tokens that match the
//! placeholder grammar (`<unk>`, `<blank>`) must be written `<<unk>`; the
//! parsed scalar holds `<unk>`.

use super::error::{ConfigError, ConfigResult};
use super::template::Template;
use super::types::*;
use indexmap::IndexMap;
use serde_yaml_ng::Value;
use std::path::Path;

/// Parse a recipe document from disk.
pub fn parse_file(path: &Path) -> ConfigResult<ConfigTree> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    parse_document(&content).map_err(|e| match e {
        ConfigError::Syntax { path: node, message } => ConfigError::Syntax {
            path: format!("{}: {}", path.display(), node),
            message,
        },
        other => other,
    })
}

/// Parse a recipe document from a string.
pub fn parse_document(yaml: &str) -> ConfigResult<ConfigTree> {
    if yaml.trim().is_empty() {
        return Ok(ConfigTree::empty());
    }
    let value: Value = serde_yaml_ng::from_str(yaml)
        .map_err(|e| ConfigError::syntax(NodePath::root(), format!("YAML parse error: {}", e)))?;

    let root = NodePath::root();
    match value {
        Value::Null => Ok(ConfigTree::empty()),
        Value::Mapping(m) => Ok(ConfigTree::new(convert_mapping(&root, m)?)),
        other => Err(ConfigError::syntax(
            root,
            format!("document root must be a mapping, got {}", value_kind(&other)),
        )),
    }
}

fn convert_mapping(
    path: &NodePath,
    mapping: serde_yaml_ng::Mapping,
) -> ConfigResult<IndexMap<String, ConfigNode>> {
    let mut entries = IndexMap::with_capacity(mapping.len());
    for (key, value) in mapping {
        let key = mapping_key(path, &key)?;
        let child = path.child(&key);
        if entries.contains_key(&key) {
            return Err(ConfigError::syntax(child, format!("duplicate key '{}'", key)));
        }
        let node = convert_value(&child, value)?;
        entries.insert(key, node);
    }
    Ok(entries)
}

fn mapping_key(path: &NodePath, key: &Value) -> ConfigResult<String> {
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(ConfigError::syntax(
            path,
            format!("mapping keys must be scalars, got {}", value_kind(other)),
        )),
    }
}

fn convert_value(path: &NodePath, value: Value) -> ConfigResult<ConfigNode> {
    match value {
        Value::Null => Ok(ConfigNode::Scalar(Scalar::Null)),
        Value::Bool(b) => Ok(ConfigNode::Scalar(Scalar::Bool(b))),
        Value::Number(n) => Ok(ConfigNode::Scalar(Scalar::Number(n))),
        Value::String(s) => convert_string(path, s),
        Value::Sequence(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| convert_value(&path.index(i), item))
            .collect::<ConfigResult<Vec<_>>>()
            .map(ConfigNode::Sequence),
        Value::Mapping(m) => convert_mapping(path, m).map(ConfigNode::Mapping),
        Value::Tagged(tagged) => {
            let tag = tagged.tag.to_string();
            if tag != REF_TAG {
                return Err(ConfigError::syntax(path, format!("unsupported tag '{}'", tag)));
            }
            match tagged.value {
                Value::String(s) => ReferencePath::explicit(&s)
                    .map(ConfigNode::Reference)
                    .map_err(|e| ConfigError::syntax(path, e)),
                other => Err(ConfigError::syntax(
                    path,
                    format!("{} expects a string, got {}", REF_TAG, value_kind(&other)),
                )),
            }
        }
    }
}

fn convert_string(path: &NodePath, s: String) -> ConfigResult<ConfigNode> {
    if !s.contains('<') {
        return Ok(ConfigNode::Scalar(Scalar::String(s)));
    }
    let template = Template::parse(&s).map_err(|e| ConfigError::syntax(path, e))?;
    match template.literal() {
        Some(text) => Ok(ConfigNode::Scalar(Scalar::String(text))),
        None => Ok(ConfigNode::Reference(ReferencePath::inline(template))),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}
