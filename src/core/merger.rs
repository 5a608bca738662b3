//! RC-004: Override merging.
//!
//! Shallow-per-key deep merge: when both sides hold a mapping at a key the
//! merge recurses, otherwise the override value replaces the base value
//! wholesale. Base-only keys keep their position; override-only keys are
//! appended in override order. Sequences are never merged element-wise.
//!
//! An override mapping that carries a `type` key is a complete typed
//! specification and replaces the base value without recursing, so a split
//! redefined in an override loses any `group_info` it does not restate.
//!
//! Overlapping overrides applied in sequence do not commute.

use super::error::{ConfigError, ConfigResult};
use super::types::*;
use indexmap::IndexMap;

/// What to do when an override changes the kind of an existing key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Fail with `ConfigError::TypeConflict`.
    #[default]
    Reject,
    /// Let the override replace the base value and log a warning.
    OverrideWins,
}

/// Merge `overlay` into `base` with the default (rejecting) policy.
pub fn merge(base: &ConfigTree, overlay: &ConfigTree) -> ConfigResult<ConfigTree> {
    merge_with(base, overlay, ConflictPolicy::default())
}

/// Merge `overlay` into `base`.
pub fn merge_with(
    base: &ConfigTree,
    overlay: &ConfigTree,
    policy: ConflictPolicy,
) -> ConfigResult<ConfigTree> {
    let entries = merge_entries(&NodePath::root(), base.entries(), overlay.entries(), policy)?;
    Ok(ConfigTree::new(entries))
}

/// Apply overrides left to right.
pub fn merge_all(
    base: &ConfigTree,
    overlays: &[ConfigTree],
    policy: ConflictPolicy,
) -> ConfigResult<ConfigTree> {
    overlays
        .iter()
        .try_fold(base.clone(), |acc, overlay| merge_with(&acc, overlay, policy))
}

fn merge_entries(
    path: &NodePath,
    base: &IndexMap<String, ConfigNode>,
    overlay: &IndexMap<String, ConfigNode>,
    policy: ConflictPolicy,
) -> ConfigResult<IndexMap<String, ConfigNode>> {
    let mut merged = base.clone();
    for (key, over) in overlay {
        let child = path.child(key);
        let value = match base.get(key) {
            Some(existing) => merge_node(&child, existing, over, policy)?,
            None => over.clone(),
        };
        merged.insert(key.clone(), value);
    }
    Ok(merged)
}

fn merge_node(
    path: &NodePath,
    base: &ConfigNode,
    over: &ConfigNode,
    policy: ConflictPolicy,
) -> ConfigResult<ConfigNode> {
    check_kinds(path, base, over, policy)?;
    match (base, over) {
        (ConfigNode::Mapping(b), ConfigNode::Mapping(o)) if !o.contains_key(TYPE_KEY) => {
            merge_entries(path, b, o, policy).map(ConfigNode::Mapping)
        }
        (ConfigNode::Mapping(_), ConfigNode::Mapping(_)) => {
            tracing::debug!(path = %path, "typed subtree replaced by override");
            Ok(over.clone())
        }
        _ => Ok(over.clone()),
    }
}

/// A null base takes any kind. A null override may only clear a scalar.
fn check_kinds(
    path: &NodePath,
    base: &ConfigNode,
    over: &ConfigNode,
    policy: ConflictPolicy,
) -> ConfigResult<()> {
    let (b, o) = (base.kind(), over.kind());
    if b == o || b == NodeKind::Null || (o == NodeKind::Null && b == NodeKind::Scalar) {
        return Ok(());
    }
    match policy {
        ConflictPolicy::Reject => Err(ConfigError::TypeConflict {
            path: path.to_string(),
            base: b.to_string(),
            override_kind: o.to_string(),
        }),
        ConflictPolicy::OverrideWins => {
            tracing::warn!(path = %path, base = %b, override_kind = %o, "override changes node kind");
            Ok(())
        }
    }
}
