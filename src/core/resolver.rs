//! RC-005: Reference resolution.
//!
//! Expands `!ref` nodes and inline `<name>` interpolations into literal
//! scalars. Each placeholder is looked up lexically: the mapping containing
//! the reference first, then every enclosing mapping up to the root. A match
//! that lands on a scalar or another reference ends the search; a match on a
//! mapping or sequence is skipped and the search moves outward.
//!
//! Resolution is depth-first and memoized per node path. Cycles are detected
//! with the stack of node paths currently being resolved, and the stack depth
//! is bounded.

use super::error::{ConfigError, ConfigResult};
use super::template::VarPath;
use super::types::*;
use indexmap::IndexMap;
use std::collections::HashMap;

/// Default bound on nested reference resolution.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Resolve every reference in `tree` with the default depth bound.
pub fn resolve(tree: &ConfigTree) -> ConfigResult<ConfigTree> {
    Resolver::new(tree).resolve()
}

/// One resolution pass over a tree.
pub struct Resolver<'a> {
    tree: &'a ConfigTree,
    max_depth: usize,
    memo: HashMap<NodePath, Scalar>,
}

impl<'a> Resolver<'a> {
    pub fn new(tree: &'a ConfigTree) -> Self {
        Self {
            tree,
            max_depth: DEFAULT_MAX_DEPTH,
            memo: HashMap::new(),
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Build the fully literal copy of the tree.
    pub fn resolve(mut self) -> ConfigResult<ConfigTree> {
        let tree = self.tree;
        let entries = self.resolve_entries(&NodePath::root(), tree.entries())?;
        tracing::debug!(resolved = self.memo.len(), "references resolved");
        Ok(ConfigTree::new(entries))
    }

    fn resolve_entries(
        &mut self,
        path: &NodePath,
        entries: &'a IndexMap<String, ConfigNode>,
    ) -> ConfigResult<IndexMap<String, ConfigNode>> {
        let mut out = IndexMap::with_capacity(entries.len());
        for (key, node) in entries {
            out.insert(key.clone(), self.resolve_node(&path.child(key), node)?);
        }
        Ok(out)
    }

    fn resolve_node(&mut self, path: &NodePath, node: &'a ConfigNode) -> ConfigResult<ConfigNode> {
        match node {
            ConfigNode::Scalar(s) => Ok(ConfigNode::Scalar(s.clone())),
            ConfigNode::Mapping(m) => self.resolve_entries(path, m).map(ConfigNode::Mapping),
            ConfigNode::Sequence(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.resolve_node(&path.index(i), item))
                .collect::<ConfigResult<Vec<_>>>()
                .map(ConfigNode::Sequence),
            ConfigNode::Reference(r) => {
                let mut stack = Vec::new();
                self.resolve_reference(path, r, &mut stack).map(ConfigNode::Scalar)
            }
        }
    }

    fn resolve_reference(
        &mut self,
        path: &NodePath,
        reference: &'a ReferencePath,
        stack: &mut Vec<NodePath>,
    ) -> ConfigResult<Scalar> {
        if let Some(done) = self.memo.get(path) {
            return Ok(done.clone());
        }
        if let Some(start) = stack.iter().position(|p| p == path) {
            return Err(cycle_error(&stack[start..], path));
        }
        if stack.len() >= self.max_depth {
            tracing::debug!(path = %path, depth = stack.len(), "reference depth bound exceeded");
            return Err(cycle_error(stack, path));
        }

        stack.push(path.clone());
        let template = reference.template();
        let value = match template.single_placeholder() {
            Some(var) => self.lookup(path, var, stack)?,
            None => Scalar::String(
                template.render(|var| self.lookup(path, var, stack).map(|s| s.render()))?,
            ),
        };
        stack.pop();

        self.memo.insert(path.clone(), value.clone());
        Ok(value)
    }

    /// Find `var` from the scope of the node at `from`, walking outward.
    fn lookup(
        &mut self,
        from: &NodePath,
        var: &VarPath,
        stack: &mut Vec<NodePath>,
    ) -> ConfigResult<Scalar> {
        let tree = self.tree;
        let segments = from.segments();
        for depth in (0..segments.len()).rev() {
            let scope_path = &segments[..depth];
            let Some(scope) = tree.mapping_at(scope_path) else {
                continue;
            };
            match follow(scope_path, scope, var) {
                Some((_, ConfigNode::Scalar(s))) => return Ok(s.clone()),
                Some((target, ConfigNode::Reference(r))) => {
                    return self.resolve_reference(&target, r, stack);
                }
                _ => continue,
            }
        }
        Err(ConfigError::UnresolvedReference {
            path: from.to_string(),
            name: var.to_string(),
        })
    }
}

/// Follow a dotted variable path down from one scope mapping.
fn follow<'t>(
    scope_path: &[PathSegment],
    scope: &'t IndexMap<String, ConfigNode>,
    var: &VarPath,
) -> Option<(NodePath, &'t ConfigNode)> {
    let (first, rest) = var.parts().split_first()?;
    let mut segments = scope_path.to_vec();
    segments.push(PathSegment::Key(first.clone()));
    let mut node = scope.get(first)?;
    for part in rest {
        node = node.get(part)?;
        segments.push(PathSegment::Key(part.clone()));
    }
    Some((NodePath::from(segments), node))
}

fn cycle_error(chain: &[NodePath], closing: &NodePath) -> ConfigError {
    let mut cycle: Vec<String> = chain.iter().map(ToString::to_string).collect();
    cycle.push(closing.to_string());
    ConfigError::CyclicReference { cycle }
}
