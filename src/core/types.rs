//! RC-001: Configuration tree types.
//!
//! A parsed document is a `ConfigTree`: an ordered root mapping of
//! `ConfigNode`s. Trees are never mutated after construction; merging and
//! resolving build new trees.

use super::error::{ConfigError, ConfigResult};
use super::template::Template;
use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_yaml_ng::value::{Tag, TaggedValue};
use std::fmt;

/// Key that selects a builder in the type registry.
pub const TYPE_KEY: &str = "type";

/// YAML tag marking an explicit reference.
pub const REF_TAG: &str = "!ref";

// ============================================================================
// Scalars
// ============================================================================

/// A leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(serde_yaml_ng::Number),
    String(String),
}

impl Scalar {
    /// Text substituted for this scalar inside an interpolated string.
    pub fn render(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => n.to_string(),
            Self::String(s) => s.clone(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
        }
    }
}

// ============================================================================
// References
// ============================================================================

/// A string that must be resolved against the tree.
///
/// `explicit` is set for `!ref`-tagged values; inline interpolations in plain
/// strings carry `explicit = false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencePath {
    template: Template,
    explicit: bool,
}

impl ReferencePath {
    pub fn explicit(source: &str) -> Result<Self, String> {
        Ok(Self {
            template: Template::parse_reference(source)?,
            explicit: true,
        })
    }

    pub fn inline(template: Template) -> Self {
        Self {
            template,
            explicit: false,
        }
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn is_explicit(&self) -> bool {
        self.explicit
    }
}

impl fmt::Display for ReferencePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.explicit {
            write!(f, "{} {}", REF_TAG, self.template)
        } else {
            write!(f, "{}", self.template)
        }
    }
}

// ============================================================================
// Nodes
// ============================================================================

/// Structural kind of a node, used for override conflict checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Null,
    Scalar,
    Mapping,
    Sequence,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Scalar => write!(f, "scalar"),
            Self::Mapping => write!(f, "mapping"),
            Self::Sequence => write!(f, "sequence"),
        }
    }
}

/// One node of a configuration tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigNode {
    Scalar(Scalar),
    Mapping(IndexMap<String, ConfigNode>),
    Sequence(Vec<ConfigNode>),
    Reference(ReferencePath),
}

impl ConfigNode {
    pub fn string(s: impl Into<String>) -> Self {
        Self::Scalar(Scalar::String(s.into()))
    }

    pub fn mapping<K: Into<String>>(entries: impl IntoIterator<Item = (K, ConfigNode)>) -> Self {
        Self::Mapping(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// References count as scalars: they always resolve to one.
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Scalar(Scalar::Null) => NodeKind::Null,
            Self::Scalar(_) | Self::Reference(_) => NodeKind::Scalar,
            Self::Mapping(_) => NodeKind::Mapping,
            Self::Sequence(_) => NodeKind::Sequence,
        }
    }

    /// Human-readable shape, for schema diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Scalar(s) => s.type_name(),
            Self::Mapping(_) => "mapping",
            Self::Sequence(_) => "sequence",
            Self::Reference(_) => "unresolved reference",
        }
    }

    pub fn as_mapping(&self) -> Option<&IndexMap<String, ConfigNode>> {
        match self {
            Self::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Scalar(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&ConfigNode> {
        self.as_mapping().and_then(|m| m.get(key))
    }

    /// Number of reference nodes in this subtree.
    pub fn reference_count(&self) -> usize {
        match self {
            Self::Reference(_) => 1,
            Self::Scalar(_) => 0,
            Self::Mapping(m) => m.values().map(Self::reference_count).sum(),
            Self::Sequence(s) => s.iter().map(Self::reference_count).sum(),
        }
    }

    /// Convert back to a YAML value; references become `!ref`-tagged strings.
    pub fn to_yaml_value(&self) -> serde_yaml_ng::Value {
        use serde_yaml_ng::Value;
        match self {
            Self::Scalar(Scalar::Null) => Value::Null,
            Self::Scalar(Scalar::Bool(b)) => Value::Bool(*b),
            Self::Scalar(Scalar::Number(n)) => Value::Number(n.clone()),
            Self::Scalar(Scalar::String(s)) => Value::String(s.clone()),
            Self::Mapping(m) => Value::Mapping(
                m.iter()
                    .map(|(k, v)| (Value::String(k.clone()), v.to_yaml_value()))
                    .collect(),
            ),
            Self::Sequence(s) => Value::Sequence(s.iter().map(Self::to_yaml_value).collect()),
            Self::Reference(r) if r.is_explicit() => Value::Tagged(Box::new(TaggedValue {
                tag: Tag::new(REF_TAG),
                value: Value::String(r.template().source().to_string()),
            })),
            Self::Reference(r) => Value::String(r.template().source().to_string()),
        }
    }
}

impl Serialize for ConfigNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Scalar(s) => s.serialize(serializer),
            Self::Mapping(m) => {
                let mut map = serializer.serialize_map(Some(m.len()))?;
                for (k, v) in m {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Self::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Reference(r) => serializer.serialize_str(&r.to_string()),
        }
    }
}

// ============================================================================
// Paths
// ============================================================================

/// One step from a container to a child.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Key chain from the document root to a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath(Vec<PathSegment>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Key(key.to_string()));
        Self(segments)
    }

    pub fn index(&self, i: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(i));
        Self(segments)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<PathSegment>> for NodePath {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(k) if i == 0 => write!(f, "{}", k)?,
                PathSegment::Key(k) => write!(f, ".{}", k)?,
                PathSegment::Index(n) => write!(f, "[{}]", n)?,
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tree
// ============================================================================

/// An immutable parsed document. The root is always a mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigTree {
    entries: IndexMap<String, ConfigNode>,
}

impl ConfigTree {
    pub fn new(entries: IndexMap<String, ConfigNode>) -> Self {
        Self { entries }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &IndexMap<String, ConfigNode> {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a dotted key path such as `test.dev-clean.shuffle`.
    pub fn get(&self, dotted: &str) -> Option<&ConfigNode> {
        let mut parts = dotted.split('.');
        let mut node = self.entries.get(parts.next()?)?;
        for part in parts {
            node = node.get(part)?;
        }
        Some(node)
    }

    /// Node at an exact path. The root itself is not a node.
    pub fn node_at(&self, path: &[PathSegment]) -> Option<&ConfigNode> {
        let (first, rest) = path.split_first()?;
        let mut node = match first {
            PathSegment::Key(k) => self.entries.get(k)?,
            PathSegment::Index(_) => return None,
        };
        for segment in rest {
            node = match (segment, node) {
                (PathSegment::Key(k), ConfigNode::Mapping(m)) => m.get(k)?,
                (PathSegment::Index(i), ConfigNode::Sequence(s)) => s.get(*i)?,
                _ => return None,
            };
        }
        Some(node)
    }

    /// Mapping at `path`, if that node is one. The empty path is the root.
    pub fn mapping_at(&self, path: &[PathSegment]) -> Option<&IndexMap<String, ConfigNode>> {
        if path.is_empty() {
            return Some(&self.entries);
        }
        self.node_at(path).and_then(ConfigNode::as_mapping)
    }

    pub fn reference_count(&self) -> usize {
        self.entries.values().map(ConfigNode::reference_count).sum()
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        let value = ConfigNode::Mapping(self.entries.clone()).to_yaml_value();
        serde_yaml_ng::to_string(&value)
            .map_err(|e| ConfigError::syntax(NodePath::root(), format!("YAML emit error: {}", e)))
    }
}

impl Serialize for ConfigTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConfigTree {
        let mut entries = IndexMap::new();
        entries.insert("dataset_path".to_string(), ConfigNode::string("datasets/"));
        entries.insert(
            "test".to_string(),
            ConfigNode::mapping([(
                "dev-clean",
                ConfigNode::mapping([
                    ("shuffle", ConfigNode::Scalar(false.into())),
                    (
                        "items",
                        ConfigNode::Sequence(vec![ConfigNode::mapping([(
                            "name",
                            ConfigNode::string("a"),
                        )])]),
                    ),
                ]),
            )]),
        );
        ConfigTree::new(entries)
    }

    #[test]
    fn test_rc001_dotted_get() {
        let tree = sample();
        assert_eq!(
            tree.get("test.dev-clean.shuffle").and_then(ConfigNode::as_bool),
            Some(false)
        );
        assert!(tree.get("test.missing").is_none());
        assert!(tree.get("dataset_path.deeper").is_none());
    }

    #[test]
    fn test_rc001_node_path_display() {
        let p = NodePath::root().child("test").child("items").index(2).child("name");
        assert_eq!(p.to_string(), "test.items[2].name");
        assert_eq!(NodePath::root().to_string(), "<root>");
    }

    #[test]
    fn test_rc001_node_at_through_sequence() {
        let tree = sample();
        let p = NodePath::root()
            .child("test")
            .child("dev-clean")
            .child("items")
            .index(0)
            .child("name");
        assert_eq!(tree.node_at(p.segments()).and_then(ConfigNode::as_str), Some("a"));
        assert!(tree.mapping_at(&[]).is_some());
        assert!(tree.mapping_at(NodePath::root().child("dataset_path").segments()).is_none());
    }

    #[test]
    fn test_rc001_kinds() {
        assert_eq!(ConfigNode::string("x").kind(), NodeKind::Scalar);
        assert_eq!(ConfigNode::Scalar(Scalar::Null).kind(), NodeKind::Null);
        let r = ConfigNode::Reference(ReferencePath::explicit("<a>").unwrap());
        assert_eq!(r.kind(), NodeKind::Scalar);
        assert_eq!(r.describe(), "unresolved reference");
        assert_eq!(r.reference_count(), 1);
    }

    #[test]
    fn test_rc001_scalar_render() {
        assert_eq!(Scalar::from(3).render(), "3");
        assert_eq!(Scalar::from(true).render(), "true");
        assert_eq!(Scalar::Null.render(), "");
    }

    #[test]
    fn test_rc001_to_yaml_keeps_ref_tag() {
        let mut entries = IndexMap::new();
        entries.insert(
            "root".to_string(),
            ConfigNode::Reference(ReferencePath::explicit("<a>/b").unwrap()),
        );
        let yaml = ConfigTree::new(entries).to_yaml().unwrap();
        assert!(yaml.contains("!ref"), "{}", yaml);
        assert!(yaml.contains("<a>/b"), "{}", yaml);
    }

    #[test]
    fn test_rc001_json_serialize_order() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.starts_with("{\"dataset_path\":\"datasets/\",\"test\""));
    }
}
