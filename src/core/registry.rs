//! RC-007: Type registry dispatching `type` and `dataset_type` to builders.
//!
//! The vocabulary of iterator and dataset kinds is fixed at startup. The
//! process-wide registry is built once on first use and is read-only
//! afterwards, so concurrent `instantiate` calls need no locking.

use super::error::{ConfigError, ConfigResult};
use super::recipe::DatasetSpec;
use super::types::{ConfigNode, NodePath, Scalar, TYPE_KEY};
use indexmap::{IndexMap, IndexSet};
use std::fmt;
use std::sync::LazyLock;

/// Builds a typed split specification from its resolved node.
pub trait DatasetIteratorBuilder: Send + Sync {
    fn build(&self, path: &NodePath, node: &ConfigNode) -> ConfigResult<DatasetSpec>;
}

/// Built-in iterator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteratorKind {
    /// `abs.Iterator`: no iterator-specific keys.
    Abstract,
    /// `block.BlockIterator`: needs a positive `batch_len`.
    Block,
    /// `piece.PieceIterator`: needs a positive integer `batch_size`.
    Piece,
}

impl IteratorKind {
    pub const ALL: [IteratorKind; 3] = [Self::Abstract, Self::Block, Self::Piece];

    pub fn type_name(self) -> &'static str {
        match self {
            Self::Abstract => "abs.Iterator",
            Self::Block => "block.BlockIterator",
            Self::Piece => "piece.PieceIterator",
        }
    }
}

impl fmt::Display for IteratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

impl DatasetIteratorBuilder for IteratorKind {
    fn build(&self, path: &NodePath, node: &ConfigNode) -> ConfigResult<DatasetSpec> {
        let spec = DatasetSpec::from_node(path, node)?;
        match self {
            Self::Abstract => {}
            Self::Block => {
                let ok = number(&spec, "batch_len")
                    .and_then(|n| n.as_f64())
                    .is_some_and(|v| v > 0.0);
                if !ok {
                    return Err(bad_key(path, &spec, "batch_len", "positive number"));
                }
            }
            Self::Piece => {
                let ok = number(&spec, "batch_size")
                    .and_then(|n| n.as_u64())
                    .is_some_and(|v| v > 0);
                if !ok {
                    return Err(bad_key(path, &spec, "batch_size", "positive integer"));
                }
            }
        }
        Ok(spec)
    }
}

fn number<'s>(spec: &'s DatasetSpec, key: &str) -> Option<&'s serde_yaml_ng::Number> {
    match spec.iterator_conf.get(key) {
        Some(ConfigNode::Scalar(Scalar::Number(n))) => Some(n),
        _ => None,
    }
}

fn bad_key(path: &NodePath, spec: &DatasetSpec, key: &str, expected: &str) -> ConfigError {
    let actual = match spec.iterator_conf.get(key) {
        Some(ConfigNode::Scalar(s)) => format!("{} {}", s.type_name(), s.render()),
        Some(other) => other.describe().to_string(),
        None => "missing".to_string(),
    };
    ConfigError::schema(path.child(key), expected, actual.trim_end())
}

/// Built-in dataset kinds.
pub const DATASET_KINDS: [&str; 2] = [
    "speech_text.SpeechTextDataset",
    "speech_text.RandomSpkFeatDataset",
];

struct FnBuilder<F>(F);

impl<F> DatasetIteratorBuilder for FnBuilder<F>
where
    F: Fn(&NodePath, &ConfigNode) -> ConfigResult<DatasetSpec> + Send + Sync,
{
    fn build(&self, path: &NodePath, node: &ConfigNode) -> ConfigResult<DatasetSpec> {
        (self.0)(path, node)
    }
}

/// Registered iterator builders and dataset kinds.
#[derive(Default)]
pub struct TypeRegistry {
    builders: IndexMap<String, Box<dyn DatasetIteratorBuilder>>,
    dataset_types: IndexSet<String>,
}

impl TypeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in iterator and dataset kind.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for kind in IteratorKind::ALL {
            registry.register(kind.type_name(), kind);
        }
        for dataset in DATASET_KINDS {
            registry.register_dataset(dataset);
        }
        registry
    }

    pub fn register(
        &mut self,
        type_name: impl Into<String>,
        builder: impl DatasetIteratorBuilder + 'static,
    ) -> &mut Self {
        self.builders.insert(type_name.into(), Box::new(builder));
        self
    }

    pub fn register_fn<F>(&mut self, type_name: impl Into<String>, builder: F) -> &mut Self
    where
        F: Fn(&NodePath, &ConfigNode) -> ConfigResult<DatasetSpec> + Send + Sync + 'static,
    {
        self.register(type_name, FnBuilder(builder))
    }

    pub fn register_dataset(&mut self, dataset_type: impl Into<String>) -> &mut Self {
        self.dataset_types.insert(dataset_type.into());
        self
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.builders.contains_key(type_name)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.builders.keys().map(String::as_str)
    }

    pub fn dataset_types(&self) -> impl Iterator<Item = &str> {
        self.dataset_types.iter().map(String::as_str)
    }

    /// Build the split at `path` with the builder registered for `type_name`.
    pub fn instantiate(
        &self,
        type_name: &str,
        path: &NodePath,
        node: &ConfigNode,
    ) -> ConfigResult<DatasetSpec> {
        let builder = self
            .builders
            .get(type_name)
            .ok_or_else(|| ConfigError::UnknownType {
                path: path.child(TYPE_KEY).to_string(),
                type_name: type_name.to_string(),
            })?;
        let spec = builder.build(path, node)?;
        if !self.dataset_types.contains(&spec.dataset_type) {
            return Err(ConfigError::UnknownType {
                path: path.child("dataset_type").to_string(),
                type_name: spec.dataset_type,
            });
        }
        Ok(spec)
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.builders.keys().collect::<Vec<_>>())
            .field("dataset_types", &self.dataset_types)
            .finish()
    }
}

static GLOBAL: LazyLock<TypeRegistry> = LazyLock::new(TypeRegistry::with_defaults);

/// The process-wide default registry.
pub fn global() -> &'static TypeRegistry {
    &GLOBAL
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::parse_document;

    fn split(extra: &str) -> ConfigNode {
        let yaml = format!(
            r#"
s:
  type: abs.Iterator
  dataset_type: speech_text.SpeechTextDataset
  dataset_conf:
    main_data:
      feat: data/idx2wav
  shuffle: true
  data_len: data/idx2wav_len
{}
"#,
            extra
        );
        parse_document(&yaml).unwrap().get("s").unwrap().clone()
    }

    #[test]
    fn test_rc007_defaults() {
        let r = TypeRegistry::with_defaults();
        let names: Vec<_> = r.type_names().collect();
        assert_eq!(
            names,
            vec!["abs.Iterator", "block.BlockIterator", "piece.PieceIterator"]
        );
        assert_eq!(r.dataset_types().count(), 2);
        assert!(global().contains("abs.Iterator"));
    }

    #[test]
    fn test_rc007_unknown_type() {
        let mut r = TypeRegistry::new();
        r.register(IteratorKind::Abstract.type_name(), IteratorKind::Abstract);
        let err = r
            .instantiate("unknown.kind", &NodePath::root().child("s"), &split(""))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownType {
                path: "s.type".into(),
                type_name: "unknown.kind".into()
            }
        );
    }

    #[test]
    fn test_rc007_unknown_dataset_type() {
        let mut r = TypeRegistry::new();
        r.register("abs.Iterator", IteratorKind::Abstract);
        let err = r
            .instantiate("abs.Iterator", &NodePath::root().child("s"), &split(""))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownType {
                path: "s.dataset_type".into(),
                type_name: "speech_text.SpeechTextDataset".into()
            }
        );
    }

    #[test]
    fn test_rc007_block_needs_batch_len() {
        let r = global();
        let path = NodePath::root().child("s");
        let err = r.instantiate("block.BlockIterator", &path, &split("")).unwrap_err();
        match err {
            ConfigError::Schema { path, actual, .. } => {
                assert_eq!(path, "s.batch_len");
                assert_eq!(actual, "missing");
            }
            other => panic!("unexpected {:?}", other),
        }
        let spec = r
            .instantiate("block.BlockIterator", &path, &split("  batch_len: 1000.5"))
            .unwrap();
        assert!(spec.iterator_conf.contains_key("batch_len"));
    }

    #[test]
    fn test_rc007_piece_needs_integer_batch_size() {
        let r = global();
        let path = NodePath::root().child("s");
        assert!(r
            .instantiate("piece.PieceIterator", &path, &split("  batch_size: 0"))
            .is_err());
        assert!(r
            .instantiate("piece.PieceIterator", &path, &split("  batch_size: 2.5"))
            .is_err());
        assert!(r
            .instantiate("piece.PieceIterator", &path, &split("  batch_size: 16"))
            .is_ok());
    }

    #[test]
    fn test_rc007_register_fn() {
        let mut r = TypeRegistry::new();
        r.register_dataset("speech_text.SpeechTextDataset");
        r.register_fn("custom.ShuffledOnly", |path, node| {
            let spec = DatasetSpec::from_node(path, node)?;
            if !spec.shuffle {
                return Err(ConfigError::schema(path.child("shuffle"), "true", "false"));
            }
            Ok(spec)
        });
        let spec = r
            .instantiate("custom.ShuffledOnly", &NodePath::root().child("s"), &split(""))
            .unwrap();
        assert!(spec.shuffle);
    }

    #[test]
    fn test_rc007_global_is_shared_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                std::thread::spawn(|| {
                    global()
                        .instantiate("abs.Iterator", &NodePath::root().child("s"), &split(""))
                        .is_ok()
                })
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
    }
}
