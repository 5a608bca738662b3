//! RC-008: Typed recipe model built from a resolved tree.
//!
//! A top-level mapping is a section (`train`, `valid`, `test`, ...) when at
//! least one of its entries is a mapping carrying `type`; every entry of a
//! section is then a dataset split handed to the registry builder named by
//! its `type`. Other top-level values, including variable namespaces such as
//! `paths: {root: ...}`, are recipe variables and are not part of the model.

use super::error::{ConfigError, ConfigResult};
use super::registry::TypeRegistry;
use super::types::*;
use indexmap::IndexMap;
use serde::Serialize;

/// Grouping dimension (e.g. `speaker`, `gender`) → label source path.
pub type GroupInfo = IndexMap<String, String>;

/// The resolved recipe handed to the training/evaluation driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RecipeConfig {
    sections: IndexMap<String, IndexMap<String, DatasetSpec>>,
}

impl RecipeConfig {
    pub fn sections(&self) -> &IndexMap<String, IndexMap<String, DatasetSpec>> {
        &self.sections
    }

    pub fn section(&self, name: &str) -> Option<&IndexMap<String, DatasetSpec>> {
        self.sections.get(name)
    }

    pub fn split(&self, section: &str, split: &str) -> Option<&DatasetSpec> {
        self.sections.get(section)?.get(split)
    }

    pub fn split_count(&self) -> usize {
        self.sections.values().map(IndexMap::len).sum()
    }
}

/// One named evaluation split.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSpec {
    #[serde(rename = "type")]
    pub iterator_type: String,
    pub dataset_type: String,
    pub dataset_conf: DatasetConf,
    pub shuffle: bool,
    pub data_len: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_info: Option<GroupInfo>,
    /// Iterator-specific keys such as `batch_len`.
    #[serde(flatten)]
    pub iterator_conf: IndexMap<String, ConfigNode>,
}

/// Data sources of a split.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetConf {
    pub main_data: IndexMap<String, String>,
    /// Dataset-kind-specific keys.
    #[serde(flatten)]
    pub extra: IndexMap<String, ConfigNode>,
}

const SPEC_KEYS: [&str; 6] = [
    TYPE_KEY,
    "dataset_type",
    "dataset_conf",
    "shuffle",
    "data_len",
    "group_info",
];

impl DatasetSpec {
    /// Validate the common shape of a split. Registry builders call this and
    /// then check their own iterator-specific keys.
    pub fn from_node(path: &NodePath, node: &ConfigNode) -> ConfigResult<Self> {
        let map = expect_mapping(path, node)?;

        let iterator_type = literal_string(&path.child(TYPE_KEY), required(path, map, TYPE_KEY)?)?;
        let dataset_type = literal_string(
            &path.child("dataset_type"),
            required(path, map, "dataset_type")?,
        )?;

        let conf_path = path.child("dataset_conf");
        let conf = expect_mapping(&conf_path, required(path, map, "dataset_conf")?)?;
        let main_path = conf_path.child("main_data");
        let main_data = string_map(&main_path, required(&conf_path, conf, "main_data")?)?;
        if main_data.is_empty() {
            return Err(ConfigError::schema(main_path, "non-empty mapping", "empty mapping"));
        }
        let extra = conf
            .iter()
            .filter(|(k, _)| k.as_str() != "main_data")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let shuffle_path = path.child("shuffle");
        let shuffle_node = required(path, map, "shuffle")?;
        let shuffle = shuffle_node
            .as_bool()
            .ok_or_else(|| ConfigError::schema(&shuffle_path, "bool", shuffle_node.describe()))?;

        let data_len = literal_string(&path.child("data_len"), required(path, map, "data_len")?)?;

        let group_info = match map.get("group_info") {
            None | Some(ConfigNode::Scalar(Scalar::Null)) => None,
            Some(node) => Some(string_map(&path.child("group_info"), node)?),
        };

        let iterator_conf = map
            .iter()
            .filter(|(k, _)| !SPEC_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            iterator_type,
            dataset_type,
            dataset_conf: DatasetConf { main_data, extra },
            shuffle,
            data_len,
            group_info,
            iterator_conf,
        })
    }
}

/// Build the typed recipe from a resolved tree.
pub fn build(resolved: &ConfigTree, registry: &TypeRegistry) -> ConfigResult<RecipeConfig> {
    let mut sections = IndexMap::new();
    for (name, node) in resolved.entries() {
        let path = NodePath::root().child(name);
        let splits = match node {
            ConfigNode::Mapping(m) if is_section(m) => m,
            ConfigNode::Reference(_) => {
                return Err(ConfigError::schema(path, "resolved value", node.describe()));
            }
            _ => continue,
        };

        let mut specs = IndexMap::with_capacity(splits.len());
        for (split, spec_node) in splits {
            let split_path = path.child(split);
            let spec_map = expect_mapping(&split_path, spec_node)?;
            let type_name = literal_string(
                &split_path.child(TYPE_KEY),
                required(&split_path, spec_map, TYPE_KEY)?,
            )?;
            let spec = registry.instantiate(&type_name, &split_path, spec_node)?;
            tracing::debug!(section = %name, split = %split, kind = %type_name, "split built");
            specs.insert(split.clone(), spec);
        }
        sections.insert(name.clone(), specs);
    }
    Ok(RecipeConfig { sections })
}

fn is_section(entries: &IndexMap<String, ConfigNode>) -> bool {
    entries
        .values()
        .any(|v| v.as_mapping().is_some_and(|m| m.contains_key(TYPE_KEY)))
}

fn expect_mapping<'n>(
    path: &NodePath,
    node: &'n ConfigNode,
) -> ConfigResult<&'n IndexMap<String, ConfigNode>> {
    node.as_mapping()
        .ok_or_else(|| ConfigError::schema(path, "mapping", node.describe()))
}

fn required<'n>(
    path: &NodePath,
    map: &'n IndexMap<String, ConfigNode>,
    key: &str,
) -> ConfigResult<&'n ConfigNode> {
    map.get(key)
        .ok_or_else(|| ConfigError::schema(path.child(key), "value", "missing"))
}

fn literal_string(path: &NodePath, node: &ConfigNode) -> ConfigResult<String> {
    match node {
        ConfigNode::Scalar(Scalar::String(s)) if !s.is_empty() => Ok(s.clone()),
        ConfigNode::Scalar(Scalar::String(_)) => {
            Err(ConfigError::schema(path, "non-empty string", "empty string"))
        }
        other => Err(ConfigError::schema(path, "non-empty string", other.describe())),
    }
}

fn string_map(path: &NodePath, node: &ConfigNode) -> ConfigResult<IndexMap<String, String>> {
    expect_mapping(path, node)?
        .iter()
        .map(|(k, v)| Ok((k.clone(), literal_string(&path.child(k), v)?)))
        .collect()
}
