//! RC-009: Pipeline from documents to a typed recipe.
//!
//! One configuration unit flows through the stages in order and the first
//! error aborts it. Units share nothing but the read-only registry, so
//! independent units may run on separate threads.

use super::error::ConfigResult;
use super::merger::{self, ConflictPolicy};
use super::parser;
use super::recipe::{self, RecipeConfig};
use super::registry::{self, TypeRegistry};
use super::resolver::{Resolver, DEFAULT_MAX_DEPTH};
use super::types::ConfigTree;
use std::path::Path;

/// Engine options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub conflict_policy: ConflictPolicy,
    pub max_depth: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            conflict_policy: ConflictPolicy::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// A recipe pipeline bound to one registry.
#[derive(Debug, Clone, Copy)]
pub struct Pipeline<'r> {
    registry: &'r TypeRegistry,
    options: PipelineOptions,
}

impl Default for Pipeline<'static> {
    fn default() -> Self {
        Self::new(registry::global(), PipelineOptions::default())
    }
}

impl<'r> Pipeline<'r> {
    pub fn new(registry: &'r TypeRegistry, options: PipelineOptions) -> Self {
        Self { registry, options }
    }

    pub fn options(&self) -> PipelineOptions {
        self.options
    }

    /// Merge overrides into `base` and resolve the result.
    pub fn compose(&self, base: &ConfigTree, overrides: &[ConfigTree]) -> ConfigResult<ConfigTree> {
        let merged = merger::merge_all(base, overrides, self.options.conflict_policy)?;
        tracing::debug!(
            overrides = overrides.len(),
            references = merged.reference_count(),
            "overrides merged"
        );
        Resolver::new(&merged)
            .with_max_depth(self.options.max_depth)
            .resolve()
    }

    /// Build the typed recipe from a resolved tree.
    pub fn build(&self, resolved: &ConfigTree) -> ConfigResult<RecipeConfig> {
        let recipe = recipe::build(resolved, self.registry)?;
        tracing::debug!(
            sections = recipe.sections().len(),
            splits = recipe.split_count(),
            "recipe built"
        );
        Ok(recipe)
    }

    /// Run the whole pipeline over in-memory documents.
    pub fn run_str(&self, base: &str, overrides: &[&str]) -> ConfigResult<RecipeConfig> {
        let base = parser::parse_document(base)?;
        let overrides = overrides
            .iter()
            .map(|doc| parser::parse_document(doc))
            .collect::<ConfigResult<Vec<_>>>()?;
        self.build(&self.compose(&base, &overrides)?)
    }

    /// Parse, merge and resolve documents on disk, stopping before the build.
    pub fn resolve_files<P: AsRef<Path>>(
        &self,
        base: &Path,
        overrides: &[P],
    ) -> ConfigResult<ConfigTree> {
        tracing::debug!(file = %base.display(), "parsing base recipe");
        let base_tree = parser::parse_file(base)?;
        let mut override_trees = Vec::with_capacity(overrides.len());
        for path in overrides {
            let path = path.as_ref();
            tracing::debug!(file = %path.display(), "parsing override");
            override_trees.push(parser::parse_file(path)?);
        }
        self.compose(&base_tree, &override_trees)
    }

    /// Run the whole pipeline over documents on disk.
    pub fn run_files<P: AsRef<Path>>(
        &self,
        base: &Path,
        overrides: &[P],
    ) -> ConfigResult<RecipeConfig> {
        self.build(&self.resolve_files(base, overrides)?)
    }
}
