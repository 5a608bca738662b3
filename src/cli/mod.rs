//! RC-010: CLI subcommands (resolve, validate, build, types).

use crate::core::merger::ConflictPolicy;
use crate::core::pipeline::{Pipeline, PipelineOptions};
use crate::core::registry::{self, TypeRegistry};
use crate::core::resolver::DEFAULT_MAX_DEPTH;
use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge overrides and print the fully resolved tree
    Resolve {
        #[command(flatten)]
        input: RecipeArgs,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Yaml)]
        format: Format,
    },

    /// Check that the recipe builds into typed dataset specs
    Validate {
        #[command(flatten)]
        input: RecipeArgs,
    },

    /// Print the typed recipe handed to the training driver
    Build {
        #[command(flatten)]
        input: RecipeArgs,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },

    /// List registered iterator and dataset types
    Types,
}

/// Input documents and engine options shared by the recipe subcommands.
#[derive(Args, Debug, Clone)]
pub struct RecipeArgs {
    /// Base recipe (data_cfg YAML)
    #[arg(short, long, default_value = "data_cfg.yaml")]
    pub file: PathBuf,

    /// Override document, applied in order (repeatable)
    #[arg(short = 'o', long = "override")]
    pub overrides: Vec<PathBuf>,

    /// Let an override change a node's kind instead of failing
    #[arg(long)]
    pub allow_kind_change: bool,

    /// Bound on nested reference resolution
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    pub max_depth: usize,
}

impl RecipeArgs {
    fn options(&self) -> PipelineOptions {
        PipelineOptions {
            conflict_policy: if self.allow_kind_change {
                ConflictPolicy::OverrideWins
            } else {
                ConflictPolicy::Reject
            },
            max_depth: self.max_depth,
        }
    }

    fn pipeline(&self) -> Pipeline<'static> {
        Pipeline::new(registry::global(), self.options())
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Resolve { input, format } => cmd_resolve(&input, format),
        Commands::Validate { input } => cmd_validate(&input),
        Commands::Build { input, format } => cmd_build(&input, format),
        Commands::Types => cmd_types(registry::global()),
    }
}

fn cmd_resolve(input: &RecipeArgs, format: Format) -> Result<(), String> {
    print!("{}", render_resolved(input, format)?);
    Ok(())
}

fn render_resolved(input: &RecipeArgs, format: Format) -> Result<String, String> {
    let tree = input
        .pipeline()
        .resolve_files(&input.file, input.overrides.as_slice())
        .map_err(|e| e.to_string())?;
    match format {
        Format::Yaml => tree.to_yaml().map_err(|e| e.to_string()),
        Format::Json => serde_json::to_string_pretty(&tree)
            .map(|s| s + "\n")
            .map_err(|e| format!("JSON error: {}", e)),
    }
}

fn cmd_validate(input: &RecipeArgs) -> Result<(), String> {
    println!("{}", validate_summary(input)?);
    Ok(())
}

fn validate_summary(input: &RecipeArgs) -> Result<String, String> {
    let recipe = input
        .pipeline()
        .run_files(&input.file, input.overrides.as_slice())
        .map_err(|e| e.to_string())?;
    Ok(format!(
        "OK: {} ({} sections, {} splits)",
        input.file.display(),
        recipe.sections().len(),
        recipe.split_count()
    ))
}

fn cmd_build(input: &RecipeArgs, format: Format) -> Result<(), String> {
    print!("{}", render_recipe(input, format)?);
    Ok(())
}

fn render_recipe(input: &RecipeArgs, format: Format) -> Result<String, String> {
    let recipe = input
        .pipeline()
        .run_files(&input.file, input.overrides.as_slice())
        .map_err(|e| e.to_string())?;
    match format {
        Format::Yaml => serde_yaml_ng::to_string(&recipe).map_err(|e| format!("YAML error: {}", e)),
        Format::Json => serde_json::to_string_pretty(&recipe)
            .map(|s| s + "\n")
            .map_err(|e| format!("JSON error: {}", e)),
    }
}

fn cmd_types(registry: &TypeRegistry) -> Result<(), String> {
    print!("{}", list_types(registry));
    Ok(())
}

fn list_types(registry: &TypeRegistry) -> String {
    let mut out = String::from("Iterator types:\n");
    for name in registry.type_names() {
        out.push_str(&format!("  {}\n", name));
    }
    out.push_str("Dataset types:\n");
    for name in registry.dataset_types() {
        out.push_str(&format!("  {}\n", name));
    }
    out
}
