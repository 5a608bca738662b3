//! Core engine: parsing, merging, resolution and the typed recipe build.

pub mod error;
pub mod merger;
pub mod parser;
pub mod pipeline;
pub mod recipe;
pub mod registry;
pub mod resolver;
pub mod template;
pub mod types;

