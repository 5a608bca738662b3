//! recipe-ref: reference resolution and override composition for
//! declarative speech dataset recipes.
//!
//! A recipe is a YAML document whose values may point at other keys through
//! `!ref <name>` tags and inline `<name>` interpolation. The engine parses
//! the base recipe and any override documents, merges them, resolves every
//! reference to a literal, and builds typed dataset specifications through a
//! registry keyed by each split's `type`.

pub mod cli;
pub mod core;
