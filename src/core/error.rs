//! RC-006: Error taxonomy for the recipe engine.
//!
//! Every variant carries the dotted/bracketed key chain (or file path) of the
//! failing node. All errors are terminal for the configuration unit that
//! produced them.

use thiserror::Error;

/// Result type used throughout the engine.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Engine error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Malformed document.
    #[error("syntax error at {path}: {message}")]
    Syntax { path: String, message: String },

    /// Override supplies a different node kind than the base at the same key.
    #[error("type conflict at {path}: base is a {base}, override supplies a {override_kind}")]
    TypeConflict {
        path: String,
        base: String,
        override_kind: String,
    },

    /// Placeholder that names no reachable key.
    #[error("unresolved reference <{name}> at {path}")]
    UnresolvedReference { path: String, name: String },

    /// Reference cycle, or resolution depth bound exceeded.
    #[error("cyclic reference: {}", cycle.join(" -> "))]
    CyclicReference { cycle: Vec<String> },

    /// `type` or `dataset_type` not present in the registry.
    #[error("unknown type '{type_name}' at {path}")]
    UnknownType { path: String, type_name: String },

    /// Resolved value has the wrong shape for its field.
    #[error("schema error at {path}: expected {expected}, got {actual}")]
    Schema {
        path: String,
        expected: String,
        actual: String,
    },

    /// Input document could not be read.
    #[error("cannot read {path}: {message}")]
    Io { path: String, message: String },
}

impl ConfigError {
    pub fn syntax(path: impl ToString, message: impl Into<String>) -> Self {
        Self::Syntax {
            path: path.to_string(),
            message: message.into(),
        }
    }

    pub fn schema(
        path: impl ToString,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::Schema {
            path: path.to_string(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Short machine-friendly name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Syntax { .. } => "SyntaxError",
            Self::TypeConflict { .. } => "TypeConflictError",
            Self::UnresolvedReference { .. } => "UnresolvedReferenceError",
            Self::CyclicReference { .. } => "CyclicReferenceError",
            Self::UnknownType { .. } => "UnknownTypeError",
            Self::Schema { .. } => "SchemaError",
            Self::Io { .. } => "IoError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rc006_display_carries_path() {
        let e = ConfigError::schema("test.dev-clean.shuffle", "bool", "string");
        assert_eq!(
            e.to_string(),
            "schema error at test.dev-clean.shuffle: expected bool, got string"
        );
    }

    #[test]
    fn test_rc006_cycle_display() {
        let e = ConfigError::CyclicReference {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(e.to_string(), "cyclic reference: a -> b -> a");
        assert_eq!(e.kind(), "CyclicReferenceError");
    }

    #[test]
    fn test_rc006_unknown_type_display() {
        let e = ConfigError::UnknownType {
            path: "test.a.type".into(),
            type_name: "bogus.kind".into(),
        };
        assert_eq!(e.to_string(), "unknown type 'bogus.kind' at test.a.type");
        assert_eq!(e.kind(), "UnknownTypeError");
    }
}
