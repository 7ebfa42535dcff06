use std::path::PathBuf;
use thiserror::Error;

/// JSON value shapes, for conflict diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    Scalar,
    Sequence,
    Mapping,
}

impl std::fmt::Display for ValueShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueShape::Scalar => "a scalar",
            ValueShape::Sequence => "a sequence",
            ValueShape::Mapping => "a mapping",
        };
        f.write_str(name)
    }
}

impl ValueShape {
    pub fn of(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(_) => ValueShape::Mapping,
            serde_json::Value::Array(_) => ValueShape::Sequence,
            _ => ValueShape::Scalar,
        }
    }
}

/// All resolution-phase failures. Every variant is raised before any
/// artifact is written; no partial configuration ever escapes.
#[derive(Error, Debug)]
pub enum StrataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(
        "layer `{layer}` supplies {incoming} for `{key}`, but an earlier layer \
         supplies {existing}; add a $replace marker if the override is intended"
    )]
    Conflict {
        key: String,
        layer: String,
        existing: ValueShape,
        incoming: ValueShape,
    },

    #[error("unknown environment `{name}` (registered: {})", .registered.join(", "))]
    UnknownEnvironment {
        name: String,
        registered: Vec<String>,
    },

    #[error("no rule matches resource `{}`; declare a rule or mark the type as handled", .0.display())]
    UnroutedResource(PathBuf),

    #[error(
        "module `{module}` is {size} bytes, which alone exceeds the {max_bytes} byte \
         cap of chunk group `{group}`"
    )]
    ChunkCapacity {
        module: String,
        size: u64,
        max_bytes: u64,
        group: String,
    },

    #[error(
        "output name collision on `{}`: content {first} and content {second} \
         both map to it; lengthen the hash prefix", .path.display()
    )]
    NamingCollision {
        path: PathBuf,
        first: String,
        second: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StrataError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

pub type Result<T> = std::result::Result<T, StrataError>;

impl From<regex::Error> for StrataError {
    fn from(err: regex::Error) -> Self {
        StrataError::config(format!("invalid matcher pattern: {}", err))
    }
}

impl From<anyhow::Error> for StrataError {
    fn from(err: anyhow::Error) -> Self {
        StrataError::config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_shape_of() {
        assert_eq!(ValueShape::of(&serde_json::json!(9090)), ValueShape::Scalar);
        assert_eq!(ValueShape::of(&serde_json::json!("x")), ValueShape::Scalar);
        assert_eq!(ValueShape::of(&serde_json::json!([1, 2])), ValueShape::Sequence);
        assert_eq!(ValueShape::of(&serde_json::json!({"a": 1})), ValueShape::Mapping);
    }

    #[test]
    fn test_conflict_message_names_layer_and_key() {
        let err = StrataError::Conflict {
            key: "port".to_string(),
            layer: "overrides".to_string(),
            existing: ValueShape::Scalar,
            incoming: ValueShape::Mapping,
        };
        let msg = err.to_string();
        assert!(msg.contains("`overrides`"));
        assert!(msg.contains("`port`"));
        assert!(msg.contains("$replace"));
    }
}
