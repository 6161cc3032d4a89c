use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by a single configuration source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source has nothing to offer (missing file, missing tool, tool failed).
    /// Resolution continues without it.
    #[error("{source_name} unavailable: {reason}")]
    Unavailable { source_name: String, reason: String },

    /// The source exists but its content could not be understood.
    #[error("failed to parse {origin}: {message}")]
    Parse { origin: String, message: String },

    #[error("failed to read {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
}

impl SourceError {
    pub fn unavailable(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        SourceError::Unavailable {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    pub fn parse(origin: impl Into<String>, message: impl Into<String>) -> Self {
        SourceError::Parse {
            origin: origin.into(),
            message: message.into(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, SourceError::Unavailable { .. })
    }
}

/// Errors surfaced by resolution and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("build configuration is missing required field(s): {}", .missing.join(", "))]
    Invalid { missing: Vec<&'static str> },

    #[error("configuration source '{name}' failed")]
    Source {
        name: String,
        #[source]
        error: SourceError,
    },

    #[error("extension fields do not match the requested schema: {0}")]
    Extension(String),

    #[error("failed to serialize build configuration: {0}")]
    Serialize(String),
}

impl ConfigError {
    /// Names of the fields that failed validation, if this is a validation error.
    pub fn missing_fields(&self) -> &[&'static str] {
        match self {
            ConfigError::Invalid { missing } => missing,
            _ => &[],
        }
    }
}
