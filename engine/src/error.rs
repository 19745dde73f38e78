//! FILENAME: engine/src/error.rs

use thiserror::Error;

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("{model} has no field named '{path}'")]
    FieldDoesNotExist { model: String, path: String },

    #[error("Improperly configured: {0}")]
    ImproperlyConfigured(String),

    #[error("Incorrect lookup parameters: {0}")]
    IncorrectLookupParameters(String),

    #[error("{model} matching pk={pk} does not exist")]
    ObjectNotFound { model: String, pk: i64 },

    #[error("{model} with pk={pk} already exists")]
    DuplicateObject { model: String, pk: i64 },
}

impl EngineError {
    /// Wraps an error raised while resolving a declared attribute so the
    /// message names the offending attribute.
    pub fn in_attribute(self, attribute: &str) -> EngineError {
        match self {
            EngineError::ImproperlyConfigured(msg) => {
                EngineError::ImproperlyConfigured(format!("{}: {}", attribute, msg))
            }
            other => EngineError::ImproperlyConfigured(format!("{}: {}", attribute, other)),
        }
    }
}
