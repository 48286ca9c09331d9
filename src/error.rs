use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecError {
    #[error("no model is currently loaded")]
    ModelNotLoaded,

    #[error("shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: String,
        expected: String,
        actual: String,
    },

    #[error("user index {index} is out of range (num_users = {num_users})")]
    InvalidUser { index: usize, num_users: usize },

    #[error("storage I/O failure at {path}: {source}")]
    Storage {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization failure: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RecError {
    pub fn shape_mismatch(
        what: impl Into<String>,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn storage(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }
}

pub type RecResult<T> = Result<T, RecError>;
