use crate::error::Error;

/// Storage failure.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object not found: {id}")]
    NotFound { id: String },

    /// The backend confirmed fewer deletions than requested. `ids` lists the
    /// objects left behind, sorted.
    #[error("some ids cannot be deleted: [{}]", ids.join(", "))]
    PartialDelete { ids: Vec<String> },

    #[error("{op} {id}: object still present after waiting")]
    Timeout { op: &'static str, id: String },

    #[error("{op}: {source}")]
    Backend {
        op: &'static str,
        #[source]
        source: object_store::Error,
    },

    #[error("storage configuration: {0}")]
    Config(String),
}

impl StorageError {
    /// Wraps a backend error, keeping not-found distinguishable.
    pub fn backend(op: &'static str, id: &str, source: object_store::Error) -> Self {
        match source {
            object_store::Error::NotFound { .. } => Self::NotFound { id: id.to_owned() },
            source => Self::Backend { op, source },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => Error::not_found(err.to_string()),
            other => Error::internal(other.to_string()),
        }
    }
}
