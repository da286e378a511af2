use std::fmt;
use thiserror::Error;

use storage::StorageError;

/// Messages for every violated field constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidFields(pub Vec<&'static str>);

impl fmt::Display for InvalidFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed: {}", self.0.join("; "))
    }
}

#[derive(Debug, Error)]
pub enum AdsError {
    #[error("{0}")]
    Validation(InvalidFields),

    #[error("image file too large ({size} bytes, limit {max})")]
    ImageTooLarge { size: usize, max: usize },

    #[error("ad not found")]
    NotFound,

    #[error("ad belongs to another user")]
    Forbidden,

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, AdsError>;
