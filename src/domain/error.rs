use thiserror::Error;

use super::permalink::PermalinkError;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("`{entity}` not found")]
    NotFound { entity: &'static str },
    #[error("invalid `{field}`: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error(transparent)]
    Permalink(#[from] PermalinkError),
}

impl DomainError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}
