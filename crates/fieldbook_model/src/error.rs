//! Error types for model validation.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while building or validating records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// The entry key is not a `YYYY-MM-DD` calendar date.
    #[error("invalid entry date {0:?}: expected YYYY-MM-DD")]
    InvalidDate(String),

    /// A business field holds a value the record cannot carry.
    #[error("invalid value for {field}: {reason}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// A device identifier could not be parsed.
    #[error("invalid device id {0:?}")]
    InvalidDeviceId(String),
}

impl ModelError {
    /// Shorthand for [`ModelError::InvalidField`].
    pub fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ModelError::InvalidDate("10/07/2025".into());
        assert!(err.to_string().contains("10/07/2025"));

        let err = ModelError::invalid_field("hours", "must be finite");
        assert_eq!(err.to_string(), "invalid value for hours: must be finite");
    }
}
