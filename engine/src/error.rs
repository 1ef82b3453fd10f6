//! Error taxonomy for model services
//! Every failure surfaces to the caller; nothing here retries or swallows.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tonic::{Code, Status};

/// Key used for errors that do not belong to a single field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Field-level validation errors reported by a serializer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationError {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single error attached to one field
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut error = Self::new();
        error.add(field, message);
        error
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }

    pub fn field_errors(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `Ok(())` when no error was recorded
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.errors {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            write!(f, "{}: {}", field, messages.join(" "))?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Failures reported by a store backend
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("{model} with {field}={value} already exists")]
    Conflict {
        model: String,
        field: String,
        value: String,
    },

    #[error("{0} instance is not persisted")]
    NotPersisted(String),

    #[error("Invalid instance data: {0}")]
    InvalidData(String),

    #[error("Store backend failure: {0}")]
    Backend(String),
}

/// Errors raised while serving a model action
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid data: {0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    MultipleObjectsReturned(String),

    #[error("Improperly configured: {0}")]
    Configuration(String),

    #[error("Method not implemented!")]
    NotImplemented,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Message conversion failed: {0}")]
    Conversion(String),
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    /// gRPC status code this error is reported with
    pub fn code(&self) -> Code {
        match self {
            Error::Validation(_) | Error::Conversion(_) => Code::InvalidArgument,
            Error::NotFound(_) => Code::NotFound,
            Error::MultipleObjectsReturned(_) => Code::FailedPrecondition,
            Error::NotImplemented => Code::Unimplemented,
            Error::Store(StoreError::Conflict { .. }) => Code::AlreadyExists,
            Error::Configuration(_) | Error::Store(_) => Code::Internal,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Conversion(error.to_string())
    }
}

impl From<Error> for Status {
    fn from(error: Error) -> Self {
        Status::new(error.code(), error.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display_groups_by_field() {
        let mut error = ValidationError::field("username", "This field is required.");
        error.add("email", "Enter a valid email address.");
        error.add("email", "Ensure this field has no more than 254 characters.");

        assert_eq!(
            error.to_string(),
            "email: Enter a valid email address. Ensure this field has no more than 254 characters.; \
             username: This field is required."
        );
        assert_eq!(error.field_errors("email").len(), 2);
        assert!(error.field_errors("missing").is_empty());
    }

    #[test]
    fn test_empty_validation_error_is_ok() {
        assert!(ValidationError::new().into_result().is_ok());
        assert!(ValidationError::field("a", "b").into_result().is_err());
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (
                Error::Validation(ValidationError::field("a", "bad")),
                Code::InvalidArgument,
            ),
            (Error::NotFound("Account: 9 not found!".into()), Code::NotFound),
            (
                Error::MultipleObjectsReturned("two".into()),
                Code::FailedPrecondition,
            ),
            (Error::configuration("typo"), Code::Internal),
            (Error::NotImplemented, Code::Unimplemented),
            (
                Error::Store(StoreError::Conflict {
                    model: "Account".into(),
                    field: "username".into(),
                    value: "ada".into(),
                }),
                Code::AlreadyExists,
            ),
            (
                Error::Store(StoreError::Backend("disk".into())),
                Code::Internal,
            ),
        ];

        for (error, code) in cases {
            let status = Status::from(error);
            assert_eq!(status.code(), code);
        }
    }

    #[test]
    fn test_not_found_message_is_preserved() {
        let status = Status::from(Error::NotFound("Account: 99 not found!".into()));
        assert_eq!(status.message(), "Account: 99 not found!");
    }
}
