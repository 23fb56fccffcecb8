use shared::domain::FieldName;
use thiserror::Error;

/// Failure of the validation collaborator itself, as opposed to a field that
/// failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidatorError {
    #[error("validation transport failed: {0}")]
    Transport(String),
    #[error("unexpected validation response: {0}")]
    UnexpectedResponse(String),
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error("form controller needs at least one field")]
    NoFields,
    #[error("duplicate field name: {0}")]
    DuplicateField(FieldName),
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("form controller needs a validator")]
    MissingValidator,
    #[error("form controller must be built inside a tokio runtime")]
    RuntimeUnavailable,
    #[error("form state lock poisoned while {0}")]
    StatePoisoned(&'static str),
    #[error(transparent)]
    Validator(#[from] ValidatorError),
}

pub type FormResult<T> = Result<T, FormError>;
