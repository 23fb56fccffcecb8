//! Debounced, multi-field form validation.
//!
//! A [`FormController`] owns the [`FormState`] of one form. Field edits are
//! sanitized and validated after a quiet period; submit skips the wait and
//! gates the caller on the result. Validator responses are stamped with a
//! [`Generation`] so that a late answer can never overwrite a newer one.

mod controller;
pub mod error;
mod sanitize;
mod store;
mod validate;

pub use controller::{
    ErrorObserver, FormController, FormControllerBuilder, NewStateObserver, DEFAULT_DEBOUNCE_WAIT,
};
pub use error::{FormError, FormResult, ValidatorError};
pub use sanitize::{NoopSanitizer, Sanitizer};
pub use shared::domain::{ErrorMap, FieldErrors, FieldName, FieldState, FieldValues, FormState};
pub use store::{FieldStore, Generation};
pub use validate::{BoxedValidation, Validator};
