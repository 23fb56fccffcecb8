use async_trait::async_trait;
use futures::future::BoxFuture;
use shared::domain::{FieldErrors, FieldValues};

use crate::error::ValidatorError;

pub type BoxedValidation = BoxFuture<'static, Result<FieldErrors, ValidatorError>>;

/// Asynchronous check of the whole form.
///
/// `Ok` carries per-field errors (a field missing from the map is valid);
/// `Err` means the check itself could not be carried out.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, fields: FieldValues) -> Result<FieldErrors, ValidatorError>;
}

#[async_trait]
impl<F> Validator for F
where
    F: Fn(FieldValues) -> BoxedValidation + Send + Sync,
{
    async fn validate(&self, fields: FieldValues) -> Result<FieldErrors, ValidatorError> {
        (self)(fields).await
    }
}
