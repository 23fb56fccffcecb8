use form_state::FormError;
use thiserror::Error;

use crate::progress::ProgressStoreError;

#[derive(Debug, Error)]
pub enum SiteStepError {
    #[error(transparent)]
    Form(#[from] FormError),
    #[error(transparent)]
    Progress(#[from] ProgressStoreError),
}

pub type SiteStepResult<T> = Result<T, SiteStepError>;
