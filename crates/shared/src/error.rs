use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes the sites endpoint is known to return. The remote side may add
/// new ones at any time, so codes travel as plain strings.
pub mod codes {
    pub const BLOG_NAME_EXISTS: &str = "blog_name_exists";
    pub const BLOG_NAME_RESERVED: &str = "blog_name_reserved";
    pub const MISSING_SITE_TITLE: &str = "missing_site_title";

    /// The name belongs to an existing account, so its owner may claim it.
    pub fn is_reserved_name(code: &str) -> bool {
        code == BLOG_NAME_RESERVED
    }
}

/// Error object returned by the remote API as `{error, message}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{error}: {message}")]
pub struct ApiError {
    pub error: String,
    pub message: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}
