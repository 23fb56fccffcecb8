use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{FormState, StepName},
    error::ApiError,
};

pub const DEFAULT_API_VERSION: &str = "1.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

/// Description of a single call against the REST API, independent of the
/// transport that ends up executing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WpcomRequest {
    pub path: String,
    pub method: HttpMethod,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

impl WpcomRequest {
    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            path: path.into(),
            method: HttpMethod::Post,
            api_version: default_api_version(),
            query: BTreeMap::new(),
            body: Some(body),
        }
    }

    /// Path relative to the API base, e.g. `rest/v1.1/sites/new`.
    pub fn versioned_path(&self) -> String {
        format!(
            "rest/v{}/{}",
            self.api_version,
            self.path.trim_start_matches('/')
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WpcomClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitesNewRequest {
    pub blog_name: String,
    pub blog_title: String,
    pub validate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

impl SitesNewRequest {
    pub fn validation(blog_name: impl Into<String>, blog_title: impl Into<String>) -> Self {
        Self {
            blog_name: blog_name.into(),
            blog_title: blog_title.into(),
            validate: true,
            client_id: None,
            client_secret: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Option<&WpcomClientCredentials>) -> Self {
        if let Some(credentials) = credentials {
            self.client_id = Some(credentials.client_id.clone());
            self.client_secret = Some(credentials.client_secret.clone());
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blogname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blogid: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitesNewResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blog_details: Option<BlogDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    InProgress,
    Completed,
}

/// Progress record kept for a signup step between mounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedStep {
    pub step_name: StepName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<FormState>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ApiError>,
    #[serde(default)]
    pub status: StepStatus,
    pub saved_at: DateTime<Utc>,
}

impl SavedStep {
    pub fn new(step_name: StepName, form: FormState) -> Self {
        Self {
            step_name,
            form: Some(form),
            errors: Vec::new(),
            status: StepStatus::InProgress,
            saved_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedSiteStep {
    pub step_name: StepName,
    pub form: FormState,
    pub site: String,
    pub site_title: String,
    pub submitted_at: DateTime<Utc>,
}
