pub mod error;
pub mod progress;
pub mod site_step;
pub mod wpcom;

pub use error::{SiteStepError, SiteStepResult};
pub use progress::{
    InMemoryProgressStore, JsonFileProgressStore, ProgressStoreError, SignupProgress,
    StepProgressStore,
};
pub use site_step::{
    sanitize_site_fields, sanitize_subdomain, SiteStep, SiteStepOptions, SiteStepValidator,
    ValidationSession, SITE, SITE_TITLE, STEP_NAME,
};
pub use wpcom::{SiteApi, SiteApiError, WpcomClient};
