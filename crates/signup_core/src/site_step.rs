use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use form_state::{
    ErrorMap, FieldErrors, FieldName, FieldValues, FormController, FormState, Validator,
    ValidatorError,
};
use shared::{
    domain::StepName,
    error::codes,
    protocol::{SavedStep, SitesNewRequest, SubmittedSiteStep},
};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    error::SiteStepResult,
    progress::StepProgressStore,
    wpcom::{SiteApi, SiteApiError},
};

pub const STEP_NAME: &str = "wp-for-teams-site";
pub const SITE: &str = "site";
pub const SITE_TITLE: &str = "siteTitle";
pub const VALIDATION_DELAY_AFTER_FIELD_CHANGES: Duration = Duration::from_millis(1500);
pub const DEFAULT_LOGIN_URL: &str = "https://wordpress.com/log-in";

const ANALYTICS_TARGET: &str = "signup::analytics";
const MISSING_SITE_TITLE_MESSAGE: &str = "Please enter your team or project name.";

/// Strips everything but ASCII letters and digits, then lowercases.
pub fn sanitize_subdomain(domain: &str) -> String {
    domain
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Corrects the `site` field only, and only when sanitizing changes it.
pub fn sanitize_site_fields(fields: &FieldValues) -> FieldValues {
    let mut corrections = FieldValues::new();
    if let Some(site) = fields.get(SITE) {
        let sanitized = sanitize_subdomain(site);
        if &sanitized != site {
            corrections.insert(FieldName::from(SITE), sanitized);
        }
    }
    corrections
}

/// Counters reported with the step's submit event. Reset after each
/// successful submit.
#[derive(Debug, Clone)]
pub struct ValidationSession {
    id: Uuid,
    site_urls_searched: Vec<String>,
    times_validation_failed: u32,
}

impl Default for ValidationSession {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            site_urls_searched: Vec::new(),
            times_validation_failed: 0,
        }
    }
}

impl ValidationSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn unique_site_urls_searched(&self) -> usize {
        self.site_urls_searched.len()
    }

    pub fn times_validation_failed(&self) -> u32 {
        self.times_validation_failed
    }

    /// Counts a remote rejection. Returns true the first time `site` is seen
    /// in this session.
    pub fn record_failure(&mut self, site: &str) -> bool {
        self.times_validation_failed += 1;
        if site.is_empty() || self.site_urls_searched.iter().any(|s| s == site) {
            return false;
        }
        self.site_urls_searched.push(site.to_owned());
        true
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

type SharedSession = Arc<Mutex<ValidationSession>>;

/// Local title check plus a `validate: true` dry run of site creation.
pub struct SiteStepValidator {
    api: Arc<dyn SiteApi>,
    session: SharedSession,
}

impl SiteStepValidator {
    pub fn new(api: Arc<dyn SiteApi>) -> Self {
        Self::with_session(api, SharedSession::default())
    }

    fn with_session(api: Arc<dyn SiteApi>, session: SharedSession) -> Self {
        Self { api, session }
    }
}

#[async_trait]
impl Validator for SiteStepValidator {
    async fn validate(&self, fields: FieldValues) -> Result<FieldErrors, ValidatorError> {
        let site = fields.get(SITE).cloned().unwrap_or_default();
        let site_title = fields.get(SITE_TITLE).cloned().unwrap_or_default();

        let mut errors = FieldErrors::new();
        if site_title.is_empty() {
            errors.insert(
                FieldName::from(SITE_TITLE),
                ErrorMap::from([(
                    codes::MISSING_SITE_TITLE.to_owned(),
                    MISSING_SITE_TITLE_MESSAGE.to_owned(),
                )]),
            );
        }

        match self
            .api
            .sites_new(SitesNewRequest::validation(&site, &site_title))
            .await
        {
            Ok(response) => debug!(success = response.success, site = %site, "site name accepted"),
            Err(SiteApiError::Api(api_error)) => {
                let first_search = lock_or_recover(&self.session).record_failure(&site);
                if first_search {
                    info!(
                        target: ANALYTICS_TARGET,
                        event = "site_url_validation_failed",
                        error = %api_error.error,
                        site_url = %site,
                        "site url validation failed"
                    );
                }
                errors.insert(
                    FieldName::from(SITE),
                    ErrorMap::from([(api_error.error, api_error.message)]),
                );
            }
            Err(err @ (SiteApiError::Status { .. } | SiteApiError::Decode(_))) => {
                return Err(ValidatorError::UnexpectedResponse(err.to_string()));
            }
            Err(err) => return Err(ValidatorError::Transport(err.to_string())),
        }
        Ok(errors)
    }
}

#[derive(Debug, Clone)]
pub struct SiteStepOptions {
    pub step_name: StepName,
    pub debounce_wait: Duration,
    pub login_url: String,
}

impl Default for SiteStepOptions {
    fn default() -> Self {
        Self {
            step_name: StepName::from(STEP_NAME),
            debounce_wait: VALIDATION_DELAY_AFTER_FIELD_CHANGES,
            login_url: DEFAULT_LOGIN_URL.to_owned(),
        }
    }
}

/// The "site address and title" signup step: a two-field form wired to the
/// site creation dry run, persisted through a [`StepProgressStore`].
pub struct SiteStep {
    options: SiteStepOptions,
    controller: FormController,
    form: Arc<Mutex<FormState>>,
    last_error: Arc<Mutex<Option<ValidatorError>>>,
    session: SharedSession,
    progress: Arc<dyn StepProgressStore>,
}

impl SiteStep {
    /// Restores any saved form for this step and starts its controller.
    /// Must be called inside a Tokio runtime.
    pub fn mount(
        api: Arc<dyn SiteApi>,
        progress: Arc<dyn StepProgressStore>,
        options: SiteStepOptions,
    ) -> SiteStepResult<Self> {
        let saved = progress.load_step(&options.step_name)?;
        let initial_state = saved.and_then(restore_form);

        let session = SharedSession::default();
        let form = Arc::new(Mutex::new(FormState::new([SITE, SITE_TITLE])));
        let last_error = Arc::new(Mutex::new(None));

        let form_sink = Arc::clone(&form);
        let error_sink = Arc::clone(&last_error);
        let controller = FormController::builder([SITE, SITE_TITLE])
            .sanitizer(sanitize_site_fields)
            .validator(SiteStepValidator::with_session(api, Arc::clone(&session)))
            .on_new_state(move |state: &FormState| {
                *lock_or_recover(&form_sink) = state.clone();
            })
            .on_error(move |err: &ValidatorError| {
                error!(error = %err, "site validation failed");
                *lock_or_recover(&error_sink) = Some(err.clone());
            })
            .debounce_wait(options.debounce_wait)
            .hide_field_errors_on_change(true)
            .initial_state(initial_state)
            .build()?;
        *lock_or_recover(&form) = controller.initial_state();

        Ok(Self {
            options,
            controller,
            form,
            last_error,
            session,
            progress,
        })
    }

    pub fn step_name(&self) -> &StepName {
        &self.options.step_name
    }

    pub fn controller(&self) -> &FormController {
        &self.controller
    }

    /// The latest state the controller reported.
    pub fn form(&self) -> FormState {
        lock_or_recover(&self.form).clone()
    }

    pub fn last_error(&self) -> Option<ValidatorError> {
        lock_or_recover(&self.last_error).clone()
    }

    pub fn session(&self) -> ValidationSession {
        lock_or_recover(&self.session).clone()
    }

    pub fn handle_change(&self, name: &str, value: impl Into<String>) -> SiteStepResult<()> {
        Ok(self.controller.handle_field_change(name, value)?)
    }

    /// Sanitizes, validates now and saves. The form is saved even when
    /// validation could not reach the API.
    pub async fn handle_blur(&self) -> SiteStepResult<()> {
        self.controller.sanitize()?;
        let validated = self.controller.validate().await;
        self.save()?;
        Ok(validated?)
    }

    /// Stores the current form. A step that was already submitted stays
    /// completed.
    pub fn save(&self) -> SiteStepResult<()> {
        let step_name = &self.options.step_name;
        let mut step = SavedStep::new(step_name.clone(), self.form());
        if let Some(existing) = self.progress.load_step(step_name)? {
            step.status = existing.status;
        }
        self.progress.save_step(step)?;
        Ok(())
    }

    /// Runs the controller's submit. Returns the recorded submission when
    /// the form was clean, `None` when it still has errors.
    pub async fn submit(&self) -> SiteStepResult<Option<SubmittedSiteStep>> {
        let has_errors = self.controller.handle_submit(|_| {}).await?;
        if has_errors {
            debug!(step = %self.options.step_name, "submit blocked by field errors");
            return Ok(None);
        }

        let form = self.form();
        {
            let mut session = lock_or_recover(&self.session);
            info!(
                target: ANALYTICS_TARGET,
                event = "site_step_submit",
                session = %session.id(),
                unique_site_urls_searched = session.unique_site_urls_searched(),
                times_validation_failed = session.times_validation_failed(),
                "site step submitted"
            );
            session.reset();
        }

        let submission = SubmittedSiteStep {
            step_name: self.options.step_name.clone(),
            site: form.value(SITE).to_owned(),
            site_title: form.value(SITE_TITLE).to_owned(),
            form,
            submitted_at: Utc::now(),
        };
        self.progress.submit_step(submission.clone())?;
        info!(step = %submission.step_name, site = %submission.site, "advancing to next step");
        Ok(Some(submission))
    }

    /// Visible messages for `field`. A reserved site name gets a hint
    /// pointing at the login page.
    pub fn error_messages(&self, field: &str) -> Vec<String> {
        let form = self.form();
        let Some(errors) = form.visible_errors(field) else {
            return Vec::new();
        };
        errors
            .iter()
            .map(|(code, message)| {
                if codes::is_reserved_name(code) {
                    format!(
                        "{message} Is this your username? Log in now to claim this site address: {}",
                        self.options.login_url
                    )
                } else {
                    message.clone()
                }
            })
            .collect()
    }

    /// Drops any pending validation and saves the current form.
    pub fn unmount(self) -> SiteStepResult<()> {
        self.controller.cancel_debounce()?;
        self.save()
    }
}

/// A saved step with server errors resumes with the first error on `site`
/// and every field marked for revalidation.
fn restore_form(saved: SavedStep) -> Option<FormState> {
    let form = saved.form?;
    match saved.errors.first() {
        Some(first) => Some(
            form.set_fields_validating()
                .set_field_errors(BTreeMap::from([(
                    FieldName::from(SITE),
                    first.message.clone(),
                )])),
        ),
        None => Some(form),
    }
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
#[path = "tests/site_step_tests.rs"]
mod tests;
