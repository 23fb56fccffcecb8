use super::*;
use crate::{
    error::SiteStepError,
    progress::InMemoryProgressStore,
};
use form_state::FormError;
use shared::{
    error::ApiError,
    protocol::{SitesNewResponse, StepStatus},
};

#[derive(Default)]
struct FakeSiteApi {
    rejections: BTreeMap<String, ApiError>,
    unavailable: bool,
    blog_names: Mutex<Vec<String>>,
}

impl FakeSiteApi {
    fn rejecting(site: &str, code: &str, message: &str) -> Self {
        Self {
            rejections: BTreeMap::from([(site.to_owned(), ApiError::new(code, message))]),
            ..Self::default()
        }
    }

    fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.blog_names.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl SiteApi for FakeSiteApi {
    async fn sites_new(
        &self,
        request: SitesNewRequest,
    ) -> Result<SitesNewResponse, SiteApiError> {
        assert!(request.validate, "site step must only dry-run site creation");
        self.blog_names
            .lock()
            .expect("calls lock")
            .push(request.blog_name.clone());
        if self.unavailable {
            return Err(SiteApiError::Status {
                status: 503,
                body: "maintenance".into(),
            });
        }
        match self.rejections.get(&request.blog_name) {
            Some(api_error) => Err(SiteApiError::Api(api_error.clone())),
            None => Ok(SitesNewResponse {
                success: true,
                blog_details: None,
            }),
        }
    }
}

fn mount(api: Arc<FakeSiteApi>, progress: Arc<InMemoryProgressStore>) -> SiteStep {
    SiteStep::mount(api, progress, SiteStepOptions::default()).expect("mount site step")
}

#[test]
fn subdomain_sanitizer_keeps_lowercase_alphanumerics() {
    assert_eq!(sanitize_subdomain("My-Team 2!"), "myteam2");
    assert_eq!(sanitize_subdomain("émile"), "mile");
    assert_eq!(sanitize_subdomain(""), "");

    let clean = FieldValues::from([(FieldName::from(SITE), "myteam".to_owned())]);
    assert!(sanitize_site_fields(&clean).is_empty());

    let dirty = FieldValues::from([
        (FieldName::from(SITE), "My Team".to_owned()),
        (FieldName::from(SITE_TITLE), "My Team".to_owned()),
    ]);
    assert_eq!(
        sanitize_site_fields(&dirty),
        FieldValues::from([(FieldName::from(SITE), "myteam".to_owned())])
    );
}

#[tokio::test]
async fn blur_sanitizes_validates_and_saves() {
    let api = Arc::new(FakeSiteApi::default());
    let progress = Arc::new(InMemoryProgressStore::new());
    let step = mount(api.clone(), progress.clone());

    step.handle_change(SITE, "My Team!").expect("change site");
    step.handle_change(SITE_TITLE, "My Team").expect("change title");
    step.handle_blur().await.expect("blur");

    assert_eq!(api.calls(), vec!["myteam".to_owned()]);
    let form = step.form();
    assert_eq!(form.value(SITE), "myteam");
    assert!(form.is_field_valid(SITE));
    assert!(form.is_field_valid(SITE_TITLE));

    let saved = progress
        .load_step(&StepName::from(STEP_NAME))
        .expect("load")
        .expect("step saved on blur");
    assert_eq!(saved.form.as_ref().map(|f| f.value(SITE)), Some("myteam"));
    assert_eq!(saved.status, StepStatus::InProgress);
}

#[tokio::test]
async fn rejected_site_is_counted_once_per_unique_url() {
    let api = Arc::new(FakeSiteApi::rejecting(
        "taken",
        codes::BLOG_NAME_EXISTS,
        "Sorry, that site already exists!",
    ));
    let step = mount(api, Arc::new(InMemoryProgressStore::new()));

    step.handle_change(SITE_TITLE, "Taken").expect("title");
    step.handle_change(SITE, "taken").expect("site");
    step.handle_blur().await.expect("first blur");
    step.handle_blur().await.expect("second blur");

    assert_eq!(
        step.error_messages(SITE),
        vec!["Sorry, that site already exists!".to_owned()]
    );
    let session = step.session();
    assert_eq!(session.times_validation_failed(), 2);
    assert_eq!(session.unique_site_urls_searched(), 1);
}

#[tokio::test]
async fn reserved_site_name_points_at_login() {
    let api = Arc::new(FakeSiteApi::rejecting(
        "admin",
        codes::BLOG_NAME_RESERVED,
        "Sorry, that site is reserved!",
    ));
    let step = mount(api, Arc::new(InMemoryProgressStore::new()));

    step.handle_change(SITE, "admin").expect("site");
    step.handle_change(SITE_TITLE, "Admin").expect("title");
    step.handle_blur().await.expect("blur");

    let messages = step.error_messages(SITE);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("Sorry, that site is reserved!"));
    assert!(messages[0].ends_with(DEFAULT_LOGIN_URL));
}

#[tokio::test]
async fn submit_without_title_is_blocked() {
    let progress = Arc::new(InMemoryProgressStore::new());
    let step = mount(Arc::new(FakeSiteApi::default()), progress.clone());

    step.handle_change(SITE, "myteam").expect("site");
    let submission = step.submit().await.expect("submit");

    assert!(submission.is_none());
    assert_eq!(
        step.error_messages(SITE_TITLE),
        vec!["Please enter your team or project name.".to_owned()]
    );
    assert!(progress.progress().submitted.is_empty());
}

#[tokio::test]
async fn clean_submit_records_submission_and_resets_counters() {
    let api = Arc::new(FakeSiteApi::rejecting(
        "taken",
        codes::BLOG_NAME_EXISTS,
        "Sorry, that site already exists!",
    ));
    let progress = Arc::new(InMemoryProgressStore::new());
    let step = mount(api, progress.clone());

    step.handle_change(SITE_TITLE, "My Team").expect("title");
    step.handle_change(SITE, "taken").expect("site");
    step.handle_blur().await.expect("blur");
    let first_session = step.session().id();
    assert_eq!(step.session().times_validation_failed(), 1);

    step.handle_change(SITE, "My Team").expect("site");
    let submission = step
        .submit()
        .await
        .expect("submit")
        .expect("form is clean");

    assert_eq!(submission.site, "myteam");
    assert_eq!(submission.site_title, "My Team");
    assert_eq!(step.session().times_validation_failed(), 0);
    assert_ne!(step.session().id(), first_session);

    let recorded = progress.progress();
    assert_eq!(recorded.submitted, vec![submission]);
    assert_eq!(
        recorded.steps.get(STEP_NAME).map(|s| s.status),
        Some(StepStatus::Completed)
    );
}

#[tokio::test]
async fn unmount_after_submit_keeps_step_completed() {
    let progress = Arc::new(InMemoryProgressStore::new());
    let step = mount(Arc::new(FakeSiteApi::default()), progress.clone());

    step.handle_change(SITE_TITLE, "My Team").expect("title");
    step.handle_change(SITE, "myteam").expect("site");
    step.submit()
        .await
        .expect("submit")
        .expect("form is clean");
    step.unmount().expect("unmount");

    let saved = progress
        .load_step(&StepName::from(STEP_NAME))
        .expect("load")
        .expect("step recorded");
    assert_eq!(saved.status, StepStatus::Completed);
    assert_eq!(saved.form.as_ref().map(|f| f.value(SITE)), Some("myteam"));
}

#[tokio::test]
async fn unavailable_api_is_reported_and_form_still_saved() {
    let progress = Arc::new(InMemoryProgressStore::new());
    let step = mount(Arc::new(FakeSiteApi::unavailable()), progress.clone());

    step.handle_change(SITE, "myteam").expect("site");
    step.handle_change(SITE_TITLE, "My Team").expect("title");
    let err = step.handle_blur().await.expect_err("api is down");

    assert!(matches!(
        err,
        SiteStepError::Form(FormError::Validator(ValidatorError::UnexpectedResponse(_)))
    ));
    assert!(matches!(
        step.last_error(),
        Some(ValidatorError::UnexpectedResponse(_))
    ));
    assert!(progress
        .load_step(&StepName::from(STEP_NAME))
        .expect("load")
        .is_some());
}

#[tokio::test(start_paused = true)]
async fn saved_server_error_is_shown_then_revalidated() {
    let mut form = FormState::new([SITE, SITE_TITLE]);
    for (name, value) in [(SITE, "taken"), (SITE_TITLE, "My Team")] {
        if let Some(field) = form.fields.get_mut(name) {
            field.value = value.to_owned();
        }
    }
    let mut saved = SavedStep::new(StepName::from(STEP_NAME), form);
    saved.errors = vec![ApiError::new(
        codes::BLOG_NAME_EXISTS,
        "That site was taken while you were away.",
    )];

    let api = Arc::new(FakeSiteApi::rejecting(
        "taken",
        codes::BLOG_NAME_EXISTS,
        "Sorry, that site already exists!",
    ));
    let step = mount(api.clone(), Arc::new(InMemoryProgressStore::with_step(saved)));

    assert_eq!(
        step.error_messages(SITE),
        vec!["That site was taken while you were away.".to_owned()]
    );
    assert!(step.form().is_validating());
    assert!(api.calls().is_empty());

    tokio::time::sleep(VALIDATION_DELAY_AFTER_FIELD_CHANGES + Duration::from_millis(1)).await;

    assert_eq!(api.calls(), vec!["taken".to_owned()]);
    assert!(!step.form().is_validating());
    assert_eq!(
        step.error_messages(SITE),
        vec!["Sorry, that site already exists!".to_owned()]
    );
}

#[tokio::test]
async fn unmount_cancels_pending_validation_and_saves() {
    let api = Arc::new(FakeSiteApi::default());
    let progress = Arc::new(InMemoryProgressStore::new());
    let step = mount(api.clone(), progress.clone());

    step.handle_change(SITE, "draft").expect("site");
    step.unmount().expect("unmount");

    let saved = progress
        .load_step(&StepName::from(STEP_NAME))
        .expect("load")
        .expect("saved on unmount");
    assert_eq!(saved.form.as_ref().map(|f| f.value(SITE)), Some("draft"));
    assert!(api.calls().is_empty());
}
