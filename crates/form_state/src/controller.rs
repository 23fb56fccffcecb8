use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use shared::domain::{FieldName, FormState};
use tokio::{runtime::Handle, sync::watch, task::JoinHandle};
use tracing::{debug, error, warn};

use crate::{
    error::{FormError, FormResult, ValidatorError},
    sanitize::{NoopSanitizer, Sanitizer},
    store::FieldStore,
    validate::Validator,
};

pub const DEFAULT_DEBOUNCE_WAIT: Duration = Duration::from_millis(1500);

pub type NewStateObserver = Arc<dyn Fn(&FormState) + Send + Sync>;
pub type ErrorObserver = Arc<dyn Fn(&ValidatorError) + Send + Sync>;

struct PendingDebounce {
    token: u64,
    handle: JoinHandle<()>,
}

struct ControllerState {
    store: FieldStore,
    debounce: Option<PendingDebounce>,
    debounce_seq: u64,
}

struct ControllerInner {
    debounce_wait: Duration,
    hide_field_errors_on_change: bool,
    sanitizer: Arc<dyn Sanitizer>,
    validator: Arc<dyn Validator>,
    on_new_state: Option<NewStateObserver>,
    on_error: Option<ErrorObserver>,
    runtime: Handle,
    initial_state: FormState,
    state: Mutex<ControllerState>,
    states: watch::Sender<FormState>,
}

/// Owns the form state and drives sanitize, debounce, validate and submit.
///
/// Cloning yields another handle to the same form. Observers are always
/// invoked after the internal lock has been released, so they may call back
/// into the controller.
#[derive(Clone)]
pub struct FormController {
    inner: Arc<ControllerInner>,
}

impl FormController {
    pub fn builder<I, N>(field_names: I) -> FormControllerBuilder
    where
        I: IntoIterator<Item = N>,
        N: Into<FieldName>,
    {
        FormControllerBuilder::new(field_names)
    }

    pub fn initial_state(&self) -> FormState {
        self.inner.initial_state.clone()
    }

    pub fn snapshot(&self) -> FormResult<FormState> {
        Ok(self.lock("reading form snapshot")?.store.snapshot())
    }

    pub fn subscribe(&self) -> watch::Receiver<FormState> {
        self.inner.states.subscribe()
    }

    /// Records a new value and (re)starts the debounce timer. Only the last
    /// change inside one debounce window reaches the validator.
    pub fn handle_field_change(&self, name: &str, value: impl Into<String>) -> FormResult<()> {
        let snapshot = {
            let mut state = self.lock("recording field change")?;
            state
                .store
                .record_change(name, value, self.inner.hide_field_errors_on_change)?;
            self.schedule_debounced(&mut state);
            state.store.snapshot()
        };
        self.publish(snapshot);
        Ok(())
    }

    /// Runs the sanitizer now. Returns whether any value was corrected.
    pub fn sanitize(&self) -> FormResult<bool> {
        let snapshot = {
            let mut state = self.lock("sanitizing fields")?;
            let corrections = self.inner.sanitizer.sanitize(&state.store.values());
            let changed = state.store.apply_corrections(corrections);
            if changed.is_empty() {
                return Ok(false);
            }
            debug!(fields = ?changed, "applied sanitizer corrections");
            state.store.snapshot()
        };
        self.publish(snapshot);
        Ok(true)
    }

    /// Drops any pending debounce and validates immediately. When this races
    /// a validation that is already in flight, the one started last wins.
    pub async fn validate(&self) -> FormResult<()> {
        self.cancel_debounce()?;
        self.run_validation().await
    }

    /// Forces a sanitize and validate pass, then reports whether the form may
    /// proceed. A field that is still awaiting validation counts as an error.
    ///
    /// On a transport failure the error observer is notified, `on_complete`
    /// is not called and the error is returned.
    pub async fn handle_submit<F>(&self, on_complete: F) -> FormResult<bool>
    where
        F: FnOnce(bool),
    {
        self.cancel_debounce()?;
        self.sanitize()?;
        self.run_validation().await?;

        let snapshot = self.snapshot()?;
        let has_errors = snapshot.has_errors() || snapshot.is_validating() || snapshot.is_pending;
        debug!(has_errors, "submit validation finished");
        on_complete(has_errors);
        Ok(has_errors)
    }

    /// Returns whether a pending debounce was cancelled.
    pub fn cancel_debounce(&self) -> FormResult<bool> {
        let mut state = self.lock("cancelling debounce")?;
        Ok(match state.debounce.take() {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        })
    }

    /// Restores the construction snapshot and disregards in-flight work.
    pub fn reset(&self) -> FormResult<()> {
        let mut initial = self.inner.initial_state.clone();
        for field in initial.fields.values_mut() {
            field.is_validating = false;
        }
        let snapshot = {
            let mut state = self.lock("resetting form")?;
            if let Some(pending) = state.debounce.take() {
                pending.handle.abort();
            }
            state.store.reset(initial);
            state.store.snapshot()
        };
        self.publish(snapshot);
        Ok(())
    }

    async fn run_validation(&self) -> FormResult<()> {
        let (generation, values) = {
            let mut state = self.lock("starting validation")?;
            let generation = state.store.begin_validation();
            (generation, state.store.values())
        };
        debug!(generation = generation.0, "running validator");

        match self.inner.validator.validate(values).await {
            Ok(errors) => {
                let snapshot = {
                    let mut state = self.lock("merging validation result")?;
                    if !state.store.finish_validation(generation, errors) {
                        return Ok(());
                    }
                    state.store.snapshot()
                };
                self.publish(snapshot);
                Ok(())
            }
            Err(error) => {
                self.lock("abandoning failed validation")?
                    .store
                    .abandon_validation(generation);
                warn!(generation = generation.0, %error, "validator failed");
                self.report_error(&error);
                Err(error.into())
            }
        }
    }

    fn schedule_debounced(&self, state: &mut ControllerState) {
        if let Some(pending) = state.debounce.take() {
            pending.handle.abort();
        }
        state.debounce_seq += 1;
        let token = state.debounce_seq;
        let wait = self.inner.debounce_wait;
        let weak = Arc::downgrade(&self.inner);
        let handle = self.inner.runtime.spawn(async move {
            tokio::time::sleep(wait).await;
            if let Some(inner) = weak.upgrade() {
                FormController { inner }.fire_debounce(token).await;
            }
        });
        debug!(token, wait_ms = wait.as_millis() as u64, "scheduled validation");
        state.debounce = Some(PendingDebounce { token, handle });
    }

    async fn fire_debounce(&self, token: u64) {
        match self.claim_debounce(token) {
            Ok(true) => {}
            Ok(false) => return,
            Err(error) => {
                error!(%error, "debounced validation skipped");
                return;
            }
        }
        if let Err(error) = self.sanitize() {
            error!(%error, "sanitizer pass failed");
            return;
        }
        // Transport failures have already reached the error observer.
        let _ = self.run_validation().await;
    }

    /// Past this point the timer task can no longer be aborted by a change;
    /// a newer change only makes its result stale.
    fn claim_debounce(&self, token: u64) -> FormResult<bool> {
        let mut state = self.lock("claiming debounce timer")?;
        if state
            .debounce
            .as_ref()
            .is_some_and(|pending| pending.token == token)
        {
            state.debounce = None;
            return Ok(true);
        }
        Ok(false)
    }

    fn publish(&self, snapshot: FormState) {
        if let Some(observer) = &self.inner.on_new_state {
            observer(&snapshot);
        }
        self.inner.states.send_replace(snapshot);
    }

    fn report_error(&self, error: &ValidatorError) {
        match &self.inner.on_error {
            Some(observer) => observer(error),
            None => error!(%error, "validation failed and no error observer is registered"),
        }
    }

    fn lock(&self, context: &'static str) -> FormResult<MutexGuard<'_, ControllerState>> {
        self.inner
            .state
            .lock()
            .map_err(|_| FormError::StatePoisoned(context))
    }
}

pub struct FormControllerBuilder {
    field_names: Vec<FieldName>,
    sanitizer: Arc<dyn Sanitizer>,
    validator: Option<Arc<dyn Validator>>,
    on_new_state: Option<NewStateObserver>,
    on_error: Option<ErrorObserver>,
    debounce_wait: Duration,
    hide_field_errors_on_change: bool,
    initial_state: Option<FormState>,
}

impl FormControllerBuilder {
    fn new<I, N>(field_names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<FieldName>,
    {
        Self {
            field_names: field_names.into_iter().map(Into::into).collect(),
            sanitizer: Arc::new(NoopSanitizer),
            validator: None,
            on_new_state: None,
            on_error: None,
            debounce_wait: DEFAULT_DEBOUNCE_WAIT,
            hide_field_errors_on_change: false,
            initial_state: None,
        }
    }

    pub fn sanitizer(mut self, sanitizer: impl Sanitizer + 'static) -> Self {
        self.sanitizer = Arc::new(sanitizer);
        self
    }

    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn shared_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn on_new_state(mut self, observer: impl Fn(&FormState) + Send + Sync + 'static) -> Self {
        self.on_new_state = Some(Arc::new(observer));
        self
    }

    pub fn on_error(mut self, observer: impl Fn(&ValidatorError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(observer));
        self
    }

    pub fn debounce_wait(mut self, wait: Duration) -> Self {
        self.debounce_wait = wait;
        self
    }

    pub fn hide_field_errors_on_change(mut self, hide: bool) -> Self {
        self.hide_field_errors_on_change = hide;
        self
    }

    /// Seeds the form from a saved snapshot. Fields the snapshot leaves out
    /// start empty; fields it marks as validating are validated again after
    /// one debounce period.
    pub fn initial_state(mut self, state: Option<FormState>) -> Self {
        self.initial_state = state;
        self
    }

    pub fn build(self) -> FormResult<FormController> {
        if self.field_names.is_empty() {
            return Err(FormError::NoFields);
        }
        let mut seen = BTreeSet::new();
        for name in &self.field_names {
            if !seen.insert(name) {
                return Err(FormError::DuplicateField(name.clone()));
            }
        }
        let validator = self.validator.ok_or(FormError::MissingValidator)?;
        let initial_state = seed_initial_state(&self.field_names, self.initial_state)?;
        let runtime = Handle::try_current().map_err(|_| FormError::RuntimeUnavailable)?;

        let resume_validation = initial_state.is_validating();
        let (states, _) = watch::channel(initial_state.clone());
        let controller = FormController {
            inner: Arc::new(ControllerInner {
                debounce_wait: self.debounce_wait,
                hide_field_errors_on_change: self.hide_field_errors_on_change,
                sanitizer: self.sanitizer,
                validator,
                on_new_state: self.on_new_state,
                on_error: self.on_error,
                runtime,
                state: Mutex::new(ControllerState {
                    store: FieldStore::new(initial_state.clone()),
                    debounce: None,
                    debounce_seq: 0,
                }),
                initial_state,
                states,
            }),
        };

        if resume_validation {
            let mut state = controller.lock("resuming validation")?;
            controller.schedule_debounced(&mut state);
        }
        Ok(controller)
    }
}

fn seed_initial_state(
    field_names: &[FieldName],
    seed: Option<FormState>,
) -> FormResult<FormState> {
    let mut state = FormState::new(field_names.iter().cloned());
    let Some(seed) = seed else {
        return Ok(state);
    };
    for (name, field) in seed.fields {
        let Some(slot) = state.fields.get_mut(&name) else {
            return Err(FormError::UnknownField(name.0));
        };
        *slot = field;
    }
    Ok(state)
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
