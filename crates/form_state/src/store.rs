use std::collections::{BTreeMap, BTreeSet};

use shared::domain::{ErrorMap, FieldErrors, FieldName, FieldState, FieldValues, FormState};
use tracing::debug;

use crate::error::{FormError, FormResult};

/// Monotonic stamp attached to every value change and validation request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub u64);

/// Per-field values and validation results, plus the bookkeeping that lets
/// late validation responses be recognised as stale.
#[derive(Debug, Clone)]
pub struct FieldStore {
    state: FormState,
    stamps: BTreeMap<FieldName, Generation>,
    in_flight: BTreeSet<Generation>,
    last_generation: Generation,
}

impl FieldStore {
    pub fn new(state: FormState) -> Self {
        let stamps = state
            .fields
            .keys()
            .map(|name| (name.clone(), Generation::default()))
            .collect();
        Self {
            state,
            stamps,
            in_flight: BTreeSet::new(),
            last_generation: Generation::default(),
        }
    }

    pub fn get_value(&self, field: &str) -> FormResult<&str> {
        Ok(self.field(field)?.value.as_str())
    }

    pub fn set_value(&mut self, field: &str, value: impl Into<String>) -> FormResult<()> {
        self.field_mut(field)?.value = value.into();
        Ok(())
    }

    pub fn get_errors(&self, field: &str) -> FormResult<Option<&ErrorMap>> {
        Ok(self.field(field)?.errors.as_ref())
    }

    /// Records a completed validation result for `field`.
    pub fn set_errors(&mut self, field: &str, errors: ErrorMap) -> FormResult<()> {
        let state = self.field_mut(field)?;
        state.errors = Some(errors);
        state.errors_hidden = false;
        state.is_validating = false;
        Ok(())
    }

    pub fn is_valid(&self, field: &str) -> FormResult<bool> {
        Ok(self.field(field)?.is_valid())
    }

    pub fn values(&self) -> FieldValues {
        self.state.values()
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight
            .iter()
            .any(|generation| self.stamps.values().any(|stamp| stamp == generation))
    }

    pub fn snapshot(&self) -> FormState {
        let mut snapshot = self.state.clone();
        snapshot.is_pending = self.is_pending();
        snapshot
    }

    /// Applies a user edit: the field waits for a fresh validation and any
    /// result already in flight for it becomes stale.
    pub(crate) fn record_change(
        &mut self,
        field: &str,
        value: impl Into<String>,
        hide_errors: bool,
    ) -> FormResult<()> {
        let generation = self.next_generation();
        let state = self.field_mut(field)?;
        state.value = value.into();
        state.is_validating = true;
        if hide_errors {
            state.errors_hidden = state.errors.is_some();
        } else {
            state.errors = None;
            state.errors_hidden = false;
        }
        self.stamp(field, generation);
        Ok(())
    }

    /// Applies sanitizer output. Returns the fields whose value changed.
    pub(crate) fn apply_corrections(&mut self, corrections: FieldValues) -> Vec<FieldName> {
        let mut changed = Vec::new();
        for (name, value) in corrections {
            let Some(state) = self.state.fields.get(&name) else {
                debug!(field = %name, "ignoring correction for unknown field");
                continue;
            };
            if state.value == value {
                continue;
            }
            let generation = self.next_generation();
            if let Some(state) = self.state.fields.get_mut(&name) {
                state.value = value;
            }
            self.stamp(name.as_str(), generation);
            changed.push(name);
        }
        changed
    }

    /// Stamps every field with a new generation and marks it in flight.
    pub(crate) fn begin_validation(&mut self) -> Generation {
        let generation = self.next_generation();
        for stamp in self.stamps.values_mut() {
            *stamp = generation;
        }
        self.in_flight.insert(generation);
        generation
    }

    /// Merges a validator response. Only fields still stamped with
    /// `generation` take it; fields absent from `errors` are valid. Returns
    /// whether the visible state changed.
    pub(crate) fn finish_validation(
        &mut self,
        generation: Generation,
        mut errors: FieldErrors,
    ) -> bool {
        let was_pending = self.is_pending();
        self.in_flight.remove(&generation);

        let current = self
            .stamps
            .iter()
            .filter(|(_, stamp)| **stamp == generation)
            .map(|(name, _)| name.clone())
            .collect::<Vec<_>>();
        if current.is_empty() {
            debug!(generation = generation.0, "discarding stale validation result");
        }
        for name in &current {
            if let Some(state) = self.state.fields.get_mut(name) {
                state.errors = Some(errors.remove(name).unwrap_or_default());
                state.errors_hidden = false;
                state.is_validating = false;
            }
        }
        !current.is_empty() || was_pending != self.is_pending()
    }

    pub(crate) fn abandon_validation(&mut self, generation: Generation) {
        self.in_flight.remove(&generation);
    }

    pub(crate) fn reset(&mut self, state: FormState) {
        let generation = self.next_generation();
        self.state = state;
        self.stamps = self
            .state
            .fields
            .keys()
            .map(|name| (name.clone(), generation))
            .collect();
        self.in_flight.clear();
    }

    fn next_generation(&mut self) -> Generation {
        self.last_generation = Generation(self.last_generation.0 + 1);
        self.last_generation
    }

    fn stamp(&mut self, field: &str, generation: Generation) {
        if let Some(stamp) = self.stamps.get_mut(field) {
            *stamp = generation;
        }
    }

    fn field(&self, field: &str) -> FormResult<&FieldState> {
        self.state
            .fields
            .get(field)
            .ok_or_else(|| FormError::UnknownField(field.to_string()))
    }

    fn field_mut(&mut self, field: &str) -> FormResult<&mut FieldState> {
        self.state
            .fields
            .get_mut(field)
            .ok_or_else(|| FormError::UnknownField(field.to_string()))
    }
}
