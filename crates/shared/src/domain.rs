use std::{
    borrow::Borrow,
    collections::BTreeMap,
    fmt::{Display, Formatter},
};

use serde::{Deserialize, Serialize};

macro_rules! name_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

name_newtype!(FieldName);
name_newtype!(StepName);

/// Error code to human readable message, for a single field.
pub type ErrorMap = BTreeMap<String, String>;
pub type FieldValues = BTreeMap<FieldName, String>;
pub type FieldErrors = BTreeMap<FieldName, ErrorMap>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldState {
    pub value: String,
    #[serde(default)]
    pub is_validating: bool,
    /// `None` until the first validation of this field completes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<ErrorMap>,
    #[serde(default)]
    pub errors_hidden: bool,
}

impl FieldState {
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn visible_errors(&self) -> Option<&ErrorMap> {
        if self.errors_hidden {
            return None;
        }
        self.errors.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.visible_errors().is_some_and(|errors| errors.is_empty())
    }

    pub fn is_invalid(&self) -> bool {
        self.visible_errors().is_some_and(|errors| !errors.is_empty())
    }

    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|errors| !errors.is_empty())
    }
}

/// Snapshot of every tracked field plus the in-flight flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormState {
    pub fields: BTreeMap<FieldName, FieldState>,
    #[serde(default)]
    pub is_pending: bool,
}

impl FormState {
    pub fn new<I, N>(field_names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<FieldName>,
    {
        Self {
            fields: field_names
                .into_iter()
                .map(|name| (name.into(), FieldState::default()))
                .collect(),
            is_pending: false,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldState> {
        self.fields.get(name)
    }

    pub fn value(&self, name: &str) -> &str {
        self.field(name).map(|field| field.value.as_str()).unwrap_or_default()
    }

    pub fn values(&self) -> FieldValues {
        self.fields
            .iter()
            .map(|(name, field)| (name.clone(), field.value.clone()))
            .collect()
    }

    pub fn errors(&self, name: &str) -> Option<&ErrorMap> {
        self.field(name).and_then(|field| field.errors.as_ref())
    }

    pub fn visible_errors(&self, name: &str) -> Option<&ErrorMap> {
        self.field(name).and_then(FieldState::visible_errors)
    }

    pub fn is_field_valid(&self, name: &str) -> bool {
        self.field(name).is_some_and(FieldState::is_valid)
    }

    pub fn is_field_invalid(&self, name: &str) -> bool {
        self.field(name).is_some_and(FieldState::is_invalid)
    }

    pub fn has_errors(&self) -> bool {
        self.fields.values().any(FieldState::has_errors)
    }

    pub fn is_validating(&self) -> bool {
        self.fields.values().any(|field| field.is_validating)
    }

    /// Marks every field as awaiting validation.
    pub fn set_fields_validating(mut self) -> Self {
        for field in self.fields.values_mut() {
            field.is_validating = true;
        }
        self
    }

    /// Installs one message per field, as a completed validation would.
    /// Fields missing from `messages` are left untouched.
    pub fn set_field_errors(mut self, messages: BTreeMap<FieldName, String>) -> Self {
        for (name, message) in messages {
            let Some(field) = self.fields.get_mut(&name) else {
                continue;
            };
            let mut errors = ErrorMap::new();
            if !message.is_empty() {
                errors.insert(SEEDED_ERROR_CODE.to_string(), message);
            }
            field.errors = Some(errors);
            field.errors_hidden = false;
            field.is_validating = false;
        }
        self
    }
}

/// Error code used for messages restored from a saved step.
pub const SEEDED_ERROR_CODE: &str = "server";
