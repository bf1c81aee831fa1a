//! Field-level validation failures and the validator port.
//!
//! Validators are side-effect free and independent of one another, so the
//! pipeline may evaluate them in any order or concurrently. Every failure is
//! kept, not only the first.

use async_trait::async_trait;
use serde::ser::{Serialize, SerializeMap, Serializer};
use tokio_util::sync::CancellationToken;

/// A single `(field, message)` validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    field: String,
    message: String,
}

impl ValidationFailure {
    /// Build a failure for `field`.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Name of the offending field.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Human-readable reason.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Validation messages grouped by field, in first-seen field order.
///
/// Serialises as a JSON object mapping each field to its list of messages.
///
/// # Examples
/// ```
/// use modulith::domain::{FieldErrors, ValidationFailure};
///
/// let errors: FieldErrors = [
///     ValidationFailure::new("email", "required"),
///     ValidationFailure::new("name", "too short"),
///     ValidationFailure::new("email", "invalid"),
/// ]
/// .into_iter()
/// .collect();
///
/// assert_eq!(errors.get("email"), Some(&["required".to_owned(), "invalid".to_owned()][..]));
/// assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["email", "name"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    entries: Vec<(String, Vec<String>)>,
}

impl FieldErrors {
    /// Empty set of field errors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` against `field`, appending to earlier messages.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        let field = field.into();
        let message = message.into();
        match self.entries.iter_mut().find(|(name, _)| *name == field) {
            Some((_, messages)) => messages.push(message),
            None => self.entries.push((field, vec![message])),
        }
    }

    /// Messages recorded for `field`.
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, messages)| messages.as_slice())
    }

    /// Field names in first-seen order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Iterate over `(field, messages)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, messages)| (name.as_str(), messages.as_slice()))
    }

    /// Whether no failures were recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct failing fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl FromIterator<ValidationFailure> for FieldErrors {
    fn from_iter<I: IntoIterator<Item = ValidationFailure>>(iter: I) -> Self {
        let mut errors = Self::new();
        for failure in iter {
            errors.push(failure.field, failure.message);
        }
        errors
    }
}

impl Serialize for FieldErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (field, messages) in &self.entries {
            map.serialize_entry(field, messages)?;
        }
        map.end()
    }
}

/// Validator for one concrete request type.
///
/// Implementations must not mutate shared state: the validation stage runs
/// all validators for a request concurrently.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Validator<R>: Send + Sync
where
    R: Send + Sync + 'static,
{
    /// Return every failure found in `request`; an empty vector means valid.
    async fn validate(&self, request: &R, cancel: &CancellationToken) -> Vec<ValidationFailure>;
}
