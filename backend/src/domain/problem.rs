//! Structured problem-detail payloads built from classified errors.
//!
//! [`ProblemFactory::build`] merges response metadata from [`ErrorInfo`] with
//! request context. Extensions from the error are written first; the factory
//! then injects `traceId` and `timestamp` (and, in diagnostic mode,
//! `exceptionType`, `stackTrace` and `innerException`), each only when the key
//! is not already present.

use std::sync::Arc;

use chrono::SecondsFormat;
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::classification::ErrorInfo;
use super::error::Error;
use super::trace_id::TraceId;

/// Media type of problem payloads.
pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

/// Detail shown for unclassified failures outside diagnostic mode.
pub const GENERIC_DETAIL: &str = "An error occurred while processing your request.";

const RESERVED_KEYS: [&str; 6] = ["type", "title", "status", "detail", "instance", "errors"];

/// Problem-detail response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub instance: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

/// Request-specific inputs to a problem payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemContext {
    pub instance: String,
    pub trace_id: Option<TraceId>,
}

impl ProblemContext {
    pub fn new(instance: impl Into<String>, trace_id: Option<TraceId>) -> Self {
        Self {
            instance: instance.into(),
            trace_id,
        }
    }
}

/// Builds [`ProblemDetails`] from classified errors.
///
/// # Examples
/// ```
/// use std::sync::Arc;
///
/// use mockable::DefaultClock;
/// use modulith::domain::{Error, ProblemContext, ProblemFactory};
///
/// let factory = ProblemFactory::new(false, Arc::new(DefaultClock));
/// let problem = factory.from_error(
///     &Error::not_found("missing"),
///     &ProblemContext::new("/api/v1/users/1", None),
/// );
/// assert_eq!(problem.status, 404);
/// assert_eq!(problem.detail, "missing");
/// ```
#[derive(Clone)]
pub struct ProblemFactory {
    diagnostics: bool,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl ProblemFactory {
    pub fn new(diagnostics: bool, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self { diagnostics, clock }
    }

    /// Whether diagnostic fields are rendered.
    pub fn diagnostics(&self) -> bool {
        self.diagnostics
    }

    /// Classify `error` and build its payload.
    pub fn from_error(&self, error: &Error, ctx: &ProblemContext) -> ProblemDetails {
        self.build(&ErrorInfo::classify(error), ctx)
    }

    /// Build the payload for an already classified error.
    pub fn build(&self, info: &ErrorInfo, ctx: &ProblemContext) -> ProblemDetails {
        let detail = if info.expose_detail() || self.diagnostics {
            info.detail().to_owned()
        } else {
            GENERIC_DETAIL.to_owned()
        };

        let mut extensions = Map::new();
        for (key, value) in info.extensions() {
            if !RESERVED_KEYS.contains(&key.as_str()) {
                extensions.insert(key.clone(), value.clone());
            }
        }

        let trace_id = ctx.trace_id.or(info.trace_id());
        if let Some(trace_id) = trace_id {
            insert_absent(&mut extensions, "traceId", trace_id.to_string());
        }
        insert_absent(
            &mut extensions,
            "timestamp",
            self.clock.utc().to_rfc3339_opts(SecondsFormat::Millis, true),
        );

        if self.diagnostics {
            let diagnostics = info.diagnostics();
            insert_absent(
                &mut extensions,
                "exceptionType",
                diagnostics.exception_type.as_str(),
            );
            if let Some(stack_trace) = &diagnostics.stack_trace {
                insert_absent(&mut extensions, "stackTrace", stack_trace.as_str());
            }
            if let Some(inner) = &diagnostics.inner {
                insert_absent(
                    &mut extensions,
                    "innerException",
                    json!({ "type": inner.type_name, "message": inner.message }),
                );
            }
        }

        let errors = info.field_errors().map(|field_errors| {
            field_errors
                .iter()
                .map(|(field, messages)| {
                    let messages = messages.iter().cloned().map(Value::from).collect();
                    (field.to_owned(), Value::Array(messages))
                })
                .collect::<Map<String, Value>>()
        });

        ProblemDetails {
            problem_type: info
                .problem_type()
                .unwrap_or_else(|| super::error::default_problem_type(info.status()))
                .to_owned(),
            title: info.title().to_owned(),
            status: info.status(),
            detail,
            instance: ctx.instance.clone(),
            errors,
            extensions,
        }
    }
}

fn insert_absent(extensions: &mut Map<String, Value>, key: &str, value: impl Into<Value>) {
    extensions
        .entry(key.to_owned())
        .or_insert_with(|| value.into());
}
