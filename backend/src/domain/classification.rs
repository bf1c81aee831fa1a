//! Classification of domain errors into response metadata.
//!
//! [`ErrorInfo::classify`] is a pure, total function: every [`Error`] maps to
//! exactly one `(errorCode, status, title)` triple. Taxonomy members report
//! their own metadata. Unclassified errors walk their source chain against
//! an ordered fallback table, and anything unmatched becomes a 500.

use std::any::type_name;
use std::error::Error as StdError;
use std::io;

use serde_json::{Map, Value};

use super::error::{DOMAIN_KEY, ERROR_CODE_KEY, Error, ErrorDomain, ErrorKind, NotImplemented};
use super::error::default_problem_type;
use super::pipeline::Cancelled;
use super::trace_id::TraceId;
use super::validation::FieldErrors;

/// Log severity derived from the `domain` extension tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    /// Severity for a `domain` tag; unknown or missing tags are errors.
    pub fn for_domain(domain: Option<&str>) -> Self {
        match domain.and_then(ErrorDomain::parse) {
            Some(
                ErrorDomain::Validation
                | ErrorDomain::Application
                | ErrorDomain::BusinessRule
                | ErrorDomain::BusinessLogic
                | ErrorDomain::Security,
            ) => Self::Warning,
            Some(ErrorDomain::Infrastructure | ErrorDomain::Database) | None => Self::Error,
        }
    }
}

/// Shapes of foreign failure recognised for unclassified errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    InvalidArgument,
    NotImplemented,
    Timeout,
    Cancelled,
}

impl Fallback {
    /// Table order; the first row matching any cause wins.
    pub const ORDER: [Self; 4] = [
        Self::InvalidArgument,
        Self::NotImplemented,
        Self::Timeout,
        Self::Cancelled,
    ];

    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::NotImplemented => "NOT_IMPLEMENTED",
            Self::Timeout => "TIMEOUT",
            Self::Cancelled => "REQUEST_CANCELLED",
        }
    }

    pub const fn status(self) -> u16 {
        match self {
            Self::InvalidArgument => 400,
            Self::NotImplemented => 501,
            Self::Timeout | Self::Cancelled => 408,
        }
    }

    pub const fn title(self) -> &'static str {
        match self {
            Self::InvalidArgument => "Bad Request",
            Self::NotImplemented => "Not Implemented",
            Self::Timeout => "Request Timeout",
            Self::Cancelled => "Request Cancelled",
        }
    }

    fn matches(self, cause: &(dyn StdError + 'static)) -> bool {
        let io_kind = cause.downcast_ref::<io::Error>().map(io::Error::kind);
        match self {
            Self::InvalidArgument => {
                cause.is::<std::num::ParseIntError>()
                    || cause.is::<std::num::ParseFloatError>()
                    || cause.is::<uuid::Error>()
                    || cause.is::<chrono::ParseError>()
                    || matches!(
                        io_kind,
                        Some(io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData)
                    )
            }
            Self::NotImplemented => {
                cause.is::<NotImplemented>() || io_kind == Some(io::ErrorKind::Unsupported)
            }
            Self::Timeout => {
                cause.is::<tokio::time::error::Elapsed>() || io_kind == Some(io::ErrorKind::TimedOut)
            }
            Self::Cancelled => cause.is::<Cancelled>(),
        }
    }

    /// First row matching any error in the chain starting at `source`.
    pub fn detect(source: Option<&(dyn StdError + 'static)>) -> Option<Self> {
        Self::ORDER.into_iter().find(|row| {
            let mut current = source;
            while let Some(cause) = current {
                if row.matches(cause) {
                    return true;
                }
                current = cause.source();
            }
            false
        })
    }
}

/// Wrapped cause reported in diagnostic mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerCause {
    pub type_name: Option<String>,
    pub message: String,
}

/// Material only rendered when diagnostics are enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    pub exception_type: String,
    pub stack_trace: Option<String>,
    pub inner: Option<InnerCause>,
}

/// Response metadata derived from an [`Error`].
///
/// # Examples
/// ```
/// use modulith::domain::{Error, ErrorInfo, Severity};
///
/// let info = ErrorInfo::classify(&Error::not_found("missing"));
/// assert_eq!(info.status(), 404);
/// assert_eq!(info.error_code(), "RESOURCE_NOT_FOUND");
/// assert_eq!(info.severity(), Severity::Warning);
/// ```
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    error_code: &'static str,
    status: u16,
    title: &'static str,
    problem_type: Option<&'static str>,
    detail: String,
    expose_detail: bool,
    extensions: Map<String, Value>,
    field_errors: Option<FieldErrors>,
    trace_id: Option<TraceId>,
    diagnostics: Diagnostics,
}

impl ErrorInfo {
    /// Classify `error`. Never fails and has no side effects.
    pub fn classify(error: &Error) -> Self {
        let kind = error.kind();
        let diagnostics = diagnostics_for(error);
        match kind {
            ErrorKind::Unclassified => {
                let (error_code, status, title) = match Fallback::detect(error.source()) {
                    Some(row) => (row.code(), row.status(), row.title()),
                    None => (kind.code(), kind.status(), kind.title()),
                };
                let mut extensions = Map::new();
                extensions.insert(ERROR_CODE_KEY.to_owned(), Value::from(error_code));
                for (key, value) in error.extensions() {
                    extensions
                        .entry(key.clone())
                        .or_insert_with(|| value.clone());
                }
                Self {
                    error_code,
                    status,
                    title,
                    problem_type: Some(default_problem_type(status)),
                    detail: error.message().to_owned(),
                    expose_detail: false,
                    extensions,
                    field_errors: None,
                    trace_id: error.trace_id(),
                    diagnostics,
                }
            }
            _ => Self {
                error_code: kind.code(),
                status: kind.status(),
                title: kind.title(),
                problem_type: kind.problem_type(),
                detail: error.message().to_owned(),
                expose_detail: true,
                extensions: error.extensions().clone(),
                field_errors: error.field_errors().cloned(),
                trace_id: error.trace_id(),
                diagnostics,
            },
        }
    }

    pub fn error_code(&self) -> &'static str {
        self.error_code
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn title(&self) -> &'static str {
        self.title
    }

    pub fn problem_type(&self) -> Option<&'static str> {
        self.problem_type
    }

    /// Original message; may contain internals for unclassified failures.
    pub fn detail(&self) -> &str {
        self.detail.as_str()
    }

    /// Whether [`Self::detail`] is safe to show outside diagnostic mode.
    pub fn expose_detail(&self) -> bool {
        self.expose_detail
    }

    pub fn extensions(&self) -> &Map<String, Value> {
        &self.extensions
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        self.field_errors.as_ref()
    }

    pub fn trace_id(&self) -> Option<TraceId> {
        self.trace_id
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Log severity from the `domain` extension.
    pub fn severity(&self) -> Severity {
        Severity::for_domain(self.extensions.get(DOMAIN_KEY).and_then(Value::as_str))
    }
}

fn diagnostics_for(error: &Error) -> Diagnostics {
    let exception_type = match error.source_type() {
        Some(name) if error.kind() == ErrorKind::Unclassified => name.to_owned(),
        _ => format!("{}::{:?}", type_name::<Error>(), error.kind()),
    };
    let inner = match error.kind() {
        // The wrapped source is the failure itself; report what it wraps.
        ErrorKind::Unclassified => error
            .source()
            .and_then(|cause| cause.source())
            .map(|cause| InnerCause {
                type_name: None,
                message: cause.to_string(),
            }),
        _ => error.source().map(|cause| InnerCause {
            type_name: error.source_type().map(str::to_owned),
            message: cause.to_string(),
        }),
    };
    Diagnostics {
        exception_type,
        stack_trace: error.backtrace().map(ToString::to_string),
        inner,
    }
}
