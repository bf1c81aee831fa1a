//! Domain-level error taxonomy.
//!
//! Every failure raised by a module is an [`Error`] tagged with one
//! [`ErrorKind`]. Kinds carry fixed metadata (machine code, status, title,
//! problem type URI and domain tag). Errors are transport agnostic: inbound
//! adapters classify them with [`crate::domain::ErrorInfo`] and render them
//! with [`crate::domain::ProblemFactory`].
//!
//! Errors are assembled once through [`ErrorBuilder`] and are read-only
//! afterwards. Extensions follow first-write-wins semantics, so the seeded
//! `errorCode` and `domain` entries cannot be overwritten by callers.

use std::any::type_name;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::trace_id::TraceId;
use super::validation::FieldErrors;

/// Extension key holding the stable machine code.
pub const ERROR_CODE_KEY: &str = "errorCode";
/// Extension key holding the [`ErrorDomain`] tag.
pub const DOMAIN_KEY: &str = "domain";

/// Coarse origin tag recorded in the `domain` extension.
///
/// Log severity is derived from this tag rather than from the error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorDomain {
    Validation,
    Application,
    BusinessRule,
    BusinessLogic,
    Security,
    Infrastructure,
    Database,
}

impl ErrorDomain {
    /// Wire representation of the tag.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Application => "application",
            Self::BusinessRule => "business_rule",
            Self::BusinessLogic => "business_logic",
            Self::Security => "security",
            Self::Infrastructure => "infrastructure",
            Self::Database => "database",
        }
    }

    /// Parse a wire tag; unknown tags yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "validation" => Some(Self::Validation),
            "application" => Some(Self::Application),
            "business_rule" => Some(Self::BusinessRule),
            "business_logic" => Some(Self::BusinessLogic),
            "security" => Some(Self::Security),
            "infrastructure" => Some(Self::Infrastructure),
            "database" => Some(Self::Database),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of failure categories with fixed response metadata.
///
/// # Examples
/// ```
/// use modulith::domain::ErrorKind;
///
/// assert_eq!(ErrorKind::BusinessRule.status(), 409);
/// assert_eq!(ErrorKind::BusinessRule.code(), "BUSINESS_RULE_VIOLATION");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input failed field-level validation.
    Validation,
    /// A requested resource does not exist.
    NotFound,
    /// Authentication is missing or invalid.
    Unauthorized,
    /// Authenticated but not permitted.
    Forbidden,
    /// A business rule such as uniqueness was violated.
    BusinessRule,
    /// An entity invariant was violated.
    Domain,
    /// A database operation failed.
    Database,
    /// An external dependency is unavailable.
    Infrastructure,
    /// Wraps a failure from outside the taxonomy.
    Unclassified,
}

impl ErrorKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Validation,
        Self::NotFound,
        Self::Unauthorized,
        Self::Forbidden,
        Self::BusinessRule,
        Self::Domain,
        Self::Database,
        Self::Infrastructure,
        Self::Unclassified,
    ];

    /// Stable machine-readable code.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "RESOURCE_NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::BusinessRule => "BUSINESS_RULE_VIOLATION",
            Self::Domain => "DOMAIN_ERROR",
            Self::Database => "DATABASE_ERROR",
            Self::Infrastructure => "INFRASTRUCTURE_ERROR",
            Self::Unclassified => "INTERNAL_ERROR",
        }
    }

    /// HTTP status code associated with the kind.
    pub const fn status(self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::BusinessRule => 409,
            Self::Domain => 422,
            Self::Database | Self::Unclassified => 500,
            Self::Infrastructure => 503,
        }
    }

    /// Short human-readable summary.
    pub const fn title(self) -> &'static str {
        match self {
            Self::Validation => "Validation Failed",
            Self::NotFound => "Resource Not Found",
            Self::Unauthorized => "Authentication Required",
            Self::Forbidden => "Access Forbidden",
            Self::BusinessRule => "Business Rule Violation",
            Self::Domain => "Domain Rule Violation",
            Self::Database => "Database Operation Failed",
            Self::Infrastructure => "Infrastructure Service Unavailable",
            Self::Unclassified => "Internal Server Error",
        }
    }

    /// Problem type URI; unclassified failures fall back to the status default.
    pub const fn problem_type(self) -> Option<&'static str> {
        match self {
            Self::Unclassified => None,
            kind => Some(default_problem_type(kind.status())),
        }
    }

    /// Domain tag seeded into the extensions.
    pub const fn domain(self) -> Option<ErrorDomain> {
        match self {
            Self::Validation => Some(ErrorDomain::Validation),
            Self::NotFound => Some(ErrorDomain::Application),
            Self::Unauthorized | Self::Forbidden => Some(ErrorDomain::Security),
            Self::BusinessRule => Some(ErrorDomain::BusinessRule),
            Self::Domain => Some(ErrorDomain::BusinessLogic),
            Self::Database => Some(ErrorDomain::Database),
            Self::Infrastructure => Some(ErrorDomain::Infrastructure),
            Self::Unclassified => None,
        }
    }
}

/// Default problem type URI for an HTTP status.
pub const fn default_problem_type(status: u16) -> &'static str {
    match status {
        400 => "https://tools.ietf.org/html/rfc7231#section-6.5.1",
        401 => "https://tools.ietf.org/html/rfc7235#section-3.1",
        403 => "https://tools.ietf.org/html/rfc7231#section-6.5.3",
        404 => "https://tools.ietf.org/html/rfc7231#section-6.5.4",
        408 => "https://tools.ietf.org/html/rfc7231#section-6.5.7",
        409 => "https://tools.ietf.org/html/rfc7231#section-6.5.8",
        422 => "https://datatracker.ietf.org/doc/html/rfc4918#section-11.2",
        501 => "https://tools.ietf.org/html/rfc7231#section-6.6.2",
        503 => "https://tools.ietf.org/html/rfc7231#section-6.6.4",
        _ => "https://tools.ietf.org/html/rfc7231#section-6.6.1",
    }
}

/// Raised by code paths that are declared but not yet available.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{feature} is not implemented")]
pub struct NotImplemented {
    feature: String,
}

impl NotImplemented {
    /// Mark `feature` as unimplemented.
    pub fn new(feature: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
        }
    }
}

type SharedSource = Arc<dyn StdError + Send + Sync + 'static>;

/// Immutable domain error.
///
/// The active [`TraceId`] and a backtrace (when enabled through
/// `RUST_BACKTRACE`) are captured when the error is built.
///
/// # Examples
/// ```
/// use modulith::domain::{Error, ErrorKind};
///
/// let err = Error::business_rule("unique_email", "User with email 'a@b.c' already exists.");
/// assert_eq!(err.kind(), ErrorKind::BusinessRule);
/// assert_eq!(err.extension("ruleName"), Some(&serde_json::json!("unique_email")));
/// ```
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    extensions: Map<String, Value>,
    field_errors: Option<FieldErrors>,
    trace_id: Option<TraceId>,
    source: Option<SharedSource>,
    source_type: Option<&'static str>,
    backtrace: Arc<Backtrace>,
}

/// Accumulates the parts of an [`Error`] before it is frozen.
#[derive(Debug)]
#[must_use]
pub struct ErrorBuilder {
    kind: ErrorKind,
    message: String,
    extensions: Map<String, Value>,
    field_errors: Option<FieldErrors>,
    source: Option<SharedSource>,
    source_type: Option<&'static str>,
}

impl ErrorBuilder {
    fn new(kind: ErrorKind, message: String) -> Self {
        let mut extensions = Map::new();
        extensions.insert(ERROR_CODE_KEY.to_owned(), Value::from(kind.code()));
        if let Some(domain) = kind.domain() {
            extensions.insert(DOMAIN_KEY.to_owned(), Value::from(domain.as_str()));
        }
        Self {
            kind,
            message,
            extensions,
            field_errors: None,
            source: None,
            source_type: None,
        }
    }

    /// Append an extension entry. Earlier writes of the same key win.
    pub fn extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extensions.entry(key.into()).or_insert(value.into());
        self
    }

    /// Attach grouped field errors.
    pub fn field_errors(mut self, errors: FieldErrors) -> Self {
        self.field_errors = Some(errors);
        self
    }

    /// Record the underlying cause.
    pub fn source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source_type = Some(type_name::<E>());
        self.source = Some(Arc::new(source));
        self
    }

    /// Freeze the error, capturing the ambient trace identifier.
    pub fn build(self) -> Error {
        Error {
            kind: self.kind,
            message: self.message,
            extensions: self.extensions,
            field_errors: self.field_errors,
            trace_id: TraceId::current(),
            source: self.source,
            source_type: self.source_type,
            backtrace: Arc::new(Backtrace::capture()),
        }
    }
}

impl Error {
    /// Start building an error of `kind`.
    pub fn builder(kind: ErrorKind, message: impl Into<String>) -> ErrorBuilder {
        ErrorBuilder::new(kind, message.into())
    }

    /// Validation failure carrying grouped field errors.
    pub fn validation(message: impl Into<String>, errors: FieldErrors) -> Self {
        Self::builder(ErrorKind::Validation, message)
            .field_errors(errors)
            .build()
    }

    /// Validation failure for a single field.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        let mut errors = FieldErrors::new();
        errors.push(field.clone(), message);
        Self::validation(format!("Validation failed for {field}"), errors)
    }

    /// Generic not-found failure.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::builder(ErrorKind::NotFound, message).build()
    }

    /// Not-found failure for a typed resource identifier.
    pub fn resource_not_found(resource_type: &str, resource_id: impl fmt::Display) -> Self {
        let id = resource_id.to_string();
        Self::builder(
            ErrorKind::NotFound,
            format!("{resource_type} with ID '{id}' was not found"),
        )
        .extension("resourceType", resource_type)
        .extension("resourceId", id)
        .build()
    }

    /// Authentication is required.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::builder(ErrorKind::Unauthorized, message).build()
    }

    /// Access is denied.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::builder(ErrorKind::Forbidden, message).build()
    }

    /// Access to `action` on `resource` is denied.
    pub fn forbidden_action(resource: &str, action: &str) -> Self {
        Self::builder(
            ErrorKind::Forbidden,
            format!("Access forbidden: insufficient permissions to {action} {resource}"),
        )
        .extension("resource", resource)
        .extension("action", action)
        .build()
    }

    /// Named business rule violation.
    pub fn business_rule(rule_name: &str, message: impl Into<String>) -> Self {
        Self::builder(ErrorKind::BusinessRule, message)
            .extension("ruleName", rule_name)
            .build()
    }

    /// Entity invariant violation.
    pub fn domain(entity_name: &str, message: impl Into<String>) -> Self {
        Self::builder(ErrorKind::Domain, message)
            .extension("entityName", entity_name)
            .build()
    }

    /// Failed database operation.
    pub fn database(operation: &str, message: impl Into<String>) -> Self {
        Self::builder(ErrorKind::Database, message)
            .extension("operation", operation)
            .build()
    }

    /// Unavailable external service.
    pub fn infrastructure(service_name: &str, message: impl Into<String>) -> Self {
        Self::builder(ErrorKind::Infrastructure, message)
            .extension("serviceName", service_name)
            .build()
    }

    /// Wrap a failure from outside the taxonomy.
    ///
    /// The wrapped error is inspected by classification to pick a fallback
    /// status; its message is never shown to clients outside diagnostic mode.
    pub fn unclassified<E>(source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        let message = source.to_string();
        Self::builder(ErrorKind::Unclassified, message)
            .source(source)
            .build()
    }

    /// Unclassified failure described only by a message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::builder(ErrorKind::Unclassified, message).build()
    }

    /// Failure category.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Structured extension entries in insertion order.
    pub fn extensions(&self) -> &Map<String, Value> {
        &self.extensions
    }

    /// Look up a single extension entry.
    pub fn extension(&self, key: &str) -> Option<&Value> {
        self.extensions.get(key)
    }

    /// Grouped field errors for validation failures.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        self.field_errors.as_ref()
    }

    /// Trace identifier in scope when the error was built.
    pub fn trace_id(&self) -> Option<TraceId> {
        self.trace_id
    }

    /// Rust type name of the wrapped cause, if any.
    pub fn source_type(&self) -> Option<&'static str> {
        self.source_type
    }

    /// Backtrace captured at construction, when enabled.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.backtrace.status() {
            BacktraceStatus::Captured => Some(&self.backtrace),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn StdError + 'static))
    }
}
