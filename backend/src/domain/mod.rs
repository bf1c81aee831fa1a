//! Shared kernel: error taxonomy, request pipeline and unit-of-work plumbing.
//!
//! Purpose: give every module the same request lifecycle (validation,
//! logging, transaction, handler) and the same failure vocabulary, so inbound
//! adapters can render any failure as a problem-detail payload.
//!
//! Public surface:
//! - Error, ErrorKind, ErrorDomain: closed error taxonomy.
//! - ErrorInfo, Severity: pure classification of errors.
//! - ProblemFactory, ProblemDetails: problem payload assembly.
//! - Dispatcher, Handler, Request: the request pipeline.
//! - UnitOfWork, UnitOfWorkResolver, ModuleRegistry: module-owned transactions.

pub mod classification;
pub mod error;
pub mod pipeline;
pub mod ports;
pub mod problem;
pub mod request;
pub mod trace_id;
pub mod unit_of_work;
pub mod validation;

pub use self::classification::{Diagnostics, ErrorInfo, Fallback, InnerCause, Severity};
pub use self::error::{
    DOMAIN_KEY, ERROR_CODE_KEY, Error, ErrorBuilder, ErrorDomain, ErrorKind, NotImplemented,
};
pub use self::pipeline::{Cancelled, Dispatcher, DispatcherBuilder, Handler, Next, PipelineError};
pub use self::problem::{
    GENERIC_DETAIL, PROBLEM_CONTENT_TYPE, ProblemContext, ProblemDetails, ProblemFactory,
};
pub use self::request::{Request, RequestContext, RequestKind};
pub use self::trace_id::{TRACE_ID_HEADER, TraceId};
pub use self::unit_of_work::{
    ModuleOwnership, ModuleRegistry, UnitOfWork, UnitOfWorkError, UnitOfWorkFactory,
    UnitOfWorkResolver, UnitOfWorkScope,
};
pub use self::validation::{FieldErrors, ValidationFailure, Validator};
