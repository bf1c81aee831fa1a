//! HTTP adapter mapping for domain errors.
//!
//! Purpose: the only place a domain [`Error`] becomes a response. Failures are
//! rendered as `application/problem+json` payloads by the shared
//! [`ProblemFactory`] and carry the `trace-id` header.

use std::fmt;
use std::sync::Arc;

use actix_web::error::{JsonPayloadError, QueryPayloadError};
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, ResponseError, web};
use mockable::DefaultClock;
use tracing::{debug, error};

use crate::domain::{
    Error, PROBLEM_CONTENT_TYPE, ProblemContext, ProblemDetails, ProblemFactory, TRACE_ID_HEADER,
    TraceId,
};

use super::state::HttpState;

/// Convenient result alias for HTTP handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// A rendered problem ready to be written to the client.
#[derive(Debug, Clone)]
pub struct ApiError {
    problem: ProblemDetails,
    trace_id: Option<TraceId>,
}

impl ApiError {
    pub fn new(problem: ProblemDetails, trace_id: Option<TraceId>) -> Self {
        Self { problem, trace_id }
    }

    /// Render `error` for the request at `instance`.
    pub fn render(
        factory: &ProblemFactory,
        error: &Error,
        instance: &str,
        trace_id: Option<TraceId>,
    ) -> Self {
        let trace_id = trace_id.or(error.trace_id());
        let problem = factory.from_error(error, &ProblemContext::new(instance, trace_id));
        Self::new(problem, trace_id)
    }

    /// Render `error` using the state registered on the request's app.
    pub fn for_request(req: &HttpRequest, error: &Error) -> Self {
        let trace_id = TraceId::current();
        match req.app_data::<web::Data<HttpState>>() {
            Some(state) => Self::render(state.problems(), error, req.path(), trace_id),
            None => {
                let factory = ProblemFactory::new(false, Arc::new(DefaultClock));
                Self::render(&factory, error, req.path(), trace_id)
            }
        }
    }

    pub fn problem(&self) -> &ProblemDetails {
        &self.problem
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {}",
            self.problem.status, self.problem.title, self.problem.detail
        )
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.problem.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        if let Some(id) = self.trace_id {
            builder.insert_header((TRACE_ID_HEADER, id.to_string()));
        }
        match serde_json::to_string(&self.problem) {
            Ok(body) => builder.content_type(PROBLEM_CONTENT_TYPE).body(body),
            Err(err) => {
                error!(error = %err, "failed to serialise problem payload");
                HttpResponse::InternalServerError().finish()
            }
        }
    }
}

/// Render malformed JSON bodies as validation problems.
pub fn json_error_handler(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    debug!(error = %err, path = req.path(), "rejected request body");
    ApiError::for_request(req, &Error::invalid_field("body", err.to_string())).into()
}

/// Render malformed query strings as validation problems.
pub fn query_error_handler(err: QueryPayloadError, req: &HttpRequest) -> actix_web::Error {
    debug!(error = %err, path = req.path(), "rejected query string");
    ApiError::for_request(req, &Error::invalid_field("query", err.to_string())).into()
}
