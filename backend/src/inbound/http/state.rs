//! Shared HTTP adapter state.
//!
//! HTTP handlers reach the pipeline through this state via
//! `actix_web::web::Data`, usually by way of the [`Dispatch`] extractor.

use std::sync::Arc;

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest, web};
use futures_util::future::{Ready, ready};
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::domain::{
    Dispatcher, Error, ProblemFactory, Request, RequestContext, TraceId, UnitOfWorkResolver,
};

use super::error::{ApiError, ApiResult};

/// Dependency bundle for HTTP handlers.
///
/// Every request context is cancelled through a child of the `shutdown`
/// token, so cancelling it aborts in-flight work and rolls back open
/// transactions.
#[derive(Clone)]
pub struct HttpState {
    dispatcher: Arc<Dispatcher>,
    resolver: Arc<UnitOfWorkResolver>,
    problems: ProblemFactory,
    shutdown: CancellationToken,
}

impl HttpState {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        resolver: Arc<UnitOfWorkResolver>,
        problems: ProblemFactory,
    ) -> Self {
        Self {
            dispatcher,
            resolver,
            problems,
            shutdown: CancellationToken::new(),
        }
    }

    /// Use `token` as the root of every request's cancellation.
    #[must_use]
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub fn problems(&self) -> &ProblemFactory {
        &self.problems
    }

    /// Fresh per-request context with its own unit-of-work scope and a
    /// cancellation token derived from the shutdown token.
    pub fn context(&self, trace_id: TraceId) -> RequestContext {
        RequestContext::new(trace_id, Arc::clone(&self.resolver))
            .with_cancellation(self.shutdown.child_token())
    }
}

/// Extractor dispatching requests on behalf of one HTTP request.
///
/// Failures are rendered against the request path so problem payloads carry
/// the right `instance`.
pub struct Dispatch {
    state: web::Data<HttpState>,
    instance: String,
    trace_id: TraceId,
}

impl Dispatch {
    /// Run `request` through the pipeline.
    ///
    /// # Errors
    ///
    /// Returns the rendered problem for any pipeline failure.
    pub async fn send<R: Request>(&self, request: R) -> ApiResult<R::Response> {
        let ctx = self.state.context(self.trace_id);
        self.state
            .dispatcher
            .execute(request, &ctx)
            .await
            .map_err(|err| self.reject(&err))
    }

    /// Render an error raised outside the pipeline.
    pub fn reject(&self, error: &Error) -> ApiError {
        ApiError::render(
            self.state.problems(),
            error,
            &self.instance,
            Some(self.trace_id),
        )
    }

    /// Path of the request being served.
    pub fn instance(&self) -> &str {
        &self.instance
    }
}

impl FromRequest for Dispatch {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let Some(state) = req.app_data::<web::Data<HttpState>>().cloned() else {
            error!(path = req.path(), "HTTP state is not registered");
            return ready(Err(ApiError::for_request(
                req,
                &Error::internal("HTTP state is not registered"),
            )
            .into()));
        };
        ready(Ok(Self {
            state,
            instance: req.path().to_owned(),
            trace_id: TraceId::current_or_generate(),
        }))
    }
}
