//! Request pipeline wrapping every handler with cross-cutting stages.
//!
//! Stages run in a fixed order: validation, logging, transaction, then the
//! handler. Each stage receives the rest of the pipeline as a [`Next`]
//! continuation and may pass through, short-circuit with an error, or observe
//! the result on the way out. The order is declared once, in
//! [`Dispatcher::execute`].

pub mod logging_stage;
pub mod transaction_stage;
pub mod validation_stage;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use tracing::{Instrument, error, info_span};

use super::error::Error;
use super::ports::define_port_error;
use super::request::{Request, RequestContext};
use super::validation::Validator;

/// Remainder of the pipeline handed to a stage.
pub type Next<'a, R> =
    Box<dyn FnOnce(R) -> BoxFuture<'a, Result<<R as Request>::Response, Error>> + Send + 'a>;

/// Raised when a request is cancelled before it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("request cancelled")]
pub struct Cancelled;

define_port_error! {
    /// Dispatcher configuration failures.
    pub enum PipelineError {
        /// No handler is registered for the request type.
        MissingHandler { request: String } => "no handler registered for {request}",
    }
}

/// Handles one concrete request type.
#[async_trait]
pub trait Handler<R: Request>: Send + Sync {
    async fn handle(&self, request: R, ctx: &RequestContext) -> Result<R::Response, Error>;
}

/// Registers handlers and validators before the dispatcher is frozen.
#[derive(Default)]
#[must_use]
pub struct DispatcherBuilder {
    handlers: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    validators: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl DispatcherBuilder {
    /// Register the handler for `R`, replacing any earlier one.
    pub fn handler<R, H>(mut self, handler: H) -> Self
    where
        R: Request,
        H: Handler<R> + 'static,
    {
        let handler: Arc<dyn Handler<R>> = Arc::new(handler);
        self.handlers.insert(TypeId::of::<R>(), Box::new(handler));
        self
    }

    /// Add a validator for `R`.
    pub fn validator<R, V>(mut self, validator: V) -> Self
    where
        R: Request,
        V: Validator<R> + 'static,
    {
        let validator: Arc<dyn Validator<R>> = Arc::new(validator);
        let entry = self
            .validators
            .entry(TypeId::of::<R>())
            .or_insert_with(|| Box::new(Vec::<Arc<dyn Validator<R>>>::new()));
        if let Some(list) = entry.downcast_mut::<Vec<Arc<dyn Validator<R>>>>() {
            list.push(validator);
        }
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            handlers: self.handlers,
            validators: self.validators,
        }
    }
}

/// Immutable request dispatcher shared by every request.
pub struct Dispatcher {
    handlers: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    validators: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    /// Whether a handler is registered for `R`.
    pub fn handles<R: Request>(&self) -> bool {
        self.handler::<R>().is_some()
    }

    fn handler<R: Request>(&self) -> Option<Arc<dyn Handler<R>>> {
        self.handlers
            .get(&TypeId::of::<R>())
            .and_then(|entry| entry.downcast_ref::<Arc<dyn Handler<R>>>())
            .cloned()
    }

    fn validators<R: Request>(&self) -> &[Arc<dyn Validator<R>>] {
        self.validators
            .get(&TypeId::of::<R>())
            .and_then(|entry| entry.downcast_ref::<Vec<Arc<dyn Validator<R>>>>())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Run `request` through the pipeline.
    ///
    /// # Errors
    ///
    /// Returns whatever a stage or the handler raised, unchanged.
    pub async fn execute<R: Request>(
        &self,
        request: R,
        ctx: &RequestContext,
    ) -> Result<R::Response, Error> {
        let Some(handler) = self.handler::<R>() else {
            error!(
                request = R::NAME,
                kind = R::KIND.label(),
                trace_id = %ctx.trace_id(),
                "no handler registered"
            );
            return Err(PipelineError::missing_handler(R::NAME).into());
        };
        let validators = self.validators::<R>();
        let span = info_span!(
            "pipeline",
            request = R::NAME,
            kind = R::KIND.label(),
            trace_id = %ctx.trace_id(),
        );

        async move {
            let handle: Next<'_, R> =
                Box::new(move |request| Box::pin(async move { handler.handle(request, ctx).await }));
            let transaction: Next<'_, R> =
                Box::new(move |request| Box::pin(transaction_stage::run(request, ctx, handle)));
            let logging: Next<'_, R> =
                Box::new(move |request| Box::pin(logging_stage::run(request, transaction)));
            validation_stage::run(request, ctx, validators, logging).await
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests;
