//! Error showcase: raises one failure of each kind on demand.
//!
//! Lets operators check how every taxonomy member and fallback renders
//! without provoking real failures.

use std::fmt;
use std::io;

use async_trait::async_trait;
use serde_json::json;

use crate::domain::{
    Cancelled, DispatcherBuilder, Error, ErrorKind, FieldErrors, Handler, NotImplemented, Request,
    RequestContext, RequestKind, ValidationFailure,
};

/// Failure scenarios the showcase can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScenario {
    Validation,
    NotFound,
    Unauthorized,
    Forbidden,
    BusinessRule,
    Domain,
    Database,
    Infrastructure,
    Unclassified,
    NotImplemented,
    Timeout,
    InvalidArgument,
    Cancelled,
}

impl ErrorScenario {
    pub const ALL: [Self; 13] = [
        Self::Validation,
        Self::NotFound,
        Self::Unauthorized,
        Self::Forbidden,
        Self::BusinessRule,
        Self::Domain,
        Self::Database,
        Self::Infrastructure,
        Self::Unclassified,
        Self::NotImplemented,
        Self::Timeout,
        Self::InvalidArgument,
        Self::Cancelled,
    ];

    /// Path segment naming the scenario.
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not-found",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::BusinessRule => "business-rule",
            Self::Domain => "domain",
            Self::Database => "database",
            Self::Infrastructure => "infrastructure",
            Self::Unclassified => "unclassified",
            Self::NotImplemented => "not-implemented",
            Self::Timeout => "timeout",
            Self::InvalidArgument => "invalid-argument",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|scenario| scenario.slug() == slug)
    }

    /// Build the error this scenario demonstrates.
    pub fn raise(self) -> Error {
        match self {
            Self::Validation => {
                let errors: FieldErrors = [
                    ValidationFailure::new("email", "Email is required"),
                    ValidationFailure::new("email", "Email must have a valid format"),
                    ValidationFailure::new("age", "Age must be between 18 and 120"),
                ]
                .into_iter()
                .collect();
                Error::validation("Validation failed for RaiseError", errors)
            }
            Self::NotFound => Error::resource_not_found("Order", 42),
            Self::Unauthorized => Error::unauthorized("A valid access token is required."),
            Self::Forbidden => Error::forbidden_action("orders", "delete"),
            Self::BusinessRule => Error::business_rule(
                "credit_limit",
                "The order total exceeds the customer's credit limit.",
            ),
            Self::Domain => Error::domain("Order", "An order must contain at least one line."),
            Self::Database => Error::database("insert", "Deadlock detected while saving the order."),
            Self::Infrastructure => {
                Error::infrastructure("payment-gateway", "The payment gateway did not respond.")
            }
            Self::Unclassified => Error::unclassified(io::Error::other("unexpected failure")),
            Self::NotImplemented => Error::unclassified(NotImplemented::new("order export")),
            Self::Timeout => Error::unclassified(io::Error::new(
                io::ErrorKind::TimedOut,
                "the inventory service timed out",
            )),
            Self::InvalidArgument => match "forty-two".parse::<u32>() {
                Ok(_) => Error::internal("argument unexpectedly parsed"),
                Err(err) => Error::unclassified(err),
            },
            Self::Cancelled => Error::unclassified(Cancelled),
        }
    }
}

impl fmt::Display for ErrorScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Raise the failure named by `scenario`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaiseError {
    pub scenario: String,
}

impl Request for RaiseError {
    type Response = ();
    const KIND: RequestKind = RequestKind::Generic;
    const MODULE: &'static str = module_path!();
    const NAME: &'static str = "RaiseError";
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RaiseErrorHandler;

#[async_trait]
impl Handler<RaiseError> for RaiseErrorHandler {
    async fn handle(&self, request: RaiseError, _ctx: &RequestContext) -> Result<(), Error> {
        let Some(scenario) = ErrorScenario::parse(&request.scenario) else {
            let available: Vec<_> = ErrorScenario::ALL.iter().map(|s| s.slug()).collect();
            return Err(Error::builder(
                ErrorKind::NotFound,
                format!("Unknown error scenario '{}'", request.scenario),
            )
            .extension("availableScenarios", json!(available))
            .build());
        };
        Err(scenario.raise())
    }
}

/// Register the showcase handler.
pub fn register(builder: DispatcherBuilder) -> DispatcherBuilder {
    builder.handler::<RaiseError, _>(RaiseErrorHandler)
}
