//! Requests dispatched through the pipeline and their per-request context.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::error::Error;
use super::trace_id::TraceId;
use super::unit_of_work::{UnitOfWork, UnitOfWorkResolver, UnitOfWorkScope};

/// Capability tag deciding which stages apply to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Mutates state; wrapped in a transaction.
    Command,
    /// Reads state; never transactional.
    Query,
    /// Anything else.
    Generic,
}

impl RequestKind {
    /// Label used in log events.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Query => "query",
            Self::Generic => "request",
        }
    }

    /// Whether the transaction stage wraps this kind.
    pub const fn is_transactional(self) -> bool {
        matches!(self, Self::Command)
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An immutable command or query with exactly one response type.
///
/// `MODULE` is the path of the declaring module, normally `module_path!()`,
/// and decides which unit of work serves the request.
///
/// # Examples
/// ```
/// use modulith::domain::{Request, RequestKind};
///
/// struct Ping;
///
/// impl Request for Ping {
///     type Response = &'static str;
///     const KIND: RequestKind = RequestKind::Query;
///     const MODULE: &'static str = module_path!();
///     const NAME: &'static str = "Ping";
/// }
///
/// assert_eq!(Ping::KIND.label(), "query");
/// ```
pub trait Request: Send + Sync + 'static {
    type Response: Send + 'static;
    const KIND: RequestKind;
    const MODULE: &'static str;
    const NAME: &'static str;
}

/// State owned by a single in-flight request.
#[derive(Clone)]
pub struct RequestContext {
    trace_id: TraceId,
    cancellation: CancellationToken,
    scope: Arc<UnitOfWorkScope>,
    resolver: Arc<UnitOfWorkResolver>,
}

impl RequestContext {
    /// Context with a fresh scope and cancellation token.
    pub fn new(trace_id: TraceId, resolver: Arc<UnitOfWorkResolver>) -> Self {
        Self {
            trace_id,
            cancellation: CancellationToken::new(),
            scope: Arc::new(UnitOfWorkScope::new()),
            resolver,
        }
    }

    /// Replace the cancellation token, e.g. with a child of a server token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn scope(&self) -> &UnitOfWorkScope {
        &self.scope
    }

    pub fn resolver(&self) -> &UnitOfWorkResolver {
        &self.resolver
    }

    /// Unit of work owning `module` within this request.
    ///
    /// # Errors
    ///
    /// Fails with an unclassified error when `module` is not registered.
    pub async fn unit_of_work(&self, module: &str) -> Result<Arc<dyn UnitOfWork>, Error> {
        Ok(self.resolver.resolve(module, &self.scope).await?)
    }

    /// Typed access to the concrete unit of work owning `module`.
    ///
    /// # Errors
    ///
    /// Fails with an unclassified error when `module` is not registered or
    /// its unit of work is not a `T`.
    pub async fn unit_of_work_as<T>(&self, module: &str) -> Result<Arc<T>, Error>
    where
        T: Send + Sync + 'static,
    {
        Ok(self.resolver.resolve_as::<T>(module, &self.scope).await?)
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("trace_id", &self.trace_id)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
