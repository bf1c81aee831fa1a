//! Correlation id shared by a request's log lines, response header and
//! problem payload.
//!
//! The [`Trace`](crate::Trace) middleware mints one id per HTTP request and
//! runs the rest of the request inside [`TraceId::scope`]. Code further down,
//! such as [`Error`](crate::domain::Error) construction, reads it back with
//! [`TraceId::current`] instead of taking it as an argument.
//!
//! The id is task-local: a `tokio::spawn`ed task starts without one unless
//! its future is wrapped in [`TraceId::scope`] again.

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use tokio::task_local;
use uuid::Uuid;

/// Response header echoing the request's trace id.
pub const TRACE_ID_HEADER: &str = "trace-id";

task_local! {
    static TRACE_ID: TraceId;
}

/// UUID naming one request end to end.
///
/// # Examples
/// ```
/// use modulith::domain::TraceId;
///
/// let id: TraceId = "0f8fad5b-d9cb-469f-a165-70867728950e".parse().unwrap();
/// assert_eq!(id.to_string(), "0f8fad5b-d9cb-469f-a165-70867728950e");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(Uuid);

impl TraceId {
    /// Fresh random (v4) id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Id of the request the calling task is serving, if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        TRACE_ID.try_with(|id| *id).ok()
    }

    /// [`TraceId::current`], minting a new id outside a request.
    #[must_use]
    pub fn current_or_generate() -> Self {
        Self::current().unwrap_or_else(Self::generate)
    }

    /// Poll `fut` to completion with `trace_id` as the current id.
    ///
    /// Scopes nest: the innermost id wins until its future finishes.
    pub async fn scope<Fut: Future>(trace_id: TraceId, fut: Fut) -> Fut::Output {
        TRACE_ID.scope(trace_id, fut).await
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for TraceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}
