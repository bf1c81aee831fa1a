//! Third stage: wrap commands in their module's unit of work.
//!
//! Only [`RequestKind::Command`](crate::domain::RequestKind::Command) requests
//! are wrapped. A command dispatched while its unit of work already has an
//! open transaction joins it; the outermost owner commits or rolls back.

use tracing::{debug, error};

use super::{Cancelled, Next};
use crate::domain::error::Error;
use crate::domain::request::{Request, RequestContext};
use crate::domain::unit_of_work::UnitOfWork;

/// Run `next` inside a transaction for commands; pass queries straight through.
///
/// On success the unit of work saves and then commits. On any failure it is
/// rolled back exactly once and the original error is returned. Rollback
/// failures are logged and never replace the original error.
pub async fn run<'a, R: Request>(
    request: R,
    ctx: &'a RequestContext,
    next: Next<'a, R>,
) -> Result<R::Response, Error> {
    if !R::KIND.is_transactional() {
        return next(request).await;
    }

    let unit = ctx.unit_of_work(R::MODULE).await?;
    if unit.in_transaction() {
        debug!(request = R::NAME, "joining ambient transaction");
        return next(request).await;
    }

    let outcome = async {
        unit.begin().await?;
        let response = tokio::select! {
            biased;
            () = ctx.cancellation().cancelled() => Err(Error::unclassified(Cancelled)),
            result = next(request) => result,
        }?;
        let saved = unit.save_changes().await?;
        unit.commit().await?;
        debug!(request = R::NAME, saved, "transaction committed");
        Ok::<_, Error>(response)
    }
    .await;

    if let Err(original) = &outcome {
        roll_back(unit.as_ref(), R::NAME, original).await;
    }
    outcome
}

async fn roll_back(unit: &dyn UnitOfWork, request: &'static str, original: &Error) {
    if let Err(rollback_error) = unit.rollback().await {
        error!(
            request,
            error = %rollback_error,
            original = %original,
            "rollback failed; returning original error"
        );
    }
}
