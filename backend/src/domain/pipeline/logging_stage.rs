//! Second stage: time the request and log its outcome.

use std::time::Instant;

use tracing::{error, info, warn};

use super::Next;
use crate::domain::classification::{ErrorInfo, Severity};
use crate::domain::error::Error;
use crate::domain::request::Request;

/// Run `next` and log success at `info` or failure at the classified severity.
///
/// The result is returned unchanged.
pub async fn run<R: Request>(request: R, next: Next<'_, R>) -> Result<R::Response, Error> {
    let kind = R::KIND.label();
    info!(kind, request = R::NAME, "handling request");
    let started = Instant::now();

    let result = next(request).await;
    let elapsed = started.elapsed();

    match &result {
        Ok(_) => info!(kind, request = R::NAME, ?elapsed, "request handled"),
        Err(err) => {
            let info = ErrorInfo::classify(err);
            match info.severity() {
                Severity::Warning => warn!(
                    kind,
                    request = R::NAME,
                    ?elapsed,
                    error_code = info.error_code(),
                    status = info.status(),
                    error = %err,
                    "request failed"
                ),
                Severity::Error => error!(
                    kind,
                    request = R::NAME,
                    ?elapsed,
                    error_code = info.error_code(),
                    status = info.status(),
                    error = %err,
                    "request failed"
                ),
            }
        }
    }
    result
}
