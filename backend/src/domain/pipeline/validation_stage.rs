//! First stage: run every validator and short-circuit on failure.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::debug;

use super::{Cancelled, Next};
use crate::domain::error::Error;
use crate::domain::request::{Request, RequestContext};
use crate::domain::validation::{FieldErrors, Validator};

/// Validate `request`, then continue with `next` when it is valid.
///
/// All validators run concurrently and every failure is reported, grouped by
/// field in first-seen order.
pub async fn run<'a, R: Request>(
    request: R,
    ctx: &'a RequestContext,
    validators: &'a [Arc<dyn Validator<R>>],
    next: Next<'a, R>,
) -> Result<R::Response, Error> {
    if ctx.is_cancelled() {
        return Err(Error::unclassified(Cancelled));
    }
    if validators.is_empty() {
        return next(request).await;
    }

    let cancel = ctx.cancellation();
    let outcomes = join_all(
        validators
            .iter()
            .map(|validator| validator.validate(&request, cancel)),
    )
    .await;
    let errors: FieldErrors = outcomes.into_iter().flatten().collect();

    if !errors.is_empty() {
        debug!(
            request = R::NAME,
            fields = errors.len(),
            "request failed validation"
        );
        return Err(Error::validation(
            format!("Validation failed for {}", R::NAME),
            errors,
        ));
    }
    next(request).await
}
