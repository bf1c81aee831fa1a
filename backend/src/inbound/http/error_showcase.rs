//! Diagnostics endpoint rendering one failure of each kind.
//!
//! ```text
//! GET /api/v1/diagnostics/errors/business-rule
//! ```

use actix_web::{HttpResponse, get, web};

use crate::modules::diagnostics::RaiseError;

use super::error::ApiResult;
use super::state::Dispatch;

/// Raise the named error scenario and return its problem payload.
#[get("/diagnostics/errors/{kind}")]
pub async fn raise_error(dispatch: Dispatch, path: web::Path<String>) -> ApiResult<HttpResponse> {
    dispatch
        .send(RaiseError {
            scenario: path.into_inner(),
        })
        .await?;
    Ok(HttpResponse::NoContent().finish())
}
