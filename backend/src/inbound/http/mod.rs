//! HTTP inbound adapter exposing REST endpoints.

pub mod error;
pub mod error_showcase;
pub mod state;
#[cfg(test)]
pub mod test_utils;
pub mod users;

use actix_web::web;

pub use error::{ApiError, ApiResult};
pub use state::{Dispatch, HttpState};

/// Register the `/api/v1` scope.
///
/// The error showcase is only mounted when `diagnostics` is set.
pub fn configure(cfg: &mut web::ServiceConfig, diagnostics: bool) {
    let mut api = web::scope("/api/v1")
        .app_data(web::JsonConfig::default().error_handler(error::json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(error::query_error_handler))
        .service(users::create_user)
        .service(users::list_users)
        .service(users::get_user);
    if diagnostics {
        api = api.service(error_showcase::raise_error);
    }
    cfg.service(api);
}
