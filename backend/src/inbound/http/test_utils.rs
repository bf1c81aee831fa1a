//! Test helpers for inbound HTTP components.

use std::sync::Arc;

use actix_web::dev::{Service, ServiceResponse};
use actix_web::{test, web};
use tokio_util::sync::CancellationToken;

use crate::modules::users::UsersStore;
use crate::outbound::persistence::InMemoryUsersStore;
use crate::server::{build_app, build_http_state_with_store};
use crate::test_support::fixture_clock;

/// Initialise the full application over an empty in-memory users store.
///
/// Timestamps come from the fixture clock.
pub async fn init_app(
    diagnostics: bool,
) -> impl Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error> {
    init_app_with_store(
        Arc::new(InMemoryUsersStore::new()),
        diagnostics,
        CancellationToken::new(),
    )
    .await
}

/// Initialise the application over `store`, rooting request cancellation in
/// `shutdown`.
pub async fn init_app_with_store(
    store: Arc<dyn UsersStore>,
    diagnostics: bool,
    shutdown: CancellationToken,
) -> impl Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error> {
    let state = build_http_state_with_store(store, diagnostics, fixture_clock())
        .expect("modules register without conflicts")
        .with_shutdown(shutdown);
    test::init_service(build_app(web::Data::new(state), diagnostics)).await
}
