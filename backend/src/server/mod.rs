//! Server construction and middleware wiring.

mod config;
mod state_builders;

pub use config::ServerConfig;
pub use state_builders::{build_http_state, build_http_state_with_store};

use actix_web::dev::{Server, ServerHandle, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::Trace;
use crate::inbound::http::{self, HttpState};

/// Assemble the application: shared state, trace middleware and routes.
pub fn build_app(
    http_state: web::Data<HttpState>,
    diagnostics: bool,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(http_state)
        .wrap(Trace)
        .configure(|cfg| http::configure(cfg, diagnostics))
}

/// Construct an Actix HTTP server using the provided configuration.
///
/// Actix's own signal handling is disabled: SIGINT/SIGTERM or cancelling the
/// configured shutdown token cancels in-flight requests (rolling back their
/// transactions) and then stops the server gracefully. Must be called from
/// within an Actix system, as `HttpServer::run` requires.
///
/// # Errors
///
/// Returns [`std::io::Error`] when module wiring fails or the socket cannot
/// be bound.
pub fn create_server(config: ServerConfig) -> std::io::Result<Server> {
    let http_state = web::Data::new(build_http_state(&config).map_err(std::io::Error::other)?);
    let ServerConfig {
        bind_addr,
        diagnostics,
        shutdown,
        ..
    } = config;

    let server = HttpServer::new(move || build_app(http_state.clone(), diagnostics))
        .disable_signals()
        .bind(bind_addr)?
        .run();

    actix_web::rt::spawn(stop_on_shutdown(shutdown, server.handle()));
    info!(%bind_addr, diagnostics, "HTTP server listening");
    Ok(server)
}

async fn stop_on_shutdown(shutdown: CancellationToken, handle: ServerHandle) {
    tokio::select! {
        () = shutdown.cancelled() => {}
        result = termination_signal() => match result {
            Ok(()) => info!("termination signal received"),
            Err(error) => {
                warn!(%error, "signal handlers unavailable; waiting for shutdown token");
                shutdown.cancelled().await;
            }
        },
    }
    shutdown.cancel();
    handle.stop(true).await;
    info!("HTTP server stopped");
}

#[cfg(unix)]
async fn termination_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn termination_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
