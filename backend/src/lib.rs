//! Modular-monolith backend: a transactional request pipeline, per-module
//! units of work and problem-detail error rendering.

pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod modules;
pub mod outbound;
pub mod server;
pub mod settings;
#[cfg(test)]
pub(crate) mod test_support;

pub use middleware::Trace;
