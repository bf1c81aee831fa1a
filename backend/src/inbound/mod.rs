//! Inbound adapters translating transport requests into pipeline requests.

pub mod http;
