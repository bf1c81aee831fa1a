//! Outbound adapters implementing module ports for external infrastructure.
//!
//! - **persistence**: users stores backed by memory or PostgreSQL.

pub mod persistence;
