//! Conference ticket desk library
//!
//! Registration, ticket verification and the participant directory, as a
//! client of the registrar HTTP API. Exposes modules for the binaries and
//! the integration tests.

pub mod domain;
pub mod infra;
pub mod io;
pub mod services;

/// Package version plus the commit it was built from
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");
