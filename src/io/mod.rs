//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `api` - HTTP client for the registrar API
//! - `assets` - Avatar and QR code asset retrieval
//! - `mock_registrar` - In-memory registrar HTTP server for local runs and tests

pub mod api;
pub mod assets;
pub mod mock_registrar;

// Re-export commonly used types
pub use api::{ApiClient, ApiError, RegistrarApi, GENERIC_ERROR_MESSAGE};
pub use assets::{AssetError, AssetKind};
pub use mock_registrar::{MockRegistrar, MockServer};
