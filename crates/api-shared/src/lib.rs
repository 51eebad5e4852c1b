//! # API Shared
//!
//! Shared utilities and definitions for Referra APIs.
//!
//! Contains:
//! - The JSON response envelope (`ApiResponse`)
//! - Shared services like `HealthService`
//! - Session/identity resolution (`SessionProvider`) used by every authenticated surface
//!
//! Used by `api-rest` and the workspace binaries.

pub mod auth;
pub mod envelope;
pub mod health;

pub use auth::{parse_bearer, AuthError, Role, SessionProvider, SessionUser, StaticSessionProvider};
pub use envelope::ApiResponse;
pub use health::{HealthRes, HealthService};
