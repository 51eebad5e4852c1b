//! Record identifiers and sharded-path utilities.
//!
//! Referra stores PHI documents under sharded directories derived from an identifier, and the
//! workflow store keeps that identifier as a plain text foreign reference. Both sides must agree
//! on a single *canonical* representation for the join to work.
//!
//! ## Canonical form
//! - Length: 32
//! - Characters: `0-9` and `a-f` only
//! - Example: `550e8400e29b41d4a716446655440000`
//!
//! This is the value produced by `Uuid::new_v4().simple().to_string()`.
//!
//! Two entry points exist for external input:
//! - [`RecordId::parse`] is strict and rejects anything that is not already canonical. Use it for
//!   request paths and CLI arguments.
//! - [`RecordId::normalise`] is lenient: it trims whitespace, lowercases and strips hyphens
//!   before checking. Use it when comparing references that may have been written by other
//!   tools (for example a hyphenated UUID stored in the relational table).
//!
//! ## Sharded directory layout
//! For a canonical id `u`, documents live under:
//! `parent_dir/<u[0..2]>/<u[2..4]>/<u>/`

mod record_id;

pub use record_id::{RecordId, Uuid};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;
