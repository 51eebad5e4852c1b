//! Session and identity resolution.
//!
//! Authentication itself is delegated: a [`SessionProvider`] answers "who owns this bearer
//! token" and "what role does this user have". The shipped [`StaticSessionProvider`] reads a
//! YAML file of pre-issued tokens:
//!
//! ```yaml
//! sessions:
//!   - token: dev-token-case-manager
//!     user_id: cm-1
//!     email: cm1@example.org
//!     role: case_manager
//!   - token: dev-token-provider
//!     user_id: provider-1
//!     role: provider
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Creates and owns referrals.
    CaseManager,
    /// Browses open referrals; never sees PHI.
    Provider,
}

/// The user behind a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid or expired session")]
    InvalidToken,
    #[error("failed to read sessions file: {0}")]
    SessionsFileRead(std::io::Error),
    #[error("failed to parse sessions file: {0}")]
    SessionsFileParse(serde_yaml::Error),
    #[error("duplicate session token for user {0}")]
    DuplicateToken(String),
    #[error("session provider unavailable: {0}")]
    Backend(String),
}

/// Resolves bearer tokens to users and users to roles.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// The user holding `token`, or `None` when the token is unknown.
    async fn current_user(&self, token: &str) -> Result<Option<SessionUser>, AuthError>;

    /// The role assigned to `user_id`, or `None` when the user has no role.
    async fn user_role(&self, user_id: &str) -> Result<Option<Role>, AuthError>;
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
///
/// # Errors
///
/// Returns [`AuthError::MissingToken`] if the scheme is not `Bearer` or the token is blank.
pub fn parse_bearer(header_value: &str) -> Result<&str, AuthError> {
    let (scheme, token) = header_value
        .trim()
        .split_once(' ')
        .ok_or(AuthError::MissingToken)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MissingToken);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

#[derive(Debug, Deserialize)]
struct SessionsFile {
    #[serde(default)]
    sessions: Vec<SessionEntry>,
}

#[derive(Debug, Deserialize)]
struct SessionEntry {
    token: String,
    user_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    role: Option<Role>,
}

/// In-memory session provider backed by a fixed token table.
#[derive(Clone, Debug, Default)]
pub struct StaticSessionProvider {
    users_by_token: HashMap<String, SessionUser>,
    roles: HashMap<String, Role>,
}

impl StaticSessionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one session. A user may hold several tokens; the last role given wins.
    pub fn with_session(mut self, token: &str, user_id: &str, role: Option<Role>) -> Self {
        self.users_by_token.insert(
            token.to_owned(),
            SessionUser {
                id: user_id.to_owned(),
                email: None,
            },
        );
        if let Some(role) = role {
            self.roles.insert(user_id.to_owned(), role);
        }
        self
    }

    /// Parses a sessions document.
    ///
    /// # Errors
    ///
    /// - [`AuthError::SessionsFileParse`] if the YAML is malformed.
    /// - [`AuthError::DuplicateToken`] if two entries share a token.
    pub fn from_yaml_str(contents: &str) -> Result<Self, AuthError> {
        let file: SessionsFile =
            serde_yaml::from_str(contents).map_err(AuthError::SessionsFileParse)?;

        let mut provider = Self::new();
        for entry in file.sessions {
            let token = entry.token.trim().to_owned();
            if provider.users_by_token.contains_key(&token) {
                return Err(AuthError::DuplicateToken(entry.user_id));
            }
            if let Some(role) = entry.role {
                provider.roles.insert(entry.user_id.clone(), role);
            }
            provider.users_by_token.insert(
                token,
                SessionUser {
                    id: entry.user_id,
                    email: entry.email,
                },
            );
        }

        Ok(provider)
    }

    /// Loads a sessions file.
    ///
    /// A missing file yields an empty provider (every request will be rejected) and a warning.
    ///
    /// # Errors
    ///
    /// - [`AuthError::SessionsFileRead`] if the file exists but cannot be read.
    /// - Any error from [`StaticSessionProvider::from_yaml_str`].
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    "sessions file not found at {}, no sessions loaded",
                    path.display()
                );
                return Ok(Self::new());
            }
            Err(e) => return Err(AuthError::SessionsFileRead(e)),
        };

        let provider = Self::from_yaml_str(&contents)?;
        tracing::info!(
            "loaded {} sessions from {}",
            provider.users_by_token.len(),
            path.display()
        );
        Ok(provider)
    }

    pub fn len(&self) -> usize {
        self.users_by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users_by_token.is_empty()
    }
}

#[async_trait]
impl SessionProvider for StaticSessionProvider {
    async fn current_user(&self, token: &str) -> Result<Option<SessionUser>, AuthError> {
        Ok(self.users_by_token.get(token.trim()).cloned())
    }

    async fn user_role(&self, user_id: &str) -> Result<Option<Role>, AuthError> {
        Ok(self.roles.get(user_id).copied())
    }
}
