use crate::config::RestConfig;
use api_shared::{SessionProvider, StaticSessionProvider};
use referra_core::ReferralService;
use std::sync::Arc;

/// Application state shared across REST API handlers
///
/// Holds the referral service (both stores), the session provider used to authenticate
/// callers, and the namespace reported by health checks.
#[derive(Clone)]
pub struct AppState {
    pub service: ReferralService,
    pub sessions: Arc<dyn SessionProvider>,
    pub namespace: Arc<str>,
}

impl AppState {
    pub fn new(
        service: ReferralService,
        sessions: Arc<dyn SessionProvider>,
        namespace: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            service,
            sessions,
            namespace: namespace.into(),
        }
    }

    /// Opens both stores and loads the sessions file named by `cfg`.
    ///
    /// # Errors
    /// Returns an error if a store cannot be opened or the sessions file is unreadable.
    pub fn from_config(cfg: &RestConfig) -> anyhow::Result<Self> {
        let service = ReferralService::from_config(&cfg.core)?;
        let sessions = StaticSessionProvider::load(&cfg.sessions_file)?;
        Ok(Self::new(
            service,
            Arc::new(sessions),
            cfg.core.namespace(),
        ))
    }
}
