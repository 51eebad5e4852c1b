use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Health check response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    /// True when every backing store answered.
    pub ok: bool,
    pub message: String,
    /// Deployment namespace this instance serves.
    pub namespace: String,
    /// Reachability per backing store, keyed by store name.
    pub stores: BTreeMap<String, bool>,
}

/// Simple health service that can be used by every Referra surface
///
/// This service provides a standardised way to report the health status of Referra. Callers
/// probe their own stores and hand the results in; the service only shapes the response.
#[derive(Clone)]
pub struct HealthService;

impl HealthService {
    /// Creates a new instance of HealthService.
    ///
    /// # Returns
    /// A new `HealthService` instance.
    pub fn new() -> Self {
        Self
    }

    /// Builds a health response from per-store probe results.
    ///
    /// # Arguments
    /// * `namespace` - Deployment namespace to report
    /// * `stores` - `(name, reachable)` pairs
    ///
    /// # Returns
    /// A `HealthRes` whose `ok` is true only when every store is reachable.
    pub fn check_health<'a>(
        namespace: &str,
        stores: impl IntoIterator<Item = (&'a str, bool)>,
    ) -> HealthRes {
        let stores: BTreeMap<String, bool> = stores
            .into_iter()
            .map(|(name, up)| (name.to_owned(), up))
            .collect();
        let ok = stores.values().all(|up| *up);

        HealthRes {
            ok,
            message: if ok {
                "Referra is alive".into()
            } else {
                "Referra is degraded".into()
            },
            namespace: namespace.to_owned(),
            stores,
        }
    }
}

impl Default for HealthService {
    fn default() -> Self {
        Self::new()
    }
}
