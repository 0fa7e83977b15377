use chrono::NaiveDate;
use civic_portal::config::RegistryConfig;
use civic_portal::workflows::applications::{
    CivicApplicationService, MemoryAccounts, MemoryBlobs, MemoryStore,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type PortalService = CivicApplicationService<MemoryStore, MemoryAccounts, MemoryBlobs>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-memory backends; the account directory is shared so callers can seed it.
pub(crate) struct Backends {
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) accounts: Arc<MemoryAccounts>,
    pub(crate) blobs: Arc<MemoryBlobs>,
}

impl Backends {
    pub(crate) fn in_memory() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            accounts: Arc::new(MemoryAccounts::default()),
            blobs: Arc::new(MemoryBlobs::default()),
        }
    }

    pub(crate) fn service(&self, config: RegistryConfig) -> PortalService {
        CivicApplicationService::new(
            self.store.clone(),
            self.accounts.clone(),
            self.blobs.clone(),
            config,
        )
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
