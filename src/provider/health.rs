//! Provider Health Store
//!
//! Per-provider availability state shared across all calls within a run.
//! Passed into the gateway at construction time rather than living in a
//! process-wide global.
//!
//! ## States
//!
//! A provider is enabled unless one of two disable flags holds:
//!
//! - **Manually disabled**: set on authentication failure; cleared only by
//!   an explicit `re_enable` (operator intervention after fixing the key).
//! - **Quota disabled**: set on hard daily/token quota exhaustion; expires
//!   on its own once the stored deadline passes.
//!
//! State lives in memory for the process lifetime and is never persisted.
//! Writes happen only from the gateway's failure paths; transitions are
//! idempotent last-writer-wins per provider, with the DashMap guarding
//! genuinely parallel writers.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{info, warn};

use crate::types::ProviderId;

#[derive(Debug, Default, Clone)]
struct HealthRecord {
    manually_disabled: bool,
    quota_disabled_until: Option<Instant>,
}

/// Snapshot of one provider's health for monitoring.
#[derive(Debug, Clone)]
pub struct ProviderHealthStatus {
    pub provider: ProviderId,
    pub enabled: bool,
    pub manually_disabled: bool,
    /// Remaining quota cool-down, if any.
    pub quota_disabled_for: Option<Duration>,
}

/// Shared, in-memory health state for all providers.
#[derive(Debug, Default)]
pub struct ProviderHealthStore {
    records: DashMap<ProviderId, HealthRecord>,
}

impl ProviderHealthStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the provider may be attempted right now. An expired quota
    /// window reads as enabled without needing a cleanup pass.
    pub fn is_enabled(&self, provider: ProviderId) -> bool {
        match self.records.get(&provider) {
            None => true,
            Some(record) => {
                if record.manually_disabled {
                    return false;
                }
                match record.quota_disabled_until {
                    Some(until) => Instant::now() >= until,
                    None => true,
                }
            }
        }
    }

    /// Disable until explicitly re-enabled. Used on authentication failures.
    pub fn disable_manual(&self, provider: ProviderId) {
        warn!(%provider, "Provider disabled until re-enabled (auth failure)");
        self.records.entry(provider).or_default().manually_disabled = true;
    }

    /// Disable for a fixed window. Used on hard quota exhaustion.
    pub fn disable_for_quota(&self, provider: ProviderId, window: Duration) {
        warn!(%provider, window_secs = window.as_secs(), "Provider quota-disabled");
        self.records.entry(provider).or_default().quota_disabled_until =
            Some(Instant::now() + window);
    }

    /// Clear both disable flags.
    pub fn re_enable(&self, provider: ProviderId) {
        info!(%provider, "Provider re-enabled");
        if let Some(mut record) = self.records.get_mut(&provider) {
            record.manually_disabled = false;
            record.quota_disabled_until = None;
        }
    }

    /// Health of every provider touched so far.
    pub fn snapshot(&self) -> Vec<ProviderHealthStatus> {
        let now = Instant::now();
        self.records
            .iter()
            .map(|entry| {
                let record = entry.value();
                let quota_disabled_for = record
                    .quota_disabled_until
                    .and_then(|until| until.checked_duration_since(now));
                ProviderHealthStatus {
                    provider: *entry.key(),
                    enabled: !record.manually_disabled && quota_disabled_for.is_none(),
                    manually_disabled: record.manually_disabled,
                    quota_disabled_for,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_is_enabled() {
        let store = ProviderHealthStore::new();
        assert!(store.is_enabled(ProviderId::Gemini));
    }

    #[test]
    fn test_manual_disable_until_re_enable() {
        let store = ProviderHealthStore::new();
        store.disable_manual(ProviderId::Gemini);
        assert!(!store.is_enabled(ProviderId::Gemini));
        // Other providers unaffected.
        assert!(store.is_enabled(ProviderId::Cerebras));

        store.re_enable(ProviderId::Gemini);
        assert!(store.is_enabled(ProviderId::Gemini));
    }

    #[test]
    fn test_quota_window_expires_on_its_own() {
        let store = ProviderHealthStore::new();
        store.disable_for_quota(ProviderId::Cerebras, Duration::from_millis(30));

        // Disabled for every probe inside the window.
        assert!(!store.is_enabled(ProviderId::Cerebras));
        std::thread::sleep(Duration::from_millis(10));
        assert!(!store.is_enabled(ProviderId::Cerebras));

        // Enabled once the window has passed.
        std::thread::sleep(Duration::from_millis(40));
        assert!(store.is_enabled(ProviderId::Cerebras));
    }

    #[test]
    fn test_snapshot_reports_remaining_window() {
        let store = ProviderHealthStore::new();
        store.disable_for_quota(ProviderId::Gemini, Duration::from_secs(60));
        store.disable_manual(ProviderId::OpenRouter);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);

        let gemini = snapshot
            .iter()
            .find(|s| s.provider == ProviderId::Gemini)
            .unwrap();
        assert!(!gemini.enabled);
        assert!(gemini.quota_disabled_for.unwrap() <= Duration::from_secs(60));

        let openrouter = snapshot
            .iter()
            .find(|s| s.provider == ProviderId::OpenRouter)
            .unwrap();
        assert!(openrouter.manually_disabled);
    }
}
