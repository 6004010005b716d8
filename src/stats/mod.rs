//! Usage statistics subsystem.
//!
//! # Data Flow
//! ```text
//! Named API request
//!     → UsageTracker::record(prefix)
//!     → CounterStore::update("api_stats", append event + recompute)
//!
//! /stats, dashboard
//!     → UsageTracker::snapshot()
//!     → CounterStore::get("api_stats") + recompute windows at query time
//! ```
//!
//! # Design Decisions
//! - Store failures are logged and swallowed; they never fail a request
//! - Window counts are recomputed from the retained event log

pub mod store;
pub mod usage;

use std::sync::Arc;

pub use store::{open_store, CounterStore, FileStore, MemoryStore, StoreError, UpdateFn};
pub use usage::{now_millis, EndpointStats, RequestEvent, UsageRecord};

use crate::observability::metrics;

/// Key under which the aggregate record is stored.
pub const STATS_KEY: &str = "api_stats";

/// Records usage events and produces aggregate snapshots.
#[derive(Clone)]
pub struct UsageTracker {
    store: Arc<dyn CounterStore>,
    endpoints: Arc<[String]>,
}

impl UsageTracker {
    /// `endpoints` lists every registered prefix so snapshots include
    /// endpoints that have never been called.
    pub fn new(store: Arc<dyn CounterStore>, endpoints: Vec<String>) -> Self {
        Self {
            store,
            endpoints: endpoints.into(),
        }
    }

    /// Record one request for `endpoint` now.
    pub async fn record(&self, endpoint: &str) {
        self.record_at(endpoint, now_millis()).await;
    }

    /// Record one request for `endpoint` at `now_ms`. Never fails.
    pub async fn record_at(&self, endpoint: &str, now_ms: u64) {
        let endpoints = self.endpoints.clone();
        let endpoint_owned = endpoint.to_string();
        let apply: UpdateFn<'_> = Box::new(move |current| {
            let mut record = current.unwrap_or_default();
            record.ensure_endpoints(endpoints.iter().map(String::as_str));
            record.record(&endpoint_owned, now_ms);
            record
        });

        if let Err(e) = self.store.update(STATS_KEY, apply).await {
            metrics::record_store_failure("update");
            tracing::error!(endpoint = %endpoint, error = %e, "Failed to record usage");
        }
    }

    /// Current aggregate record with windows recomputed at `now`.
    pub async fn snapshot(&self) -> UsageRecord {
        self.snapshot_at(now_millis()).await
    }

    /// Aggregate record with windows recomputed at `now_ms`.
    ///
    /// A failing store yields an empty record rather than an error.
    pub async fn snapshot_at(&self, now_ms: u64) -> UsageRecord {
        let mut record = match self.store.get(STATS_KEY).await {
            Ok(record) => record.unwrap_or_default(),
            Err(e) => {
                metrics::record_store_failure("get");
                tracing::error!(error = %e, "Failed to load usage statistics");
                UsageRecord::default()
            }
        };
        record.ensure_endpoints(self.endpoints.iter().map(String::as_str));
        record.recompute(now_ms);
        record
    }
}
