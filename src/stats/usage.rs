//! Usage records and time-windowed aggregation.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub const HOUR_MS: u64 = 60 * 60 * 1000;
pub const DAY_MS: u64 = 24 * HOUR_MS;
pub const WEEK_MS: u64 = 7 * DAY_MS;
/// Events older than this are pruned on the next write.
pub const RETENTION_MS: u64 = 30 * DAY_MS;

/// Per-route counters. `total` is cumulative; the windows are derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointStats {
    pub total: u64,
    /// Last 24 hours.
    pub today: u64,
    /// Last 7 days.
    pub week: u64,
    /// Last 30 days.
    pub month: u64,
}

/// One recorded request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEvent {
    pub endpoint: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// The aggregate record kept in the counter store.
///
/// The window counts are always recomputed from `requests`, never
/// incremented, so clock changes or a lost write cannot make them drift.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageRecord {
    pub total: u64,
    pub endpoints: BTreeMap<String, EndpointStats>,
    pub requests: Vec<RequestEvent>,
}

impl UsageRecord {
    /// Make sure every known endpoint has an entry.
    pub fn ensure_endpoints<'a>(&mut self, endpoints: impl IntoIterator<Item = &'a str>) {
        for endpoint in endpoints {
            self.endpoints.entry(endpoint.to_string()).or_default();
        }
    }

    /// Append one event at `now_ms`, prune expired events and refresh windows.
    pub fn record(&mut self, endpoint: &str, now_ms: u64) {
        self.total += 1;
        self.endpoints.entry(endpoint.to_string()).or_default().total += 1;
        self.requests.push(RequestEvent {
            endpoint: endpoint.to_string(),
            timestamp: now_ms,
        });
        self.prune(now_ms);
        self.recompute(now_ms);
    }

    /// Drop events older than the retention window.
    pub fn prune(&mut self, now_ms: u64) {
        let cutoff = now_ms.saturating_sub(RETENTION_MS);
        self.requests.retain(|r| r.timestamp > cutoff);
    }

    /// Recompute the 24h / 7d / 30d windows from the event log.
    pub fn recompute(&mut self, now_ms: u64) {
        let day = now_ms.saturating_sub(DAY_MS);
        let week = now_ms.saturating_sub(WEEK_MS);
        let month = now_ms.saturating_sub(RETENTION_MS);

        for stats in self.endpoints.values_mut() {
            stats.today = 0;
            stats.week = 0;
            stats.month = 0;
        }

        for event in &self.requests {
            // Events for endpoints that are no longer registered are ignored.
            let Some(stats) = self.endpoints.get_mut(&event.endpoint) else {
                continue;
            };
            if event.timestamp > day {
                stats.today += 1;
            }
            if event.timestamp > week {
                stats.week += 1;
            }
            if event.timestamp > month {
                stats.month += 1;
            }
        }
    }

    /// Request counts over the `span_ms` ending at `now_ms`, in buckets of
    /// `bucket_ms`, oldest first. Covers every endpoint.
    pub fn activity(&self, now_ms: u64, span_ms: u64, bucket_ms: u64) -> Vec<u64> {
        let bucket_ms = bucket_ms.max(1);
        let mut buckets = vec![0; (span_ms / bucket_ms) as usize];
        if buckets.is_empty() {
            return buckets;
        }
        let start = now_ms.saturating_sub(span_ms);
        for event in &self.requests {
            if event.timestamp <= start || event.timestamp > now_ms {
                continue;
            }
            let index = ((event.timestamp - start - 1) / bucket_ms) as usize;
            let last = buckets.len() - 1;
            buckets[index.min(last)] += 1;
        }
        buckets
    }

    /// Number of endpoints that have served at least one request.
    pub fn active_endpoints(&self) -> usize {
        self.endpoints.values().filter(|s| s.total > 0).count()
    }
}

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
