//! Client-side metrics.
//!
//! The dispatcher reports every physical attempt to a [`MetricsSink`].
//! [`ApiMetrics`] keeps the series in memory and is safe to share between
//! concurrent dispatches: counters are atomics behind a concurrent map.

use std::{
    collections::{BTreeMap, VecDeque},
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use dashmap::DashMap;
use serde::Serialize;

/// Number of page load measurements kept for the average.
pub const LOAD_TIME_WINDOW: usize = 50;

/// Receiver of client-side metrics. Every method defaults to a no-op.
pub trait MetricsSink: Send + Sync {
    fn record_api_call(&self, _endpoint: &str, _status: &str, _duration: Duration) {}
    fn record_page_view(&self, _page: &str) {}
    fn record_ui_interaction(&self, _component: &str, _action: &str) {}
    fn record_load_time(&self, _duration: Duration) {}
    fn record_error(&self, _category: &str, _message: &str) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {}

#[derive(Default)]
struct CallStats {
    count: AtomicU64,
    total_micros: AtomicU64,
}

/// In-memory metrics collector.
#[derive(Default)]
pub struct ApiMetrics {
    api_calls: DashMap<(String, String), CallStats>,
    page_views: DashMap<String, AtomicU64>,
    ui_interactions: DashMap<(String, String), AtomicU64>,
    errors: DashMap<(String, String), AtomicU64>,
    load_times: Mutex<VecDeque<Duration>>,
}

impl fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiMetrics")
            .field("api_calls", &self.api_calls.len())
            .field("page_views", &self.page_views.len())
            .field("ui_interactions", &self.ui_interactions.len())
            .field("errors", &self.errors.len())
            .finish_non_exhaustive()
    }
}

impl ApiMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies the current series into a sorted, serializable snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut api_calls: Vec<ApiCallSnapshot> = self
            .api_calls
            .iter()
            .map(|entry| {
                let (endpoint, status) = entry.key().clone();
                let count = entry.count.load(Ordering::Relaxed);
                let total_ms = entry.total_micros.load(Ordering::Relaxed) as f64 / 1_000.0;
                ApiCallSnapshot {
                    endpoint,
                    status,
                    count,
                    avg_duration_ms: if count > 0 { total_ms / count as f64 } else { 0.0 },
                }
            })
            .collect();
        api_calls.sort_by(|a, b| (&a.endpoint, &a.status).cmp(&(&b.endpoint, &b.status)));

        let load_times: Vec<Duration> = self.load_window().iter().copied().collect();
        let avg_load_time_ms = (!load_times.is_empty()).then(|| {
            load_times.iter().map(|d| d.as_secs_f64() * 1_000.0).sum::<f64>()
                / load_times.len() as f64
        });

        MetricsSnapshot {
            api_calls,
            page_views: counters(&self.page_views, |page| page.clone()),
            ui_interactions: counters(&self.ui_interactions, |(component, action)| {
                format!("{component}:{action}")
            }),
            errors: counters(&self.errors, |(category, message)| {
                format!("{category}:{message}")
            }),
            load_time_samples: load_times.len(),
            avg_load_time_ms,
        }
    }

    /// Drops every recorded series.
    pub fn reset(&self) {
        self.api_calls.clear();
        self.page_views.clear();
        self.ui_interactions.clear();
        self.errors.clear();
        self.load_window().clear();
    }

    // Poisoning is ignored: every update leaves the window consistent.
    fn load_window(&self) -> MutexGuard<'_, VecDeque<Duration>> {
        self.load_times.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn counters<K, F>(map: &DashMap<K, AtomicU64>, label: F) -> BTreeMap<String, u64>
where
    K: std::hash::Hash + Eq,
    F: Fn(&K) -> String,
{
    map.iter()
        .map(|entry| (label(entry.key()), entry.value().load(Ordering::Relaxed)))
        .collect()
}

fn bump<K: std::hash::Hash + Eq>(map: &DashMap<K, AtomicU64>, key: K) {
    map.entry(key)
        .or_default()
        .fetch_add(1, Ordering::Relaxed);
}

impl MetricsSink for ApiMetrics {
    fn record_api_call(&self, endpoint: &str, status: &str, duration: Duration) {
        let key = (sanitize_label(endpoint), sanitize_label(status));
        let stats = self.api_calls.entry(key).or_default();
        stats.count.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        stats.total_micros.fetch_add(micros, Ordering::Relaxed);
    }

    fn record_page_view(&self, page: &str) {
        bump(&self.page_views, sanitize_label(page));
    }

    fn record_ui_interaction(&self, component: &str, action: &str) {
        bump(
            &self.ui_interactions,
            (sanitize_label(component), sanitize_label(action)),
        );
    }

    fn record_load_time(&self, duration: Duration) {
        let mut window = self.load_window();
        window.push_back(duration);
        while window.len() > LOAD_TIME_WINDOW {
            window.pop_front();
        }
    }

    fn record_error(&self, category: &str, message: &str) {
        bump(
            &self.errors,
            (sanitize_label(category), sanitize_label(message)),
        );
    }
}

/// Replaces characters that break exposition-format label values.
pub fn sanitize_label(value: &str) -> String {
    value
        .chars()
        .map(|c| if matches!(c, '"' | '\n' | '\r' | '\\') { '_' } else { c })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ApiCallSnapshot {
    pub endpoint: String,
    pub status: String,
    pub count: u64,
    pub avg_duration_ms: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Sorted by (endpoint, status).
    pub api_calls: Vec<ApiCallSnapshot>,
    pub page_views: BTreeMap<String, u64>,
    /// Keyed by `component:action`.
    pub ui_interactions: BTreeMap<String, u64>,
    /// Keyed by `category:message`.
    pub errors: BTreeMap<String, u64>,
    pub load_time_samples: usize,
    pub avg_load_time_ms: Option<f64>,
}

impl MetricsSnapshot {
    /// Total calls recorded for `endpoint` across all statuses.
    pub fn calls_to(&self, endpoint: &str) -> u64 {
        self.api_calls
            .iter()
            .filter(|call| call.endpoint == endpoint)
            .map(|call| call.count)
            .sum()
    }
}
