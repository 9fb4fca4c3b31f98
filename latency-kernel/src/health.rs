use latency_core::poller::PollStats;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Debug, Serialize)]
pub struct KernelHealth {
    pub uptime_seconds: u64,
    pub started_at: String,
    pub memory_usage_mb: f32,
    pub dashboard_mounted: bool,
    pub edges_tracked: usize,
    pub poller: Option<PollStats>,
    pub upstream_failures: u64,
    pub last_upstream_error: Option<String>,
}

/// Instantané de la session dashboard fourni par la couche HTTP
pub struct DashboardProbe {
    pub mounted: bool,
    pub edges: usize,
    pub stats: PollStats,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    started_at: OffsetDateTime,
    upstream_failures: Arc<AtomicU64>,
    last_upstream_error: Arc<Mutex<Option<String>>>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            started_at: OffsetDateTime::now_utc(),
            upstream_failures: Arc::new(AtomicU64::new(0)),
            last_upstream_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn record_upstream_failure(&self, endpoint: &str, error: &str) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
        *self.last_upstream_error.lock() = Some(format!("{endpoint}: {error}"));
    }

    pub fn get_health(&self, dashboard: Option<DashboardProbe>) -> KernelHealth {
        let (dashboard_mounted, edges_tracked, poller) = match dashboard {
            Some(probe) => (probe.mounted, probe.edges, Some(probe.stats)),
            None => (false, 0, None),
        };
        KernelHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            started_at: self.started_at.format(&Rfc3339).unwrap_or_default(),
            memory_usage_mb: get_memory_usage_mb(),
            dashboard_mounted,
            edges_tracked,
            poller,
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
            last_upstream_error: self.last_upstream_error.lock().clone(),
        }
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn get_memory_usage_mb() -> f32 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            let rss_kb = status
                .lines()
                .find(|l| l.starts_with("VmRSS:"))
                .and_then(|l| l.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<u64>().ok());
            if let Some(kb) = rss_kb {
                return kb as f32 / 1024.0;
            }
        }
    }
    0.0
}
