//! # Collector de Métricas
//! src/metrics/collector.rs
//!
//! Recolecta y agrega métricas de requests en tiempo real.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Cantidad de latencias recientes sobre las que se calculan percentiles
const LATENCY_WINDOW: usize = 10_000;

/// Collector de métricas thread-safe. Clonar comparte el mismo estado.
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsData>>,
    start_time: Instant,
    started_at: DateTime<Utc>,
}

struct MetricsData {
    total_requests: u64,

    status_codes: HashMap<u16, u64>,

    /// Latencias recientes en microsegundos
    latencies: VecDeque<u64>,

    /// Requests por patrón de ruta (`/status/{job_id}`, no el path crudo)
    requests_per_route: HashMap<String, u64>,

    active_connections: u64,
}

/// Estadísticas de latencia en microsegundos
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencyStats {
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub avg: u64,
    pub stddev: f64,
    pub samples: usize,
}

/// Snapshot serializable de las métricas
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
    pub total_requests: u64,
    pub active_connections: u64,
    pub status_codes: BTreeMap<u16, u64>,
    pub routes: BTreeMap<String, u64>,
    pub latency_us: LatencyStats,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsData {
                total_requests: 0,
                status_codes: HashMap::new(),
                latencies: VecDeque::with_capacity(LATENCY_WINDOW),
                requests_per_route: HashMap::new(),
                active_connections: 0,
            })),
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }

    // Contadores: un pánico a mitad de actualización a lo sumo pierde una muestra
    fn lock(&self) -> MutexGuard<'_, MetricsData> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registra un request atendido
    pub fn record_request(&self, route: &str, status_code: u16, latency: Duration) {
        let mut data = self.lock();

        data.total_requests += 1;
        *data.status_codes.entry(status_code).or_insert(0) += 1;

        if data.latencies.len() >= LATENCY_WINDOW {
            data.latencies.pop_front();
        }
        data.latencies
            .push_back(u64::try_from(latency.as_micros()).unwrap_or(u64::MAX));

        *data.requests_per_route.entry(route.to_string()).or_insert(0) += 1;
    }

    pub fn increment_active_connections(&self) {
        self.lock().active_connections += 1;
    }

    pub fn decrement_active_connections(&self) {
        let mut data = self.lock();
        data.active_connections = data.active_connections.saturating_sub(1);
    }

    pub fn active_connections(&self) -> u64 {
        self.lock().active_connections
    }

    fn latency_stats(latencies: &VecDeque<u64>) -> LatencyStats {
        if latencies.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted: Vec<u64> = latencies.iter().copied().collect();
        sorted.sort_unstable();

        let len = sorted.len();
        let avg = sorted.iter().sum::<u64>() / len as u64;
        let variance = sorted
            .iter()
            .map(|&x| {
                let diff = x as f64 - avg as f64;
                diff * diff
            })
            .sum::<f64>()
            / len as f64;

        LatencyStats {
            p50: sorted[len * 50 / 100],
            p95: sorted[len * 95 / 100],
            p99: sorted[len * 99 / 100],
            avg,
            stddev: (variance.sqrt() * 100.0).round() / 100.0,
            samples: len,
        }
    }

    /// Obtiene un snapshot de las métricas
    pub fn snapshot(&self) -> MetricsSnapshot {
        let data = self.lock();

        MetricsSnapshot {
            started_at: self.started_at,
            uptime_secs: self.start_time.elapsed().as_secs(),
            total_requests: data.total_requests,
            active_connections: data.active_connections,
            status_codes: data.status_codes.iter().map(|(k, v)| (*k, *v)).collect(),
            routes: data
                .requests_per_route
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            latency_us: Self::latency_stats(&data.latencies),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
