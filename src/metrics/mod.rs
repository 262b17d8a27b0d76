//! # Sistema de Métricas
//! src/metrics/mod.rs
//!
//! Recolección y agregación de métricas de requests:
//! - Contadores por código de estado y por ruta
//! - Latencias (p50, p95, p99)
//! - Conexiones activas
//!
//! El estado de la cola y de los jobs lo aporta el `JobManager` en `/metrics`.

pub mod collector;

pub use collector::{LatencyStats, MetricsCollector, MetricsSnapshot};
