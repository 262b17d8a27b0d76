//! # Logging
//! src/telemetry.rs
//!
//! Instala el subscriber global de `tracing`. `RUST_LOG`, si está definida,
//! tiene prioridad sobre el nivel configurado.

use crate::config::LogFormat;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Construye el filtro: `RUST_LOG` o, si no está, `level`
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Inicializa el logging. Retorna error si ya había un subscriber global.
pub fn init_logging(
    level: &str,
    format: LogFormat,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let registry = tracing_subscriber::registry().with(env_filter(level));

    match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(false).with_thread_names(true))
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_thread_names(true),
            )
            .try_init(),
    }
}
