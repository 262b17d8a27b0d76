//! # Configuración del Servidor
//! src/config.rs
//!
//! Configuración del gateway con soporte para argumentos CLI, variables de
//! entorno y un archivo `.env` (cargado en `main` con dotenvy).
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./optimization_gateway --port 5000 \
//!   --workers 8 \
//!   --queue-capacity 512 \
//!   --engine-timeout-ms 120000
//! ```
//!
//! ### Motor externo
//! ```bash
//! ./optimization_gateway --engine command \
//!   --engine-cmd python3 --engine-arg optimizer.py
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! HTTP_PORT=8080 JOB_WORKERS=2 LOG_FORMAT=json ./optimization_gateway
//! ```

use clap::{Parser, ValueEnum};
use thiserror::Error;
use tracing::info;

/// Motor de optimización a usar
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EngineKind {
    /// Heurística local de setpoints
    Setpoint,

    /// Proceso externo: JSON por stdin, JSON por stdout
    Command,
}

/// Formato de los logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Configuración inválida
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("workers must be >= 1")]
    NoWorkers,

    #[error("queue capacity must be >= 1")]
    NoQueueCapacity,

    #[error("job retention must be > 0 seconds")]
    ZeroRetention,

    #[error("sweep interval must be > 0 seconds")]
    ZeroSweepInterval,

    #[error("max body size must be > 0 bytes")]
    ZeroMaxBody,

    #[error("--engine command requires --engine-cmd (ENGINE_CMD)")]
    MissingEngineCommand,
}

/// Configuración del gateway
#[derive(Debug, Clone, Parser)]
#[command(name = "optimization_gateway")]
#[command(about = "Gateway HTTP asíncrono para un motor de optimización")]
#[command(version)]
pub struct Config {
    /// Puerto en el que escucha el servidor
    #[arg(short, long, default_value = "5000", env = "HTTP_PORT")]
    pub port: u16,

    /// Host/IP en el que escucha
    #[arg(long, default_value = "127.0.0.1", env = "HTTP_HOST")]
    pub host: String,

    // === Workers y cola ===

    /// Número de workers que ejecutan jobs
    #[arg(long, default_value = "4", env = "JOB_WORKERS")]
    pub workers: usize,

    /// Capacidad máxima de la cola de jobs
    #[arg(long = "queue-capacity", default_value = "256", env = "JOB_QUEUE_CAPACITY")]
    pub queue_capacity: usize,

    /// Deadline por llamada al motor en milisegundos (0 = sin deadline)
    #[arg(long = "engine-timeout-ms", default_value = "600000", env = "ENGINE_TIMEOUT_MS")]
    pub engine_timeout_ms: u64,

    // === Limpieza ===

    /// Edad en segundos a partir de la cual se desaloja un job
    #[arg(long = "job-retention-secs", default_value = "86400", env = "JOB_RETENTION_SECS")]
    pub job_retention_secs: u64,

    /// Intervalo en segundos entre pasadas de limpieza
    #[arg(long = "sweep-interval-secs", default_value = "3600", env = "SWEEP_INTERVAL_SECS")]
    pub sweep_interval_secs: u64,

    // === Backpressure ===

    /// Tiempo de reintento sugerido en milisegundos cuando la cola está llena
    #[arg(long = "retry-after-ms", default_value = "5000", env = "RETRY_AFTER_MS")]
    pub retry_after_ms: u64,

    /// Tamaño máximo del body de un request
    #[arg(long = "max-body-bytes", default_value = "1048576", env = "MAX_BODY_BYTES")]
    pub max_body_bytes: usize,

    // === Motor ===

    /// Motor de optimización
    #[arg(long, value_enum, default_value = "setpoint", env = "ENGINE")]
    pub engine: EngineKind,

    /// Programa a ejecutar con `--engine command`
    #[arg(long = "engine-cmd", env = "ENGINE_CMD")]
    pub engine_cmd: Option<String>,

    /// Argumento para el programa del motor (repetible; en ENGINE_ARGS separados por espacio)
    #[arg(
        long = "engine-arg",
        env = "ENGINE_ARGS",
        value_delimiter = ' ',
        allow_hyphen_values = true
    )]
    pub engine_args: Vec<String>,

    // === Logging ===

    /// Nivel de log por defecto; RUST_LOG tiene prioridad
    #[arg(long = "log-level", default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,

    /// Formato de los logs
    #[arg(long = "log-format", value_enum, default_value = "pretty", env = "LOG_FORMAT")]
    pub log_format: LogFormat,
}

impl Config {
    /// Obtiene la dirección completa para bind (host:port)
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Valida la configuración
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::NoQueueCapacity);
        }
        if self.job_retention_secs == 0 {
            return Err(ConfigError::ZeroRetention);
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::ZeroSweepInterval);
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::ZeroMaxBody);
        }
        if self.engine == EngineKind::Command && self.engine_cmd.is_none() {
            return Err(ConfigError::MissingEngineCommand);
        }

        Ok(())
    }

    /// Deja un resumen de la configuración en el log
    pub fn log_summary(&self) {
        info!(
            address = %self.address(),
            workers = self.workers,
            queue_capacity = self.queue_capacity,
            engine = ?self.engine,
            engine_timeout_ms = self.engine_timeout_ms,
            job_retention_secs = self.job_retention_secs,
            sweep_interval_secs = self.sweep_interval_secs,
            retry_after_ms = self.retry_after_ms,
            max_body_bytes = self.max_body_bytes,
            "configuration loaded"
        );
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            host: "127.0.0.1".to_string(),
            workers: 4,
            queue_capacity: 256,
            engine_timeout_ms: 600_000,
            job_retention_secs: 86_400,
            sweep_interval_secs: 3_600,
            retry_after_ms: 5_000,
            max_body_bytes: 1_048_576,
            engine: EngineKind::Setpoint,
            engine_cmd: None,
            engine_args: Vec::new(),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}
