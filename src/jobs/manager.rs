//! # Gestor Central de Jobs
//! src/jobs/manager.rs
//!
//! Coordina la ejecución de jobs: validación, encolado, pool fijo de
//! workers y limpieza periódica.

use crate::config::Config;
use crate::engine::OptimizationEngine;
use crate::jobs::error::{StoreError, SubmitError};
use crate::jobs::executor::{self, Execution};
use crate::jobs::query::JobQuery;
use crate::jobs::queue::{JobQueue, QueueStats};
use crate::jobs::reaper::Reaper;
use crate::jobs::storage::{JobStore, StatusCounts};
use crate::jobs::types::JobId;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Configuración del Job Manager
#[derive(Debug, Clone)]
pub struct JobManagerConfig {
    /// Número de workers del pool
    pub workers: usize,

    /// Capacidad máxima de la cola
    pub queue_capacity: usize,

    /// Deadline por llamada al motor (`None` = sin límite)
    pub engine_timeout: Option<Duration>,

    /// Edad a partir de la cual el reaper desaloja un job
    pub retention: Duration,

    /// Cada cuánto corre el reaper
    pub sweep_interval: Duration,
}

impl Default for JobManagerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 256,
            engine_timeout: Some(Duration::from_secs(600)),
            retention: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(60 * 60),
        }
    }
}

impl JobManagerConfig {
    /// Crea una configuración desde el Config principal
    pub fn from_config(config: &Config) -> Self {
        Self {
            workers: config.workers,
            queue_capacity: config.queue_capacity,
            engine_timeout: match config.engine_timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            retention: Duration::from_secs(config.job_retention_secs),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
        }
    }
}

/// Estado agregado para `/metrics`
#[derive(Debug, Clone, Serialize)]
pub struct JobStats {
    pub workers: usize,
    pub queue: QueueStats,
    pub jobs: StatusCounts,
}

/// Gestor central de jobs
pub struct JobManager {
    config: JobManagerConfig,

    store: JobStore,

    queue: JobQueue<Execution>,

    /// Handles del pool; se vacía en `shutdown`
    workers: Mutex<Vec<JoinHandle<()>>>,

    reaper: Reaper,
}

/// Rechaza entradas vacías o que no sean un objeto JSON
fn validate_input(input: &Value) -> Result<(), SubmitError> {
    match input {
        Value::Null => Err(SubmitError::EmptyInput),
        Value::Object(map) if map.is_empty() => Err(SubmitError::EmptyInput),
        Value::Object(_) => Ok(()),
        _ => Err(SubmitError::InvalidInput(
            "expected a JSON object".to_string(),
        )),
    }
}

impl JobManager {
    /// Crea el manager, lanza el pool de workers y el reaper
    pub fn new(
        config: JobManagerConfig,
        engine: Arc<dyn OptimizationEngine>,
    ) -> std::io::Result<Self> {
        let store = JobStore::new();
        let queue = JobQueue::new(config.queue_capacity);
        let reaper = Reaper::spawn(store.clone(), config.retention, config.sweep_interval)?;

        let manager = Self {
            config,
            store,
            queue,
            workers: Mutex::new(Vec::new()),
            reaper,
        };

        manager.spawn_workers(engine)?;

        info!(
            workers = manager.config.workers,
            queue_capacity = manager.config.queue_capacity,
            engine_timeout_ms = manager.config.engine_timeout.map(|d| d.as_millis() as u64),
            "job manager started"
        );

        Ok(manager)
    }

    /// Inicia los workers para procesar jobs
    fn spawn_workers(&self, engine: Arc<dyn OptimizationEngine>) -> std::io::Result<()> {
        let mut handles = Vec::with_capacity(self.config.workers);

        for i in 0..self.config.workers {
            let name = format!("job-worker-{}", i);
            let queue = self.queue.clone();
            let store = self.store.clone();
            let engine = Arc::clone(&engine);
            let deadline = self.config.engine_timeout;

            let spawned = thread::Builder::new()
                .name(name.clone())
                .spawn(move || Self::worker_loop(name, queue, store, engine, deadline));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    // Los workers ya lanzados terminan al cerrar la cola
                    self.queue.close();
                    return Err(e);
                }
            }
        }

        if let Ok(mut workers) = self.workers.lock() {
            *workers = handles;
        }

        Ok(())
    }

    /// Loop principal del worker. Termina cuando la cola se cierra y vacía.
    fn worker_loop(
        name: String,
        queue: JobQueue<Execution>,
        store: JobStore,
        engine: Arc<dyn OptimizationEngine>,
        deadline: Option<Duration>,
    ) {
        debug!(worker = %name, "worker started");

        while let Some(execution) = queue.dequeue() {
            debug!(worker = %name, job_id = %execution.job_id, "picked up job");
            executor::execute(&store, &engine, execution, deadline);
        }

        debug!(worker = %name, "worker stopped");
    }

    /// Encola un nuevo job y retorna su ID sin esperar al motor.
    ///
    /// El registro se crea sólo si el job entró en la cola: un rechazo no
    /// deja nada en el store.
    pub fn submit(&self, input: Value) -> Result<JobId, SubmitError> {
        validate_input(&input)?;

        let job_id = JobId::new();
        let store = &self.store;

        let admitted = self.queue.admit(Execution { job_id, input }, |execution| {
            store.create(execution.job_id).map_err(SubmitError::from)
        });

        match admitted {
            Ok(()) => {
                info!(job_id = %job_id, "job queued");
                Ok(job_id)
            }
            Err(e @ SubmitError::QueueFull { .. }) => {
                warn!(error = %e, "job rejected");
                Err(e)
            }
            Err(e) => {
                error!(error = %e, "job submission failed");
                Err(e)
            }
        }
    }

    /// Cierra la cola, deja que los workers la vacíen y los espera.
    /// También detiene el reaper. Llamarlo dos veces no hace nada.
    pub fn shutdown(&self) {
        self.queue.close();

        let handles = match self.workers.lock() {
            Ok(mut workers) => std::mem::take(&mut *workers),
            Err(_) => Vec::new(),
        };

        for handle in handles {
            if handle.join().is_err() {
                error!("job worker panicked");
            }
        }

        self.reaper.stop();
        info!("job manager stopped");
    }

    /// Estadísticas de cola y jobs
    pub fn stats(&self) -> Result<JobStats, StoreError> {
        Ok(JobStats {
            workers: self.config.workers,
            queue: self.queue.stats(),
            jobs: self.store.counts()?,
        })
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn query(&self) -> JobQuery {
        JobQuery::new(self.store.clone())
    }
}

impl Drop for JobManager {
    fn drop(&mut self) {
        // Sin join: un motor colgado no debe bloquear el drop
        self.queue.close();
    }
}
