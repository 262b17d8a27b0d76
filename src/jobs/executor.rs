//! # Ejecución de Jobs
//! src/jobs/executor.rs
//!
//! Corre el motor para un job y refleja el resultado en el store. Es un
//! cortafuegos: errores del motor, pánicos y deadlines vencidos terminan como
//! un job `failed`, nunca como un pánico del worker ni del proceso.
//!
//! Si el motor sabe cortar su propia ejecución (`enforces_deadline`), el
//! deadline se le pasa directamente; si no, se vigila desde un thread auxiliar.

use crate::engine::{EngineError, OptimizationEngine};
use crate::jobs::storage::JobStore;
use crate::jobs::types::{FailureKind, JobId, JobStatus, JobUpdate};
use serde_json::Value;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Trabajo pendiente para un worker
#[derive(Debug, Clone)]
pub struct Execution {
    pub job_id: JobId,
    pub input: Value,
}

struct Failure {
    kind: FailureKind,
    message: String,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("engine panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("engine panicked: {}", s)
    } else {
        "engine panicked".to_string()
    }
}

/// Llama al motor atrapando errores y pánicos
fn run_guarded<F>(call: F) -> Result<Value, Failure>
where
    F: FnOnce() -> Result<Value, EngineError>,
{
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e @ EngineError::Timeout(_))) => Err(Failure {
            kind: FailureKind::Timeout,
            message: e.to_string(),
        }),
        Ok(Err(e)) => Err(Failure {
            kind: FailureKind::Engine,
            message: e.to_string(),
        }),
        Err(payload) => Err(Failure {
            kind: FailureKind::Panic,
            message: panic_message(payload.as_ref()),
        }),
    }
}

/// Llama al motor en un thread auxiliar y espera como mucho `deadline`.
///
/// Sólo para motores que no cortan su propia ejecución. Un thread de Rust no
/// se puede matar: si el deadline vence, el thread auxiliar queda suelto
/// hasta que el motor retorne y su resultado se descarta.
fn run_on_helper_thread(
    engine: &Arc<dyn OptimizationEngine>,
    job_id: JobId,
    input: Value,
    deadline: Duration,
) -> Result<Value, Failure> {
    let (tx, rx) = mpsc::channel();
    let engine = Arc::clone(engine);

    let spawned = thread::Builder::new()
        .name(format!("engine-{}", job_id))
        .spawn(move || {
            // Si ya nadie escucha (deadline vencido) el envío falla y se ignora
            let _ = tx.send(run_guarded(|| engine.run(&input)));
        });

    if let Err(e) = spawned {
        return Err(Failure {
            kind: FailureKind::Engine,
            message: format!("failed to spawn engine thread: {}", e),
        });
    }

    match rx.recv_timeout(deadline) {
        Ok(outcome) => outcome,
        Err(RecvTimeoutError::Timeout) => Err(Failure {
            kind: FailureKind::Timeout,
            message: format!("engine call exceeded deadline of {} ms", deadline.as_millis()),
        }),
        Err(RecvTimeoutError::Disconnected) => Err(Failure {
            kind: FailureKind::Panic,
            message: "engine thread terminated unexpectedly".to_string(),
        }),
    }
}

/// Ejecuta un job de punta a punta y retorna el estado terminal alcanzado.
///
/// `deadline = None` espera al motor indefinidamente.
pub fn execute(
    store: &JobStore,
    engine: &Arc<dyn OptimizationEngine>,
    execution: Execution,
    deadline: Option<Duration>,
) -> JobStatus {
    let Execution { job_id, input } = execution;

    info!(job_id = %job_id, engine = engine.name(), "starting job");
    let started = Instant::now();

    let outcome = match deadline {
        Some(deadline) if engine.enforces_deadline() => {
            run_guarded(|| engine.run_with_deadline(&input, deadline))
        }
        Some(deadline) => run_on_helper_thread(engine, job_id, input, deadline),
        None => run_guarded(|| engine.run(&input)),
    };

    let elapsed = started.elapsed();

    let update = match outcome {
        Ok(result) => {
            info!(job_id = %job_id, execution_time = elapsed.as_secs_f64(), "job completed");
            JobUpdate::completed(result, elapsed)
        }
        Err(Failure { kind, message }) => {
            error!(job_id = %job_id, kind = ?kind, error = %message, "job failed");
            JobUpdate::failed(message, kind, elapsed)
        }
    };

    let status = update.status();

    match store.update(job_id, update) {
        Ok(true) => {}
        Ok(false) => debug!(job_id = %job_id, "job evicted before it finished; result dropped"),
        Err(e) => error!(job_id = %job_id, error = %e, "failed to record job outcome"),
    }

    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine<F>(f: F) -> Arc<dyn OptimizationEngine>
    where
        F: Fn(&Value) -> Result<Value, EngineError> + Send + Sync + 'static,
    {
        Arc::new(f)
    }

    fn submitted(store: &JobStore, input: Value) -> Execution {
        let job_id = JobId::new();
        store.create(job_id).unwrap();
        Execution { job_id, input }
    }

    #[test]
    fn test_execute_success() {
        let store = JobStore::new();
        let execution = submitted(&store, json!({"x": 1}));
        let job_id = execution.job_id;
        let engine = engine(|input| Ok(json!({"y": input["x"].as_i64().unwrap_or(0) + 1})));

        let status = execute(&store, &engine, execution, None);

        assert_eq!(status, JobStatus::Completed);
        let record = store.get(job_id).unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.result, Some(json!({"y": 2})));
        assert!(record.error.is_none());
        assert!(record.execution_time.is_some());
    }

    #[test]
    fn test_execute_engine_error() {
        let store = JobStore::new();
        let execution = submitted(&store, json!({"x": 1}));
        let job_id = execution.job_id;
        let engine = engine(|_| Err(EngineError::failed("bad input")));

        let status = execute(&store, &engine, execution, None);

        assert_eq!(status, JobStatus::Failed);
        let record = store.get(job_id).unwrap().unwrap();
        assert_eq!(record.error.as_deref(), Some("bad input"));
        assert_eq!(record.error_kind, Some(FailureKind::Engine));
        assert!(record.result.is_none());
        assert!(record.execution_time.is_some());
    }

    #[test]
    fn test_execute_catches_panic() {
        let store = JobStore::new();
        let execution = submitted(&store, json!({"x": 1}));
        let job_id = execution.job_id;
        let engine = engine(|_| panic!("index out of bounds"));

        let status = execute(&store, &engine, execution, None);

        assert_eq!(status, JobStatus::Failed);
        let record = store.get(job_id).unwrap().unwrap();
        assert_eq!(record.error_kind, Some(FailureKind::Panic));
        assert!(record.error.unwrap().contains("index out of bounds"));
    }

    #[test]
    fn test_execute_catches_panic_with_deadline() {
        let store = JobStore::new();
        let execution = submitted(&store, json!({}));
        let job_id = execution.job_id;
        let engine = engine(|_| panic!("boom"));

        execute(&store, &engine, execution, Some(Duration::from_secs(5)));

        let record = store.get(job_id).unwrap().unwrap();
        assert_eq!(record.error_kind, Some(FailureKind::Panic));
    }

    #[test]
    fn test_execute_deadline_exceeded() {
        let store = JobStore::new();
        let execution = submitted(&store, json!({}));
        let job_id = execution.job_id;
        let engine = engine(|_| {
            thread::sleep(Duration::from_millis(500));
            Ok(json!({"late": true}))
        });

        let started = Instant::now();
        let status = execute(&store, &engine, execution, Some(Duration::from_millis(50)));

        assert!(started.elapsed() < Duration::from_millis(400));
        assert_eq!(status, JobStatus::Failed);
        let record = store.get(job_id).unwrap().unwrap();
        assert_eq!(record.error_kind, Some(FailureKind::Timeout));
        assert!(record.error.unwrap().contains("50 ms"));

        // El resultado tardío se descarta
        thread::sleep(Duration::from_millis(600));
        assert_eq!(store.get(job_id).unwrap().unwrap().status, JobStatus::Failed);
    }

    /// Motor que respeta el deadline por sí mismo y registra qué llamada recibió
    struct SelfTimedEngine {
        bounded_calls: std::sync::atomic::AtomicUsize,
    }

    impl OptimizationEngine for SelfTimedEngine {
        fn run(&self, _input: &Value) -> Result<Value, EngineError> {
            Ok(json!({"unbounded": true}))
        }

        fn enforces_deadline(&self) -> bool {
            true
        }

        fn run_with_deadline(&self, _input: &Value, deadline: Duration) -> Result<Value, EngineError> {
            self.bounded_calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err(EngineError::Timeout(deadline))
        }
    }

    #[test]
    fn test_execute_uses_engine_deadline() {
        let store = JobStore::new();
        let execution = submitted(&store, json!({}));
        let job_id = execution.job_id;
        let timed = Arc::new(SelfTimedEngine {
            bounded_calls: Default::default(),
        });
        let engine: Arc<dyn OptimizationEngine> = timed.clone();

        let status = execute(&store, &engine, execution, Some(Duration::from_millis(80)));

        assert_eq!(status, JobStatus::Failed);
        assert_eq!(timed.bounded_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        let record = store.get(job_id).unwrap().unwrap();
        assert_eq!(record.error_kind, Some(FailureKind::Timeout));
        assert!(record.error.unwrap().contains("80 ms"));
    }

    #[cfg(unix)]
    #[test]
    fn test_execute_timeout_stops_command_engine() {
        use crate::engine::CommandEngine;

        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("finished");
        let store = JobStore::new();
        let execution = submitted(&store, json!({"x": 1}));
        let job_id = execution.job_id;
        let engine: Arc<dyn OptimizationEngine> = Arc::new(CommandEngine::new(
            "sh",
            vec![
                "-c".to_string(),
                format!("cat > /dev/null; sleep 1; touch '{}'; echo '{{}}'", marker.display()),
            ],
        ));

        let status = execute(&store, &engine, execution, Some(Duration::from_millis(100)));

        assert_eq!(status, JobStatus::Failed);
        assert_eq!(
            store.get(job_id).unwrap().unwrap().error_kind,
            Some(FailureKind::Timeout)
        );

        thread::sleep(Duration::from_millis(1500));
        assert!(!marker.exists());
    }

    #[test]
    fn test_execute_within_deadline() {
        let store = JobStore::new();
        let execution = submitted(&store, json!({}));
        let job_id = execution.job_id;
        let engine = engine(|_| Ok(json!({"ok": true})));

        let status = execute(&store, &engine, execution, Some(Duration::from_secs(5)));

        assert_eq!(status, JobStatus::Completed);
        assert_eq!(store.get(job_id).unwrap().unwrap().result, Some(json!({"ok": true})));
    }

    #[test]
    fn test_execute_after_eviction_is_noop() {
        let store = JobStore::new();
        let execution = submitted(&store, json!({}));
        let job_id = execution.job_id;
        store
            .evict_created_before(chrono::Utc::now() + chrono::Duration::seconds(1))
            .unwrap();
        let engine = engine(|_| Ok(json!({})));

        execute(&store, &engine, execution, None);

        assert!(store.get(job_id).unwrap().is_none());
    }
}
