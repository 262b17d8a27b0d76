//! # Limpieza Periódica de Jobs
//! src/jobs/reaper.rs
//!
//! Un thread en segundo plano que cada `interval` desaloja los jobs creados
//! hace más de `retention`, sin importar su estado. Un job en curso que se
//! desaloja simplemente pierde su resultado.

use crate::jobs::storage::JobStore;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

/// Handle del thread de limpieza
pub struct Reaper {
    store: JobStore,
    retention: Duration,
    stop_tx: Mutex<Option<Sender<()>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

/// Una pasada de limpieza. Retorna cuántos jobs se desalojaron.
pub fn sweep_once(store: &JobStore, retention: Duration) -> usize {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| store.evict_older_than(retention)));

    match outcome {
        Ok(Ok(evicted)) => {
            if evicted > 0 {
                info!(evicted, "removed expired jobs");
            } else {
                debug!("no expired jobs");
            }
            evicted
        }
        Ok(Err(e)) => {
            error!(error = %e, "job sweep failed");
            0
        }
        Err(_) => {
            error!("job sweep panicked");
            0
        }
    }
}

impl Reaper {
    /// Lanza el thread de limpieza
    pub fn spawn(store: JobStore, retention: Duration, interval: Duration) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let sweeper = store.clone();

        let handle = thread::Builder::new()
            .name("job-reaper".to_string())
            .spawn(move || {
                info!(
                    retention_secs = retention.as_secs(),
                    interval_secs = interval.as_secs(),
                    "job reaper started"
                );

                loop {
                    // La espera del intervalo también es la señal de parada
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            sweep_once(&sweeper, retention);
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }

                info!("job reaper stopped");
            })?;

        Ok(Self {
            store,
            retention,
            stop_tx: Mutex::new(Some(stop_tx)),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Corre una pasada ahora, fuera del ciclo periódico
    pub fn sweep_once(&self) -> usize {
        sweep_once(&self.store, self.retention)
    }

    /// Detiene el thread y espera a que termine. Llamarlo dos veces no hace nada.
    pub fn stop(&self) {
        if let Ok(mut tx) = self.stop_tx.lock() {
            if let Some(tx) = tx.take() {
                let _ = tx.send(());
            }
        }

        let handle = self.handle.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("job reaper thread panicked");
            }
        }
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.stop();
    }
}
